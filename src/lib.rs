//! Testdeck server library.
//!
//! This library provides the core functionality for the test-case management
//! server: the entity store, the run execution and aggregation engine,
//! authentication, and API services.

pub mod api;
pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
pub mod store;
