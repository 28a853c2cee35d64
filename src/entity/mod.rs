//! SeaORM entity definitions for the PostgreSQL backend.

pub mod project;
pub mod test_case;
pub mod test_run;
pub mod test_run_result;
pub mod test_suite;
