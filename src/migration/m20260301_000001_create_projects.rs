//! Migration: Create projects table.
//!
//! Projects are the root of containment. No foreign keys anywhere in this
//! schema: cascade deletes are issued explicitly by the service layer, so the
//! store enforces no referential integrity.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE projects (
                    id UUID PRIMARY KEY, -- UUIDv7 for time-ordered sorting
                    name VARCHAR(200) NOT NULL,
                    description TEXT NOT NULL DEFAULT '',

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Index for listing by creation date
                CREATE INDEX idx_projects_created_at ON projects(created_at DESC);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS projects;")
            .await?;

        Ok(())
    }
}
