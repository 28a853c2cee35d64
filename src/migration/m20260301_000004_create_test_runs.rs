//! Migration: Create test_runs table.

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
                CREATE TABLE test_runs (
                    id UUID PRIMARY KEY,
                    project_id UUID NOT NULL,
                    name VARCHAR(200) NOT NULL,
                    description TEXT NOT NULL DEFAULT '',

                    -- Ordered suite-id snapshot frozen at creation time
                    suite_ids JSONB NOT NULL DEFAULT '[]'::jsonb,

                    created_by VARCHAR(200) NOT NULL,
                    started_at TIMESTAMPTZ NOT NULL,
                    completed_at TIMESTAMPTZ,
                    status VARCHAR(20) NOT NULL DEFAULT 'in_progress'
                        CHECK (status IN ('in_progress', 'completed')),

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Index for project lookup
                CREATE INDEX idx_test_runs_project_id ON test_runs(project_id);

                -- Index for listing latest runs first
                CREATE INDEX idx_test_runs_started_at ON test_runs(started_at DESC);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS test_runs;")
            .await?;

        Ok(())
    }
}
