//! Migration: Create test_cases table.
//!
//! `sequence` is nullable: legacy rows without an assigned sequence are
//! backfilled positionally by the ordering service at read time.

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
                CREATE TABLE test_cases (
                    id UUID PRIMARY KEY,
                    project_id UUID NOT NULL,
                    suite_id UUID NOT NULL,

                    title VARCHAR(500) NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    preconditions TEXT NOT NULL DEFAULT '',
                    test_steps TEXT NOT NULL DEFAULT '',
                    expected_result TEXT NOT NULL DEFAULT '',

                    -- Ordering within suite (gaps allowed, no uniqueness)
                    sequence INTEGER,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Index for suite lookup
                CREATE INDEX idx_test_cases_suite_id ON test_cases(suite_id);

                -- Index for project-wide queries
                CREATE INDEX idx_test_cases_project_id ON test_cases(project_id);

                -- Index for ordering within suite
                CREATE INDEX idx_test_cases_sequence ON test_cases(suite_id, sequence);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS test_cases;")
            .await?;

        Ok(())
    }
}
