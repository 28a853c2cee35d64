//! Migration: Create test_run_results table.
//!
//! At most one row exists per (test_run_id, test_case_id) pair. The ledger
//! enforces this via upsert lookup, not a unique constraint, matching the
//! store contract.

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
                CREATE TABLE test_run_results (
                    id UUID PRIMARY KEY,
                    test_run_id UUID NOT NULL,
                    test_case_id UUID NOT NULL,

                    status VARCHAR(20) NOT NULL DEFAULT 'not_run'
                        CHECK (status IN ('pass', 'fail', 'skip', 'blocked', 'not_run')),

                    -- Optional execution details; NULL means never set
                    comment TEXT,
                    bug_id VARCHAR(100),
                    executed_at TIMESTAMPTZ,
                    executed_by VARCHAR(200),

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Index for the per-run full scan the ledger performs
                CREATE INDEX idx_test_run_results_run_id ON test_run_results(test_run_id);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS test_run_results;")
            .await?;

        Ok(())
    }
}
