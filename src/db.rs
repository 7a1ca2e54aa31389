//! Database module
//!
//! Connectivity and schema checks for the Postgres backend.

use sqlx::PgPool;

/// Tables created by `migrations/0001_initial.sql`
const REQUIRED_TABLES: &[&str] = &[
    "api_keys",
    "users",
    "subjects",
    "students",
    "educators",
    "educator_subjects",
    "student_favorite_subjects",
    "sessions",
    "reviews",
    "transactions",
    "payout_accounts",
    "audit_logs",
];

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables and the booking overlap constraint exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    let has_overlap_guard: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM pg_constraint WHERE conname = 'sessions_no_overlap')",
    )
    .fetch_one(pool)
    .await?;

    if !has_overlap_guard {
        tracing::error!("Constraint 'sessions_no_overlap' is missing. Please run migrations.");
        return Ok(false);
    }

    tracing::info!(tables = REQUIRED_TABLES.len(), "Database schema verified");
    Ok(true)
}
