//! Database module - PostgreSQL connection and migrations
//!
//! The engine owns only its three derived tables. The observation store
//! (`access_points`, `observations`) and the feedback store (`network_tags`)
//! are populated by the host platform's ingest layer and are read-only here.

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create tables if not exist
    sqlx::query(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Behavioral threat scores (one row per transmitter, overwritten each run)
CREATE TABLE IF NOT EXISTS network_threat_scores (
    bssid VARCHAR(17) PRIMARY KEY,
    ml_threat_score DOUBLE PRECISION NOT NULL,
    ml_threat_probability DOUBLE PRECISION NOT NULL,
    ml_primary_class VARCHAR(20) NOT NULL,
    final_threat_score DOUBLE PRECISION NOT NULL,
    final_threat_level VARCHAR(20) NOT NULL,
    model_version VARCHAR(20) NOT NULL,
    feedback_applied BOOLEAN NOT NULL DEFAULT false,
    manual_tag VARCHAR(50),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- OUI device groups (multi-radio devices inferred from shared address prefix)
CREATE TABLE IF NOT EXISTS oui_device_groups (
    oui VARCHAR(8) PRIMARY KEY,
    device_count INT NOT NULL,
    collective_threat_score DOUBLE PRECISION NOT NULL,
    threat_level VARCHAR(20) NOT NULL,
    primary_bssid VARCHAR(17) NOT NULL,
    secondary_bssids TEXT[] NOT NULL,
    last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- MAC randomization suspects (address families likely one rotating device)
CREATE TABLE IF NOT EXISTS mac_randomization_suspects (
    oui VARCHAR(8) PRIMARY KEY,
    mac_count INT NOT NULL,
    mac_sequence TEXT[] NOT NULL,
    avg_distance_km DOUBLE PRECISION NOT NULL,
    movement_speed_kmh DOUBLE PRECISION NOT NULL,
    confidence_score DOUBLE PRECISION NOT NULL,
    status VARCHAR(20) NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_threat_scores_level ON network_threat_scores(final_threat_level);
CREATE INDEX IF NOT EXISTS idx_threat_scores_updated ON network_threat_scores(updated_at);
CREATE INDEX IF NOT EXISTS idx_oui_groups_level ON oui_device_groups(threat_level);
CREATE INDEX IF NOT EXISTS idx_mac_suspects_status ON mac_randomization_suspects(status);
"#;
