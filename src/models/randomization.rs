//! MAC randomization suspect model

use serde::Serialize;
use sqlx::PgPool;

/// Suspect status: `confirmed` at confidence >= 0.7, `suspected` below
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SuspectStatus {
    Confirmed,
    Suspected,
}

impl SuspectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuspectStatus::Confirmed => "confirmed",
            SuspectStatus::Suspected => "suspected",
        }
    }
}

/// An address family heuristically believed to be one device rotating its
/// MAC. Only written when confidence >= 0.5.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RandomizationSuspect {
    pub oui: String,
    pub mac_count: i32,
    pub mac_sequence: Vec<String>,
    pub avg_distance_km: f64,
    pub movement_speed_kmh: f64,
    pub confidence_score: f64,
    pub status: SuspectStatus,
}

impl RandomizationSuspect {
    /// Idempotent upsert keyed by oui
    pub async fn upsert(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO mac_randomization_suspects
                (oui, mac_count, mac_sequence, avg_distance_km,
                 movement_speed_kmh, confidence_score, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (oui) DO UPDATE SET
                mac_count = EXCLUDED.mac_count,
                mac_sequence = EXCLUDED.mac_sequence,
                avg_distance_km = EXCLUDED.avg_distance_km,
                movement_speed_kmh = EXCLUDED.movement_speed_kmh,
                confidence_score = EXCLUDED.confidence_score,
                status = EXCLUDED.status,
                updated_at = NOW()
            "#
        )
        .bind(&self.oui)
        .bind(self.mac_count)
        .bind(&self.mac_sequence)
        .bind(self.avg_distance_km)
        .bind(self.movement_speed_kmh)
        .bind(self.confidence_score)
        .bind(self.status.as_str())
        .execute(pool)
        .await?;

        Ok(())
    }
}
