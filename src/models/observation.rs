//! Read-only accessors over the observation store
//!
//! `access_points` and `observations` are owned by the ingest layer; the
//! engine only aggregates them. Every query here is bounded (LIMIT plus
//! HAVING filters) so a run cannot balloon with the store.

use sqlx::{FromRow, PgPool};
use chrono::{DateTime, Utc};

/// Per-transmitter behavioral aggregate consumed by the scorer
#[derive(Debug, Clone, FromRow)]
pub struct BehavioralAggregate {
    pub bssid: String,
    pub observation_count: i64,
    /// Distinct calendar days on which the transmitter was sighted
    pub unique_days: i64,
    /// Coarse bounding-box estimate of the largest displacement between
    /// sightings, in km. Not great-circle distance; 1 degree ~ 111 km.
    pub max_distance_km: f64,
}

impl BehavioralAggregate {
    /// Transmitters qualifying for this scoring run: position-bearing,
    /// above the observation floor, ordered by bssid for determinism,
    /// capped at `limit`. A transmitter left out by the cap is "not yet
    /// scored this cycle", not cleared.
    pub async fn fetch_for_scoring(
        pool: &PgPool,
        limit: i64,
        min_observations: i64,
        max_bssid_length: i32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BehavioralAggregate>(
            r#"
            SELECT
                ap.bssid,
                COUNT(DISTINCT obs.id) AS observation_count,
                COUNT(DISTINCT DATE(obs.observed_at)) AS unique_days,
                COALESCE(
                    (MAX(obs.lat) - MIN(obs.lat) + MAX(obs.lon) - MIN(obs.lon)) * 111.0,
                    0
                ) AS max_distance_km
            FROM access_points ap
            JOIN observations obs ON ap.bssid = obs.bssid
            WHERE ap.bssid IS NOT NULL
              AND LENGTH(ap.bssid) <= $1
              AND obs.lat IS NOT NULL
              AND obs.lon IS NOT NULL
            GROUP BY ap.bssid
            HAVING COUNT(DISTINCT obs.id) > $2
            ORDER BY ap.bssid
            LIMIT $3
            "#
        )
        .bind(max_bssid_length)
        .bind(min_observations)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

/// One transmitter joined with its latest final score, keyed by OUI.
/// Rows arrive ordered by (oui, final_score DESC) so the grouper can fold
/// them into families in a single pass.
#[derive(Debug, Clone, FromRow)]
pub struct FamilyMemberRow {
    pub oui: String,
    pub bssid: String,
    pub final_score: f64,
}

impl FamilyMemberRow {
    pub async fn fetch_all(pool: &PgPool, oui_prefix_length: i32) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FamilyMemberRow>(
            r#"
            SELECT
                SUBSTRING(ap.bssid, 1, $1) AS oui,
                ap.bssid,
                COALESCE(ts.final_threat_score, 0) AS final_score
            FROM access_points ap
            LEFT JOIN network_threat_scores ts ON ap.bssid = ts.bssid
            WHERE ap.bssid IS NOT NULL
            ORDER BY SUBSTRING(ap.bssid, 1, $1), COALESCE(ts.final_threat_score, 0) DESC, ap.bssid
            "#
        )
        .bind(oui_prefix_length)
        .fetch_all(pool)
        .await
    }
}

/// One OUI family with enough distinct addresses to be a randomization
/// candidate, with its aggregate sighting window and mean position
#[derive(Debug, Clone, FromRow)]
pub struct RandomizationCandidate {
    pub oui: String,
    pub mac_count: i64,
    pub mac_sequence: Vec<String>,
    pub avg_lat: Option<f64>,
    pub avg_lon: Option<f64>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl RandomizationCandidate {
    /// Families with >= `min_members` distinct position-bearing addresses,
    /// largest first, capped at `limit`
    pub async fn fetch(
        pool: &PgPool,
        min_members: i64,
        limit: i64,
        oui_prefix_length: i32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, RandomizationCandidate>(
            r#"
            SELECT
                SUBSTRING(ap.bssid, 1, $1) AS oui,
                COUNT(DISTINCT ap.bssid) AS mac_count,
                ARRAY_AGG(DISTINCT ap.bssid) AS mac_sequence,
                AVG(obs.lat) AS avg_lat,
                AVG(obs.lon) AS avg_lon,
                MIN(obs.observed_at) AS first_seen,
                MAX(obs.observed_at) AS last_seen
            FROM access_points ap
            JOIN observations obs ON ap.bssid = obs.bssid
            WHERE obs.lat IS NOT NULL
              AND obs.lon IS NOT NULL
            GROUP BY SUBSTRING(ap.bssid, 1, $1)
            HAVING COUNT(DISTINCT ap.bssid) >= $2
            ORDER BY COUNT(DISTINCT ap.bssid) DESC
            LIMIT $3
            "#
        )
        .bind(oui_prefix_length)
        .bind(min_members)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
