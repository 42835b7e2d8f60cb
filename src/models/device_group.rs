//! OUI device group model

use serde::Serialize;
use sqlx::PgPool;

use super::ThreatLevel;

/// A multi-radio device inferred from transmitters sharing an address
/// prefix. `device_count == 1 + secondary_bssids.len()` always holds;
/// single-member families are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OuiDeviceGroup {
    pub oui: String,
    pub device_count: i32,
    pub collective_threat_score: f64,
    pub threat_level: ThreatLevel,
    /// Member with the highest final score; ties go to the first
    /// encountered in the read ordering
    pub primary_bssid: String,
    /// Remaining members in descending score order
    pub secondary_bssids: Vec<String>,
}

impl OuiDeviceGroup {
    /// Idempotent upsert keyed by oui
    pub async fn upsert(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO oui_device_groups
                (oui, device_count, collective_threat_score, threat_level,
                 primary_bssid, secondary_bssids)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (oui) DO UPDATE SET
                device_count = EXCLUDED.device_count,
                collective_threat_score = EXCLUDED.collective_threat_score,
                threat_level = EXCLUDED.threat_level,
                primary_bssid = EXCLUDED.primary_bssid,
                secondary_bssids = EXCLUDED.secondary_bssids,
                last_updated = NOW()
            "#
        )
        .bind(&self.oui)
        .bind(self.device_count)
        .bind(self.collective_threat_score)
        .bind(self.threat_level.as_str())
        .bind(&self.primary_bssid)
        .bind(&self.secondary_bssids)
        .execute(pool)
        .await?;

        Ok(())
    }
}
