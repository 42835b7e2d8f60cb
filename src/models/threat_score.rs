//! Threat score model

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Version tag of the behavioral scoring formula in effect.
/// Bump when the formula changes so downstream consumers can tell
/// which model produced a stored score.
pub const MODEL_VERSION: &str = "2.0.0";

/// Five-tier threat level bucketed from a 0-100 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatLevel {
    None,
    Low,
    Med,
    High,
    Critical,
}

impl ThreatLevel {
    /// Bucket a final score into a threat level (thresholds 80/60/40/20)
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            ThreatLevel::Critical
        } else if score >= 60.0 {
            ThreatLevel::High
        } else if score >= 40.0 {
            ThreatLevel::Med
        } else if score >= 20.0 {
            ThreatLevel::Low
        } else {
            ThreatLevel::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::None => "NONE",
            ThreatLevel::Low => "LOW",
            ThreatLevel::Med => "MED",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Critical => "CRITICAL",
        }
    }
}

/// One scored transmitter. Recomputed and overwritten on every analysis
/// run; the host platform's dashboard reads the persisted rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreatScore {
    pub bssid: String,
    /// Base behavioral score before feedback adjustment (0-100)
    pub ml_threat_score: f64,
    pub ml_threat_probability: f64,
    pub ml_primary_class: String,
    /// Score after feedback boost/suppression (0-100)
    pub final_threat_score: f64,
    pub final_threat_level: ThreatLevel,
    pub feedback_applied: bool,
    pub manual_tag: Option<String>,
}

impl ThreatScore {
    /// Idempotent upsert keyed by bssid
    pub async fn upsert(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO network_threat_scores
                (bssid, ml_threat_score, ml_threat_probability, ml_primary_class,
                 final_threat_score, final_threat_level, model_version,
                 feedback_applied, manual_tag)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (bssid) DO UPDATE SET
                ml_threat_score = EXCLUDED.ml_threat_score,
                ml_threat_probability = EXCLUDED.ml_threat_probability,
                ml_primary_class = EXCLUDED.ml_primary_class,
                final_threat_score = EXCLUDED.final_threat_score,
                final_threat_level = EXCLUDED.final_threat_level,
                model_version = EXCLUDED.model_version,
                feedback_applied = EXCLUDED.feedback_applied,
                manual_tag = EXCLUDED.manual_tag,
                updated_at = NOW()
            "#
        )
        .bind(&self.bssid)
        .bind(self.ml_threat_score)
        .bind(self.ml_threat_probability)
        .bind(&self.ml_primary_class)
        .bind(self.final_threat_score)
        .bind(self.final_threat_level.as_str())
        .bind(MODEL_VERSION)
        .bind(self.feedback_applied)
        .bind(&self.manual_tag)
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_thresholds() {
        assert_eq!(ThreatLevel::from_score(0.0), ThreatLevel::None);
        assert_eq!(ThreatLevel::from_score(19.9), ThreatLevel::None);
        assert_eq!(ThreatLevel::from_score(20.0), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_score(40.0), ThreatLevel::Med);
        assert_eq!(ThreatLevel::from_score(60.0), ThreatLevel::High);
        assert_eq!(ThreatLevel::from_score(79.9), ThreatLevel::High);
        assert_eq!(ThreatLevel::from_score(80.0), ThreatLevel::Critical);
        assert_eq!(ThreatLevel::from_score(100.0), ThreatLevel::Critical);
    }

    #[test]
    fn test_level_labels() {
        assert_eq!(ThreatLevel::None.as_str(), "NONE");
        assert_eq!(ThreatLevel::Critical.as_str(), "CRITICAL");
    }
}
