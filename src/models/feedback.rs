//! Manual feedback tags
//!
//! Human reviewers tag transmitters through the host platform's UI; the
//! scorer reads those tags to boost or suppress behavioral scores. The tag
//! table is read-only here.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};

/// Reviewer verdict attached to a transmitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackKind {
    Threat,
    Suspect,
    FalsePositive,
    Investigate,
}

impl FeedbackKind {
    /// Parse the tag text stored by the review UI. Unknown tags are
    /// treated as no tag at all.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "THREAT" => Some(FeedbackKind::Threat),
            "SUSPECT" => Some(FeedbackKind::Suspect),
            "FALSE_POSITIVE" => Some(FeedbackKind::FalsePositive),
            "INVESTIGATE" => Some(FeedbackKind::Investigate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Threat => "THREAT",
            FeedbackKind::Suspect => "SUSPECT",
            FeedbackKind::FalsePositive => "FALSE_POSITIVE",
            FeedbackKind::Investigate => "INVESTIGATE",
        }
    }
}

/// One active tag for one transmitter
#[derive(Debug, Clone)]
pub struct FeedbackTag {
    pub bssid: String,
    pub kind: FeedbackKind,
    pub confidence: f64,
    pub notes: Option<String>,
}

impl FeedbackTag {
    /// Load every active tag. Called once per run; the result is held in an
    /// in-memory map for the duration of that run only, so edits made
    /// between runs are always picked up.
    pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT bssid, threat_tag, threat_confidence, notes
            FROM network_tags
            WHERE threat_tag IS NOT NULL
            "#
        )
        .fetch_all(pool)
        .await?;

        let mut tags = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.get("threat_tag");
            let Some(kind) = FeedbackKind::parse(&raw) else {
                tracing::warn!("Ignoring unknown threat tag {:?}", raw);
                continue;
            };
            tags.push(FeedbackTag {
                bssid: row.get("bssid"),
                kind,
                // Missing confidence means the reviewer was certain
                confidence: row.get::<Option<f64>, _>("threat_confidence").unwrap_or(1.0),
                notes: row.get("notes"),
            });
        }

        Ok(tags)
    }
}
