//! Behavioral threat scoring stage
//!
//! Scores every qualifying transmitter from two weak behavioral signals
//! (how far it moves, how many days it keeps showing up) and then adjusts
//! the result with reviewer feedback tags. The thresholds are deliberately
//! simple linear rules inherited from the v2.0 model; changing them changes
//! production classifications, so treat any tuning as a model version bump.

use std::collections::HashMap;
use std::time::Instant;

use sqlx::PgPool;

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::jobs::StageSummary;
use crate::models::{BehavioralAggregate, FeedbackKind, FeedbackTag, ThreatLevel, ThreatScore};

const MOBILITY_HIGH_KM: f64 = 5.0;
const MOBILITY_MED_KM: f64 = 1.0;
const PERSISTENCE_HIGH_DAYS: i64 = 7;
const PERSISTENCE_MED_DAYS: i64 = 3;

const MOBILITY_WEIGHT: f64 = 0.6;
const PERSISTENCE_WEIGHT: f64 = 0.4;

const FALSE_POSITIVE_MULTIPLIER: f64 = 0.1;
const THREAT_BOOST: f64 = 0.3;
const SUSPECT_BOOST: f64 = 0.15;

/// Base score threshold for the THREAT primary class
const THREAT_CLASS_THRESHOLD: f64 = 60.0;

/// Compute one transmitter's score record. Pure and deterministic: the same
/// aggregate and tag always produce the same record.
pub fn score_transmitter(
    agg: &BehavioralAggregate,
    tag: Option<&FeedbackTag>,
) -> ThreatScore {
    // Missing or zero displacement/days simply contribute nothing
    let mobility = if agg.max_distance_km > MOBILITY_HIGH_KM {
        80.0
    } else if agg.max_distance_km > MOBILITY_MED_KM {
        40.0
    } else {
        0.0
    };

    let persistence = if agg.unique_days > PERSISTENCE_HIGH_DAYS {
        60.0
    } else if agg.unique_days > PERSISTENCE_MED_DAYS {
        30.0
    } else {
        0.0
    };

    let base_score = mobility * MOBILITY_WEIGHT + persistence * PERSISTENCE_WEIGHT;

    let (final_score, feedback_applied) = match tag {
        Some(tag) => {
            let adjusted = match tag.kind {
                FeedbackKind::FalsePositive => base_score * FALSE_POSITIVE_MULTIPLIER,
                FeedbackKind::Threat => base_score * (1.0 + tag.confidence * THREAT_BOOST),
                FeedbackKind::Suspect => base_score * (1.0 + tag.confidence * SUSPECT_BOOST),
                FeedbackKind::Investigate => base_score,
            };
            (adjusted, true)
        }
        None => (base_score, false),
    };

    ThreatScore {
        bssid: agg.bssid.clone(),
        ml_threat_score: base_score,
        ml_threat_probability: base_score / 100.0,
        ml_primary_class: if base_score >= THREAT_CLASS_THRESHOLD {
            "THREAT".to_string()
        } else {
            "LEGITIMATE".to_string()
        },
        final_threat_score: final_score,
        final_threat_level: ThreatLevel::from_score(final_score),
        feedback_applied,
        manual_tag: tag.map(|t| t.kind.as_str().to_string()),
    }
}

/// Run the scoring stage: load qualifying transmitters and the full tag
/// table, score each transmitter, upsert each record. A record that fails
/// to write is logged and skipped; failing to read either input set aborts
/// the stage.
pub async fn run(pool: &PgPool, config: &Config) -> EngineResult<StageSummary> {
    let started = Instant::now();
    tracing::info!("Behavioral scoring starting");

    let networks = BehavioralAggregate::fetch_for_scoring(
        pool,
        config.scoring_batch_limit,
        config.min_observations,
        config.max_bssid_length,
    )
    .await
    .map_err(|e| EngineError::stage("scoring", e))?;

    // The tag table is small relative to the transmitter count; load it
    // once per run so edits between runs never leak stale state
    let tags = FeedbackTag::fetch_all(pool)
        .await
        .map_err(|e| EngineError::stage("scoring", e))?;

    let tag_map: HashMap<&str, &FeedbackTag> =
        tags.iter().map(|t| (t.bssid.as_str(), t)).collect();

    tracing::info!(
        "Scoring {} transmitters ({} manual tags loaded)",
        networks.len(),
        tag_map.len()
    );

    let mut written = 0usize;
    let mut failed = 0usize;

    for net in &networks {
        let score = score_transmitter(net, tag_map.get(net.bssid.as_str()).copied());

        match score.upsert(pool).await {
            Ok(()) => written += 1,
            Err(err) => {
                failed += 1;
                tracing::warn!("Failed to write score for {}: {}", net.bssid, err);
            }
        }
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        "Behavioral scoring complete: {} scored, {} failed in {}ms",
        written,
        failed,
        duration_ms
    );

    Ok(StageSummary {
        processed: networks.len(),
        written,
        failed,
        duration_ms,
    })
}
