//! MAC randomization detection stage
//!
//! Flags address families that look like one device rotating its MAC for
//! privacy rather than several distinct devices. These are heuristics, not
//! a statistical model: two weak signals (member count, sighting-window
//! shape) averaged into a confidence. The speed and distance figures are
//! crude proxies kept for dashboard compatibility, not measurements.

use std::time::Instant;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::jobs::StageSummary;
use crate::models::{RandomizationCandidate, RandomizationSuspect, SuspectStatus};

/// Minimum distinct addresses for a family to be assessed
const MIN_MAC_COUNT: i64 = 3;

/// Confidence floor below which nothing is persisted
const MATERIALIZE_THRESHOLD: f64 = 0.5;

/// Confidence at or above which a suspect is marked confirmed
const CONFIRMED_THRESHOLD: f64 = 0.7;

/// The plausible address-rotation window: rotation cycles shorter than a
/// day or longer than 30 days look like ordinary distinct devices
const ROTATION_WINDOW_MIN_HOURS: f64 = 24.0;
const ROTATION_WINDOW_MAX_HOURS: f64 = 720.0;

/// Heuristic verdict for one address family
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub confidence_score: f64,
    pub status: SuspectStatus,
    pub movement_speed_kmh: f64,
    pub avg_distance_km: f64,
}

/// Hours between first and last sighting; 0 when either timestamp is absent
pub fn sighting_window_hours(
    first_seen: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
) -> f64 {
    match (first_seen, last_seen) {
        (Some(first), Some(last)) => {
            (last - first).num_seconds().max(0) as f64 / 3600.0
        }
        _ => 0.0,
    }
}

/// Assess one family from its member count and sighting window.
/// Pure and deterministic.
pub fn assess(mac_count: i64, time_delta_hours: f64) -> Assessment {
    // Crude proxy: more addresses over a shorter window implies movement.
    // Not a true velocity.
    let movement_speed_kmh = if time_delta_hours > 0.0 {
        (mac_count as f64 * 2.0) / time_delta_hours
    } else {
        0.0
    };

    let mac_count_confidence = if mac_count >= 5 {
        0.8
    } else if mac_count >= MIN_MAC_COUNT {
        0.6
    } else {
        0.3
    };

    let time_confidence = if time_delta_hours > ROTATION_WINDOW_MIN_HOURS
        && time_delta_hours < ROTATION_WINDOW_MAX_HOURS
    {
        0.8
    } else {
        0.4
    };

    let confidence_score = (mac_count_confidence + time_confidence) / 2.0;

    Assessment {
        confidence_score,
        status: if confidence_score >= CONFIRMED_THRESHOLD {
            SuspectStatus::Confirmed
        } else {
            SuspectStatus::Suspected
        },
        movement_speed_kmh,
        // Placeholder estimate, not a measured distance
        avg_distance_km: mac_count as f64 * 0.5,
    }
}

/// Turn a candidate into a persistable suspect, or None when the family is
/// too small or the confidence falls below the materialization floor
pub fn evaluate_candidate(candidate: &RandomizationCandidate) -> Option<RandomizationSuspect> {
    if candidate.mac_count < MIN_MAC_COUNT {
        return None;
    }

    let window = sighting_window_hours(candidate.first_seen, candidate.last_seen);
    let assessment = assess(candidate.mac_count, window);

    if assessment.confidence_score < MATERIALIZE_THRESHOLD {
        return None;
    }

    Some(RandomizationSuspect {
        oui: candidate.oui.clone(),
        mac_count: candidate.mac_count as i32,
        mac_sequence: candidate.mac_sequence.clone(),
        avg_distance_km: assessment.avg_distance_km,
        movement_speed_kmh: assessment.movement_speed_kmh,
        confidence_score: assessment.confidence_score,
        status: assessment.status,
    })
}

/// Run the detection stage. Reading the candidate set is stage-fatal; a
/// failure writing one suspect is logged and the rest proceed.
pub async fn run(pool: &PgPool, config: &Config) -> EngineResult<StageSummary> {
    let started = Instant::now();
    tracing::info!("MAC randomization detection starting");

    let candidates = RandomizationCandidate::fetch(
        pool,
        MIN_MAC_COUNT,
        config.randomization_candidate_limit,
        config.oui_prefix_length,
    )
    .await
    .map_err(|e| EngineError::stage("randomization", e))?;

    let mut written = 0usize;
    let mut failed = 0usize;

    for candidate in &candidates {
        let Some(suspect) = evaluate_candidate(candidate) else {
            continue;
        };

        match suspect.upsert(pool).await {
            Ok(()) => {
                written += 1;
                tracing::info!(
                    "OUI {}: {} MACs, confidence {:.2}, speed {:.1} km/h ({})",
                    suspect.oui,
                    suspect.mac_count,
                    suspect.confidence_score,
                    suspect.movement_speed_kmh,
                    suspect.status.as_str()
                );
            }
            Err(err) => {
                failed += 1;
                tracing::warn!("Failed to write suspect {}: {}", suspect.oui, err);
            }
        }
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        "MAC randomization detection complete: {} suspects from {} candidates, {} failed in {}ms",
        written,
        candidates.len(),
        failed,
        duration_ms
    );

    Ok(StageSummary {
        processed: candidates.len(),
        written,
        failed,
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(
        oui: &str,
        macs: &[&str],
        first_seen: Option<DateTime<Utc>>,
        last_seen: Option<DateTime<Utc>>,
    ) -> RandomizationCandidate {
        RandomizationCandidate {
            oui: oui.to_string(),
            mac_count: macs.len() as i64,
            mac_sequence: macs.iter().map(|m| m.to_string()).collect(),
            avg_lat: Some(43.65),
            avg_lon: Some(-79.38),
            first_seen,
            last_seen,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hour as i64)
    }

    #[test]
    fn test_boundary_three_macs_48_hours_is_confirmed() {
        // macCountConfidence 0.6, timeConfidence 0.8, mean 0.7 -> confirmed
        let assessment = assess(3, 48.0);
        assert!(assessment.confidence_score >= CONFIRMED_THRESHOLD);
        assert!((assessment.confidence_score - 0.7).abs() < 1e-9);
        assert_eq!(assessment.status, SuspectStatus::Confirmed);
    }

    #[test]
    fn test_five_macs_in_window_is_high_confidence() {
        let assessment = assess(5, 100.0);
        assert!((assessment.confidence_score - 0.8).abs() < 1e-9);
        assert_eq!(assessment.status, SuspectStatus::Confirmed);
    }

    #[test]
    fn test_three_macs_outside_window_is_half_confidence() {
        // 0.6 and 0.4 average to 0.5: materialized but only suspected
        let assessment = assess(3, 12.0);
        assert!((assessment.confidence_score - 0.5).abs() < 1e-9);
        assert_eq!(assessment.status, SuspectStatus::Suspected);
    }

    #[test]
    fn test_rotation_window_bounds_are_exclusive() {
        assert!((assess(3, 24.0).confidence_score - 0.5).abs() < 1e-9);
        assert!((assess(3, 720.0).confidence_score - 0.5).abs() < 1e-9);
        assert!((assess(3, 24.1).confidence_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_speed_proxy() {
        let assessment = assess(4, 2.0);
        assert!((assessment.movement_speed_kmh - 4.0).abs() < 1e-9);
        // Zero window means no speed estimate
        assert_eq!(assess(4, 0.0).movement_speed_kmh, 0.0);
    }

    #[test]
    fn test_distance_placeholder() {
        assert!((assess(6, 48.0).avg_distance_km - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_sighting_window() {
        assert!((sighting_window_hours(Some(at(0)), Some(at(48))) - 48.0).abs() < 1e-9);
        assert_eq!(sighting_window_hours(None, Some(at(48))), 0.0);
        assert_eq!(sighting_window_hours(Some(at(0)), None), 0.0);
        // Inverted timestamps clamp to zero rather than going negative
        assert_eq!(sighting_window_hours(Some(at(48)), Some(at(0))), 0.0);
    }

    #[test]
    fn test_candidate_below_floor_not_materialized() {
        // 2 MACs never qualify regardless of window
        let c = candidate("AA:BB:CC", &["AA:BB:CC:00:00:01", "AA:BB:CC:00:00:02"], Some(at(0)), Some(at(48)));
        assert!(evaluate_candidate(&c).is_none());
    }

    #[test]
    fn test_candidate_materialized_with_status() {
        let c = candidate(
            "AA:BB:CC",
            &["AA:BB:CC:00:00:01", "AA:BB:CC:00:00:02", "AA:BB:CC:00:00:03"],
            Some(at(0)),
            Some(at(48)),
        );
        let suspect = evaluate_candidate(&c).unwrap();
        assert_eq!(suspect.oui, "AA:BB:CC");
        assert_eq!(suspect.mac_count, 3);
        assert_eq!(suspect.status, SuspectStatus::Confirmed);
        assert_eq!(suspect.mac_sequence.len(), 3);
        assert!((suspect.avg_distance_km - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_candidate_without_timestamps_still_materializes_at_floor() {
        // No window: timeConfidence 0.4, macCountConfidence 0.6 -> exactly 0.5
        let c = candidate(
            "AA:BB:CC",
            &["AA:BB:CC:00:00:01", "AA:BB:CC:00:00:02", "AA:BB:CC:00:00:03"],
            None,
            None,
        );
        let suspect = evaluate_candidate(&c).unwrap();
        assert_eq!(suspect.status, SuspectStatus::Suspected);
        assert_eq!(suspect.movement_speed_kmh, 0.0);
    }
}
