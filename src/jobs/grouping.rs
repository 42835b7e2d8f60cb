//! OUI grouping stage
//!
//! Transmitters sharing an address prefix are treated as radios of one
//! physical device, and the worst member score is propagated to the whole
//! family: one malicious radio makes the entire device suspect. Because the
//! primary is simply the highest scorer, a family's primary can change
//! between runs as scores shift.

use std::time::Instant;

use sqlx::PgPool;

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::jobs::StageSummary;
use crate::models::{FamilyMemberRow, OuiDeviceGroup, ThreatLevel};

/// Minimum members for a family to be materialized
const MIN_FAMILY_SIZE: usize = 2;

/// Fold member rows (ordered by oui) into families. Single-member families
/// are dropped. The primary is the member with the maximum score, ties
/// broken by first-encountered; secondaries keep their encountered order.
pub fn build_groups(rows: &[FamilyMemberRow]) -> Vec<OuiDeviceGroup> {
    let mut groups = Vec::new();
    let mut members: Vec<&FamilyMemberRow> = Vec::new();

    for row in rows {
        if let Some(first) = members.first() {
            if first.oui != row.oui {
                if let Some(group) = finish_group(&members) {
                    groups.push(group);
                }
                members.clear();
            }
        }
        members.push(row);
    }
    if let Some(group) = finish_group(&members) {
        groups.push(group);
    }

    groups
}

fn finish_group(members: &[&FamilyMemberRow]) -> Option<OuiDeviceGroup> {
    if members.len() < MIN_FAMILY_SIZE {
        return None;
    }

    // Strictly-greater comparison keeps the first-encountered member on ties
    let mut primary_idx = 0;
    for (idx, member) in members.iter().enumerate() {
        if member.final_score > members[primary_idx].final_score {
            primary_idx = idx;
        }
    }

    let collective = members[primary_idx].final_score;
    let secondary_bssids = members
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != primary_idx)
        .map(|(_, m)| m.bssid.clone())
        .collect::<Vec<_>>();

    Some(OuiDeviceGroup {
        oui: members[0].oui.clone(),
        device_count: members.len() as i32,
        collective_threat_score: collective,
        threat_level: ThreatLevel::from_score(collective),
        primary_bssid: members[primary_idx].bssid.clone(),
        secondary_bssids,
    })
}

/// Run the grouping stage. Reading the member set is stage-fatal; a failure
/// while writing one family is logged and the remaining families proceed.
pub async fn run(pool: &PgPool, config: &Config) -> EngineResult<StageSummary> {
    let started = Instant::now();
    tracing::info!("OUI grouping starting");

    let rows = FamilyMemberRow::fetch_all(pool, config.oui_prefix_length)
        .await
        .map_err(|e| EngineError::stage("grouping", e))?;

    let groups = build_groups(&rows);

    let mut written = 0usize;
    let mut failed = 0usize;

    for group in &groups {
        match group.upsert(pool).await {
            Ok(()) => {
                written += 1;
                tracing::info!(
                    "OUI {}: {} radios, collective threat {:.2}",
                    group.oui,
                    group.device_count,
                    group.collective_threat_score
                );
            }
            Err(err) => {
                failed += 1;
                tracing::warn!("Failed to write group {}: {}", group.oui, err);
            }
        }
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        "OUI grouping complete: {} families from {} transmitters, {} failed in {}ms",
        written,
        rows.len(),
        failed,
        duration_ms
    );

    Ok(StageSummary {
        processed: groups.len(),
        written,
        failed,
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(oui: &str, bssid: &str, final_score: f64) -> FamilyMemberRow {
        FamilyMemberRow {
            oui: oui.to_string(),
            bssid: bssid.to_string(),
            final_score,
        }
    }

    #[test]
    fn test_single_member_family_dropped() {
        let rows = vec![row("AA:BB:CC", "AA:BB:CC:11:22:33", 50.0)];
        assert!(build_groups(&rows).is_empty());
    }

    #[test]
    fn test_two_member_family_propagates_max() {
        let rows = vec![
            row("AA:BB:CC", "AA:BB:CC:11:22:33", 72.0),
            row("AA:BB:CC", "AA:BB:CC:44:55:66", 15.0),
        ];
        let groups = build_groups(&rows);
        assert_eq!(groups.len(), 1);

        let group = &groups[0];
        assert_eq!(group.oui, "AA:BB:CC");
        assert_eq!(group.device_count, 2);
        assert!((group.collective_threat_score - 72.0).abs() < 1e-9);
        assert_eq!(group.threat_level, ThreatLevel::High);
        assert_eq!(group.primary_bssid, "AA:BB:CC:11:22:33");
        assert_eq!(group.secondary_bssids, vec!["AA:BB:CC:44:55:66".to_string()]);
    }

    #[test]
    fn test_device_count_invariant() {
        let rows = vec![
            row("AA:BB:CC", "AA:BB:CC:00:00:01", 10.0),
            row("AA:BB:CC", "AA:BB:CC:00:00:02", 85.0),
            row("AA:BB:CC", "AA:BB:CC:00:00:03", 40.0),
            row("DD:EE:FF", "DD:EE:FF:00:00:01", 5.0),
            row("DD:EE:FF", "DD:EE:FF:00:00:02", 5.0),
        ];
        for group in build_groups(&rows) {
            assert_eq!(group.device_count as usize, 1 + group.secondary_bssids.len());
        }
    }

    #[test]
    fn test_primary_is_max_even_when_rows_unordered() {
        let rows = vec![
            row("AA:BB:CC", "AA:BB:CC:00:00:01", 10.0),
            row("AA:BB:CC", "AA:BB:CC:00:00:02", 85.0),
            row("AA:BB:CC", "AA:BB:CC:00:00:03", 40.0),
        ];
        let groups = build_groups(&rows);
        assert_eq!(groups[0].primary_bssid, "AA:BB:CC:00:00:02");
        assert!((groups[0].collective_threat_score - 85.0).abs() < 1e-9);
        assert_eq!(groups[0].threat_level, ThreatLevel::Critical);
        assert_eq!(
            groups[0].secondary_bssids,
            vec!["AA:BB:CC:00:00:01".to_string(), "AA:BB:CC:00:00:03".to_string()]
        );
    }

    #[test]
    fn test_tie_goes_to_first_encountered() {
        let rows = vec![
            row("AA:BB:CC", "AA:BB:CC:00:00:01", 60.0),
            row("AA:BB:CC", "AA:BB:CC:00:00:02", 60.0),
        ];
        let groups = build_groups(&rows);
        assert_eq!(groups[0].primary_bssid, "AA:BB:CC:00:00:01");
    }

    #[test]
    fn test_multiple_families_split_on_prefix() {
        let rows = vec![
            row("AA:BB:CC", "AA:BB:CC:00:00:01", 1.0),
            row("AA:BB:CC", "AA:BB:CC:00:00:02", 2.0),
            row("DD:EE:FF", "DD:EE:FF:00:00:01", 3.0),
            row("DD:EE:FF", "DD:EE:FF:00:00:02", 99.0),
        ];
        let groups = build_groups(&rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].oui, "AA:BB:CC");
        assert_eq!(groups[1].oui, "DD:EE:FF");
        assert_eq!(groups[1].primary_bssid, "DD:EE:FF:00:00:02");
    }

    #[test]
    fn test_unscored_members_default_to_zero() {
        // COALESCE in the query feeds 0.0 for unscored members; an
        // all-unscored family still materializes with level NONE
        let rows = vec![
            row("AA:BB:CC", "AA:BB:CC:00:00:01", 0.0),
            row("AA:BB:CC", "AA:BB:CC:00:00:02", 0.0),
        ];
        let groups = build_groups(&rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].collective_threat_score, 0.0);
        assert_eq!(groups[0].threat_level, ThreatLevel::None);
    }
}
