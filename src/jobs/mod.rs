//! Analysis pipeline
//!
//! Three stages run in a fixed order on every firing: behavioral scoring,
//! OUI grouping (which reads the scores the first stage just wrote), then
//! MAC randomization detection. A stage that cannot read its input aborts
//! the rest of the run; the next scheduled firing starts clean.

pub mod scheduler;
pub mod scoring;
pub mod grouping;
pub mod randomization;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Instant;

use crate::config::Config;

/// Per-stage counters reported to the manual trigger and the logs
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub processed: usize,
    pub written: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// What happened to one stage within a run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed {
        #[serde(flatten)]
        summary: StageSummary,
    },
    Failed {
        error: String,
    },
    /// An earlier stage failed, so this one never ran
    Skipped,
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }
}

/// Outcome of one full pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub scoring: StageOutcome,
    pub grouping: StageOutcome,
    pub randomization: StageOutcome,
}

/// Run scorer -> grouper -> detector. Stage failures are contained here:
/// the caller always gets a summary, never an Err, so one bad cycle cannot
/// take the scheduler down.
pub async fn run_pipeline(pool: &PgPool, config: &Config) -> PipelineSummary {
    let started_at = Utc::now();
    let started = Instant::now();

    tracing::info!("Analysis pipeline starting");

    let scoring = match scoring::run(pool, config).await {
        Ok(summary) => StageOutcome::Completed { summary },
        Err(err) => {
            tracing::error!("Scoring stage failed: {}", err);
            StageOutcome::Failed { error: err.to_string() }
        }
    };

    let grouping = if scoring.is_failed() {
        StageOutcome::Skipped
    } else {
        match grouping::run(pool, config).await {
            Ok(summary) => StageOutcome::Completed { summary },
            Err(err) => {
                tracing::error!("Grouping stage failed: {}", err);
                StageOutcome::Failed { error: err.to_string() }
            }
        }
    };

    let randomization = if scoring.is_failed() || grouping.is_failed() {
        StageOutcome::Skipped
    } else {
        match randomization::run(pool, config).await {
            Ok(summary) => StageOutcome::Completed { summary },
            Err(err) => {
                tracing::error!("Randomization stage failed: {}", err);
                StageOutcome::Failed { error: err.to_string() }
            }
        }
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::info!("Analysis pipeline complete in {}ms", duration_ms);

    PipelineSummary {
        started_at,
        duration_ms,
        scoring,
        grouping,
        randomization,
    }
}
