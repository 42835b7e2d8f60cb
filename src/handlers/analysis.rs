//! Analysis admin handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::jobs::PipelineSummary;
use crate::{AppState, EngineResult};

#[derive(Debug, Serialize)]
pub struct AnalysisStatus {
    pub running: bool,
    pub interval_hours: u64,
    pub last_run: Option<PipelineSummary>,
}

/// Trigger a full analysis run synchronously. Returns 409 when a run is
/// already in flight.
pub async fn run(State(state): State<AppState>) -> EngineResult<Json<PipelineSummary>> {
    let summary = state.scheduler.run_now().await?;
    Ok(Json(summary))
}

/// Report whether a run is in flight and the summary of the last one
pub async fn status(State(state): State<AppState>) -> Json<AnalysisStatus> {
    Json(AnalysisStatus {
        running: state.scheduler.is_running(),
        interval_hours: state.config.scoring_interval_hours,
        last_run: state.scheduler.last_summary().await,
    })
}
