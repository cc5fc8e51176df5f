//! Host response: `{status, message, run_id, output, performance}`.

use cs_controls::{ControllerKind, ReportStream};
use cs_sim::SimOutcome;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResponse {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Output>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Performance>,
}

/// Recorded series of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub time: Vec<f64>,
    pub crank_angle: Vec<f64>,
    pub controllers: Vec<ControllerSeries>,
    pub instantaneous: ReportStream,
    pub averaged: ReportStream,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSeries {
    /// 1-based controller id.
    pub id: u32,
    pub kind: ControllerKind,
    pub output: Vec<f64>,
    /// Recorded samples on which the controller fell back to its last value.
    pub degraded_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub steps: u64,
    pub cycles: u64,
    pub final_time_s: f64,
    pub hit_step_limit: bool,
    /// Per controller, mean output over the whole run.
    pub mean_outputs: Vec<f64>,
    /// Wall-clock time spent in setup and stepping.
    pub elapsed_s: f64,
}

impl SimulationResponse {
    pub fn success(
        run_id: String,
        kinds: &[ControllerKind],
        outcome: SimOutcome,
        elapsed_s: f64,
    ) -> Self {
        let controllers = kinds
            .iter()
            .enumerate()
            .map(|(slot, kind)| ControllerSeries {
                id: slot as u32 + 1,
                kind: *kind,
                output: outcome.record.controller_series(slot),
                degraded_samples: outcome
                    .record
                    .degraded
                    .iter()
                    .filter(|row| row.get(slot).copied().unwrap_or(false))
                    .count(),
            })
            .collect();

        let performance = Performance {
            steps: outcome.steps,
            cycles: outcome.cycles,
            final_time_s: outcome.final_time,
            hit_step_limit: outcome.hit_step_limit,
            mean_outputs: outcome.mean_outputs,
            elapsed_s,
        };
        let message = if performance.hit_step_limit {
            format!(
                "simulation stopped at the step limit after {} steps",
                performance.steps
            )
        } else {
            format!(
                "simulation completed: {} steps, {} cycles",
                performance.steps, performance.cycles
            )
        };

        Self {
            status: Status::Success,
            message,
            run_id: Some(run_id),
            output: Some(Output {
                time: outcome.record.t,
                crank_angle: outcome.record.crank_angle,
                controllers,
                instantaneous: outcome.instant,
                averaged: outcome.averaged,
            }),
            performance: Some(performance),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            run_id: None,
            output: None,
            performance: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

impl From<HostError> for SimulationResponse {
    fn from(e: HostError) -> Self {
        Self::error(e.to_string())
    }
}
