//! Engine-speed sweep: the same configuration run once per speed.
//!
//! Speeds run from `rpm_min` in `rpm_step` increments up to and including
//! `rpm_max`. Each point is an ordinary request with the speed overridden,
//! so a failing point is reported in place and the sweep carries on.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HostError, HostResult};
use crate::request::{Overrides, SimulationRequest};
use crate::response::{Performance, Status};
use crate::service::handle_request;

/// Most runs one sweep may ask for.
pub const MAX_SWEEP_POINTS: usize = 1000;

/// Serialized when serializing the real response itself fails.
const SWEEP_FALLBACK_ERROR: &str =
    r#"{"status":"error","message":"failed to serialize response","points":[]}"#;

/// Top-end slack for speeds that land on `rpm_max` up to rounding.
const STEP_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepRequest {
    pub config: String,
    /// Applied at every point. The engine speed is replaced per point.
    #[serde(default)]
    pub overrides: Overrides,
    pub rpm_min: f64,
    pub rpm_max: f64,
    pub rpm_step: f64,
}

impl SweepRequest {
    /// Engine speeds visited, in order.
    pub fn speeds(&self) -> HostResult<Vec<f64>> {
        let finite = [self.rpm_min, self.rpm_max, self.rpm_step]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.rpm_min <= 0.0 || self.rpm_step <= 0.0 || self.rpm_max < self.rpm_min {
            return Err(HostError::InvalidRequest(format!(
                "sweep needs 0 < rpm_min <= rpm_max and rpm_step > 0, got {}..{} by {}",
                self.rpm_min, self.rpm_max, self.rpm_step
            )));
        }
        let points = ((self.rpm_max - self.rpm_min) / self.rpm_step + STEP_EPS).floor() + 1.0;
        if points > MAX_SWEEP_POINTS as f64 {
            return Err(HostError::InvalidRequest(format!(
                "sweep has {points} points, at most {MAX_SWEEP_POINTS} are allowed"
            )));
        }
        Ok((0..points as usize)
            .map(|k| self.rpm_min + k as f64 * self.rpm_step)
            .collect())
    }

    fn point_request(&self, speed_rpm: f64) -> SimulationRequest {
        SimulationRequest {
            config: self.config.clone(),
            overrides: Overrides {
                engine_speed_rpm: Some(speed_rpm),
                ..self.overrides.clone()
            },
        }
    }
}

/// Outcome at one engine speed. Recorded series are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub engine_speed_rpm: f64,
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Performance>,
}

/// `status` is `success` only when every point succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResponse {
    pub status: Status,
    pub message: String,
    #[serde(default)]
    pub points: Vec<SweepPoint>,
}

impl SweepResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            points: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

impl From<HostError> for SweepResponse {
    fn from(e: HostError) -> Self {
        Self::error(e.to_string())
    }
}

/// Run every point of a sweep. Fails only on an invalid speed range.
pub fn run_sweep(request: &SweepRequest) -> HostResult<SweepResponse> {
    let speeds = request.speeds()?;
    info!(
        points = speeds.len(),
        rpm_min = request.rpm_min,
        rpm_max = request.rpm_max,
        "sweep request"
    );

    let points: Vec<SweepPoint> = speeds
        .into_iter()
        .map(|speed_rpm| {
            let response = handle_request(&request.point_request(speed_rpm));
            SweepPoint {
                engine_speed_rpm: speed_rpm,
                status: response.status,
                message: response.message,
                run_id: response.run_id,
                performance: response.performance,
            }
        })
        .collect();

    let failed = points.iter().filter(|p| p.status == Status::Error).count();
    let (status, message) = if failed == 0 {
        (Status::Success, format!("sweep completed: {} points", points.len()))
    } else {
        (
            Status::Error,
            format!("sweep completed with {failed} of {} points failing", points.len()),
        )
    };
    Ok(SweepResponse {
        status,
        message,
        points,
    })
}

/// JSON in, JSON out, for sweeps. Never fails.
pub fn handle_sweep_json(request_json: &str) -> String {
    let response = match serde_json::from_str::<SweepRequest>(request_json) {
        Ok(request) => run_sweep(&request).unwrap_or_else(|e| {
            warn!(error = %e, "sweep request failed");
            SweepResponse::from(e)
        }),
        Err(e) => {
            let e = HostError::from(e);
            warn!(error = %e, "rejected sweep request");
            SweepResponse::from(e)
        }
    };
    serde_json::to_string(&response).unwrap_or_else(|_| SWEEP_FALLBACK_ERROR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(rpm_min: f64, rpm_max: f64, rpm_step: f64) -> SweepRequest {
        SweepRequest {
            config: String::new(),
            overrides: Overrides::default(),
            rpm_min,
            rpm_max,
            rpm_step,
        }
    }

    #[test]
    fn speeds_include_an_aligned_maximum() {
        assert_eq!(
            sweep(1000.0, 2000.0, 250.0).speeds().unwrap(),
            vec![1000.0, 1250.0, 1500.0, 1750.0, 2000.0]
        );
        assert_eq!(sweep(1500.0, 1500.0, 100.0).speeds().unwrap(), vec![1500.0]);
        // 0.1 steps do not add up exactly
        assert_eq!(sweep(1.0, 1.3, 0.1).speeds().unwrap().len(), 4);
    }

    #[test]
    fn speeds_never_overshoot_the_maximum() {
        let speeds = sweep(1000.0, 1900.0, 400.0).speeds().unwrap();
        assert_eq!(speeds, vec![1000.0, 1400.0, 1800.0]);
    }

    #[test]
    fn bad_ranges_are_rejected() {
        for bad in [
            sweep(0.0, 1000.0, 100.0),
            sweep(2000.0, 1000.0, 100.0),
            sweep(1000.0, 2000.0, 0.0),
            sweep(1000.0, f64::INFINITY, 100.0),
            sweep(1000.0, 2000.0, f64::NAN),
        ] {
            assert!(
                matches!(bad.speeds(), Err(HostError::InvalidRequest(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn too_many_points_are_rejected() {
        let err = sweep(1.0, 1e12, 1.0).speeds().unwrap_err();
        assert!(err.to_string().contains("at most 1000"));
        assert_eq!(sweep(1.0, 1000.0, 1.0).speeds().unwrap().len(), MAX_SWEEP_POINTS);
    }

    #[test]
    fn point_keeps_base_overrides() {
        let mut request = sweep(1000.0, 2000.0, 500.0);
        request.overrides.cycles = Some(3);
        request.overrides.engine_speed_rpm = Some(9999.0);
        let point = request.point_request(1500.0);
        assert_eq!(point.overrides.engine_speed_rpm, Some(1500.0));
        assert_eq!(point.overrides.cycles, Some(3));
    }

    #[test]
    fn fallback_is_an_error_response() {
        let response: SweepResponse = serde_json::from_str(SWEEP_FALLBACK_ERROR).unwrap();
        assert!(!response.is_success());
    }
}
