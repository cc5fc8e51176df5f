//! Request handling: parse, override, run, respond.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use cs_controls::ControllerKind;
use cs_sim::{SimSetup, run_sim};
use tracing::{info, warn};

use crate::error::{HostError, HostResult};
use crate::hash::compute_run_id;
use crate::request::SimulationRequest;
use crate::response::SimulationResponse;

/// Version folded into every run id.
pub const SOLVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Serialized when serializing the real response itself fails.
const FALLBACK_ERROR: &str = r#"{"status":"error","message":"failed to serialize response"}"#;

/// Parse the configuration, apply overrides and run to completion.
pub fn run_request(request: &SimulationRequest) -> HostResult<SimulationResponse> {
    let started = Instant::now();
    let run_id = compute_run_id(&request.config, &request.overrides, SOLVER_VERSION);
    info!(run_id = %run_id, overrides = !request.overrides.is_empty(), "simulation request");

    let mut setup = SimSetup::from_text(&request.config)?;
    request.overrides.apply(&mut setup)?;
    let kinds: Vec<ControllerKind> = setup.control.controllers.iter().map(|c| c.kind()).collect();

    let outcome = run_sim(setup)?;
    let elapsed_s = started.elapsed().as_secs_f64();
    info!(
        run_id = %run_id,
        steps = outcome.steps,
        cycles = outcome.cycles,
        elapsed_s,
        "simulation request complete"
    );
    Ok(SimulationResponse::success(run_id, &kinds, outcome, elapsed_s))
}

/// Run a request, turning errors and panics into `status: error` responses.
pub fn handle_request(request: &SimulationRequest) -> SimulationResponse {
    let result = panic::catch_unwind(AssertUnwindSafe(|| run_request(request)))
        .unwrap_or_else(|payload| {
            Err(HostError::Panic {
                message: panic_message(payload.as_ref()),
            })
        });
    match result {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "simulation request failed");
            SimulationResponse::from(e)
        }
    }
}

/// JSON in, JSON out. Never fails.
pub fn handle_json(request_json: &str) -> String {
    let response = match serde_json::from_str::<SimulationRequest>(request_json) {
        Ok(request) => handle_request(&request),
        Err(e) => {
            let e = HostError::from(e);
            warn!(error = %e, "rejected request");
            SimulationResponse::from(e)
        }
    };
    serde_json::to_string(&response).unwrap_or_else(|_| FALLBACK_ERROR.to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_messages() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 7");
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }

    #[test]
    fn fallback_is_an_error_response() {
        let response: SimulationResponse = serde_json::from_str(FALLBACK_ERROR).unwrap();
        assert!(!response.is_success());
    }
}
