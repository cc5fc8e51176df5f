//! Host embedding boundary for cyclesim.
//!
//! A host sends a JSON [`SimulationRequest`] (configuration text plus
//! overrides) and gets back a JSON [`SimulationResponse`]. Failures of any
//! kind, panics included, come back as `status: error`. A [`SweepRequest`]
//! repeats one configuration across a range of engine speeds.

pub mod error;
pub mod hash;
pub mod request;
pub mod response;
pub mod service;
pub mod sweep;

pub use error::{HostError, HostResult};
pub use hash::compute_run_id;
pub use request::{Overrides, SimulationRequest};
pub use response::{ControllerSeries, Output, Performance, SimulationResponse, Status};
pub use service::{SOLVER_VERSION, handle_json, handle_request, run_request};
pub use sweep::{
    MAX_SWEEP_POINTS, SweepPoint, SweepRequest, SweepResponse, handle_sweep_json, run_sweep,
};
