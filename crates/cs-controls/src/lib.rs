//! Controller subsystem for cyclesim.
//!
//! Controllers are pluggable units that read sensors once per simulation
//! timestep and produce one scalar actuation value. This crate provides the
//! controller contract, its variants, the resumable configuration stream they
//! are loaded from, and the result aggregation the simulation loop drives.
//!
//! # Architecture
//!
//! - Sensors live in a [`SensorBank`] arena and are refreshed by the loop
//! - Controllers live in a [`ControllerSet`] arena, evaluated in file order
//! - Loading is two-phase: parse every block, then bind ids to arena slots
//! - Evaluation is total: a controller that cannot compute returns
//!   [`ControllerOutput::Degraded`] with its last value
//!
//! # Design Principles
//!
//! - **Resumable Parsing**: every parser leaves the [`Cursor`] just past its block
//! - **Externally Driven**: nothing here schedules itself; the loop calls in
//! - **Strict Reports**: header once, rows exactly as wide as the header

pub mod config;
pub mod controller;
pub mod error;
pub mod loader;
pub mod lookup;
pub mod pid;
pub mod results;
pub mod sensor;
pub mod system;
pub mod table;

pub use config::{BlockReader, ConfigStream, Cursor};
pub use controller::{
    BindingScope, Controller, ControllerKind, ControllerOutput, SignalInputs, column_name,
};
pub use error::{ControlError, ControlResult};
pub use loader::{load_control_system, new_controller};
pub use lookup::{Axis, LookupTable, MAX_AXES};
pub use pid::{PidController, PidGains, PidQuantity, PidState, PidTerms, Setpoint};
pub use results::{Cadence, ReportStream, ResultAggregator, RunningMean, TIME_COLUMN};
pub use sensor::{MeasurementProvider, SensedQuantity, Sensor, SensorBank};
pub use system::{ControlSystem, ControllerBlock, ControllerSet};
pub use table::TableController;
