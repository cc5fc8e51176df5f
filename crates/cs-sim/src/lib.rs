//! Fixed-step engine-cycle simulation driving the controller subsystem.
//!
//! Provides:
//! - Engine kinematics (crank angle, cycle counting) feeding sensors
//! - Cam phaser actuators with first-order dynamics
//! - The `FlowModel` seam for an external gas-dynamics solver
//! - The do-while simulation loop and its result record

pub mod actuator;
pub mod engine;
pub mod error;
pub mod flow;
pub mod setup;
pub mod sim;

pub use actuator::{ActuatorBank, PhaserActuator, PhaserState};
pub use engine::{Engine, EngineModel};
pub use error::{SimError, SimResult};
pub use flow::{Actuation, DetachedFlow, FlowModel};
pub use sim::{
    AveragingInterval, EndCondition, SimOptions, SimOutcome, SimPhase, SimRecord, SimSetup,
    Simulation, run_sim,
};
