//! FlowModel trait: the seam to the gas-dynamics solver.

use crate::error::SimResult;

/// Actuation handed to the flow model once per timestep.
#[derive(Clone, Copy, Debug)]
pub struct Actuation<'a> {
    /// Crank angle at the end of the engine advance (degrees).
    pub crank_angle: f64,
    /// Latest output of every controller, by construction order.
    pub controller_outputs: &'a [f64],
    /// Phaser positions (degrees), by construction order.
    pub phaser_positions: &'a [f64],
}

/// Trait for flow solvers driven by the simulation loop.
///
/// A FlowModel is advanced after the engine and the controllers of the same
/// tick, so the actuation it receives is always current.
pub trait FlowModel {
    /// Advance the flow state from `time - dt` to `time`.
    fn advance(&mut self, time: f64, dt: f64, actuation: &Actuation<'_>) -> SimResult<()>;
}

/// Flow model that accepts actuation without feeding anything back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetachedFlow {
    pub steps: u64,
    pub last_positions: Vec<f64>,
}

impl FlowModel for DetachedFlow {
    fn advance(&mut self, _time: f64, _dt: f64, actuation: &Actuation<'_>) -> SimResult<()> {
        self.steps += 1;
        self.last_positions.clear();
        self.last_positions.extend_from_slice(actuation.phaser_positions);
        Ok(())
    }
}
