//! Cam phaser actuators driven by controller outputs.
//!
//! Dynamics: `dpos/dt = (cmd - pos) / tau`, clamped to `[-rate_limit, rate_limit]`,
//! with the position held inside `[min, max]` crank degrees.

use cs_controls::{ConfigStream, ControlError, ControllerSet, Cursor};
use cs_core::{ActuatorId, ControllerId, ensure_finite, ensure_positive};
use tracing::debug;

use crate::error::{SimError, SimResult};

/// State of a phaser (position in crank degrees).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhaserState {
    pub position: f64,
}

/// First-order phaser with rate and position limits.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaserActuator {
    pub id: ActuatorId,
    /// Controller whose output commands this phaser.
    pub controller: ControllerId,
    /// Time constant (seconds), must be positive
    pub tau: f64,
    /// Rate limit (degrees/second), must be positive
    pub rate_limit: f64,
    pub min: f64,
    pub max: f64,
}

impl PhaserActuator {
    pub fn new(
        index: u32,
        controller: ControllerId,
        tau: f64,
        rate_limit: f64,
        min: f64,
        max: f64,
    ) -> SimResult<Self> {
        ensure_positive(tau, "phaser tau")?;
        ensure_positive(rate_limit, "phaser rate limit")?;
        ensure_finite(min, "phaser min")?;
        ensure_finite(max, "phaser max")?;
        if min > max {
            return Err(SimError::InvalidArg {
                what: "phaser min must not exceed max",
            });
        }
        Ok(Self {
            id: ActuatorId::from_index(index),
            controller,
            tau,
            rate_limit,
            min,
            max,
        })
    }

    /// Resting state: the position closest to zero advance.
    pub fn initial_state(&self) -> PhaserState {
        PhaserState {
            position: 0.0_f64.clamp(self.min, self.max),
        }
    }

    /// Compute position derivative given current position and command.
    pub fn dpdt(&self, position: f64, command: f64) -> f64 {
        let raw = (command - position) / self.tau;
        raw.clamp(-self.rate_limit, self.rate_limit)
    }

    /// Advance state by dt given command. A non-finite command holds position.
    pub fn step(&self, state: &PhaserState, dt: f64, command: f64) -> PhaserState {
        if !command.is_finite() {
            return *state;
        }
        let position = state.position + self.dpdt(state.position, command) * dt;
        PhaserState {
            position: position.clamp(self.min, self.max),
        }
    }
}

/// All phasers of a simulation with their states.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActuatorBank {
    actuators: Vec<PhaserActuator>,
    states: Vec<PhaserState>,
    positions: Vec<f64>,
}

impl ActuatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, actuator: PhaserActuator) {
        let state = actuator.initial_state();
        self.positions.push(state.position);
        self.states.push(state);
        self.actuators.push(actuator);
    }

    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }

    pub fn actuators(&self) -> &[PhaserActuator] {
        &self.actuators
    }

    /// Current positions (degrees), by construction order.
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// Check that every commanding controller exists.
    pub fn validate_against(&self, controllers: &ControllerSet) -> SimResult<()> {
        for actuator in &self.actuators {
            if actuator.controller.slot() >= controllers.len() {
                return Err(ControlError::UnresolvedReference {
                    owner: format!("actuator {}", actuator.id),
                    target: "controller",
                    id: actuator.controller,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Step every phaser towards its controller's latest output.
    pub fn step_all(&mut self, dt: f64, outputs: &[f64]) {
        for ((actuator, state), position) in self
            .actuators
            .iter()
            .zip(&mut self.states)
            .zip(&mut self.positions)
        {
            let command = outputs
                .get(actuator.controller.slot())
                .copied()
                .unwrap_or(f64::NAN);
            *state = actuator.step(state, dt, command);
            *position = state.position;
        }
    }

    /// Parse an `actuators <n>` section of `phaser` entries.
    pub fn parse_section(stream: &ConfigStream, cursor: &mut Cursor) -> SimResult<Self> {
        let entries = stream.read_block(cursor, |reader| {
            reader.keyword("actuators")?;
            let count = reader.count("actuator count")?;
            let mut entries = Vec::new();
            for _ in 0..count {
                reader.keyword("phaser")?;
                let at = reader.next_token_offset();
                let controller = reader.id("commanding controller id")?;
                let tau = reader.real("phaser tau")?;
                let rate_limit = reader.real("phaser rate limit")?;
                let min = reader.real("phaser min")?;
                let max = reader.real("phaser max")?;
                entries.push((at, controller, tau, rate_limit, min, max));
            }
            Ok(entries)
        })?;

        let mut bank = Self::new();
        for (index, (at, controller, tau, rate_limit, min, max)) in
            entries.into_iter().enumerate()
        {
            let actuator = PhaserActuator::new(index as u32, controller, tau, rate_limit, min, max)
                .map_err(|e| stream.format_error(at, e.to_string()))?;
            bank.push(actuator);
        }
        debug!(actuators = bank.len(), "actuator section parsed");
        Ok(bank)
    }
}
