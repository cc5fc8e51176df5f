//! Engine kinematics: time, crank angle and cycle count.
//!
//! The crank turns at a fixed speed. One four-stroke cycle is 720 crank
//! degrees; the angle wraps there and the completed-cycle counter advances.

use cs_controls::{ConfigStream, Cursor, MeasurementProvider, SensedQuantity};
use cs_core::constants::DEG_PER_CYCLE;
use cs_core::units::{Angle, AngularVelocity, Ratio, Time};
use cs_core::{deg, ensure_non_negative, ensure_positive, percent, rpm, s};
use cs_core::{to_deg_per_s, to_percent, to_rpm, to_seconds};
use tracing::debug;

use crate::error::{SimError, SimResult};

/// Unit conversions round-trip through radians; absorb that at the wrap.
const ANGLE_EPS: f64 = 1e-9;

/// Operating point of the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineModel {
    pub speed: AngularVelocity,
    pub throttle: Ratio,
}

impl EngineModel {
    pub fn new(speed_rpm: f64, throttle_pct: f64) -> SimResult<Self> {
        let speed_rpm = ensure_positive(speed_rpm, "engine speed")?;
        let throttle_pct = ensure_non_negative(throttle_pct, "throttle")?;
        if throttle_pct > 100.0 {
            return Err(SimError::InvalidArg {
                what: "throttle must not exceed 100 %",
            });
        }
        Ok(Self {
            speed: rpm(speed_rpm),
            throttle: percent(throttle_pct),
        })
    }

    pub fn speed_rpm(&self) -> f64 {
        to_rpm(self.speed)
    }

    pub fn throttle_pct(&self) -> f64 {
        to_percent(self.throttle)
    }

    /// Crank degrees swept in `dt` seconds (6 · rpm · dt).
    pub fn degrees_per_step(&self, dt: f64) -> f64 {
        to_deg_per_s(self.speed) * dt
    }

    /// Time for one full cycle at this speed (seconds).
    pub fn cycle_period(&self) -> f64 {
        DEG_PER_CYCLE / to_deg_per_s(self.speed)
    }

    /// Parse an `engine <speed_rpm> <throttle_pct>` section.
    pub fn parse_section(stream: &ConfigStream, cursor: &mut Cursor) -> SimResult<Self> {
        let model = stream.read_block(cursor, |reader| {
            reader.keyword("engine")?;
            let speed_at = reader.next_token_offset();
            let speed = reader.real("engine speed (rpm)")?;
            let throttle_at = reader.next_token_offset();
            let throttle = reader.real("throttle (%)")?;
            if speed <= 0.0 {
                return Err(reader.error_at(speed_at, "engine speed must be positive"));
            }
            if !(0.0..=100.0).contains(&throttle) {
                return Err(reader.error_at(throttle_at, "throttle must lie in [0, 100] %"));
            }
            Ok((speed, throttle))
        })?;
        debug!(speed_rpm = model.0, throttle_pct = model.1, "engine section parsed");
        Self::new(model.0, model.1)
    }
}

/// Engine model plus its evolving kinematic state.
#[derive(Clone, Debug, PartialEq)]
pub struct Engine {
    model: EngineModel,
    time: Time,
    /// Degrees, kept unconverted so cycle boundaries land exactly.
    crank_deg: f64,
    cycle: u64,
}

impl Engine {
    pub fn new(model: EngineModel) -> Self {
        Self {
            model,
            time: s(0.0),
            crank_deg: 0.0,
            cycle: 0,
        }
    }

    pub fn model(&self) -> &EngineModel {
        &self.model
    }

    /// Simulated time (seconds).
    pub fn time(&self) -> f64 {
        to_seconds(self.time)
    }

    /// Crank angle within the current cycle (degrees, `[0, 720)`).
    pub fn crank_angle(&self) -> f64 {
        self.crank_deg
    }

    pub fn crank_angle_quantity(&self) -> Angle {
        deg(self.crank_deg)
    }

    /// Completed cycles.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn speed_rpm(&self) -> f64 {
        self.model.speed_rpm()
    }

    /// Advance by `dt` seconds. Returns the number of cycles completed.
    pub fn advance(&mut self, dt: f64) -> u64 {
        self.time += s(dt);
        let angle = self.crank_deg + self.model.degrees_per_step(dt);
        let mut completed = (angle / DEG_PER_CYCLE).floor() as u64;
        let mut rest = angle.rem_euclid(DEG_PER_CYCLE);
        if DEG_PER_CYCLE - rest <= ANGLE_EPS {
            rest = 0.0;
            completed = completed.saturating_add(1);
        }
        self.crank_deg = if rest.is_finite() { rest } else { 0.0 };
        self.cycle = self.cycle.saturating_add(completed);
        completed
    }
}

impl MeasurementProvider for Engine {
    fn measure(&self, quantity: &SensedQuantity) -> Option<f64> {
        match quantity {
            SensedQuantity::EngineSpeed => Some(self.speed_rpm()),
            SensedQuantity::Throttle => Some(self.model.throttle_pct()),
            SensedQuantity::CrankAngle => Some(self.crank_angle()),
            SensedQuantity::Time => Some(self.time()),
            SensedQuantity::Cycle => Some(self.cycle as f64),
            SensedQuantity::Constant(v) => Some(*v),
        }
    }
}
