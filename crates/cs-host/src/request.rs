//! Host request: configuration text plus parameter overrides.

use cs_sim::{EndCondition, EngineModel, SimSetup};
use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};

/// A simulation request as sent by an embedding host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationRequest {
    /// Raw configuration stream text.
    pub config: String,
    #[serde(default)]
    pub overrides: Overrides,
}

/// Values that replace the ones parsed from the configuration stream.
///
/// Absent fields leave the parsed value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Overrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_speed_rpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle_pct: Option<f64>,
    /// Replaces the end condition with a cycle count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycles: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_every: Option<usize>,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge these overrides into a parsed setup.
    pub fn apply(&self, setup: &mut SimSetup) -> HostResult<()> {
        if self.engine_speed_rpm.is_some() || self.throttle_pct.is_some() {
            let speed = self
                .engine_speed_rpm
                .unwrap_or_else(|| setup.engine.speed_rpm());
            let throttle = self
                .throttle_pct
                .unwrap_or_else(|| setup.engine.throttle_pct());
            setup.engine = EngineModel::new(speed, throttle)?;
        }
        if let Some(cycles) = self.cycles {
            if cycles == 0 {
                return Err(HostError::InvalidOverride {
                    what: "cycles must be positive",
                });
            }
            setup.options.end = EndCondition::Cycles(cycles);
        }
        if let Some(record_every) = self.record_every {
            if record_every == 0 {
                return Err(HostError::InvalidOverride {
                    what: "record_every must be positive",
                });
            }
            setup.options.record_every = record_every;
        }
        Ok(())
    }
}
