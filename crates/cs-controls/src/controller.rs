//! The controller contract shared by every variant.
//!
//! A controller turns sensor readings (and possibly sibling controllers'
//! outputs) into one scalar actuation value per timestep. Its life has three
//! phases:
//!
//! 1. **Parse**: read its own block from the configuration stream.
//! 2. **Bind**: resolve sensor/controller ids captured while parsing into arena
//!    slots, once every controller exists (forward references are legal).
//! 3. **Run**: produce an output every tick and take part in the instantaneous
//!    and averaged result cadences driven by the simulation loop.
//!
//! Output evaluation is total. A controller that cannot compute a value this
//! tick returns [`ControllerOutput::Degraded`] carrying its last output.

use std::fmt;

use cs_core::{ControllerId, Id, SensorId};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigStream, Cursor};
use crate::error::{ControlError, ControlResult};
use crate::sensor::SensorBank;

/// Variant tag for a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerKind {
    /// Lookup table over one or more sensor axes.
    Table,
    /// Proportional-integral-derivative feedback loop.
    Pid,
}

impl ControllerKind {
    /// Keyword that opens this variant's block in the configuration stream.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Pid => "pid",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "table" => Some(Self::Table),
            "pid" => Some(Self::Pid),
            _ => None,
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Value produced by one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerOutput {
    /// Freshly computed from the current inputs.
    Computed(f64),
    /// The computation was not possible this tick; carries the last output.
    Degraded(f64),
}

impl ControllerOutput {
    pub fn value(self) -> f64 {
        match self {
            Self::Computed(v) | Self::Degraded(v) => v,
        }
    }

    pub fn is_degraded(self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Read-only view of the signals available to a controller during one tick.
#[derive(Debug, Clone, Copy)]
pub struct SignalInputs<'a> {
    sensors: &'a SensorBank,
    outputs: &'a [f64],
}

impl<'a> SignalInputs<'a> {
    pub fn new(sensors: &'a SensorBank, outputs: &'a [f64]) -> Self {
        Self { sensors, outputs }
    }

    /// Reading of a bound sensor slot. Missing slots read as NaN.
    pub fn sensor(&self, slot: usize) -> f64 {
        self.sensors.reading(slot).unwrap_or(f64::NAN)
    }

    /// Latest output of a bound controller slot. Missing slots read as NaN.
    pub fn controller(&self, slot: usize) -> f64 {
        self.outputs.get(slot).copied().unwrap_or(f64::NAN)
    }
}

/// Everything a controller may reference during the binding phase.
#[derive(Debug, Clone, Copy)]
pub struct BindingScope<'a> {
    sensors: &'a SensorBank,
    controller_count: usize,
}

impl<'a> BindingScope<'a> {
    pub fn new(sensors: &'a SensorBank, controller_count: usize) -> Self {
        Self {
            sensors,
            controller_count,
        }
    }

    /// Resolve a sensor id to its arena slot.
    pub fn sensor(&self, owner: ControllerId, id: SensorId) -> ControlResult<usize> {
        self.sensors
            .get(id)
            .map(|_| id.slot())
            .ok_or_else(|| unresolved(owner, "sensor", id))
    }

    /// Resolve a controller id to its arena slot.
    pub fn controller(&self, owner: ControllerId, id: ControllerId) -> ControlResult<usize> {
        if id.slot() < self.controller_count {
            Ok(id.slot())
        } else {
            Err(unresolved(owner, "controller", id))
        }
    }
}

fn unresolved(owner: ControllerId, target: &'static str, id: Id) -> ControlError {
    ControlError::UnresolvedReference {
        owner: format!("controller {owner}"),
        target,
        id,
    }
}

/// Column name for a reported controller quantity.
pub fn column_name(id: ControllerId, quantity: &str) -> String {
    format!("ctrl{id}/{quantity}")
}

/// Contract implemented by every controller variant.
///
/// The result-lifecycle hooks default to no-ops; a variant without a given
/// quantity may rely on that, though the in-tree variants spell each one out.
pub trait Controller: fmt::Debug {
    /// Identifier (construction index + 1). Never changes.
    fn id(&self) -> ControllerId;

    fn kind(&self) -> ControllerKind;

    /// Most recently produced value (0.0 before the first evaluation).
    fn last_output(&self) -> f64;

    /// Evaluate at simulated `time`. Called once per timestep.
    fn output(&mut self, time: f64, inputs: &SignalInputs<'_>) -> ControllerOutput;

    /// Read this controller's block starting at `cursor` and leave `cursor`
    /// just past it. The variant keyword has already been consumed.
    fn parse_configuration(
        &mut self,
        stream: &ConfigStream,
        cursor: &mut Cursor,
    ) -> ControlResult<()>;

    /// Resolve the references captured while parsing. On failure the
    /// controller keeps its previous bindings.
    fn bind_references(&mut self, scope: &BindingScope<'_>) -> ControlResult<()>;

    /// Read which averaged quantities to report.
    fn parse_average_selection(
        &mut self,
        _stream: &ConfigStream,
        _cursor: &mut Cursor,
    ) -> ControlResult<()> {
        Ok(())
    }

    /// Read which instantaneous quantities to report.
    fn parse_instant_selection(
        &mut self,
        _stream: &ConfigStream,
        _cursor: &mut Cursor,
    ) -> ControlResult<()> {
        Ok(())
    }

    /// Start a new averaging interval.
    fn reset_averages(&mut self) {}

    /// Fold this tick into the running averages. `current` is this tick's output.
    fn accumulate_average(&mut self, _current: f64) {}

    /// Close the averaging interval and compute the summary values.
    fn finalize_average(&mut self) {}

    /// Capture the instantaneous quantities for this tick.
    fn compute_instantaneous(&mut self) {}

    fn average_header(&self, _columns: &mut Vec<String>) {}

    fn instant_header(&self, _columns: &mut Vec<String>) {}

    fn average_values(&self, _row: &mut Vec<f64>) {}

    fn instant_values(&self, _row: &mut Vec<f64>) {}
}
