//! PID controller variant.
//!
//! Closes a loop around one sensor (the process variable) towards a setpoint
//! read from another sensor, a sibling controller or a constant.
//!
//! Includes:
//! - Anti-windup (integral held while the output saturates)
//! - Output clamping
//! - First-order filtered derivative
//!
//! Configuration block (after the `pid` keyword):
//!
//! ```text
//! <pv_sensor_id> <setpoint> <kp> <ti> <td> <td_filter> <out_min> <out_max>
//! <setpoint> := sensor <id> | controller <id> | value <x>
//! ```
//!
//! Result selection: `<k> <quantity>...` with quantities
//! `output | error | setpoint | proportional | integral | derivative`.
//! Averages are simple means over the accumulated ticks.

use cs_core::{ControllerId, SensorId};

use crate::config::{BlockReader, ConfigStream, Cursor};
use crate::controller::{
    BindingScope, Controller, ControllerKind, ControllerOutput, SignalInputs, column_name,
};
use crate::error::{ControlError, ControlResult};
use crate::results::RunningMean;

/// PID tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral time constant (seconds).
    pub ti: f64,
    /// Derivative time constant (seconds).
    pub td: f64,
    /// Derivative filter time constant (seconds).
    pub td_filter: f64,
    pub out_min: f64,
    pub out_max: f64,
}

impl PidGains {
    pub fn new(
        kp: f64,
        ti: f64,
        td: f64,
        td_filter: f64,
        out_min: f64,
        out_max: f64,
    ) -> ControlResult<Self> {
        if !kp.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "kp must be finite",
            });
        }
        if !(ti > 0.0 && ti.is_finite()) {
            return Err(ControlError::InvalidArg {
                what: "ti must be positive",
            });
        }
        if !(td >= 0.0 && td.is_finite()) {
            return Err(ControlError::InvalidArg {
                what: "td must be non-negative",
            });
        }
        if !(td_filter > 0.0 && td_filter.is_finite()) {
            return Err(ControlError::InvalidArg {
                what: "td_filter must be positive",
            });
        }
        if !(out_min < out_max) {
            return Err(ControlError::InvalidArg {
                what: "out_min must be less than out_max",
            });
        }
        Ok(Self {
            kp,
            ti,
            td,
            td_filter,
            out_min,
            out_max,
        })
    }

    /// One control step.
    ///
    /// `dt` is `None` on the first evaluation or when time did not advance; the
    /// step is then proportional-only and the integral is left untouched.
    pub fn update(
        &self,
        state: &PidState,
        pv: f64,
        sp: f64,
        dt: Option<f64>,
    ) -> (PidState, PidTerms) {
        let error = sp - pv;
        let proportional = self.kp * error;
        let ki = self.kp / self.ti;

        let Some(dt) = dt else {
            let integral = ki * state.integral;
            let raw = proportional + integral;
            let next = PidState {
                integral: state.integral,
                filtered_error: if state.primed { state.filtered_error } else { error },
                primed: true,
            };
            return (
                next,
                PidTerms {
                    output: raw.clamp(self.out_min, self.out_max),
                    error,
                    setpoint: sp,
                    proportional,
                    integral,
                    derivative: 0.0,
                },
            );
        };

        let new_integral = state.integral + error * dt;
        let integral = ki * new_integral;

        // filt[n] = alpha * filt[n-1] + (1 - alpha) * error
        let alpha = self.td_filter / (self.td_filter + dt);
        let filtered_error = alpha * state.filtered_error + (1.0 - alpha) * error;
        let derivative = self.kp * self.td * (filtered_error - state.filtered_error) / dt;

        let raw = proportional + integral + derivative;
        let output = raw.clamp(self.out_min, self.out_max);

        // anti-windup
        let (kept_integral, integral) = if output == raw {
            (new_integral, integral)
        } else {
            (state.integral, ki * state.integral)
        };

        (
            PidState {
                integral: kept_integral,
                filtered_error,
                primed: true,
            },
            PidTerms {
                output,
                error,
                setpoint: sp,
                proportional,
                integral,
                derivative,
            },
        )
    }
}

/// Integrator and derivative-filter state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidState {
    /// Integral of the error (error · seconds).
    pub integral: f64,
    pub filtered_error: f64,
    primed: bool,
}

/// Terms of the most recent evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidTerms {
    pub output: f64,
    pub error: f64,
    pub setpoint: f64,
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
}

impl PidTerms {
    pub fn get(&self, quantity: PidQuantity) -> f64 {
        match quantity {
            PidQuantity::Output => self.output,
            PidQuantity::Error => self.error,
            PidQuantity::Setpoint => self.setpoint,
            PidQuantity::Proportional => self.proportional,
            PidQuantity::Integral => self.integral,
            PidQuantity::Derivative => self.derivative,
        }
    }
}

/// Reportable PID quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PidQuantity {
    Output,
    Error,
    Setpoint,
    Proportional,
    Integral,
    Derivative,
}

impl PidQuantity {
    pub const ALL: [PidQuantity; 6] = [
        Self::Output,
        Self::Error,
        Self::Setpoint,
        Self::Proportional,
        Self::Integral,
        Self::Derivative,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Output => "output",
            Self::Error => "error",
            Self::Setpoint => "setpoint",
            Self::Proportional => "proportional",
            Self::Integral => "integral",
            Self::Derivative => "derivative",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.keyword() == keyword)
    }
}

/// Where the setpoint comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    Constant(f64),
    Sensor(SensorId),
    Controller(ControllerId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BoundSetpoint {
    Constant(f64),
    Sensor(usize),
    Controller(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PidLoop {
    gains: PidGains,
    pv_sensor: SensorId,
    setpoint: Setpoint,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Binding {
    pv: usize,
    setpoint: BoundSetpoint,
}

/// PID feedback controller.
#[derive(Debug, Clone, PartialEq)]
pub struct PidController {
    id: ControllerId,
    last_output: f64,
    config: Option<PidLoop>,
    bound: Option<Binding>,
    state: PidState,
    terms: PidTerms,
    last_time: Option<f64>,
    average_selection: Vec<PidQuantity>,
    instant_selection: Vec<PidQuantity>,
    means: Vec<RunningMean>,
    averages: Vec<f64>,
    instant: Vec<f64>,
}

impl PidController {
    /// Create an unconfigured (degraded) PID controller at a 0-based index.
    pub fn new(index: u32) -> Self {
        Self {
            id: ControllerId::from_index(index),
            last_output: 0.0,
            config: None,
            bound: None,
            state: PidState::default(),
            terms: PidTerms::default(),
            last_time: None,
            average_selection: Vec::new(),
            instant_selection: Vec::new(),
            means: Vec::new(),
            averages: Vec::new(),
            instant: Vec::new(),
        }
    }

    /// Set the loop. Clears bindings and the integrator.
    pub fn configure(&mut self, gains: PidGains, pv_sensor: SensorId, setpoint: Setpoint) {
        self.config = Some(PidLoop {
            gains,
            pv_sensor,
            setpoint,
        });
        self.bound = None;
        self.state = PidState::default();
        self.last_time = None;
    }

    /// Select averaged quantities directly.
    pub fn select_averages(&mut self, quantities: Vec<PidQuantity>) {
        self.means = vec![RunningMean::new(); quantities.len()];
        self.averages = vec![0.0; quantities.len()];
        self.average_selection = quantities;
    }

    /// Select instantaneous quantities directly.
    pub fn select_instants(&mut self, quantities: Vec<PidQuantity>) {
        self.instant = vec![0.0; quantities.len()];
        self.instant_selection = quantities;
    }

    pub fn gains(&self) -> Option<PidGains> {
        self.config.map(|c| c.gains)
    }

    pub fn setpoint(&self) -> Option<Setpoint> {
        self.config.map(|c| c.setpoint)
    }

    pub fn state(&self) -> &PidState {
        &self.state
    }

    pub fn terms(&self) -> &PidTerms {
        &self.terms
    }

    fn read_loop(reader: &mut BlockReader<'_>) -> ControlResult<PidLoop> {
        let pv_sensor = reader.id("process variable sensor id")?;
        let source = reader.parse_with("setpoint source", |t| {
            ["sensor", "controller", "value"].into_iter().find(|k| *k == t)
        })?;
        let setpoint = match source {
            "sensor" => Setpoint::Sensor(reader.id("setpoint sensor id")?),
            "controller" => Setpoint::Controller(reader.id("setpoint controller id")?),
            _ => Setpoint::Constant(reader.real("setpoint value")?),
        };

        let gains_at = reader.next_token_offset();
        let kp = reader.real("kp")?;
        let ti = reader.real("ti")?;
        let td = reader.real("td")?;
        let td_filter = reader.real("td_filter")?;
        let out_min = reader.real("out_min")?;
        let out_max = reader.real("out_max")?;
        let gains = PidGains::new(kp, ti, td, td_filter, out_min, out_max)
            .map_err(|e| reader.error_at(gains_at, e.to_string()))?;

        Ok(PidLoop {
            gains,
            pv_sensor,
            setpoint,
        })
    }

    fn read_selection(
        stream: &ConfigStream,
        cursor: &mut Cursor,
    ) -> ControlResult<Vec<PidQuantity>> {
        stream.read_block(cursor, |reader| {
            let count = reader.count("quantity count")?;
            (0..count)
                .map(|_| reader.parse_with("PID quantity", PidQuantity::from_keyword))
                .collect()
        })
    }
}

impl Controller for PidController {
    fn id(&self) -> ControllerId {
        self.id
    }

    fn kind(&self) -> ControllerKind {
        ControllerKind::Pid
    }

    fn last_output(&self) -> f64 {
        self.last_output
    }

    fn output(&mut self, time: f64, inputs: &SignalInputs<'_>) -> ControllerOutput {
        let (Some(config), Some(bound)) = (&self.config, &self.bound) else {
            return ControllerOutput::Degraded(self.last_output);
        };

        let pv = inputs.sensor(bound.pv);
        let sp = match bound.setpoint {
            BoundSetpoint::Constant(v) => v,
            BoundSetpoint::Sensor(slot) => inputs.sensor(slot),
            BoundSetpoint::Controller(slot) => inputs.controller(slot),
        };
        if !pv.is_finite() || !sp.is_finite() {
            return ControllerOutput::Degraded(self.last_output);
        }

        let dt = self
            .last_time
            .map(|previous| time - previous)
            .filter(|dt| *dt > 0.0);
        let (state, terms) = config.gains.update(&self.state, pv, sp, dt);
        self.state = state;
        self.terms = terms;
        self.last_time = Some(time);
        self.last_output = terms.output;
        ControllerOutput::Computed(terms.output)
    }

    fn parse_configuration(
        &mut self,
        stream: &ConfigStream,
        cursor: &mut Cursor,
    ) -> ControlResult<()> {
        let config = stream.read_block(cursor, Self::read_loop)?;
        self.configure(config.gains, config.pv_sensor, config.setpoint);
        Ok(())
    }

    fn bind_references(&mut self, scope: &BindingScope<'_>) -> ControlResult<()> {
        let Some(config) = self.config else {
            return Ok(());
        };
        let pv = scope.sensor(self.id, config.pv_sensor)?;
        let setpoint = match config.setpoint {
            Setpoint::Constant(v) => BoundSetpoint::Constant(v),
            Setpoint::Sensor(id) => BoundSetpoint::Sensor(scope.sensor(self.id, id)?),
            Setpoint::Controller(id) => BoundSetpoint::Controller(scope.controller(self.id, id)?),
        };
        self.bound = Some(Binding { pv, setpoint });
        Ok(())
    }

    fn parse_average_selection(
        &mut self,
        stream: &ConfigStream,
        cursor: &mut Cursor,
    ) -> ControlResult<()> {
        let selection = Self::read_selection(stream, cursor)?;
        self.select_averages(selection);
        Ok(())
    }

    fn parse_instant_selection(
        &mut self,
        stream: &ConfigStream,
        cursor: &mut Cursor,
    ) -> ControlResult<()> {
        let selection = Self::read_selection(stream, cursor)?;
        self.select_instants(selection);
        Ok(())
    }

    fn reset_averages(&mut self) {
        for mean in &mut self.means {
            mean.reset();
        }
    }

    fn accumulate_average(&mut self, current: f64) {
        for (mean, quantity) in self.means.iter_mut().zip(&self.average_selection) {
            let value = match quantity {
                PidQuantity::Output => current,
                other => self.terms.get(*other),
            };
            mean.add(value);
        }
    }

    fn finalize_average(&mut self) {
        for (slot, mean) in self.averages.iter_mut().zip(&self.means) {
            *slot = mean.mean().unwrap_or(0.0);
        }
    }

    fn compute_instantaneous(&mut self) {
        for (slot, quantity) in self.instant.iter_mut().zip(&self.instant_selection) {
            *slot = match quantity {
                PidQuantity::Output => self.last_output,
                other => self.terms.get(*other),
            };
        }
    }

    fn average_header(&self, columns: &mut Vec<String>) {
        columns.extend(self.average_selection.iter().map(|q| column_name(self.id, q.keyword())));
    }

    fn instant_header(&self, columns: &mut Vec<String>) {
        columns.extend(self.instant_selection.iter().map(|q| column_name(self.id, q.keyword())));
    }

    fn average_values(&self, row: &mut Vec<f64>) {
        row.extend_from_slice(&self.averages);
    }

    fn instant_values(&self, row: &mut Vec<f64>) {
        row.extend_from_slice(&self.instant);
    }
}
