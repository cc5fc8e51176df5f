//! Table controller: maps sensor readings to an output through a lookup table.
//!
//! Each table axis is fed by one sensor. Until a table has been loaded (from
//! the configuration stream or through [`TableController::load_table`]) the
//! controller is degraded and keeps returning its cached output.
//!
//! Configuration block (after the `table` keyword):
//!
//! ```text
//! <n_axes>
//! axis <sensor_id> <n_points> <breakpoint>...    # n_axes times
//! values <value>...                              # product of n_points
//! ```

use cs_core::{ControllerId, SensorId};

use crate::config::{BlockReader, ConfigStream, Cursor};
use crate::controller::{BindingScope, Controller, ControllerKind, ControllerOutput, SignalInputs};
use crate::error::{ControlError, ControlResult};
use crate::lookup::{Axis, LookupTable, MAX_AXES};

/// Lookup-table controller.
#[derive(Debug, Clone, PartialEq)]
pub struct TableController {
    id: ControllerId,
    last_output: f64,
    table: Option<LookupTable>,
    /// Sensor feeding each axis, as written in the configuration.
    axis_sensors: Vec<SensorId>,
    /// Arena slot for each axis sensor; filled by binding.
    bound: Option<Vec<usize>>,
    readings: Vec<f64>,
}

impl TableController {
    /// Create an empty (degraded) table controller at a 0-based construction index.
    pub fn new(index: u32) -> Self {
        Self {
            id: ControllerId::from_index(index),
            last_output: 0.0,
            table: None,
            axis_sensors: Vec::new(),
            bound: None,
            readings: Vec::new(),
        }
    }

    /// Replace the table and its axis sensors. Bindings are cleared and must be
    /// resolved again.
    pub fn load_table(
        &mut self,
        table: LookupTable,
        axis_sensors: Vec<SensorId>,
    ) -> ControlResult<()> {
        if axis_sensors.len() != table.dimensions() {
            return Err(ControlError::InvalidArg {
                what: "one sensor is required per table axis",
            });
        }
        self.readings = Vec::with_capacity(axis_sensors.len());
        self.table = Some(table);
        self.axis_sensors = axis_sensors;
        self.bound = None;
        Ok(())
    }

    pub fn table(&self) -> Option<&LookupTable> {
        self.table.as_ref()
    }

    pub fn axis_sensors(&self) -> &[SensorId] {
        &self.axis_sensors
    }

    /// True once a table is loaded and every axis sensor is bound.
    pub fn is_ready(&self) -> bool {
        self.table.is_some() && self.bound.is_some()
    }

    fn read_block(reader: &mut BlockReader<'_>) -> ControlResult<(LookupTable, Vec<SensorId>)> {
        let axes_at = reader.next_token_offset();
        let n_axes = reader.count("table axis count")?;
        if n_axes > MAX_AXES {
            return Err(reader.error_at(
                axes_at,
                format!("table has {n_axes} axes, at most {MAX_AXES} are supported"),
            ));
        }

        let mut axes = Vec::with_capacity(n_axes);
        let mut sensors = Vec::with_capacity(n_axes);
        for _ in 0..n_axes {
            reader.keyword("axis")?;
            sensors.push(reader.id("axis sensor id")?);
            let points_at = reader.next_token_offset();
            let n_points = reader.positive_count("axis breakpoint count")?;
            let mut breakpoints = Vec::new();
            for _ in 0..n_points {
                breakpoints.push(reader.real("axis breakpoint")?);
            }
            let axis = Axis::new(breakpoints)
                .map_err(|e| reader.error_at(points_at, e.to_string()))?;
            axes.push(axis);
        }

        reader.keyword("values")?;
        let values_at = reader.next_token_offset();
        let n_values = axes
            .iter()
            .try_fold(1_usize, |n, axis| n.checked_mul(axis.len()))
            .ok_or_else(|| reader.error_at(values_at, "table has too many values"))?;
        let mut values = Vec::new();
        for _ in 0..n_values {
            values.push(reader.real("table value")?);
        }
        let table =
            LookupTable::new(axes, values).map_err(|e| reader.error_at(values_at, e.to_string()))?;
        Ok((table, sensors))
    }
}

impl Controller for TableController {
    fn id(&self) -> ControllerId {
        self.id
    }

    fn kind(&self) -> ControllerKind {
        ControllerKind::Table
    }

    fn last_output(&self) -> f64 {
        self.last_output
    }

    fn output(&mut self, _time: f64, inputs: &SignalInputs<'_>) -> ControllerOutput {
        let (Some(table), Some(slots)) = (&self.table, &self.bound) else {
            return ControllerOutput::Degraded(self.last_output);
        };

        self.readings.clear();
        self.readings.extend(slots.iter().map(|slot| inputs.sensor(*slot)));
        match table.evaluate(&self.readings) {
            Some(value) => {
                self.last_output = value;
                ControllerOutput::Computed(value)
            }
            None => ControllerOutput::Degraded(self.last_output),
        }
    }

    fn parse_configuration(
        &mut self,
        stream: &ConfigStream,
        cursor: &mut Cursor,
    ) -> ControlResult<()> {
        let (table, sensors) = stream.read_block(cursor, Self::read_block)?;
        self.load_table(table, sensors)
    }

    fn bind_references(&mut self, scope: &BindingScope<'_>) -> ControlResult<()> {
        let slots = self
            .axis_sensors
            .iter()
            .map(|sensor| scope.sensor(self.id, *sensor))
            .collect::<ControlResult<Vec<_>>>()?;
        self.bound = Some(slots);
        Ok(())
    }

    // A table carries no error terms or internal signals, so there is nothing
    // to select, average or print for it. Each hook is intentionally empty.

    fn parse_average_selection(
        &mut self,
        _stream: &ConfigStream,
        _cursor: &mut Cursor,
    ) -> ControlResult<()> {
        Ok(())
    }

    fn parse_instant_selection(
        &mut self,
        _stream: &ConfigStream,
        _cursor: &mut Cursor,
    ) -> ControlResult<()> {
        Ok(())
    }

    fn reset_averages(&mut self) {}

    fn accumulate_average(&mut self, _current: f64) {}

    fn finalize_average(&mut self) {}

    fn compute_instantaneous(&mut self) {}

    fn average_header(&self, _columns: &mut Vec<String>) {}

    fn instant_header(&self, _columns: &mut Vec<String>) {}

    fn average_values(&self, _row: &mut Vec<f64>) {}

    fn instant_values(&self, _row: &mut Vec<f64>) {}
}
