//! Controller arena and the assembled control system.

use std::ops::Range;

use cs_core::ControllerId;
use tracing::debug;

use crate::controller::{BindingScope, Controller, ControllerKind, SignalInputs};
use crate::error::{ControlError, ControlResult};
use crate::sensor::{MeasurementProvider, SensorBank};

/// Controllers in construction order, with their latest outputs.
#[derive(Debug, Default)]
pub struct ControllerSet {
    controllers: Vec<Box<dyn Controller>>,
    outputs: Vec<f64>,
    degraded: Vec<bool>,
}

impl ControllerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a controller. Its id must match the next construction index.
    pub fn push(&mut self, controller: Box<dyn Controller>) -> ControlResult<ControllerId> {
        let id = controller.id();
        if id.slot() != self.controllers.len() {
            return Err(ControlError::InvalidArg {
                what: "controller id must equal its construction index + 1",
            });
        }
        self.outputs.push(controller.last_output());
        self.degraded.push(false);
        self.controllers.push(controller);
        Ok(id)
    }

    /// Construction index the next pushed controller must carry.
    pub fn next_index(&self) -> u32 {
        self.controllers.len() as u32
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn get(&self, id: ControllerId) -> Option<&(dyn Controller + 'static)> {
        self.controllers.get(id.slot()).map(|c| c.as_ref())
    }

    pub fn get_mut(&mut self, id: ControllerId) -> Option<&mut (dyn Controller + 'static)> {
        self.controllers.get_mut(id.slot()).map(|c| c.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn Controller + 'static)> {
        self.controllers.iter().map(|c| c.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (dyn Controller + 'static)> {
        self.controllers.iter_mut().map(|c| c.as_mut())
    }

    /// Latest output of every controller, by slot.
    pub fn outputs(&self) -> &[f64] {
        &self.outputs
    }

    /// Whether each controller's latest evaluation was degraded, by slot.
    pub fn degraded(&self) -> &[bool] {
        &self.degraded
    }

    pub fn output_of(&self, id: ControllerId) -> Option<f64> {
        self.outputs.get(id.slot()).copied()
    }

    /// Resolve every controller's references. Stops at the first failure.
    pub fn bind_all(&mut self, sensors: &SensorBank) -> ControlResult<()> {
        let scope = BindingScope::new(sensors, self.controllers.len());
        for controller in &mut self.controllers {
            controller.bind_references(&scope)?;
        }
        Ok(())
    }

    /// Evaluate every controller once, in construction order.
    ///
    /// A controller reading a sibling sees this tick's value when the sibling
    /// comes earlier and the previous tick's value otherwise.
    pub fn evaluate(&mut self, time: f64, sensors: &SensorBank) {
        for slot in 0..self.controllers.len() {
            let inputs = SignalInputs::new(sensors, &self.outputs);
            let output = self.controllers[slot].output(time, &inputs);
            if output.is_degraded() && !self.degraded[slot] {
                debug!(
                    controller = %self.controllers[slot].id(),
                    time,
                    "controller output degraded"
                );
            }
            self.outputs[slot] = output.value();
            self.degraded[slot] = output.is_degraded();
        }
    }
}

/// Where a controller's block sits in the configuration stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerBlock {
    pub id: ControllerId,
    pub kind: ControllerKind,
    /// Byte range from the cursor before the block to the cursor after it.
    pub span: Range<usize>,
}

/// Sensors plus bound controllers, ready to run.
#[derive(Debug, Default)]
pub struct ControlSystem {
    pub sensors: SensorBank,
    pub controllers: ControllerSet,
    pub blocks: Vec<ControllerBlock>,
}

impl ControlSystem {
    /// Refresh sensors from `provider`, then evaluate every controller.
    pub fn tick(&mut self, time: f64, provider: &dyn MeasurementProvider) {
        self.sensors.update_all(time, provider);
        self.controllers.evaluate(time, &self.sensors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupTable;
    use crate::pid::{PidController, PidGains, Setpoint};
    use crate::sensor::SensedQuantity;
    use crate::table::TableController;
    use cs_core::SensorId;

    fn constant_table(index: u32, value: f64) -> Box<dyn Controller> {
        let mut table = TableController::new(index);
        table
            .load_table(LookupTable::constant(value).unwrap(), vec![])
            .unwrap();
        Box::new(table)
    }

    #[test]
    fn push_rejects_out_of_order_ids() {
        let mut set = ControllerSet::new();
        assert!(set.push(constant_table(1, 0.0)).is_err());
        assert_eq!(set.push(constant_table(0, 0.0)).unwrap().number(), 1);
        assert_eq!(set.next_index(), 1);
    }

    #[test]
    fn later_sibling_is_seen_one_tick_late() {
        let mut sensors = SensorBank::new();
        sensors.push(SensedQuantity::Constant(0.0));

        let gains = PidGains::new(1.0, 1e9, 0.0, 0.1, -100.0, 100.0).unwrap();
        let mut pid = PidController::new(0);
        pid.configure(
            gains,
            SensorId::from_index(0),
            Setpoint::Controller(ControllerId::from_index(1)),
        );

        let mut set = ControllerSet::new();
        set.push(Box::new(pid)).unwrap();
        set.push(constant_table(1, 7.0)).unwrap();
        set.bind_all(&sensors).unwrap();

        set.evaluate(0.0, &sensors);
        assert_eq!(set.outputs(), &[0.0, 7.0]);
        set.evaluate(0.1, &sensors);
        assert!((set.outputs()[0] - 7.0).abs() < 1e-6);
    }

    #[test]
    fn degraded_flags_follow_evaluation() {
        let sensors = SensorBank::new();
        let mut set = ControllerSet::new();
        set.push(Box::new(TableController::new(0))).unwrap();
        set.push(constant_table(1, 2.0)).unwrap();
        set.bind_all(&sensors).unwrap();
        set.evaluate(0.0, &sensors);
        assert_eq!(set.degraded(), &[true, false]);
        assert_eq!(set.output_of(ControllerId::from_index(1)), Some(2.0));
    }
}
