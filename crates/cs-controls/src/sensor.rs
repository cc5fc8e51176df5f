//! Sensors: read-only, time-indexed scalar readings consumed by controllers.
//!
//! A sensor names a quantity of the simulated engine. Once per timestep the
//! simulation loop refreshes every sensor from a [`MeasurementProvider`];
//! controllers only ever read the latest value.

use cs_core::SensorId;
use tracing::debug;

use crate::config::{ConfigStream, Cursor};
use crate::error::ControlResult;

/// Quantity observed by a sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensedQuantity {
    /// Crankshaft speed (rpm).
    EngineSpeed,
    /// Throttle opening (%).
    Throttle,
    /// Crank angle within the current cycle (degrees, 0..720).
    CrankAngle,
    /// Simulated time (seconds).
    Time,
    /// Number of completed engine cycles.
    Cycle,
    /// Fixed value, independent of the simulation.
    Constant(f64),
}

impl SensedQuantity {
    /// Keyword used in configuration files.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::EngineSpeed => "engine_speed",
            Self::Throttle => "throttle",
            Self::CrankAngle => "crank_angle",
            Self::Time => "time",
            Self::Cycle => "cycle",
            Self::Constant(_) => "constant",
        }
    }
}

/// Trait for types that can provide measured values.
///
/// Implemented by the simulation's engine state.
pub trait MeasurementProvider {
    /// Get the current value of a quantity.
    ///
    /// Returns `None` if the quantity is not available.
    fn measure(&self, quantity: &SensedQuantity) -> Option<f64>;
}

/// A single sensor and its latest reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    id: SensorId,
    quantity: SensedQuantity,
    reading: f64,
    sampled_at: Option<f64>,
}

impl Sensor {
    /// Create a sensor at a 0-based construction index.
    pub fn new(index: u32, quantity: SensedQuantity) -> Self {
        let reading = match quantity {
            SensedQuantity::Constant(value) => value,
            _ => 0.0,
        };
        Self {
            id: SensorId::from_index(index),
            quantity,
            reading,
            sampled_at: None,
        }
    }

    pub fn id(&self) -> SensorId {
        self.id
    }

    pub fn quantity(&self) -> SensedQuantity {
        self.quantity
    }

    /// Latest reading.
    pub fn reading(&self) -> f64 {
        self.reading
    }

    /// Time of the latest refresh, if any.
    pub fn sampled_at(&self) -> Option<f64> {
        self.sampled_at
    }

    /// Refresh the reading. A quantity the provider cannot supply keeps the
    /// previous reading.
    pub fn update(&mut self, time: f64, provider: &dyn MeasurementProvider) {
        let value = match self.quantity {
            SensedQuantity::Constant(value) => Some(value),
            ref quantity => provider.measure(quantity),
        };
        if let Some(value) = value {
            self.reading = value;
        }
        self.sampled_at = Some(time);
    }
}

/// Arena of sensors indexed by construction order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorBank {
    sensors: Vec<Sensor>,
}

impl SensorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sensor and return its identifier.
    pub fn push(&mut self, quantity: SensedQuantity) -> SensorId {
        let sensor = Sensor::new(self.sensors.len() as u32, quantity);
        let id = sensor.id();
        self.sensors.push(sensor);
        id
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn get(&self, id: SensorId) -> Option<&Sensor> {
        self.sensors.get(id.slot())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.iter()
    }

    /// Reading of the sensor in arena slot `slot`.
    pub fn reading(&self, slot: usize) -> Option<f64> {
        self.sensors.get(slot).map(Sensor::reading)
    }

    /// Refresh every sensor from `provider`.
    pub fn update_all(&mut self, time: f64, provider: &dyn MeasurementProvider) {
        for sensor in &mut self.sensors {
            sensor.update(time, provider);
        }
    }

    /// Parse a `sensors <n>` section.
    pub fn parse_section(stream: &ConfigStream, cursor: &mut Cursor) -> ControlResult<Self> {
        let bank = stream.read_block(cursor, |reader| {
            reader.keyword("sensors")?;
            let count = reader.count("sensor count")?;
            let mut bank = SensorBank::new();
            for _ in 0..count {
                let quantity = reader.parse_with("sensor quantity", |token| match token {
                    "engine_speed" => Some(SensedQuantity::EngineSpeed),
                    "throttle" => Some(SensedQuantity::Throttle),
                    "crank_angle" => Some(SensedQuantity::CrankAngle),
                    "time" => Some(SensedQuantity::Time),
                    "cycle" => Some(SensedQuantity::Cycle),
                    "constant" => Some(SensedQuantity::Constant(0.0)),
                    _ => None,
                })?;
                let quantity = match quantity {
                    SensedQuantity::Constant(_) => {
                        SensedQuantity::Constant(reader.real("constant value")?)
                    }
                    other => other,
                };
                bank.push(quantity);
            }
            Ok(bank)
        })?;
        debug!(sensors = bank.len(), "sensor section parsed");
        Ok(bank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl MeasurementProvider for Fixed {
        fn measure(&self, quantity: &SensedQuantity) -> Option<f64> {
            match quantity {
                SensedQuantity::EngineSpeed => Some(3000.0),
                SensedQuantity::Throttle => Some(42.0),
                _ => None,
            }
        }
    }

    #[test]
    fn ids_follow_construction_order() {
        let mut bank = SensorBank::new();
        let a = bank.push(SensedQuantity::EngineSpeed);
        let b = bank.push(SensedQuantity::Throttle);
        assert_eq!(a.number(), 1);
        assert_eq!(b.number(), 2);
        assert_eq!(bank.get(b).unwrap().quantity(), SensedQuantity::Throttle);
    }

    #[test]
    fn update_reads_provider_and_keeps_unavailable() {
        let mut bank = SensorBank::new();
        bank.push(SensedQuantity::EngineSpeed);
        bank.push(SensedQuantity::CrankAngle);
        bank.push(SensedQuantity::Constant(7.5));
        bank.update_all(0.01, &Fixed);
        assert_eq!(bank.reading(0), Some(3000.0));
        assert_eq!(bank.reading(1), Some(0.0));
        assert_eq!(bank.reading(2), Some(7.5));
        assert_eq!(bank.get(SensorId::from_index(0)).unwrap().sampled_at(), Some(0.01));
    }

    #[test]
    fn parse_section_reads_all_quantities() {
        let stream =
            ConfigStream::new("sensors 3\n engine_speed\n constant 1.5 # fixed\n throttle\nnext");
        let mut cursor = Cursor::START;
        let bank = SensorBank::parse_section(&stream, &mut cursor).unwrap();
        assert_eq!(bank.len(), 3);
        assert_eq!(bank.reading(1), Some(1.5));
        assert_eq!(&stream.as_str()[cursor.offset()..], "\nnext");
    }

    #[test]
    fn parse_section_rejects_unknown_quantity() {
        let stream = ConfigStream::new("sensors 1 boost_pressure");
        let mut cursor = Cursor::START;
        let err = SensorBank::parse_section(&stream, &mut cursor).unwrap_err();
        assert!(err.to_string().contains("boost_pressure"));
        assert_eq!(cursor.offset(), 10);
    }
}
