//! Reading a whole simulation from one configuration stream.
//!
//! Section order: `simulation`, `engine`, `sensors`, `controllers`,
//! `averaged`, `instantaneous`, `actuators`. The cursor is handed from one
//! section parser to the next; nothing may follow the last section.

use cs_controls::{ConfigStream, Cursor, load_control_system};
use tracing::info;

use crate::actuator::ActuatorBank;
use crate::engine::EngineModel;
use crate::error::SimResult;
use crate::sim::{SimOptions, SimSetup};

impl SimSetup {
    /// Parse every section of `stream` starting at `cursor`.
    pub fn load(stream: &ConfigStream, cursor: &mut Cursor) -> SimResult<Self> {
        let options = SimOptions::parse_section(stream, cursor)?;
        let engine = EngineModel::parse_section(stream, cursor)?;
        let control = load_control_system(stream, cursor)?;
        let actuators = ActuatorBank::parse_section(stream, cursor)?;
        actuators.validate_against(&control.controllers)?;

        if !stream.is_exhausted(*cursor) {
            let at = stream.reader(*cursor).next_token_offset();
            *cursor = Cursor::at(at);
            return Err(stream
                .format_error(at, "unexpected content after the actuators section")
                .into());
        }

        info!(
            sensors = control.sensors.len(),
            controllers = control.controllers.len(),
            actuators = actuators.len(),
            "simulation configuration loaded"
        );
        Ok(Self {
            options,
            engine,
            control,
            actuators,
        })
    }

    /// Parse a complete configuration text.
    pub fn from_text(text: &str) -> SimResult<Self> {
        let stream = ConfigStream::new(text);
        let mut cursor = Cursor::START;
        Self::load(&stream, &mut cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use cs_controls::ControlError;

    const CONFIG: &str = "\
simulation step 1e-4 end cycles 2 average cycle
engine 2000 40
sensors 1 engine_speed
controllers 1
  table 1 axis 1 3 1000 2000 3000 values 5 15 25
averaged 0
instantaneous 0
actuators 1 phaser 1 0.02 300 -10 40
";

    #[test]
    fn loads_all_sections() {
        let setup = SimSetup::from_text(CONFIG).unwrap();
        assert_eq!(setup.options.end, crate::sim::EndCondition::Cycles(2));
        assert_eq!(setup.control.controllers.len(), 1);
        assert_eq!(setup.actuators.len(), 1);
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let text = format!("{CONFIG}extra");
        let err = SimSetup::from_text(&text).unwrap_err();
        match err {
            SimError::Control(ControlError::ConfigFormat { line, .. }) => assert_eq!(line, 9),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn actuator_with_unknown_controller_is_unresolved() {
        let text = CONFIG.replace("phaser 1", "phaser 3");
        let err = SimSetup::from_text(&text).unwrap_err();
        assert!(matches!(
            err,
            SimError::Control(ControlError::UnresolvedReference { .. })
        ));
    }
}
