//! Two-phase construction of the control system from the configuration stream.
//!
//! Phase one walks the stream in file order: the sensor section, then one block
//! per controller (variant keyword, then the variant's own parser), then the
//! averaged and instantaneous result selections. Phase two binds every
//! controller's references once all controllers exist.

use cs_core::ControllerId;
use tracing::{debug, info};

use crate::config::{ConfigStream, Cursor};
use crate::controller::{Controller, ControllerKind};
use crate::error::{ControlError, ControlResult};
use crate::pid::PidController;
use crate::sensor::SensorBank;
use crate::system::{ControlSystem, ControllerBlock, ControllerSet};
use crate::table::TableController;

/// Build an empty controller of `kind` at a 0-based construction index.
pub fn new_controller(kind: ControllerKind, index: u32) -> Box<dyn Controller> {
    match kind {
        ControllerKind::Table => Box::new(TableController::new(index)),
        ControllerKind::Pid => Box::new(PidController::new(index)),
    }
}

/// Load sensors, controllers and result selections starting at `cursor`.
///
/// On success the cursor sits just past the `instantaneous` section. On failure
/// it sits at the offending token and nothing is returned.
pub fn load_control_system(
    stream: &ConfigStream,
    cursor: &mut Cursor,
) -> ControlResult<ControlSystem> {
    let sensors = SensorBank::parse_section(stream, cursor)?;
    let (mut controllers, blocks) = parse_controllers(stream, cursor)?;

    controllers.bind_all(&sensors)?;
    debug!(controllers = controllers.len(), "controller references bound");

    parse_selections(stream, cursor, "averaged", &mut controllers, |c, s, k| {
        c.parse_average_selection(s, k)
    })?;
    parse_selections(stream, cursor, "instantaneous", &mut controllers, |c, s, k| {
        c.parse_instant_selection(s, k)
    })?;

    info!(
        sensors = sensors.len(),
        controllers = controllers.len(),
        "control system loaded"
    );
    Ok(ControlSystem {
        sensors,
        controllers,
        blocks,
    })
}

fn parse_controllers(
    stream: &ConfigStream,
    cursor: &mut Cursor,
) -> ControlResult<(ControllerSet, Vec<ControllerBlock>)> {
    let count = stream.read_block(cursor, |reader| {
        reader.keyword("controllers")?;
        reader.count("controller count")
    })?;

    let mut set = ControllerSet::new();
    let mut blocks = Vec::new();
    for _ in 0..count {
        let start = cursor.offset();
        let kind = stream.read_block(cursor, |reader| {
            reader.parse_with("controller kind", ControllerKind::from_keyword)
        })?;
        let mut controller = new_controller(kind, set.next_index());
        controller.parse_configuration(stream, cursor)?;
        let id = set.push(controller)?;
        debug!(controller = %id, %kind, "controller constructed");
        blocks.push(ControllerBlock {
            id,
            kind,
            span: start..cursor.offset(),
        });
    }
    Ok((set, blocks))
}

fn parse_selections(
    stream: &ConfigStream,
    cursor: &mut Cursor,
    section: &'static str,
    controllers: &mut ControllerSet,
    mut parse: impl FnMut(&mut dyn Controller, &ConfigStream, &mut Cursor) -> ControlResult<()>,
) -> ControlResult<()> {
    let count = stream.read_block(cursor, |reader| {
        reader.keyword(section)?;
        reader.count("selection count")
    })?;

    for _ in 0..count {
        let id: ControllerId = stream.read_block(cursor, |reader| reader.id("controller id"))?;
        let controller = controllers
            .get_mut(id)
            .ok_or_else(|| ControlError::UnresolvedReference {
                owner: format!("{section} section"),
                target: "controller",
                id,
            })?;
        parse(controller, stream, cursor)?;
    }
    debug!(section, entries = count, "result selection parsed");
    Ok(())
}
