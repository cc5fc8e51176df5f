//! Integration tests: loading, evaluating and reporting a control system.

use cs_controls::{
    ConfigStream, ControlError, Controller, ControllerKind, ControllerOutput, Cursor,
    MeasurementProvider, ResultAggregator, SensedQuantity, load_control_system,
};
use proptest::prelude::*;

struct Engine {
    speed: f64,
}

impl MeasurementProvider for Engine {
    fn measure(&self, quantity: &SensedQuantity) -> Option<f64> {
        match quantity {
            SensedQuantity::EngineSpeed => Some(self.speed),
            _ => None,
        }
    }
}

fn load(text: &str) -> cs_controls::ControlResult<cs_controls::ControlSystem> {
    let stream = ConfigStream::new(text);
    let mut cursor = Cursor::START;
    load_control_system(&stream, &mut cursor)
}

#[test]
fn table_follows_sensor_and_clamps() {
    let mut system = load(
        "sensors 1 engine_speed
         controllers 1 table 1 axis 1 2 0 100 values 10 20
         averaged 0 instantaneous 0",
    )
    .expect("system should load");

    system.tick(0.0, &Engine { speed: 50.0 });
    assert_eq!(system.controllers.outputs(), &[15.0]);

    system.tick(0.1, &Engine { speed: 150.0 });
    assert_eq!(system.controllers.outputs(), &[20.0]);
    assert_eq!(system.controllers.degraded(), &[false]);
}

#[test]
fn forward_reference_between_controllers_binds() {
    // controller 1 uses controller 2 (declared later) as its setpoint
    let system = load(
        "sensors 1 constant 0
         controllers 2
           pid 1 controller 2 1 1 0 0.1 -50 50
           table 0 values 12
         averaged 0 instantaneous 0",
    )
    .expect("forward reference is legal");
    assert_eq!(system.controllers.len(), 2);
}

#[test]
fn unresolved_sensor_fails_the_whole_load() {
    let err = load(
        "sensors 1 engine_speed
         controllers 1 table 1 axis 4 2 0 1 values 0 1
         averaged 0 instantaneous 0",
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "controller 1 references unknown sensor 4"
    );
}

#[test]
fn degraded_table_repeats_last_output() {
    let mut system = load(
        "sensors 1 engine_speed
         controllers 1 table 1 axis 1 2 0 100 values 10 20
         averaged 0 instantaneous 0",
    )
    .unwrap();
    system.tick(0.0, &Engine { speed: 25.0 });
    assert_eq!(system.controllers.outputs(), &[12.5]);

    // NaN readings make the tick undefined; the output holds
    for t in 1..4 {
        system.tick(f64::from(t), &Engine { speed: f64::NAN });
        assert_eq!(system.controllers.outputs(), &[12.5]);
        assert_eq!(system.controllers.degraded(), &[true]);
    }
}

#[test]
fn degraded_output_variant_is_observable() {
    let mut table = cs_controls::TableController::new(0);
    let sensors = cs_controls::SensorBank::new();
    let out = table.output(0.0, &cs_controls::SignalInputs::new(&sensors, &[]));
    assert!(matches!(out, ControllerOutput::Degraded(v) if v == 0.0));
}

#[test]
fn aggregator_reports_both_cadences() {
    let mut system = load(
        "sensors 1 constant 1
         controllers 2
           table 0 values 3
           pid 1 value 5 1 1 0 0.1 0 100
         averaged 1 2 1 output
         instantaneous 2 1 2 2 output error",
    )
    .unwrap();
    let mut aggregator = ResultAggregator::new();
    aggregator.write_headers(&system.controllers).unwrap();
    assert_eq!(aggregator.instant().columns(), ["time_s", "ctrl2/output", "ctrl2/error"]);
    assert_eq!(aggregator.averaged().columns(), ["time_s", "ctrl2/output"]);

    aggregator.begin_interval(&mut system.controllers);
    for (step, time) in [0.0, 0.5].into_iter().enumerate() {
        system.tick(time, &Engine { speed: 0.0 });
        aggregator.accumulate(&mut system.controllers);
        aggregator.record_instant(time, &mut system.controllers).unwrap();
        assert_eq!(aggregator.instant().rows().len(), step + 1);
    }
    aggregator.close_interval(0.5, &mut system.controllers).unwrap();

    // error 4 on both ticks; tick 1 is P-only (4), tick 2 adds I = 4 * 0.5 = 2
    let instant = aggregator.instant();
    assert_eq!(instant.column("ctrl2/output"), Some(vec![4.0, 6.0]));
    assert_eq!(instant.column("ctrl2/error"), Some(vec![4.0, 4.0]));
    assert_eq!(aggregator.averaged().rows(), &[vec![0.5, 5.0]]);
}

#[test]
fn aggregator_rejects_second_header() {
    let system = load("sensors 0 controllers 0 averaged 0 instantaneous 0").unwrap();
    let mut aggregator = ResultAggregator::new();
    aggregator.write_headers(&system.controllers).unwrap();
    assert!(matches!(
        aggregator.write_headers(&system.controllers),
        Err(ControlError::ReportShape { .. })
    ));
}

fn table_block(axes: &[usize]) -> String {
    let mut block = format!("table {}", axes.len());
    for points in axes {
        block.push_str(&format!(" axis 1 {points}"));
        for k in 0..*points {
            block.push_str(&format!(" {}", k * 10));
        }
    }
    let n: usize = axes.iter().product();
    block.push_str(" values");
    for k in 0..n {
        block.push_str(&format!(" {k}.5"));
    }
    block
}

fn pid_block(gain: u8) -> String {
    format!("pid 1 value 2 {gain} 1 0 0.1 -10 10")
}

proptest! {
    #[test]
    fn controller_spans_are_contiguous_and_monotonic(
        blocks in prop::collection::vec(
            prop_oneof![
                prop::collection::vec(1usize..4, 0..3).prop_map(|axes| table_block(&axes)),
                (1u8..9).prop_map(pid_block),
            ],
            0..6,
        )
    ) {
        let text = format!(
            "sensors 1 engine_speed # generated\ncontrollers {}\n{}\naveraged 0 instantaneous 0",
            blocks.len(),
            blocks.join("\n"),
        );
        let stream = ConfigStream::new(text.as_str());
        let mut cursor = Cursor::START;
        let system = load_control_system(&stream, &mut cursor).unwrap();
        prop_assert!(stream.is_exhausted(cursor));
        prop_assert_eq!(system.blocks.len(), blocks.len());

        for (i, block) in system.blocks.iter().enumerate() {
            prop_assert_eq!(block.id.number() as usize, i + 1);
            prop_assert!(block.span.start <= block.span.end);
            let expected = if blocks[i].starts_with("pid") {
                ControllerKind::Pid
            } else {
                ControllerKind::Table
            };
            prop_assert_eq!(block.kind, expected);
            // each block's text is exactly its controller, nothing of the next
            prop_assert_eq!(text[block.span.clone()].trim(), blocks[i].as_str());
        }
        for pair in system.blocks.windows(2) {
            prop_assert_eq!(pair[0].span.end, pair[1].span.start);
        }
    }
}
