//! JSON in, JSON out: the boundary an embedding host talks to.

use cs_host::{SimulationResponse, Status, handle_json};
use serde_json::{Value, json};

const CONFIG: &str = "\
simulation step 1e-3 end cycles 2 average cycle
engine 3000 60
sensors 2 engine_speed throttle
controllers 2
  table 2
    axis 1 2 1000 5000
    axis 2 2 0 100
    values 0 10 20 40
  pid 2 controller 1 0.5 0.05 0 0.01 -20 50
averaged 1 2 1 output
instantaneous 1 2 1 error
actuators 1 phaser 1 0.005 2000 -10 40
";

fn request(config: &str, overrides: Value) -> String {
    json!({ "config": config, "overrides": overrides }).to_string()
}

fn respond(request_json: &str) -> SimulationResponse {
    serde_json::from_str(&handle_json(request_json)).unwrap()
}

#[test]
fn successful_run_reports_series_and_performance() {
    let response = respond(&request(CONFIG, json!({})));
    assert_eq!(response.status, Status::Success, "{}", response.message);
    assert_eq!(response.run_id.as_ref().map(String::len), Some(64));

    let output = response.output.unwrap();
    assert_eq!(output.time.len(), 80);
    assert_eq!(output.crank_angle.len(), 80);
    assert_eq!(output.controllers.len(), 2);
    assert_eq!(output.controllers[0].id, 1);
    assert_eq!(output.controllers[1].output.len(), 80);
    assert_eq!(output.controllers[0].degraded_samples, 0);
    assert_eq!(output.averaged.rows().len(), 2);
    assert_eq!(output.instantaneous.columns(), ["time_s", "ctrl2/error"]);

    let performance = response.performance.unwrap();
    assert_eq!(performance.steps, 80);
    assert_eq!(performance.cycles, 2);
    assert!(!performance.hit_step_limit);
    assert!((performance.mean_outputs[0] - 19.0).abs() < 1e-9);
}

#[test]
fn wire_shape_uses_lowercase_status() {
    let raw: Value = serde_json::from_str(&handle_json(&request(CONFIG, json!({})))).unwrap();
    assert_eq!(raw["status"], "success");
    assert_eq!(raw["output"]["controllers"][0]["kind"], "table");
    assert!(raw["performance"]["elapsed_s"].is_number());
}

#[test]
fn overrides_change_the_run_and_its_id() {
    let base = respond(&request(CONFIG, json!({})));
    let shorter = respond(&request(CONFIG, json!({ "cycles": 1, "engine_speed_rpm": 1500.0 })));
    assert_eq!(shorter.status, Status::Success, "{}", shorter.message);
    assert_ne!(base.run_id, shorter.run_id);

    let performance = shorter.performance.unwrap();
    assert_eq!(performance.cycles, 1);
    // 9 deg per step at 1500 rpm
    assert_eq!(performance.steps, 80);
}

#[test]
fn identical_requests_share_a_run_id() {
    let a = respond(&request(CONFIG, json!({ "record_every": 4 })));
    let b = respond(&request(CONFIG, json!({ "record_every": 4 })));
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.output.unwrap().time.len(), 20);
}

#[test]
fn malformed_json_is_an_error_response() {
    let response = respond("{ not json");
    assert_eq!(response.status, Status::Error);
    assert!(response.message.starts_with("Invalid request"));
    assert!(response.output.is_none());
    assert!(response.performance.is_none());
}

#[test]
fn configuration_errors_are_reported_not_raised() {
    let broken = CONFIG.replace("values 0 10 20 40", "values 0 10 20");
    let response = respond(&request(&broken, json!({})));
    assert_eq!(response.status, Status::Error);
    assert!(response.message.contains("line"), "{}", response.message);

    let dangling = CONFIG.replace("phaser 1", "phaser 9");
    let response = respond(&request(&dangling, json!({})));
    assert_eq!(response.status, Status::Error);
    assert!(response.message.contains("unknown controller 9"), "{}", response.message);
}

#[test]
fn invalid_overrides_are_reported() {
    let response = respond(&request(CONFIG, json!({ "record_every": 0 })));
    assert_eq!(response.status, Status::Error);
    assert!(response.message.contains("record_every"));
}

#[test]
fn huge_declared_counts_fail_cleanly() {
    let huge = CONFIG.replace("axis 1 2 1000 5000", "axis 1 1000000000000 1000 5000");
    let response = respond(&request(&huge, json!({})));
    assert_eq!(response.status, Status::Error);
    assert!(response.message.contains("line 7"), "{}", response.message);
    assert!(response.message.contains("axis breakpoint"), "{}", response.message);

    let huge = CONFIG.replace("controllers 2", "controllers 1000000000000");
    let response = respond(&request(&huge, json!({})));
    assert_eq!(response.status, Status::Error);
}

#[test]
fn absurd_engine_speed_is_an_error_response() {
    let response = respond(&request(CONFIG, json!({ "engine_speed_rpm": 1e22 })));
    assert_eq!(response.status, Status::Error);
    assert!(response.message.contains("Non-physical"), "{}", response.message);

    let fast = CONFIG.replace("engine 3000 60", "engine 1e22 10");
    let response = respond(&request(&fast, json!({})));
    assert_eq!(response.status, Status::Error);
}
