//! Simulation runner and result recording.
//!
//! The loop is a do-while over fixed steps. Each tick:
//! 1. determine the step size (independent of engine state)
//! 2. advance the engine, refresh sensors, evaluate controllers, step phasers
//! 3. advance the flow model with this tick's actuation
//! 4. manage output: accumulate averages, emit the instantaneous row and, on an
//!    interval boundary, finalize and emit the averaged row
//!
//! The end predicate is checked after every tick, so at least one tick runs.

use cs_controls::{
    ConfigStream, ControlSystem, Cursor, ReportStream, ResultAggregator, RunningMean,
};
use cs_core::constants::DEG_PER_CYCLE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::actuator::ActuatorBank;
use crate::engine::{Engine, EngineModel};
use crate::error::{SimError, SimResult};
use crate::flow::{Actuation, DetachedFlow, FlowModel};

/// When the loop stops.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCondition {
    /// Simulated time reached (seconds).
    Time(f64),
    /// Completed engine cycles reached.
    Cycles(u64),
    /// Ticks executed.
    Steps(u64),
}

/// Span over which controller outputs are averaged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AveragingInterval {
    /// Closes on the tick that completes an engine cycle.
    #[default]
    EngineCycle,
    /// Closes on every n-th tick.
    Steps(u64),
}

/// Options for simulation runs.
#[derive(Clone, Debug, PartialEq)]
pub struct SimOptions {
    /// Fixed time step (seconds)
    pub dt: f64,
    /// End predicate
    pub end: EndCondition,
    /// Averaging interval for the averaged report
    pub interval: AveragingInterval,
    /// Maximum number of steps (safety limit)
    pub max_steps: usize,
    /// Record every N-th step (decimation)
    pub record_every: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            dt: 1e-4,
            end: EndCondition::Cycles(10),
            interval: AveragingInterval::EngineCycle,
            max_steps: 10_000_000,
            record_every: 1,
        }
    }
}

impl SimOptions {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(SimError::InvalidArg {
                what: "dt must be positive",
            });
        }
        match self.end {
            EndCondition::Time(t) if !(t > 0.0 && t.is_finite()) => {
                return Err(SimError::InvalidArg {
                    what: "end time must be positive",
                });
            }
            EndCondition::Cycles(0) | EndCondition::Steps(0) => {
                return Err(SimError::InvalidArg {
                    what: "end count must be positive",
                });
            }
            _ => {}
        }
        if self.interval == AveragingInterval::Steps(0) {
            return Err(SimError::InvalidArg {
                what: "averaging interval must be positive",
            });
        }
        if self.max_steps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        if self.record_every == 0 {
            return Err(SimError::InvalidArg {
                what: "record_every must be positive",
            });
        }
        Ok(())
    }

    /// Parse the `simulation` section.
    pub fn parse_section(stream: &ConfigStream, cursor: &mut Cursor) -> SimResult<Self> {
        let options = stream.read_block(cursor, |reader| {
            reader.keyword("simulation")?;
            reader.keyword("step")?;
            let dt_at = reader.next_token_offset();
            let dt = reader.real("time step")?;
            if dt <= 0.0 {
                return Err(reader.error_at(dt_at, "time step must be positive"));
            }

            reader.keyword("end")?;
            let end = match reader.parse_with("end kind (cycles, time or steps)", |t| {
                ["cycles", "time", "steps"].into_iter().find(|k| *k == t)
            })? {
                "cycles" => EndCondition::Cycles(reader.positive_count("cycle count")? as u64),
                "steps" => EndCondition::Steps(reader.positive_count("step count")? as u64),
                _ => {
                    let at = reader.next_token_offset();
                    let t = reader.real("end time")?;
                    if t <= 0.0 {
                        return Err(reader.error_at(at, "end time must be positive"));
                    }
                    EndCondition::Time(t)
                }
            };

            reader.keyword("average")?;
            let interval = match reader.parse_with("averaging interval (cycle or steps)", |t| {
                ["cycle", "steps"].into_iter().find(|k| *k == t)
            })? {
                "cycle" => AveragingInterval::EngineCycle,
                _ => AveragingInterval::Steps(reader.positive_count("interval steps")? as u64),
            };

            Ok(SimOptions {
                dt,
                end,
                interval,
                ..SimOptions::default()
            })
        })?;
        debug!(
            dt = options.dt,
            end = ?options.end,
            interval = ?options.interval,
            "simulation section parsed"
        );
        Ok(options)
    }
}

/// Loop state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimPhase {
    Initializing,
    Stepping,
    Ended,
}

/// Record of simulation results (decimated by `record_every`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimRecord {
    /// Time points (seconds)
    pub t: Vec<f64>,
    /// Crank angle (degrees)
    pub crank_angle: Vec<f64>,
    pub cycle: Vec<u64>,
    /// Controller outputs per sample, by construction order
    pub outputs: Vec<Vec<f64>>,
    pub degraded: Vec<Vec<bool>>,
    /// Phaser positions per sample (degrees)
    pub phaser_positions: Vec<Vec<f64>>,
}

impl SimRecord {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Output series of one controller slot.
    pub fn controller_series(&self, slot: usize) -> Vec<f64> {
        self.outputs.iter().filter_map(|row| row.get(slot).copied()).collect()
    }
}

/// Everything a simulation is built from.
#[derive(Debug)]
pub struct SimSetup {
    pub options: SimOptions,
    pub engine: EngineModel,
    pub control: ControlSystem,
    pub actuators: ActuatorBank,
}

/// What a finished run produced.
#[derive(Clone, Debug, PartialEq)]
pub struct SimOutcome {
    pub record: SimRecord,
    pub instant: ReportStream,
    pub averaged: ReportStream,
    pub steps: u64,
    pub cycles: u64,
    pub final_time: f64,
    /// Mean output of every controller over all ticks.
    pub mean_outputs: Vec<f64>,
    /// The loop ended on the `max_steps` safety limit.
    pub hit_step_limit: bool,
}

/// Fixed-step simulation driving a control system.
#[derive(Debug)]
pub struct Simulation<F: FlowModel = DetachedFlow> {
    options: SimOptions,
    engine: Engine,
    control: ControlSystem,
    actuators: ActuatorBank,
    flow: F,
    aggregator: ResultAggregator,
    phase: SimPhase,
    steps: u64,
    steps_in_interval: u64,
    reset_pending: bool,
    hit_step_limit: bool,
    record: SimRecord,
    output_means: Vec<RunningMean>,
}

impl<F: FlowModel> Simulation<F> {
    pub fn new(setup: SimSetup, flow: F) -> SimResult<Self> {
        setup.options.validate()?;
        let sweep = setup.engine.degrees_per_step(setup.options.dt);
        if !(sweep.is_finite() && sweep <= DEG_PER_CYCLE) {
            return Err(SimError::NonPhysical {
                what: "one step would sweep more than an engine cycle",
            });
        }
        setup.actuators.validate_against(&setup.control.controllers)?;
        let output_means = vec![RunningMean::new(); setup.control.controllers.len()];
        Ok(Self {
            options: setup.options,
            engine: Engine::new(setup.engine),
            control: setup.control,
            actuators: setup.actuators,
            flow,
            aggregator: ResultAggregator::new(),
            phase: SimPhase::Initializing,
            steps: 0,
            steps_in_interval: 0,
            reset_pending: false,
            hit_step_limit: false,
            record: SimRecord::default(),
            output_means,
        })
    }

    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn control(&self) -> &ControlSystem {
        &self.control
    }

    pub fn actuators(&self) -> &ActuatorBank {
        &self.actuators
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    pub fn record(&self) -> &SimRecord {
        &self.record
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Write report headers and open the first averaging interval.
    pub fn initialize(&mut self) -> SimResult<()> {
        if self.phase != SimPhase::Initializing {
            return Err(SimError::InvalidArg {
                what: "simulation already initialized",
            });
        }
        let time = self.engine.time();
        self.control.sensors.update_all(time, &self.engine);
        self.aggregator.write_headers(&self.control.controllers)?;
        self.aggregator.begin_interval(&mut self.control.controllers);
        self.phase = SimPhase::Stepping;
        info!(
            controllers = self.control.controllers.len(),
            actuators = self.actuators.len(),
            dt = self.options.dt,
            "simulation initialized"
        );
        Ok(())
    }

    /// Step size for the next tick.
    fn determine_step(&self) -> f64 {
        self.options.dt
    }

    /// Run one tick. Initializes on first use; a no-op once ended.
    pub fn step(&mut self) -> SimResult<SimPhase> {
        match self.phase {
            SimPhase::Initializing => self.initialize()?,
            SimPhase::Ended => return Ok(SimPhase::Ended),
            SimPhase::Stepping => {}
        }

        let dt = self.determine_step();
        if self.reset_pending {
            self.aggregator.begin_interval(&mut self.control.controllers);
            self.reset_pending = false;
        }

        // engine, sensors, controllers, actuation
        let completed_cycles = self.engine.advance(dt);
        let time = self.engine.time();
        self.control.tick(time, &self.engine);
        let outputs = self.control.controllers.outputs();
        self.actuators.step_all(dt, outputs);

        // flow
        let actuation = Actuation {
            crank_angle: self.engine.crank_angle(),
            controller_outputs: outputs,
            phaser_positions: self.actuators.positions(),
        };
        self.flow.advance(time, dt, &actuation)?;

        self.steps += 1;
        self.manage_output(time, completed_cycles)?;

        if self.end_reached(time) {
            self.phase = SimPhase::Ended;
            info!(steps = self.steps, cycles = self.engine.cycle(), time, "simulation ended");
        } else if self.steps >= self.options.max_steps as u64 {
            self.phase = SimPhase::Ended;
            self.hit_step_limit = true;
            warn!(
                max_steps = self.options.max_steps,
                time, "simulation stopped at step limit before the end condition"
            );
        }
        Ok(self.phase)
    }

    fn manage_output(&mut self, time: f64, completed_cycles: u64) -> SimResult<()> {
        let controllers = &mut self.control.controllers;
        for (mean, output) in self.output_means.iter_mut().zip(controllers.outputs()) {
            mean.add(*output);
        }
        self.aggregator.accumulate(controllers);
        self.aggregator.record_instant(time, controllers)?;

        self.steps_in_interval += 1;
        let boundary = match self.options.interval {
            AveragingInterval::EngineCycle => completed_cycles > 0,
            AveragingInterval::Steps(n) => self.steps_in_interval >= n,
        };
        if boundary {
            self.aggregator.close_interval(time, controllers)?;
            self.steps_in_interval = 0;
            self.reset_pending = true;
        }

        if (self.steps as usize) % self.options.record_every == 0 {
            self.record.t.push(time);
            self.record.crank_angle.push(self.engine.crank_angle());
            self.record.cycle.push(self.engine.cycle());
            self.record.outputs.push(controllers.outputs().to_vec());
            self.record.degraded.push(controllers.degraded().to_vec());
            self.record.phaser_positions.push(self.actuators.positions().to_vec());
        }
        Ok(())
    }

    fn end_reached(&self, time: f64) -> bool {
        match self.options.end {
            EndCondition::Time(t_end) => time >= t_end - 0.5 * self.options.dt,
            EndCondition::Cycles(n) => self.engine.cycle() >= n,
            EndCondition::Steps(n) => self.steps >= n,
        }
    }

    /// Run ticks until the end predicate holds (at least one tick).
    pub fn run(mut self) -> SimResult<SimOutcome> {
        loop {
            if self.step()? == SimPhase::Ended {
                break;
            }
        }
        Ok(self.finish())
    }

    fn finish(self) -> SimOutcome {
        let (instant, averaged) = self.aggregator.into_streams();
        SimOutcome {
            record: self.record,
            instant,
            averaged,
            steps: self.steps,
            cycles: self.engine.cycle(),
            final_time: self.engine.time(),
            mean_outputs: self
                .output_means
                .iter()
                .map(|m| m.mean().unwrap_or(0.0))
                .collect(),
            hit_step_limit: self.hit_step_limit,
        }
    }
}

/// Build and run a simulation with a [`DetachedFlow`].
pub fn run_sim(setup: SimSetup) -> SimResult<SimOutcome> {
    Simulation::new(setup, DetachedFlow::default())?.run()
}
