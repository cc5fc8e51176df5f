use clap::{Parser, Subcommand};
use cs_controls::{ConfigStream, Cursor};
use cs_host::{HostResult, Overrides, SimulationRequest, SweepRequest, run_request, run_sweep};
use cs_sim::{EndCondition, SimSetup};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cs-cli")]
#[command(about = "cyclesim CLI - engine-cycle controller simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and bind a configuration without running it
    Check {
        /// Path to the configuration stream
        config_path: PathBuf,
    },
    /// Run a simulation
    Run {
        /// Path to the configuration stream
        config_path: PathBuf,
        /// Engine speed override (rpm)
        #[arg(long)]
        speed: Option<f64>,
        /// Throttle override (%)
        #[arg(long)]
        throttle: Option<f64>,
        /// Run for this many engine cycles instead of the configured end
        #[arg(long)]
        cycles: Option<u64>,
        /// Keep every n-th sample in the recorded series
        #[arg(long)]
        record_every: Option<usize>,
        /// Print the full JSON response instead of a summary
        #[arg(long)]
        json: bool,
        /// Write the instantaneous report as tab-separated text
        #[arg(long)]
        instant: Option<PathBuf>,
        /// Write the averaged report as tab-separated text
        #[arg(long)]
        averaged: Option<PathBuf>,
    },
    /// Run once per engine speed over an inclusive rpm range
    Sweep {
        /// Path to the configuration stream
        config_path: PathBuf,
        /// Lowest engine speed (rpm)
        #[arg(long)]
        rpm_min: f64,
        /// Highest engine speed (rpm)
        #[arg(long)]
        rpm_max: f64,
        /// Speed increment (rpm)
        #[arg(long, default_value_t = 200.0)]
        rpm_step: f64,
        /// Throttle override (%)
        #[arg(long)]
        throttle: Option<f64>,
        /// Run each point for this many engine cycles
        #[arg(long)]
        cycles: Option<u64>,
        /// Print the full JSON response instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> HostResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config_path } => cmd_check(&config_path),
        Commands::Run {
            config_path,
            speed,
            throttle,
            cycles,
            record_every,
            json,
            instant,
            averaged,
        } => {
            let overrides = Overrides {
                engine_speed_rpm: speed,
                throttle_pct: throttle,
                cycles,
                record_every,
            };
            cmd_run(
                &config_path,
                overrides,
                json,
                instant.as_deref(),
                averaged.as_deref(),
            )
        }
        Commands::Sweep {
            config_path,
            rpm_min,
            rpm_max,
            rpm_step,
            throttle,
            cycles,
            json,
        } => {
            let request = SweepRequest {
                config: fs::read_to_string(&config_path)?,
                overrides: Overrides {
                    throttle_pct: throttle,
                    cycles,
                    ..Overrides::default()
                },
                rpm_min,
                rpm_max,
                rpm_step,
            };
            cmd_sweep(&request, json)
        }
    }
}

fn cmd_check(config_path: &Path) -> HostResult<()> {
    println!("Checking configuration: {}", config_path.display());
    let stream = ConfigStream::new(fs::read_to_string(config_path)?);
    let mut cursor = Cursor::START;
    let setup = SimSetup::load(&stream, &mut cursor)?;

    let end = match setup.options.end {
        EndCondition::Time(t) => format!("{t} s"),
        EndCondition::Cycles(n) => format!("{n} cycles"),
        EndCondition::Steps(n) => format!("{n} steps"),
    };
    println!(
        "  step {} s, end after {}, engine {} rpm at {} % throttle",
        setup.options.dt,
        end,
        setup.engine.speed_rpm(),
        setup.engine.throttle_pct()
    );
    println!("  {} sensors", setup.control.sensors.len());
    println!("  {} controllers:", setup.control.controllers.len());
    for block in &setup.control.blocks {
        println!(
            "    {} {} (line {}, bytes {}..{})",
            block.kind.keyword(),
            block.id,
            stream.line_of(block.span.start),
            block.span.start,
            block.span.end
        );
    }
    println!("  {} actuators", setup.actuators.len());
    println!("✓ Configuration is valid");
    Ok(())
}

fn cmd_run(
    config_path: &Path,
    overrides: Overrides,
    json: bool,
    instant_path: Option<&Path>,
    averaged_path: Option<&Path>,
) -> HostResult<()> {
    debug!(config = %config_path.display(), "reading configuration");
    let request = SimulationRequest {
        config: fs::read_to_string(config_path)?,
        overrides,
    };
    let response = run_request(&request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.message);
        if let Some(run_id) = &response.run_id {
            println!("  run id: {run_id}");
        }
        if let Some(performance) = &response.performance {
            println!(
                "  final time {:.6} s, wall time {:.3} s",
                performance.final_time_s, performance.elapsed_s
            );
            for (slot, mean) in performance.mean_outputs.iter().enumerate() {
                println!("  controller {}: mean output {:.6}", slot + 1, mean);
            }
        }
    }

    if let Some(output) = &response.output {
        if let Some(path) = instant_path {
            output.instantaneous.write_tsv(BufWriter::new(File::create(path)?))?;
            println!("Wrote instantaneous report to {}", path.display());
        }
        if let Some(path) = averaged_path {
            output.averaged.write_tsv(BufWriter::new(File::create(path)?))?;
            println!("Wrote averaged report to {}", path.display());
        }
    }
    Ok(())
}

fn cmd_sweep(request: &SweepRequest, json: bool) -> HostResult<()> {
    let response = run_sweep(request)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.message);
    for point in &response.points {
        match &point.performance {
            Some(performance) => {
                let means: Vec<String> = performance
                    .mean_outputs
                    .iter()
                    .map(|m| format!("{m:.6}"))
                    .collect();
                println!(
                    "  {:>8.1} rpm  {:>6} steps  {}",
                    point.engine_speed_rpm,
                    performance.steps,
                    means.join("  ")
                );
            }
            None => println!("  {:>8.1} rpm  {}", point.engine_speed_rpm, point.message),
        }
    }
    Ok(())
}
