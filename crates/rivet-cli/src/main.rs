//! `rivet` – runs the robot's control loop.
//!
//! 1. Loads `~/.rivet/config.toml` (or `--config`); flags override it.
//! 2. Wires every mechanism to the backends for the selected mode, installs
//!    its tunable registry process-wide and stages any `--set` overrides.
//! 3. Ticks at the configured period on a current-thread tokio runtime,
//!    printing safety alerts as they happen.
//! 4. On Ctrl-C or after `--ticks`, cancels every action and commands zero
//!    volts before exiting.

mod config;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use colored::Colorize;
use rivet_kernel::tunable;
use rivet_middleware::{Topic, TopicReceiver};
use rivet_runtime::{Robot, init_tracing};
use rivet_types::{EventPayload, ExecutionMode};
use tracing::{error, info, warn};

/// Competition robot control loop.
#[derive(Parser, Debug)]
#[command(name = "rivet")]
#[command(version)]
#[command(about = "Fixed-rate mechanism control loop")]
struct Args {
    /// Backend family: live, simulated or replay.
    #[arg(long)]
    mode: Option<ExecutionMode>,

    /// Config file (default ~/.rivet/config.toml).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory of <Mechanism>.jsonl logs for replay mode.
    #[arg(long, value_name = "DIR")]
    replay_log: Option<PathBuf>,

    /// Stop after this many ticks.
    #[arg(long)]
    ticks: Option<u64>,

    /// Named action to schedule on the first tick (e.g. ShootNote, RunPath:Amp).
    #[arg(long, value_name = "ACTION")]
    auto: Option<String>,

    /// Period in milliseconds; overrides the config file.
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// Override a tunable for this run, e.g. `Shooter/Flywheel/kP=0.0008`.
    /// Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
    overrides: Vec<(String, f64)>,
}

fn parse_override(raw: &str) -> Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("empty tunable key".to_string());
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("bad value for {key}: {e}"))?;
    if !value.is_finite() {
        return Err(format!("value for {key} must be finite"));
    }
    Ok((key.to_string(), value))
}

/// Stage `overrides` on the process-wide registry.  They become live when
/// the first tick commits.  Returns how many were staged.
fn stage_overrides(overrides: &[(String, f64)]) -> usize {
    let Some(registry) = tunable::global() else {
        warn!(count = overrides.len(), "no tunable registry installed; overrides ignored");
        return 0;
    };
    for (key, value) in overrides {
        registry.set(key, *value);
        info!(key = %key, value, "tunable override staged");
    }
    overrides.len()
}

fn main() {
    let args = Args::parse();
    let _guard = init_tracing("rivet");

    print_banner();

    if let Err(e) = run(args) {
        error!(error = %e, "fatal");
        println!("{}: {e}", "Error".red().bold());
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let path = args.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = config::load(&path)?;
    if path.exists() {
        println!("  Config loaded from {}", path.display().to_string().bold());
    }
    if let Some(mode) = args.mode {
        cfg.mode = mode;
    }
    if let Some(ms) = args.tick_ms {
        cfg.tick_period_ms = ms;
    }
    if args.replay_log.is_some() {
        cfg.replay_log = args.replay_log.clone();
    }

    let robot_cfg = cfg.into_robot_config()?;
    let mut robot = Robot::new(robot_cfg)?;
    if tunable::install_global(Arc::clone(robot.registry())).is_err() {
        warn!("tunable registry already installed");
    }
    let staged = stage_overrides(&args.overrides);
    if staged > 0 {
        println!("  Staged {} tunable override(s)", staged.to_string().bold());
    }

    println!(
        "  Mode {} · period {} ms · {} named actions",
        robot.mode().to_string().bold().cyan(),
        robot.period().as_millis(),
        robot.actions().names().len()
    );

    if let Some(name) = &args.auto {
        robot.schedule_named(name)?;
        println!("  Scheduled {}", name.bold());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – disabling outputs …".yellow().bold());
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(control_loop(&mut robot, &shutdown, args.ticks));

    robot.disable();
    println!(
        "{}",
        format!("  ✓ Outputs zeroed after {} ticks.", robot.tick_count()).green()
    );
    Ok(())
}

async fn control_loop(robot: &mut Robot, shutdown: &AtomicBool, limit: Option<u64>) {
    let mut alerts = robot.bus().subscribe_to(Topic::SystemAlerts);
    let mut interval = tokio::time::interval(robot.period());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!(period_ms = robot.period().as_millis() as u64, "control loop running");

    loop {
        interval.tick().await;
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        robot.tick();
        print_alerts(&mut alerts);
        if limit.is_some_and(|n| robot.tick_count() >= n) {
            break;
        }
    }
}

fn print_alerts(alerts: &mut TopicReceiver) {
    for event in alerts.drain() {
        match event.payload {
            EventPayload::Interlock {
                mechanism,
                channel,
                current_amps,
                engaged: true,
            } => println!(
                "  {} {mechanism}/{channel} at {current_amps:.1} A",
                "INTERLOCK".red().bold()
            ),
            EventPayload::Interlock {
                mechanism, channel, ..
            } => println!("  {} {mechanism}/{channel}", "released".green()),
            EventPayload::HardwareFault {
                component,
                code,
                message,
            } => println!("  {} [{code}] {component}: {message}", "FAULT".yellow().bold()),
            _ => {}
        }
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___  _____   ______________"#.bold().cyan());
    println!("{}", r#"  / _ \/  _/ | / / __/_  __/"#.bold().cyan());
    println!("{}", r#" / , _// / | |/ / _/  / /   "#.bold().cyan());
    println!("{}", r#"/_/|_/___/ |___/___/ /_/    "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Rivet".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let args = Args::try_parse_from([
            "rivet",
            "--mode",
            "replay",
            "--replay-log",
            "/tmp/match",
            "--ticks",
            "50",
            "--auto",
            "RunPath:Amp",
        ])
        .expect("parse");
        assert_eq!(args.mode, Some(ExecutionMode::Replay));
        assert_eq!(args.replay_log, Some(PathBuf::from("/tmp/match")));
        assert_eq!(args.ticks, Some(50));
        assert_eq!(args.auto.as_deref(), Some("RunPath:Amp"));
    }

    #[test]
    fn set_flag_parses_key_value_pairs() {
        let args = Args::try_parse_from([
            "rivet",
            "--set",
            "Shooter/Flywheel/kP=0.0008",
            "--set",
            "Pivot/Arm/kG = 0.3",
        ])
        .expect("parse");
        assert_eq!(
            args.overrides,
            vec![
                ("Shooter/Flywheel/kP".to_string(), 0.0008),
                ("Pivot/Arm/kG".to_string(), 0.3),
            ]
        );
    }

    #[test]
    fn malformed_overrides_are_rejected() {
        assert!(parse_override("Shooter/Flywheel/kP").is_err());
        assert!(parse_override("=1.0").is_err());
        assert!(parse_override("Shooter/Flywheel/kP=fast").is_err());
        assert!(parse_override("Shooter/Flywheel/kP=NaN").is_err());
    }

    #[test]
    fn overrides_reach_the_installed_registry() {
        let robot = Robot::new(rivet_runtime::RobotConfig::default()).expect("robot");
        let _ = tunable::install_global(Arc::clone(robot.registry()));
        let registry = tunable::global().expect("installed");

        let staged = stage_overrides(&[("Intake/Roller/kV".to_string(), 0.0042)]);
        assert_eq!(staged, 1);
        registry.begin_tick();
        assert_eq!(registry.get("Intake/Roller/kV"), 0.0042);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Args::try_parse_from(["rivet", "--mode", "teleport"]).is_err());
    }

    #[test]
    fn loop_stops_at_tick_limit() {
        let mut robot = Robot::new(rivet_runtime::RobotConfig {
            period: std::time::Duration::from_millis(1),
            ..Default::default()
        })
        .expect("robot");
        let shutdown = AtomicBool::new(false);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        runtime.block_on(control_loop(&mut robot, &shutdown, Some(5)));
        assert_eq!(robot.tick_count(), 5);
    }

    #[test]
    fn shutdown_flag_stops_before_ticking() {
        let mut robot = Robot::new(rivet_runtime::RobotConfig::default()).expect("robot");
        let shutdown = AtomicBool::new(true);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        runtime.block_on(control_loop(&mut robot, &shutdown, None));
        assert_eq!(robot.tick_count(), 0);
    }
}
