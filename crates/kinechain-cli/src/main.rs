//! kinechain - replay orientation-sensor recordings through a kinematic chain
//!
//! Loads per-joint quaternion logs, reconstructs the skeleton pose frame by
//! frame, and exports joint angles relative to the starting pose.

mod cli;
mod logs;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use kinechain_core::skeleton::presets;
use kinechain_core::{ComponentOrder, Engine, EngineConfig, HistoryBuffer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, Preset};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            input_dir,
            config,
            order,
            output,
            derived_output,
        } => run_replay(&input_dir, config.as_deref(), order, &output, derived_output),
        Commands::Topology { config } => run_topology(config.as_deref()),
        Commands::Preset { name, output } => run_preset(name, output),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => {
            info!("No config given, using the upper-limb preset");
            Ok(presets::upper_limb())
        }
    }
}

fn run_replay(
    input_dir: &Path,
    config: Option<&Path>,
    order: Option<ComponentOrder>,
    output: &Path,
    derived_output: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(order) = order {
        config = config.with_component_order(order);
    }

    let streams = logs::load_recording(input_dir, config.component_order)?;
    let engine = Engine::new(config, streams).context("failed to build engine")?;

    for failure in engine.calibration_failures() {
        warn!(joint = %failure.joint, "No angles for joint: {}", failure.error);
    }

    let mut history = HistoryBuffer::new();
    for frame in engine.frames() {
        history.append(&frame);
    }
    info!(frames = history.len(), "Replay complete");

    let file = File::create(output).with_context(|| format!("cannot create {}", output.display()))?;
    history
        .write_csv(BufWriter::new(file))
        .with_context(|| format!("cannot write {}", output.display()))?;
    info!(path = %output.display(), "Saved movement angles");

    let probes: Vec<&str> = engine.config().probes.iter().map(|p| p.name.as_str()).collect();
    if let Some(path) = derived_output {
        let file = File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
        history
            .write_derived_csv(BufWriter::new(file), &probes)
            .with_context(|| format!("cannot write {}", path.display()))?;
        info!(path = %path.display(), "Saved probe angles");
    }

    print_probe_summary(&history, &probes, &mut io::stdout().lock())?;
    Ok(())
}

/// Min / mean / max of every probe over the replay
fn print_probe_summary(history: &HistoryBuffer, probes: &[&str], out: &mut impl Write) -> Result<()> {
    if probes.is_empty() {
        return Ok(());
    }
    writeln!(out, "{:<12} {:>8} {:>8} {:>8} {:>8}", "probe", "frames", "min", "mean", "max")?;
    for name in probes {
        let values: Vec<f64> = history
            .derived_series(name)
            .into_iter()
            .filter_map(|(_, v)| v)
            .collect();
        if values.is_empty() {
            writeln!(out, "{:<12} {:>8}", name, 0)?;
            continue;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        writeln!(
            out,
            "{:<12} {:>8} {:>8.2} {:>8.2} {:>8.2}",
            name,
            values.len(),
            min,
            mean,
            max
        )?;
    }
    Ok(())
}

fn run_topology(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let topology = config.build_topology().context("invalid topology")?;
    print!("{topology}");
    for probe in &config.probes {
        println!(
            "probe {}: {}->{} vs {}->{}",
            probe.name, probe.first.from, probe.first.to, probe.second.from, probe.second.to
        );
    }
    Ok(())
}

fn run_preset(name: Preset, output: Option<PathBuf>) -> Result<()> {
    let config = match name {
        Preset::UpperLimb => presets::upper_limb(),
    };
    let json = config.to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(&path, json + "\n")
                .with_context(|| format!("cannot write {}", path.display()))?;
            info!(path = %path.display(), "Wrote preset");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinechain_core::{JointStream, Quaternion, StreamSet};

    fn still_arm(frames: usize) -> Engine {
        let config = presets::upper_limb();
        let streams: StreamSet = config
            .topology
            .iter()
            .map(|spec| {
                let mut s = JointStream::new(spec.id.clone());
                for i in 0..frames {
                    s.push(i as f64, Quaternion::identity()).unwrap();
                }
                s
            })
            .collect();
        Engine::new(config, streams).unwrap()
    }

    #[test]
    fn test_probe_summary() {
        let engine = still_arm(2);
        let mut history = HistoryBuffer::new();
        for frame in engine.frames() {
            history.append(&frame);
        }

        let mut out = Vec::new();
        print_probe_summary(&history, &["shoulder", "elbow", "wrist"], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("shoulder"));
        assert!(lines[2].contains("180.00"));
        assert!(lines[3].starts_with("wrist"));
    }

    #[test]
    fn test_probe_summary_skips_missing_values() {
        let engine = still_arm(1);
        let mut history = HistoryBuffer::new();
        // past the end of every stream: no positions, no probe values
        history.append(&engine.frame(3));

        let mut out = Vec::new();
        print_probe_summary(&history, &["elbow"], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let row: Vec<&str> = text.lines().nth(1).unwrap().split_whitespace().collect();
        assert_eq!(row, ["elbow", "0"]);
    }
}
