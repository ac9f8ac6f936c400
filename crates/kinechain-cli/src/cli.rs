//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use kinechain_core::ComponentOrder;

/// Replay orientation-sensor recordings through a kinematic chain
#[derive(Parser, Debug)]
#[command(name = "kinechain")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Built-in skeletons
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Six-sensor arm: torso to hand
    UpperLimb,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate every frame of a recording and export joint angles
    Replay {
        /// Recording directory with `<joint>_..quaternion...csv` logs
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Engine config (JSON); defaults to the upper-limb preset
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the config's quaternion component order
        #[arg(long)]
        order: Option<ComponentOrder>,

        /// Movement-angle CSV
        #[arg(short, long, default_value = "movement_angles.csv")]
        output: PathBuf,

        /// Probe-value CSV (skipped when not given)
        #[arg(long)]
        derived_output: Option<PathBuf>,
    },

    /// Print the joint tree of a config
    Topology {
        /// Engine config (JSON); defaults to the upper-limb preset
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print a built-in config as JSON
    Preset {
        #[arg(value_enum, default_value = "upper-limb")]
        name: Preset,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replay() {
        let cli = Cli::parse_from([
            "kinechain", "replay", "-i", "rec", "--order", "xyzw", "-o", "out.csv",
        ]);
        match cli.command {
            Commands::Replay {
                input_dir,
                order,
                output,
                config,
                derived_output,
            } => {
                assert_eq!(input_dir, PathBuf::from("rec"));
                assert_eq!(order, Some(ComponentOrder::ScalarLast));
                assert_eq!(output, PathBuf::from("out.csv"));
                assert!(config.is_none());
                assert!(derived_output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_preset_default() {
        let cli = Cli::parse_from(["kinechain", "preset"]);
        assert!(matches!(
            cli.command,
            Commands::Preset {
                name: Preset::UpperLimb,
                output: None
            }
        ));
    }
}
