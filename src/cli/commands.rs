//! CLI command definitions using clap.
//!
//! - run: full survey/plan/execute/validate against a drawing snapshot
//! - exec: dispatch a plan document without a model
//! - prepare: explode-until-stable geometry preparation only
//! - mapping: learn or show vendor layer mappings

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Floorproof - model-driven proofing of exhibition-floor drawings
#[derive(Parser, Debug)]
#[command(name = "floorproof")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Drawing snapshot to operate on
#[derive(Args, Debug, Clone)]
pub struct DrawingArgs {
    /// Drawing snapshot (JSON)
    #[arg(short, long)]
    pub drawing: PathBuf,

    /// Write the mutated drawing back to the snapshot file
    #[arg(short, long)]
    pub save: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Proof a drawing against an objective
    Run {
        /// What the run should achieve, e.g. "proof this drawing"
        objective: String,

        #[command(flatten)]
        drawing: DrawingArgs,
    },

    /// Execute a plan document without consulting a model
    Exec {
        /// Plan document ({"tool_calls": [...]})
        #[arg(short, long)]
        plan: PathBuf,

        #[command(flatten)]
        drawing: DrawingArgs,
    },

    /// Explode compound entities until only whitelisted types remain
    Prepare {
        #[command(flatten)]
        drawing: DrawingArgs,
    },

    /// Vendor layer mappings
    Mapping {
        #[command(subcommand)]
        command: MappingCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum MappingCommands {
    /// Remember that a vendor layer belongs on a standard layer
    Learn {
        /// Vendor layer name
        source: String,

        /// Standard layer name
        target: String,
    },

    /// Print every known mapping
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_run() {
        let cli = Cli::try_parse_from(["floorproof", "run", "proof this drawing", "-d", "hall.json"]).unwrap();
        match cli.command {
            Commands::Run { objective, drawing } => {
                assert_eq!(objective, "proof this drawing");
                assert_eq!(drawing.drawing, PathBuf::from("hall.json"));
                assert!(!drawing.save);
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_cli_exec_with_save() {
        let cli = Cli::try_parse_from(["floorproof", "exec", "--plan", "p.json", "--drawing", "d.json", "--save"])
            .unwrap();
        match cli.command {
            Commands::Exec { plan, drawing } => {
                assert_eq!(plan, PathBuf::from("p.json"));
                assert!(drawing.save);
            }
            _ => panic!("Expected exec command"),
        }
    }

    #[test]
    fn test_cli_drawing_required() {
        assert!(Cli::try_parse_from(["floorproof", "prepare"]).is_err());
    }

    #[test]
    fn test_cli_mapping_learn() {
        let cli = Cli::try_parse_from(["floorproof", "-v", "mapping", "learn", "outlines", "Expo_BoothOutline"]).unwrap();
        assert!(cli.is_verbose());
        match cli.command {
            Commands::Mapping {
                command: MappingCommands::Learn { source, target },
            } => {
                assert_eq!(source, "outlines");
                assert_eq!(target, "Expo_BoothOutline");
            }
            _ => panic!("Expected mapping learn command"),
        }
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["floorproof", "mapping", "show", "-c", "/etc/floorproof.yml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/floorproof.yml")));
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
