use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "songlang")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Graph-based scripting language interpreter", long_about = None)]
pub struct Args {
    /// Script file to run; omit to start the interactive shell
    #[arg(value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Inline source to run instead of a script file
    #[arg(short = 'e', long = "eval", value_name = "SOURCE", conflicts_with = "script")]
    pub eval: Option<String>,

    /// Print the graph snapshot as JSON after a successful run
    #[arg(long = "snapshot")]
    pub snapshot: bool,

    /// Seed for CHANCE and RANDOM, for reproducible runs
    #[arg(long = "seed", value_name = "N")]
    pub seed: Option<u64>,

    #[arg(long = "color", value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Complete {
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "Invalid color choice: {}. Must be 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Args::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, &bin_name, &mut io::stdout());
}
