use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(version, about = "Run repository actions from a JSON command board.", long_about = None)]
pub struct Cli {
    /// Path to the config JSON file
    pub config: Option<PathBuf>,
    /// List all commands and exit
    #[arg(short, long, conflicts_with = "run")]
    pub list: bool,
    /// Run a command path: group/[subgroup/]command[/action]
    #[arg(short, long, value_name = "PATH")]
    pub run: Option<String>,
    /// Show the command string without executing
    #[arg(short, long, requires = "run")]
    pub dry_run: bool,
    /// Close after the first successful action (overrides the config)
    #[arg(short = 'c', long, visible_alias = "one-shot")]
    pub auto_close: bool,
    /// Validate paths and executables, then exit with 0 or 4
    #[arg(short, long, conflicts_with_all = ["list", "run"])]
    pub test_config: bool,
}
