use std::path::PathBuf;

use thiserror::Error;

pub const LOAD_EXIT_CODE: i32 = 1;
/// Exit code for a `--run` path that names nothing, or a bad flag combination.
pub const USAGE_EXIT_CODE: i32 = 2;
pub const EXECUTION_EXIT_CODE: i32 = 3;
/// Exit code for `--test-config` when paths or executables are missing.
pub const VALIDATION_EXIT_CODE: i32 = 4;

/// Fatal errors raised while loading a config. Load is all-or-nothing.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", .path.to_string_lossy())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config json: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("invalid config: {0}")]
    Schema(String),
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("unknown template variable '{{{0}}}'")]
    UnknownVariable(String),
    #[error("unbalanced quote in arguments: {0}")]
    UnbalancedQuote(String),
    #[error("action needs a path but command '{0}' has none")]
    MissingPath(String),
    #[error("action '{0}' has no executable")]
    MissingExecutable(String),
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' exited with {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "a signal".to_string()))]
    NonZeroExit { command: String, code: Option<i32> },
}
