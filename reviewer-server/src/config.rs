use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// File name of the SQLite database inside `state_dir`.
pub const DATABASE_FILE_NAME: &str = "reviewer-state.db";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    /// Fixed seed for reviewer selection. When unset, selection uses entropy.
    /// Setting it makes assignment reproducible across restarts.
    pub assignment_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let assignment_seed = parse_seed(env::var("ASSIGNMENT_SEED").ok())?;

        Ok(Config {
            port,
            state_dir,
            assignment_seed,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join(DATABASE_FILE_NAME)
    }
}

/// Parse ASSIGNMENT_SEED from an optional string value.
///
/// Missing, empty or whitespace-only values mean "no seed". Anything else
/// must be a valid u64.
pub fn parse_seed(value: Option<String>) -> Result<Option<u64>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("ASSIGNMENT_SEED must be a valid u64, got '{}'", raw)),
    }
}
