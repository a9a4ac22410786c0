//! Run configuration
//!
//! Options can be set explicitly through [`RunBuilder`](crate::RunBuilder) or
//! picked up from the environment:
//!
//! - `FAKE_TB_NAME` - name reported by `Tb::name`
//! - `FAKE_TB_STACK_DEPTH` - initial capacity of stack captures
//! - `FAKE_TB_TEMP_ROOT` - directory under which `Tb::temp_dir` creates directories

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Result;
use crate::stack::DEFAULT_DEPTH;

pub const DEFAULT_NAME: &str = "fake-tb";

const ENV_PREFIX: &str = "FAKE_TB";

/// Options for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Test name
    pub name: String,

    /// Initial number of frame slots per stack capture (grown on truncation)
    pub stack_depth: usize,

    /// Parent directory for `temp_dir` (system temp dir if unset)
    pub temp_root: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            stack_depth: DEFAULT_DEPTH,
            temp_root: None,
        }
    }
}

impl RunOptions {
    /// Load options from `FAKE_TB_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let options = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize::<RunOptions>()?;

        Ok(options)
    }
}
