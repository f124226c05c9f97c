// config.rs — Compilation options.
//
// Options that parameterize the generated boilerplate. Loadable from a JSON
// file (`--config`); missing fields take their defaults and CLI flags
// override file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_RUNTIME_DIR: &str = "/usr/local/share/jam/lib/jserver";
pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_STACK_SIZE: u32 = 50000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    /// Directory holding the managed-tier runtime modules (`jamlib`, `jnode`, ...).
    pub runtime_dir: String,
    /// MQTT broker port passed to `jam_init`.
    pub port: u16,
    /// Stack size of the embedded event-loop and application tasks.
    pub stack_size: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            runtime_dir: DEFAULT_RUNTIME_DIR.to_string(),
            port: DEFAULT_PORT,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CompileOptions {
    pub fn from_json(text: &str) -> serde_json::Result<CompileOptions> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<CompileOptions, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Path of a runtime module, as written into `require(...)`.
    pub fn runtime_module(&self, module: &str) -> String {
        format!("{}/{}", self.runtime_dir.trim_end_matches('/'), module)
    }
}
