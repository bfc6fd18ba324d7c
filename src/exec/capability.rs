//! One-time tool availability probe
//!
//! Adapters hold the probe result and fail fast with
//! [`Error::ToolUnavailable`] instead of re-checking on every call.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// Whether an external tool can be invoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Capability {
    Available { tool: String, path: PathBuf },
    Unavailable { tool: String, reason: String },
}

impl Capability {
    /// Resolve `program` once
    ///
    /// Programs containing a path separator must exist on disk; bare names
    /// are looked up in PATH.
    pub fn probe(tool: &str, program: &str) -> Self {
        let looks_like_path = program.contains('/') || program.contains('\\');

        if looks_like_path {
            let path = Path::new(program);
            if path.is_file() {
                return Self::Available {
                    tool: tool.to_string(),
                    path: path.to_path_buf(),
                };
            }
            return Self::Unavailable {
                tool: tool.to_string(),
                reason: format!("'{}' does not exist", program),
            };
        }

        match which::which(program) {
            Ok(path) => Self::Available {
                tool: tool.to_string(),
                path,
            },
            Err(_) => Self::Unavailable {
                tool: tool.to_string(),
                reason: format!("'{}' not found in PATH", program),
            },
        }
    }

    pub fn tool(&self) -> &str {
        match self {
            Self::Available { tool, .. } | Self::Unavailable { tool, .. } => tool,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    /// Resolved program path, or the unavailability error
    pub fn program(&self) -> Result<&Path> {
        match self {
            Self::Available { path, .. } => Ok(path),
            Self::Unavailable { tool, reason } => Err(Error::tool_unavailable(tool, reason)),
        }
    }
}
