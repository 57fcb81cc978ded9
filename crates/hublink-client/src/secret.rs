//! Password references.
//!
//! The `password` of the `[credentials]` section may point at a secret kept
//! outside the config file:
//!
//! - `env::HUBLINK_PASSWORD` reads the environment variable
//! - `pass::hublink/alice` runs `pass show hublink/alice` and keeps the first line
//! - any other value is the password itself

use std::process::Command;

use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Resolves a possibly-referenced secret.
pub fn resolve(value: &str) -> ClientResult<String> {
    if let Some(var) = value.strip_prefix("env::") {
        debug!(var, "reading secret from environment");
        return std::env::var(var)
            .map_err(|_| ClientError::secret(format!("environment variable `{var}` is not set")));
    }

    if let Some(entry) = value.strip_prefix("pass::") {
        debug!(entry, "reading secret from password store");
        return from_password_store(entry);
    }

    Ok(value.to_string())
}

fn from_password_store(entry: &str) -> ClientResult<String> {
    let output = Command::new("pass")
        .args(["show", entry])
        .output()
        .map_err(|e| ClientError::secret(format!("cannot run `pass show {entry}`: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ClientError::secret(format!(
            "`pass show {entry}` exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| ClientError::secret(format!("`pass show {entry}` printed nothing")))
}
