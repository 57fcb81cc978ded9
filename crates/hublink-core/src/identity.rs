//! Client identities.
//!
//! An identity has the form `user@domain/resource`, where the resource is
//! optional. The bare form (`user@domain`) is what the server knows a
//! publisher by.
//!
//! # Example
//!
//! ```
//! use hublink_core::Identity;
//!
//! let id = Identity::parse("alice@hub.example.com/laptop").unwrap();
//! assert_eq!(id.bare(), "alice@hub.example.com");
//! assert_eq!(id.resource(), Some("laptop"));
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static IDENTITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^@/\s]+)@([^@/\s]+)(?:/([^\s]+))?$").expect("Invalid identity regex")
});

/// Errors raised while parsing an identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The identity is empty.
    #[error("identity is empty")]
    Empty,

    /// The identity does not match `user@domain[/resource]`.
    #[error("malformed identity: {0:?} (expected user@domain[/resource])")]
    Malformed(String),
}

/// A parsed `user@domain[/resource]` identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity {
    user: String,
    domain: String,
    resource: Option<String>,
}

impl Identity {
    /// Parses an identity string.
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(IdentityError::Empty);
        }

        let caps = IDENTITY_REGEX
            .captures(input)
            .ok_or_else(|| IdentityError::Malformed(input.to_string()))?;

        Ok(Self {
            user: caps[1].to_string(),
            domain: caps[2].to_string(),
            resource: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }

    /// Returns the user part.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Returns the domain part.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the resource part, if any.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Returns the bare identity (`user@domain`).
    pub fn bare(&self) -> String {
        format!("{}@{}", self.user, self.domain)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(resource) => write!(f, "{}@{}/{}", self.user, self.domain, resource),
            None => write!(f, "{}@{}", self.user, self.domain),
        }
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.to_string()
    }
}
