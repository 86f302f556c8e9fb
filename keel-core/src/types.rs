//! Strongly typed identifiers with validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Container identifier, also used as the leaf name of its cgroup
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerId(String);

impl ContainerId {
    /// Maximum length for container IDs
    pub const MAX_LENGTH: usize = 1024;

    /// Create a new `ContainerId` with validation
    ///
    /// # Errors
    /// Returns a validation error if the ID is empty, too long, or cannot be
    /// used as a single cgroup path segment
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    fn validate(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::validation("container ID cannot be empty"));
        }

        if id.len() > Self::MAX_LENGTH {
            return Err(Error::validation(format!(
                "container ID too long (max {} chars)",
                Self::MAX_LENGTH
            )));
        }

        if id == "." || id == ".." {
            return Err(Error::validation(format!(
                "container ID {id:?} is not a valid path segment"
            )));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
        {
            return Err(Error::validation(format!(
                "container ID {id:?} may only contain alphanumerics and '-', '_', '.', '+'"
            )));
        }

        Ok(())
    }

    /// Get the container ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContainerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContainerId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<ContainerId> for String {
    fn from(id: ContainerId) -> Self {
        id.0
    }
}

/// Process identifier as listed in a cgroup's process-list file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        Self(nix::unistd::getpid().as_raw())
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let pid: i32 = s
            .trim()
            .parse()
            .map_err(|e| Error::validation(format!("invalid pid {s:?}: {e}")))?;
        if pid <= 0 {
            return Err(Error::validation(format!("invalid pid {pid}")));
        }
        Ok(Self(pid))
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

impl From<ProcessId> for nix::unistd::Pid {
    fn from(pid: ProcessId) -> Self {
        Self::from_raw(pid.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_id_validation() {
        assert!(ContainerId::new("valid-id_123").is_ok());
        assert!(ContainerId::new("web.1").is_ok());
        assert!(ContainerId::new("").is_err());
        assert!(ContainerId::new("a".repeat(1025)).is_err());
        assert!(ContainerId::new("..").is_err());
        assert!(ContainerId::new("invalid id").is_err());
        assert!(ContainerId::new("invalid/id").is_err());
    }

    #[test]
    fn test_container_id_serde() {
        let id = ContainerId::new("test-123").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"test-123\"");
        assert!(serde_json::from_str::<ContainerId>("\"bad/id\"").is_err());
    }

    #[test]
    fn test_process_id_parse() {
        assert_eq!("123".parse::<ProcessId>().unwrap(), ProcessId::from_raw(123));
        assert_eq!(" 42\n".parse::<ProcessId>().unwrap().as_raw(), 42);
        assert!("abc".parse::<ProcessId>().is_err());
        assert!("0".parse::<ProcessId>().is_err());
        assert!("-5".parse::<ProcessId>().is_err());
    }

    #[test]
    fn test_process_id_nix_roundtrip() {
        let pid = ProcessId::from_raw(77);
        let nix_pid: nix::unistd::Pid = pid.into();
        assert_eq!(ProcessId::from(nix_pid), pid);
    }
}
