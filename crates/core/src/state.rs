// Instance state and the status message derived from it

use serde::{Serialize, Serializer};

/// Canonical state of the instance, owned exclusively by the Coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceState {
    /// Display name, generated once at startup
    pub name: String,
    /// Completed requests
    pub request_count: u64,
    /// Requests started but not yet finished
    pub active_requests: u64,
    /// Set once on termination, never reverts
    pub deleted: bool,
    /// Hashes per millisecond over the last load window
    pub work_rate: u64,
}

impl InstanceState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request_count: 0,
            active_requests: 0,
            deleted: false,
            work_rate: 0,
        }
    }

    /// Status as reported to the outside world
    pub fn status(&self) -> InstanceStatus {
        InstanceStatus::derive(self.deleted, self.active_requests)
    }

    /// Snapshot for publication
    pub fn to_message(&self) -> StatusMessage {
        StatusMessage {
            name: self.name.clone(),
            request_count: self.request_count,
            instance_status: self.status(),
            work_rate: self.work_rate,
        }
    }
}

/// Reported instance status; serialized as its integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InstanceStatus {
    Unknown = 0,
    Idle = 1,
    Processing = 2,
    Killed = 3,
}

impl InstanceStatus {
    /// Killed wins over everything, then any in-flight request means Processing
    pub fn derive(deleted: bool, active_requests: u64) -> Self {
        if deleted {
            InstanceStatus::Killed
        } else if active_requests > 0 {
            InstanceStatus::Processing
        } else {
            InstanceStatus::Idle
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Unknown => write!(f, "unknown"),
            InstanceStatus::Idle => write!(f, "idle"),
            InstanceStatus::Processing => write!(f, "processing"),
            InstanceStatus::Killed => write!(f, "killed"),
        }
    }
}

impl Serialize for InstanceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Wire message published on every status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusMessage {
    pub name: String,
    pub request_count: u64,
    pub instance_status: InstanceStatus,
    pub work_rate: u64,
}
