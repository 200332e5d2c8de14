//! Snapshots of cluster state fetched per invocation.

use std::fmt;

/// Workload classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Vm,
    Container,
}

impl ResourceKind {
    /// Classify an upstream type tag. Anything but `lxc` is a VM.
    pub fn from_type_tag(tag: &str) -> Self {
        if tag == "lxc" {
            ResourceKind::Container
        } else {
            ResourceKind::Vm
        }
    }

    /// Type tag used by the management API.
    pub fn type_tag(self) -> &'static str {
        match self {
            ResourceKind::Vm => "qemu",
            ResourceKind::Container => "lxc",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Vm => f.write_str("vm"),
            ResourceKind::Container => f.write_str("container"),
        }
    }
}

/// A VM or container as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: u32,
    pub node: String,
    pub kind: ResourceKind,
    pub name: Option<String>,
    pub status: String,
    pub tags: Option<Vec<String>>,
    pub pool: Option<String>,
    pub is_template: bool,
}

impl Resource {
    pub fn new(id: u32, kind: ResourceKind, node: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id,
            node: node.into(),
            kind,
            name: None,
            status: status.into(),
            tags: None,
            pool: None,
            is_template: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = Some(pool.into());
        self
    }

    pub fn as_template(mut self) -> Self {
        self.is_template = true;
        self
    }

    /// Name for display, `-` when unnamed.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("-")
    }
}

/// Routing information for one workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub id: u32,
    pub node: String,
    pub kind: ResourceKind,
    pub name: Option<String>,
}

/// Row of the cluster-wide workload listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadEntry {
    pub id: u32,
    pub node: String,
    /// Upstream type tag (`qemu`, `lxc`, ...).
    pub type_tag: String,
    pub name: Option<String>,
}

impl From<&WorkloadEntry> for ResolvedEntry {
    fn from(entry: &WorkloadEntry) -> Self {
        Self {
            id: entry.id,
            node: entry.node.clone(),
            kind: ResourceKind::from_type_tag(&entry.type_tag),
            name: entry.name.clone(),
        }
    }
}

/// Hypervisor host in the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub status: String,
}

/// State of an asynchronous job on the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    /// `running` or `stopped`.
    pub status: String,
    /// Set once the task has stopped. `OK` means success.
    pub exit_status: Option<String>,
}

impl TaskStatus {
    pub fn running() -> Self {
        Self {
            status: "running".to_string(),
            exit_status: None,
        }
    }

    pub fn finished(exit_status: impl Into<String>) -> Self {
        Self {
            status: "stopped".to_string(),
            exit_status: Some(exit_status.into()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == "running"
    }

    pub fn is_ok(&self) -> bool {
        !self.is_running() && self.exit_status.as_deref() == Some("OK")
    }
}
