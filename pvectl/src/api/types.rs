//! Wire types of the management API.

use serde::{Deserialize, Deserializer};

use crate::model::{Node, Resource, ResourceKind, TaskStatus, WorkloadEntry};

/// Every response wraps its payload in `{"data": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

/// Row of `/cluster/resources` or `/nodes/{node}/{qemu|lxc}`.
#[derive(Debug, Deserialize)]
pub(crate) struct GuestDto {
    pub vmid: Option<u32>,
    pub node: Option<String>,
    #[serde(rename = "type")]
    pub type_tag: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub tags: Option<String>,
    pub pool: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub template: bool,
}

impl GuestDto {
    pub fn into_resource(self, kind: ResourceKind, node: Option<&str>) -> Option<Resource> {
        let node = self.node.or_else(|| node.map(String::from))?;
        Some(Resource {
            id: self.vmid?,
            node,
            kind,
            name: self.name.filter(|n| !n.is_empty()),
            status: self.status.unwrap_or_else(|| "unknown".to_string()),
            tags: parse_tags(self.tags.as_deref()),
            pool: self.pool.filter(|p| !p.is_empty()),
            is_template: self.template,
        })
    }

    pub fn into_entry(self) -> Option<WorkloadEntry> {
        Some(WorkloadEntry {
            id: self.vmid?,
            node: self.node?,
            type_tag: self.type_tag.unwrap_or_default(),
            name: self.name,
        })
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        self.type_tag.as_deref().map(ResourceKind::from_type_tag)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NodeDto {
    pub node: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl From<NodeDto> for Node {
    fn from(dto: NodeDto) -> Self {
        Node {
            name: dto.node,
            status: dto.status.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskStatusDto {
    pub status: String,
    pub exitstatus: Option<String>,
}

impl From<TaskStatusDto> for TaskStatus {
    fn from(dto: TaskStatusDto) -> Self {
        TaskStatus {
            status: dto.status,
            exit_status: dto.exitstatus,
        }
    }
}

/// Tags come as one string separated by `;`, `,` or spaces.
pub(crate) fn parse_tags(tags: Option<&str>) -> Option<Vec<String>> {
    let tags: Vec<String> = tags?
        .split([';', ',', ' '])
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    (!tags.is_empty()).then_some(tags)
}

/// Node name embedded in a task reference (`UPID:<node>:...`).
pub fn upid_node(task: &str) -> Option<&str> {
    let mut parts = task.split(':');
    if parts.next()? != "UPID" {
        return None;
    }
    parts.next().filter(|node| !node.is_empty())
}

/// Booleans are sent as `0`/`1`, occasionally as JSON booleans or strings.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n != 0,
        Some(Flag::Str(s)) => s == "1" || s == "true",
        None => false,
    })
}
