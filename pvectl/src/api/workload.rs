//! Per-kind workload repository over the management API.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::ApiClient;
use super::types::GuestDto;
use crate::error::Result;
use crate::model::{Resource, ResourceKind};
use crate::operation::Operation;
use crate::repository::WorkloadRepository;

/// VMs (`qemu`) or containers (`lxc`) of the cluster.
pub struct WorkloadClient {
    api: Arc<ApiClient>,
    kind: ResourceKind,
}

impl WorkloadClient {
    pub fn new(api: Arc<ApiClient>, kind: ResourceKind) -> Self {
        Self { api, kind }
    }

    pub fn vms(api: Arc<ApiClient>) -> Self {
        Self::new(api, ResourceKind::Vm)
    }

    pub fn containers(api: Arc<ApiClient>) -> Self {
        Self::new(api, ResourceKind::Container)
    }
}

#[async_trait]
impl WorkloadRepository for WorkloadClient {
    async fn list(&self, node: Option<&str>) -> Result<Vec<Resource>> {
        let mut resources: Vec<Resource> = match node {
            Some(node) => {
                let guests: Vec<GuestDto> = self
                    .api
                    .get(&["nodes", node, self.kind.type_tag()], &[])
                    .await?;
                guests
                    .into_iter()
                    .filter_map(|g| g.into_resource(self.kind, Some(node)))
                    .collect()
            }
            None => self
                .api
                .cluster_guests()
                .await?
                .into_iter()
                .filter(|g| g.kind() == Some(self.kind))
                .filter_map(|g| g.into_resource(self.kind, None))
                .collect(),
        };
        resources.sort_by_key(|r| r.id);
        debug!(kind = %self.kind, count = resources.len(), "Listed workloads");
        Ok(resources)
    }

    async fn get(&self, id: u32) -> Result<Option<Resource>> {
        Ok(self
            .api
            .cluster_guests()
            .await?
            .into_iter()
            .filter(|g| g.vmid == Some(id) && g.kind() == Some(self.kind))
            .find_map(|g| g.into_resource(self.kind, None)))
    }

    async fn perform(&self, operation: Operation, id: u32, node: &str) -> Result<String> {
        let id = id.to_string();
        let id = id.as_str();
        let kind = self.kind.type_tag();

        let action = match operation {
            Operation::Delete => return self.api.delete(&["nodes", node, kind, id]).await,
            Operation::ConvertToTemplate => {
                return self.api.post(&["nodes", node, kind, id, "template"]).await;
            }
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Shutdown => "shutdown",
            Operation::Restart => "reboot",
            Operation::Reset => "reset",
            Operation::Suspend => "suspend",
            Operation::Resume => "resume",
        };
        self.api
            .post(&["nodes", node, kind, id, "status", action])
            .await
    }
}
