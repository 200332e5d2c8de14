//! Workload identity resolution.
//!
//! A [`Resolver`] maps workload IDs to the node and kind needed to route
//! operations. It lists the cluster once, on first use, and keeps the result
//! for its whole lifetime; construct one per command invocation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::Result;
use crate::model::ResolvedEntry;
use crate::repository::ClusterListing;

pub struct Resolver {
    listing: Arc<dyn ClusterListing>,
    cache: OnceCell<BTreeMap<u32, ResolvedEntry>>,
}

impl Resolver {
    pub fn new(listing: Arc<dyn ClusterListing>) -> Self {
        Self {
            listing,
            cache: OnceCell::new(),
        }
    }

    /// Resolve one ID, `None` if the cluster has no such workload.
    pub async fn resolve(&self, id: u32) -> Result<Option<ResolvedEntry>> {
        Ok(self.entries().await?.get(&id).cloned())
    }

    /// Resolve several IDs in input order, dropping unknown ones.
    pub async fn resolve_multiple(&self, ids: &[u32]) -> Result<Vec<ResolvedEntry>> {
        let entries = self.entries().await?;
        Ok(ids.iter().filter_map(|id| entries.get(id).cloned()).collect())
    }

    /// Every workload in the cluster, by ascending ID.
    pub async fn resolve_all(&self) -> Result<Vec<ResolvedEntry>> {
        Ok(self.entries().await?.values().cloned().collect())
    }

    async fn entries(&self) -> Result<&BTreeMap<u32, ResolvedEntry>> {
        self.cache
            .get_or_try_init(|| async {
                let workloads = self.listing.list_workloads().await?;
                debug!(count = workloads.len(), "Loaded cluster workload index");
                Ok(workloads
                    .iter()
                    .map(|w| (w.id, ResolvedEntry::from(w)))
                    .collect())
            })
            .await
    }
}
