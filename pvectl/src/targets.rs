//! Turning ids, `--all` and selectors into the resources an operation runs on.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::error::Result;
use crate::model::{Resource, ResourceKind};
use crate::orchestrator::StrategyRegistry;
use crate::resolver::Resolver;
use crate::selector::Selector;

/// Which workloads a command asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requested {
    Ids(Vec<u32>),
    All,
}

/// Selected resources plus the requested ids that could not be found.
#[derive(Debug, Clone, Default)]
pub struct Targets {
    pub resources: Vec<Resource>,
    pub missing: Vec<u32>,
}

/// Resolve `requested`, load a snapshot of every resolved workload and filter it
/// with `selector`.
///
/// Resources keep the order of the requested ids (ascending id for `All`).
pub async fn select_targets(
    resolver: &Resolver,
    registry: &StrategyRegistry,
    requested: &Requested,
    selector: &Selector,
) -> Result<Targets> {
    // Each workload is targeted once, at the position it was first named.
    let ids: Vec<u32> = match requested {
        Requested::All => Vec::new(),
        Requested::Ids(ids) => {
            let mut seen = HashSet::new();
            ids.iter().copied().filter(|id| seen.insert(*id)).collect()
        }
    };
    let entries = match requested {
        Requested::All => resolver.resolve_all().await?,
        Requested::Ids(_) => resolver.resolve_multiple(&ids).await?,
    };

    let kinds: BTreeSet<ResourceKind> = entries.iter().map(|e| e.kind).collect();
    let mut snapshots: HashMap<(ResourceKind, u32), Resource> = HashMap::new();
    for kind in kinds {
        let Some(strategy) = registry.get(kind) else {
            continue;
        };
        for resource in strategy.repository().list(None).await? {
            snapshots.insert((kind, resource.id), resource);
        }
    }

    let mut resources = Vec::with_capacity(entries.len());
    let mut missing = Vec::new();
    for entry in &entries {
        match snapshots.remove(&(entry.kind, entry.id)) {
            Some(resource) => resources.push(resource),
            None => missing.push(entry.id),
        }
    }
    missing.extend(
        ids.iter()
            .filter(|id| !entries.iter().any(|e| e.id == **id)),
    );

    let resources = selector.apply(resources)?;
    debug!(
        selected = resources.len(),
        missing = missing.len(),
        selector = %selector,
        "Selected targets"
    );
    Ok(Targets { resources, missing })
}
