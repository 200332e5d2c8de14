//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::model::{Resource, TaskStatus};
use crate::operation::Operation;
use crate::repository::{TASK_POLL_INTERVAL, TaskRepository, WorkloadRepository, poll_task};

/// Workload repository that records every dispatched operation.
///
/// Task references look like `UPID:<node>:<id>:<operation>`.
#[derive(Default)]
pub struct FakeRepository {
    resources: Vec<Resource>,
    failing: HashMap<u32, u16>,
    transient: Mutex<HashMap<u32, u32>>,
    calls: Mutex<Vec<(Operation, u32)>>,
}

impl FakeRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn builder() -> Self {
        Self::default()
    }

    pub fn resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = resources;
        self
    }

    /// Every dispatch for `id` fails with `status`.
    pub fn failing(mut self, id: u32, status: u16) -> Self {
        self.failing.insert(id, status);
        self
    }

    /// The first `times` dispatches for `id` fail with a 503.
    pub fn transient(self, id: u32, times: u32) -> Self {
        self.transient.lock().unwrap().insert(id, times);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<(Operation, u32)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_ids(&self) -> Vec<u32> {
        self.calls().into_iter().map(|(_, id)| id).collect()
    }
}

#[async_trait]
impl WorkloadRepository for FakeRepository {
    async fn list(&self, node: Option<&str>) -> Result<Vec<Resource>> {
        Ok(self
            .resources
            .iter()
            .filter(|r| node.is_none_or(|n| r.node == n))
            .cloned()
            .collect())
    }

    async fn get(&self, id: u32) -> Result<Option<Resource>> {
        Ok(self.resources.iter().find(|r| r.id == id).cloned())
    }

    async fn perform(&self, operation: Operation, id: u32, node: &str) -> Result<String> {
        self.calls.lock().unwrap().push((operation, id));

        if let Some(&status) = self.failing.get(&id) {
            return Err(Error::Api {
                status,
                message: format!("{operation} failed for {id}"),
            });
        }
        if let Some(remaining) = self.transient.lock().unwrap().get_mut(&id)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(Error::Api {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(format!("UPID:{node}:{id}:{operation}"))
    }
}

/// Task repository answering from a per-workload status table.
///
/// Tasks of workloads without an entry finish with `OK`.
pub struct FakeTasks {
    statuses: HashMap<u32, TaskStatus>,
    wait_calls: AtomicUsize,
    find_calls: AtomicUsize,
}

impl FakeTasks {
    pub fn new() -> Self {
        Self {
            statuses: HashMap::new(),
            wait_calls: AtomicUsize::new(0),
            find_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_status(mut self, id: u32, status: TaskStatus) -> Self {
        self.statuses.insert(id, status);
        self
    }

    pub fn wait_calls(&self) -> usize {
        self.wait_calls.load(Ordering::SeqCst)
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskRepository for FakeTasks {
    async fn find(&self, task: &str) -> Result<TaskStatus> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let id: u32 = task
            .split(':')
            .nth(2)
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| Error::InvalidTaskRef(task.to_string()))?;
        Ok(self
            .statuses
            .get(&id)
            .cloned()
            .unwrap_or_else(|| TaskStatus::finished("OK")))
    }

    async fn wait(&self, task: &str, timeout: Duration) -> Result<TaskStatus> {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        poll_task(self, task, timeout, TASK_POLL_INTERVAL).await
    }
}
