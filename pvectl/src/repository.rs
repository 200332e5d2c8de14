//! Collaborator traits consumed by the operation engine.
//!
//! These abstract the management API so the resolver and orchestrator work on
//! domain values and can be driven by in-memory implementations in tests.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::Result;
use crate::model::{Node, Resource, TaskStatus, WorkloadEntry};
use crate::operation::Operation;

/// Interval between task status polls while waiting.
pub const TASK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Repository for one kind of workload.
#[async_trait]
pub trait WorkloadRepository: Send + Sync {
    /// List workloads, optionally restricted to one node.
    async fn list(&self, node: Option<&str>) -> Result<Vec<Resource>>;

    /// Get a workload by ID.
    async fn get(&self, id: u32) -> Result<Option<Resource>>;

    /// Dispatch a lifecycle operation; returns the task reference.
    async fn perform(&self, operation: Operation, id: u32, node: &str) -> Result<String>;
}

/// Access to asynchronous jobs on the cluster.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Current status of a task.
    async fn find(&self, task: &str) -> Result<TaskStatus>;

    /// Wait until the task stops or `timeout` elapses.
    ///
    /// Returns the last observed status, which is still running on timeout.
    async fn wait(&self, task: &str, timeout: Duration) -> Result<TaskStatus> {
        poll_task(self, task, timeout, TASK_POLL_INTERVAL).await
    }
}

/// Cluster-wide workload listing, used for identity resolution.
#[async_trait]
pub trait ClusterListing: Send + Sync {
    async fn list_workloads(&self) -> Result<Vec<WorkloadEntry>>;
}

/// Hypervisor hosts of the cluster.
#[async_trait]
pub trait NodeRepository: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>>;
}

/// Poll `find` every `interval` until the task stops or `timeout` elapses.
pub async fn poll_task<R>(
    tasks: &R,
    task: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<TaskStatus>
where
    R: TaskRepository + ?Sized,
{
    let deadline = Instant::now() + timeout;
    loop {
        let status = tasks.find(task).await?;
        if !status.is_running() {
            return Ok(status);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(status);
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Reports running for the first `running_polls` lookups.
    struct SlowTask {
        running_polls: u32,
        polls: AtomicU32,
    }

    #[async_trait]
    impl TaskRepository for SlowTask {
        async fn find(&self, _task: &str) -> Result<TaskStatus> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.running_polls {
                Ok(TaskStatus::running())
            } else {
                Ok(TaskStatus::finished("OK"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_polls_until_stopped() {
        let tasks = SlowTask {
            running_polls: 3,
            polls: AtomicU32::new(0),
        };
        let status = tasks.wait("UPID:pve1:1", Duration::from_secs(60)).await.unwrap();
        assert!(status.is_ok());
        assert_eq!(tasks.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_gives_up_at_timeout() {
        let tasks = SlowTask {
            running_polls: u32::MAX,
            polls: AtomicU32::new(0),
        };
        let start = Instant::now();
        let status = tasks.wait("UPID:pve1:1", Duration::from_secs(5)).await.unwrap();
        assert!(status.is_running());
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }
}
