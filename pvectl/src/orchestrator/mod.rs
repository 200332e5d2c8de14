//! Multi-resource lifecycle orchestration.
//!
//! The [`Orchestrator`] runs one operation over a list of resources, strictly
//! in order:
//! 1. Dispatch through the kind's repository (as a retried write)
//! 2. Either return the task reference right away (`detach`) or wait for it
//! 3. Record a result per resource, stopping at the first failure under
//!    `fail_fast`
//!
//! Per-resource failures never escape `execute`; they become
//! [`Outcome::Failure`](crate::operation::Outcome::Failure) results.

pub mod confirm;
pub mod strategy;

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::model::Resource;
use crate::operation::{Operation, OperationResult};
use crate::repository::TaskRepository;
use crate::retry::{Method, RetryPolicy};

pub use confirm::{Confirmation, ImpactSummary, confirmation_for, is_affirmative};
pub use strategy::{Attempt, KindStrategy, StrategyRegistry};

/// Default ceiling for waiting on a task.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Options for one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Return PENDING results without waiting for tasks.
    pub detach: bool,
    /// Explicitly wait for tasks. Waiting is already the default, so this
    /// only matters against `detach`, which wins.
    pub wait: bool,
    /// Stop after the first failure.
    pub fail_fast: bool,
    /// Ceiling for each task wait.
    pub timeout: Duration,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            detach: false,
            wait: false,
            fail_fast: false,
            timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

impl ExecuteOptions {
    pub fn detached() -> Self {
        Self {
            detach: true,
            ..Default::default()
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether tasks are waited on. Detaching wins over an explicit wait.
    pub fn waits_for_task(&self) -> bool {
        !self.detach
    }

    /// An explicit wait was requested but detaching overrides it.
    pub fn wait_overridden(&self) -> bool {
        self.detach && self.wait
    }
}

/// Runs lifecycle operations against resolved resources.
pub struct Orchestrator<'a> {
    registry: &'a StrategyRegistry,
    tasks: &'a dyn TaskRepository,
    retry: RetryPolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(registry: &'a StrategyRegistry, tasks: &'a dyn TaskRepository, retry: RetryPolicy) -> Self {
        Self {
            registry,
            tasks,
            retry,
        }
    }

    /// Run `operation` on each resource in order and return one result per
    /// attempted resource, in input order.
    ///
    /// Under `fail_fast` the returned list is the prefix up to and including
    /// the first failure.
    pub async fn execute(
        &self,
        operation: Operation,
        resources: &[Resource],
        options: &ExecuteOptions,
    ) -> Vec<OperationResult> {
        if options.wait_overridden() {
            warn!(operation = %operation, "Both detach and wait requested, not waiting for tasks");
        }
        let mut results = Vec::with_capacity(resources.len());

        for resource in resources {
            let result = self.execute_one(operation, resource, options).await;
            let failed = result.is_failure();
            results.push(result);

            if failed && options.fail_fast {
                let skipped = resources.len() - results.len();
                if skipped > 0 {
                    warn!(
                        operation = %operation,
                        vmid = resource.id,
                        skipped,
                        "Stopping after first failure"
                    );
                }
                break;
            }
        }

        results
    }

    async fn execute_one(
        &self,
        operation: Operation,
        resource: &Resource,
        options: &ExecuteOptions,
    ) -> OperationResult {
        let Some(strategy) = self.registry.get(resource.kind) else {
            return OperationResult::failure(
                resource.clone(),
                operation,
                None,
                format!("no handler registered for {} workloads", resource.kind),
            );
        };

        let attempt = self.attempt(strategy, operation, resource, options).await;
        if let Attempt::Failed { error, .. } = &attempt {
            warn!(
                operation = %operation,
                vmid = resource.id,
                node = %resource.node,
                "{} failed: {}",
                strategy.describe(resource),
                error
            );
        }
        strategy.result(resource, operation, attempt)
    }

    async fn attempt(
        &self,
        strategy: &KindStrategy,
        operation: Operation,
        resource: &Resource,
        options: &ExecuteOptions,
    ) -> Attempt {
        if !strategy.supports(operation) {
            let error = Error::UnsupportedOperation {
                operation,
                resource: strategy.resource_label(),
            };
            return Attempt::Failed {
                task: None,
                error: error.to_string(),
            };
        }

        let repository = strategy.repository();
        let dispatched = self
            .retry
            .with_retry(Method::Write, || {
                repository.perform(operation, resource.id, &resource.node)
            })
            .await;
        let task = match dispatched {
            Ok(task) => task,
            Err(e) => {
                return Attempt::Failed {
                    task: None,
                    error: e.to_string(),
                };
            }
        };
        info!(
            operation = %operation,
            vmid = resource.id,
            node = %resource.node,
            task = %task,
            "Dispatched {}",
            strategy.describe(resource)
        );

        if !options.waits_for_task() {
            return Attempt::Dispatched { task };
        }

        match self.tasks.wait(&task, options.timeout).await {
            Ok(status) if status.is_ok() => {
                debug!(task = %task, "Task finished");
                Attempt::Completed { task }
            }
            Ok(status) if status.is_running() => {
                let error = Error::TaskTimeout {
                    task: task.clone(),
                    timeout: options.timeout,
                };
                Attempt::Failed {
                    task: Some(task),
                    error: error.to_string(),
                }
            }
            Ok(status) => Attempt::Failed {
                task: Some(task),
                error: status
                    .exit_status
                    .unwrap_or_else(|| "task stopped without exit status".to_string()),
            },
            Err(e) => Attempt::Failed {
                task: Some(task),
                error: e.to_string(),
            },
        }
    }
}
