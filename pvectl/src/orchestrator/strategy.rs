//! Per-kind dispatch for lifecycle operations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Resource, ResourceKind};
use crate::operation::{Operation, OperationResult};
use crate::repository::WorkloadRepository;

/// How an attempt ended, before it is turned into an [`OperationResult`].
#[derive(Debug, Clone)]
pub enum Attempt {
    Dispatched { task: String },
    Completed { task: String },
    Failed { task: Option<String>, error: String },
}

/// Builds the result value for one attempt.
pub type ResultBuilder = fn(&KindStrategy, &Resource, Operation, Attempt) -> OperationResult;

/// Everything the orchestrator needs to know about one workload kind.
pub struct KindStrategy {
    kind: ResourceKind,
    resource_label: &'static str,
    id_label: &'static str,
    repository: Arc<dyn WorkloadRepository>,
    supported: &'static [Operation],
    result_builder: ResultBuilder,
}

impl KindStrategy {
    pub fn vm(repository: Arc<dyn WorkloadRepository>) -> Self {
        Self {
            kind: ResourceKind::Vm,
            resource_label: "VM",
            id_label: "VMID",
            repository,
            supported: &Operation::ALL,
            result_builder: build_result,
        }
    }

    pub fn container(repository: Arc<dyn WorkloadRepository>) -> Self {
        Self {
            kind: ResourceKind::Container,
            resource_label: "container",
            id_label: "CTID",
            repository,
            supported: &[
                Operation::Start,
                Operation::Stop,
                Operation::Shutdown,
                Operation::Restart,
                Operation::Delete,
                Operation::ConvertToTemplate,
            ],
            result_builder: build_result,
        }
    }

    pub fn with_result_builder(mut self, builder: ResultBuilder) -> Self {
        self.result_builder = builder;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn resource_label(&self) -> &'static str {
        self.resource_label
    }

    pub fn id_label(&self) -> &'static str {
        self.id_label
    }

    pub fn repository(&self) -> &dyn WorkloadRepository {
        self.repository.as_ref()
    }

    pub fn supports(&self, operation: Operation) -> bool {
        self.supported.contains(&operation)
    }

    /// "VM 100 (web)"
    pub fn describe(&self, resource: &Resource) -> String {
        match &resource.name {
            Some(name) => format!("{} {} ({})", self.resource_label, resource.id, name),
            None => format!("{} {}", self.resource_label, resource.id),
        }
    }

    pub fn result(&self, resource: &Resource, operation: Operation, attempt: Attempt) -> OperationResult {
        (self.result_builder)(self, resource, operation, attempt)
    }
}

fn build_result(
    _strategy: &KindStrategy,
    resource: &Resource,
    operation: Operation,
    attempt: Attempt,
) -> OperationResult {
    let resource = resource.clone();
    match attempt {
        Attempt::Dispatched { task } => OperationResult::pending(resource, operation, task),
        Attempt::Completed { task } => OperationResult::success(resource, operation, task),
        Attempt::Failed { task, error } => OperationResult::failure(resource, operation, task, error),
    }
}

/// Strategies by kind, built once at startup and lent to the orchestrator.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: Vec<KindStrategy>,
    index: HashMap<ResourceKind, usize>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy, replacing any previous one for the same kind.
    pub fn register(&mut self, strategy: KindStrategy) {
        match self.index.get(&strategy.kind) {
            Some(&slot) => self.strategies[slot] = strategy,
            None => {
                self.index.insert(strategy.kind, self.strategies.len());
                self.strategies.push(strategy);
            }
        }
    }

    pub fn with(mut self, strategy: KindStrategy) -> Self {
        self.register(strategy);
        self
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&KindStrategy> {
        self.index.get(&kind).map(|&slot| &self.strategies[slot])
    }

    /// Registered strategies in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &KindStrategy> {
        self.strategies.iter()
    }
}
