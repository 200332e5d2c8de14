//! Lifecycle operations and their per-resource outcomes.

use std::fmt;
use std::str::FromStr;

use crate::model::Resource;

/// Lifecycle operation applied to a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Start,
    /// Hard stop.
    Stop,
    /// Graceful shutdown via the guest.
    Shutdown,
    Restart,
    /// Hard reset.
    Reset,
    Suspend,
    Resume,
    Delete,
    ConvertToTemplate,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Start,
        Operation::Stop,
        Operation::Shutdown,
        Operation::Restart,
        Operation::Reset,
        Operation::Suspend,
        Operation::Resume,
        Operation::Delete,
        Operation::ConvertToTemplate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Shutdown => "shutdown",
            Operation::Restart => "restart",
            Operation::Reset => "reset",
            Operation::Suspend => "suspend",
            Operation::Resume => "resume",
            Operation::Delete => "delete",
            Operation::ConvertToTemplate => "template",
        }
    }

    /// Operations that cannot be undone once they complete.
    pub fn is_irreversible(self) -> bool {
        matches!(self, Operation::Delete | Operation::ConvertToTemplate)
    }

    /// Verb for confirmation prompts ("Stop 3 VMs?").
    pub fn verb(self) -> &'static str {
        match self {
            Operation::Start => "Start",
            Operation::Stop => "Stop",
            Operation::Shutdown => "Shut down",
            Operation::Restart => "Restart",
            Operation::Reset => "Reset",
            Operation::Suspend => "Suspend",
            Operation::Resume => "Resume",
            Operation::Delete => "Delete",
            Operation::ConvertToTemplate => "Convert to template",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| format!("unknown operation '{s}'"))
    }
}

/// Terminal state of one resource's operation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    /// Dispatched without waiting for the task.
    Pending,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Failure => f.write_str("failure"),
            Outcome::Pending => f.write_str("pending"),
        }
    }
}

/// Outcome of running one operation against one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    resource: Resource,
    operation: Operation,
    outcome: Outcome,
    task: Option<String>,
    error: Option<String>,
}

impl OperationResult {
    pub fn success(resource: Resource, operation: Operation, task: String) -> Self {
        Self {
            resource,
            operation,
            outcome: Outcome::Success,
            task: Some(task),
            error: None,
        }
    }

    pub fn pending(resource: Resource, operation: Operation, task: String) -> Self {
        Self {
            resource,
            operation,
            outcome: Outcome::Pending,
            task: Some(task),
            error: None,
        }
    }

    pub fn failure(
        resource: Resource,
        operation: Operation,
        task: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            resource,
            operation,
            outcome: Outcome::Failure,
            task,
            error: Some(error.into()),
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failure
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == Outcome::Pending
    }
}

/// Summary over the results of one `execute` call.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    results: Vec<OperationResult>,
    requested: usize,
}

impl ExecutionReport {
    /// `requested` is the number of resources handed to the orchestrator.
    pub fn new(results: Vec<OperationResult>, requested: usize) -> Self {
        Self { results, requested }
    }

    pub fn results(&self) -> &[OperationResult] {
        &self.results
    }

    pub fn succeeded(&self) -> usize {
        self.count(Outcome::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::Failure)
    }

    pub fn pending(&self) -> usize {
        self.count(Outcome::Pending)
    }

    /// Resources never attempted because of fail-fast.
    pub fn skipped(&self) -> usize {
        self.requested.saturating_sub(self.results.len())
    }

    pub fn is_truncated(&self) -> bool {
        self.skipped() > 0
    }

    pub fn all_succeeded(&self) -> bool {
        !self.is_truncated() && self.results.iter().all(OperationResult::is_success)
    }

    /// 0 when nothing failed, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.failed() > 0 || self.is_truncated() { 1 } else { 0 }
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} pending",
            self.succeeded(),
            self.failed(),
            self.pending()
        )?;
        if self.is_truncated() {
            write!(f, ", {} skipped (fail-fast)", self.skipped())?;
        }
        Ok(())
    }
}
