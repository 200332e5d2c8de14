//! Confirmation policy for multi-resource operations.
//!
//! Pure: decides whether the caller must ask, and renders what to ask. Reading
//! the answer is left to the CLI.

use std::fmt;

use crate::model::{Resource, ResourceKind};
use crate::operation::Operation;

/// Human-readable description of what an operation is about to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactSummary {
    action: String,
    irreversible: bool,
    targets: Vec<String>,
}

impl ImpactSummary {
    pub fn new(action: impl Into<String>, irreversible: bool, targets: Vec<String>) -> Self {
        Self {
            action: action.into(),
            irreversible,
            targets,
        }
    }

    pub fn for_operation(operation: Operation, resources: &[Resource]) -> Self {
        let targets = resources
            .iter()
            .map(|r| {
                let kind = match r.kind {
                    ResourceKind::Vm => "VM",
                    ResourceKind::Container => "CT",
                };
                format!("{kind} {} ({}) on {}", r.id, r.display_name(), r.node)
            })
            .collect();
        Self::new(operation.verb(), operation.is_irreversible(), targets)
    }

    pub fn is_irreversible(&self) -> bool {
        self.irreversible
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

impl fmt::Display for ImpactSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.targets.len();
        writeln!(
            f,
            "{} {} resource{}:",
            self.action,
            count,
            if count == 1 { "" } else { "s" }
        )?;
        for target in &self.targets {
            writeln!(f, "  - {target}")?;
        }
        if self.irreversible {
            writeln!(f, "WARNING: this operation cannot be undone.")?;
        }
        write!(f, "Proceed? [y/N] ")
    }
}

/// Whether the caller has to ask before executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    NotRequired,
    Required(ImpactSummary),
}

/// Single-resource operations never ask; multi-resource ones ask unless
/// `assume_yes` is set.
pub fn confirmation_for(
    operation: Operation,
    resources: &[Resource],
    assume_yes: bool,
) -> Confirmation {
    confirmation_for_summary(ImpactSummary::for_operation(operation, resources), assume_yes)
}

/// Same policy for a summary built by the caller.
pub fn confirmation_for_summary(summary: ImpactSummary, assume_yes: bool) -> Confirmation {
    if summary.targets.len() <= 1 || assume_yes {
        Confirmation::NotRequired
    } else {
        Confirmation::Required(summary)
    }
}

/// Parse an answer to the prompt. Only an explicit yes counts.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
