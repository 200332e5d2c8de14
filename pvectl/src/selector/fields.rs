//! Per-type field extraction for selectors.

use crate::model::{Node, Resource};

/// Value of one selectable field on one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// Single string. Absent optional attributes read as `""`.
    Scalar(&'a str),
    /// Multi-valued field; `None` when the attribute is absent.
    Set(Option<&'a [String]>),
    /// Boolean attribute, matched against `yes`/`no`.
    Flag(bool),
}

/// A type whose collections can be filtered with a [`super::Selector`].
pub trait Selectable {
    /// Label used in error messages.
    const RESOURCE_LABEL: &'static str;
    /// Fields conditions may reference.
    const SUPPORTED_FIELDS: &'static [&'static str];

    /// Extract `field`, or `None` if the type does not expose it.
    fn field_value(&self, field: &str) -> Option<FieldValue<'_>>;
}

impl Selectable for Resource {
    const RESOURCE_LABEL: &'static str = "workload";
    const SUPPORTED_FIELDS: &'static [&'static str] =
        &["status", "tags", "pool", "node", "name", "template"];

    fn field_value(&self, field: &str) -> Option<FieldValue<'_>> {
        let value = match field {
            "status" => FieldValue::Scalar(&self.status),
            "tags" => FieldValue::Set(self.tags.as_deref().filter(|tags| !tags.is_empty())),
            "pool" => FieldValue::Scalar(self.pool.as_deref().unwrap_or("")),
            "node" => FieldValue::Scalar(&self.node),
            "name" => FieldValue::Scalar(self.name.as_deref().unwrap_or("")),
            "template" => FieldValue::Flag(self.is_template),
            _ => return None,
        };
        Some(value)
    }
}

impl Selectable for Node {
    const RESOURCE_LABEL: &'static str = "node";
    const SUPPORTED_FIELDS: &'static [&'static str] = &["name", "status"];

    fn field_value(&self, field: &str) -> Option<FieldValue<'_>> {
        match field {
            "name" => Some(FieldValue::Scalar(&self.name)),
            "status" => Some(FieldValue::Scalar(&self.status)),
            _ => None,
        }
    }
}
