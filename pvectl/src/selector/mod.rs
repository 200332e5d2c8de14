//! Selector DSL for filtering resource collections.
//!
//! A selector is an AND-combined list of conditions such as
//! `status=running,tags=prod,name=~web-*`. Field names are validated when the
//! selector is applied, since each resource type exposes its own fields.

mod fields;
mod parser;

use std::fmt;

pub use fields::{FieldValue, Selectable};

use crate::error::{Error, Result};

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Neq,
    /// `=~` with `*` wildcards
    Match,
    /// `in (...)`
    In,
}

/// Expected value of a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionValue {
    Single(String),
    List(Vec<String>),
}

impl ConditionValue {
    fn contains(&self, actual: &str) -> bool {
        match self {
            ConditionValue::Single(v) => v == actual,
            ConditionValue::List(values) => values.iter().any(|v| v == actual),
        }
    }

    fn values(&self) -> &[String] {
        match self {
            ConditionValue::Single(v) => std::slice::from_ref(v),
            ConditionValue::List(values) => values,
        }
    }
}

/// One `(field, operator, value)` test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    field: String,
    operator: Operator,
    value: ConditionValue,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: ConditionValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &ConditionValue {
        &self.value
    }

    fn matches<T: Selectable>(&self, item: &T) -> Result<bool> {
        let actual = item
            .field_value(&self.field)
            .ok_or_else(|| Error::UnknownField {
                field: self.field.clone(),
                resource: T::RESOURCE_LABEL,
                supported: T::SUPPORTED_FIELDS.join(", "),
            })?;
        Ok(compare_value(actual, self.operator, &self.value))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.operator, &self.value) {
            (Operator::In, value) => write!(f, "{} in ({})", self.field, value.values().join(",")),
            (op, value) => {
                let op = match op {
                    Operator::Eq => "=",
                    Operator::Neq => "!=",
                    Operator::Match => "=~",
                    Operator::In => unreachable!(),
                };
                write!(f, "{}{}{}", self.field, op, value.values().join(","))
            }
        }
    }
}

/// Parsed, AND-combined list of conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    conditions: Vec<Condition>,
}

impl Selector {
    /// Parse one selector string.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            conditions: parser::parse_conditions(text)?,
        })
    }

    /// Parse several selector strings into one selector.
    pub fn parse_all<I, S>(texts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut conditions = Vec::new();
        for text in texts {
            conditions.extend(parser::parse_conditions(text.as_ref())?);
        }
        Ok(Self { conditions })
    }

    pub fn from_conditions(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `item` satisfies every condition.
    pub fn matches<T: Selectable>(&self, item: &T) -> Result<bool> {
        for condition in &self.conditions {
            if !condition.matches(item)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Keep the items satisfying every condition, in input order.
    pub fn apply<T: Selectable>(&self, items: Vec<T>) -> Result<Vec<T>> {
        if self.is_empty() {
            return Ok(items);
        }
        let mut selected = Vec::with_capacity(items.len());
        for item in items {
            if self.matches(&item)? {
                selected.push(item);
            }
        }
        Ok(selected)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, condition) in self.conditions.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{condition}")?;
        }
        Ok(())
    }
}

/// Test one extracted field against a condition.
pub fn compare_value(actual: FieldValue<'_>, operator: Operator, expected: &ConditionValue) -> bool {
    match actual {
        FieldValue::Scalar(value) => compare_scalar(value, operator, expected),
        // Absent sets never match, except for negation which holds vacuously.
        FieldValue::Set(None) => operator == Operator::Neq,
        // Some element passes the per-element test, for every operator.
        FieldValue::Set(Some(items)) => items
            .iter()
            .any(|item| compare_scalar(item, operator, expected)),
        FieldValue::Flag(flag) => {
            let token = if flag { "yes" } else { "no" };
            compare_scalar(token, operator, expected)
        }
    }
}

fn compare_scalar(actual: &str, operator: Operator, expected: &ConditionValue) -> bool {
    match operator {
        Operator::Eq | Operator::In => expected.contains(actual),
        Operator::Neq => !expected.contains(actual),
        Operator::Match => expected
            .values()
            .iter()
            .any(|pattern| wildcard_match(pattern, actual)),
    }
}

/// Match `text` against a pattern where `*` stands for any run of characters.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // No wildcard at all.
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
