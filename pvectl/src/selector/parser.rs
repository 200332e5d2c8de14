//! Selector text to conditions.
//!
//! Clauses are separated by commas, except inside an `in (...)` list:
//!
//! - `field=value`
//! - `field!=value`
//! - `field=~pattern` (`*` wildcard)
//! - `field in (a,b,c)`

use super::{Condition, ConditionValue, Operator};
use crate::error::{Error, Result};

pub(super) fn parse_conditions(text: &str) -> Result<Vec<Condition>> {
    split_clauses(text)
        .into_iter()
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(parse_clause)
        .collect()
}

/// Split on commas that are not inside parentheses.
fn split_clauses(text: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                clauses.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    clauses.push(&text[start..]);
    clauses
}

fn parse_clause(clause: &str) -> Result<Condition> {
    if let Some(condition) = parse_in_clause(clause)? {
        return Ok(condition);
    }

    let syntax_error = || Error::SelectorSyntax(clause.to_string());
    let eq = clause.find('=').ok_or_else(syntax_error)?;
    let (head, tail) = (&clause[..eq], &clause[eq + 1..]);

    let (field, operator, value) = if let Some(field) = head.strip_suffix('!') {
        (field, Operator::Neq, tail)
    } else if let Some(pattern) = tail.strip_prefix('~') {
        (head, Operator::Match, pattern)
    } else {
        (head, Operator::Eq, tail)
    };

    let field = field.trim();
    if !is_valid_field(field) {
        return Err(syntax_error());
    }

    Ok(Condition::new(
        field,
        operator,
        ConditionValue::Single(value.trim().to_string()),
    ))
}

/// `field in (a,b,c)`. Returns `Ok(None)` when the clause has a different form.
fn parse_in_clause(clause: &str) -> Result<Option<Condition>> {
    let Some(open) = clause.find('(') else {
        return Ok(None);
    };
    let head = clause[..open].trim_end();
    let Some(field) = head.strip_suffix(" in").or_else(|| head.strip_suffix("\tin")) else {
        return Ok(None);
    };

    // `name=sign in (x)` is an equality whose value happens to contain ` in (`.
    let field = field.trim();
    if !is_valid_field(field) {
        return Ok(None);
    }
    let rest = clause[open + 1..].trim_end();
    let Some(inner) = rest.strip_suffix(')') else {
        return Err(Error::SelectorSyntax(clause.to_string()));
    };
    if inner.contains(['(', ')']) {
        return Err(Error::SelectorSyntax(clause.to_string()));
    }

    let values = inner
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect();

    Ok(Some(Condition::new(
        field,
        Operator::In,
        ConditionValue::List(values),
    )))
}

fn is_valid_field(field: &str) -> bool {
    !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
