//! Variable references inside option values
//!
//! Strings may embed `${name}` or `${name.path.0}` references, optionally
//! negated with `${!name}`. A string that is exactly one reference evaluates
//! to the referenced JSON value itself; otherwise every reference is rendered
//! into the surrounding text. `$${` produces a literal `${`.

use crate::deferred::{Deferred, Variable};
use crate::error::WorkflowError;
use futures::future::join_all;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn reference_pattern() -> Result<&'static Regex, WorkflowError> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"\$\$\{|\$\{\s*(!?)\s*([A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_-]+)*)\s*\}")
                .ok()
        })
        .as_ref()
        .ok_or_else(|| WorkflowError::new("variable reference pattern failed to compile"))
}

/// A parsed `${...}` reference
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reference {
    negate: bool,
    name: String,
    path: Vec<String>,
}

impl Reference {
    fn from_captures(captures: &Captures<'_>) -> Option<Self> {
        let expression = captures.get(2)?.as_str();
        let mut segments = expression.split('.').map(str::to_string);
        let name = segments.next()?;
        Some(Self {
            negate: captures.get(1).is_some_and(|m| !m.as_str().is_empty()),
            name,
            path: segments.collect(),
        })
    }

    fn qualified(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.path.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Resolve against the variables, deferring lazy ones
    fn evaluate(&self, variables: &IndexMap<String, Variable>) -> Result<Deferred, WorkflowError> {
        let variable = variables
            .get(&self.name)
            .ok_or_else(|| WorkflowError::UndefinedVariable(self.name.clone()))?;

        match variable {
            Variable::Literal(value) => self.project(value.clone()).map(Deferred::Value),
            Variable::Lazy(lazy) => {
                let reference = self.clone();
                let pending = lazy.evaluate();
                Ok(Deferred::from_future(async move {
                    let value = pending.await?;
                    reference.project(value)
                }))
            }
        }
    }

    /// Walk the path into the value and apply negation
    fn project(&self, value: Value) -> Result<Value, WorkflowError> {
        let mut current = value;
        for segment in &self.path {
            let next = match &mut current {
                Value::Object(map) => map.remove(segment),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .filter(|index| *index < items.len())
                    .map(|index| items.swap_remove(index)),
                _ => None,
            };
            current = next.ok_or_else(|| WorkflowError::UndefinedVariable(self.qualified()))?;
        }

        if self.negate {
            Ok(Value::Bool(!is_truthy(&current)))
        } else {
            Ok(current)
        }
    }
}

/// `false`, `null`, `0`, `""`, `[]` and `{}` are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text form of a value embedded in a larger string
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

enum Piece {
    Text(String),
    Reference(Deferred),
}

/// Substitute variable references throughout a JSON value.
///
/// Literal variables are substituted immediately; lazy ones become pending
/// nodes, so the result must be resolved with [`crate::deferred::resolve`].
pub fn interpolate(
    value: &Value,
    variables: &IndexMap<String, Variable>,
) -> Result<Deferred, WorkflowError> {
    match value {
        Value::String(text) => interpolate_str(text, variables),
        Value::Array(items) => items
            .iter()
            .map(|item| interpolate(item, variables))
            .collect::<Result<Vec<_>, _>>()
            .map(Deferred::Array),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| Ok((key.clone(), interpolate(item, variables)?)))
            .collect::<Result<Vec<_>, WorkflowError>>()
            .map(Deferred::Object),
        other => Ok(Deferred::Value(other.clone())),
    }
}

fn interpolate_str(
    text: &str,
    variables: &IndexMap<String, Variable>,
) -> Result<Deferred, WorkflowError> {
    let pattern = reference_pattern()?;

    // A lone reference keeps the referenced value's type
    if let Some(captures) = pattern.captures(text) {
        let whole = captures.get(0).map(|m| m.as_str().len()) == Some(text.len());
        if whole && captures.get(2).is_some() {
            if let Some(reference) = Reference::from_captures(&captures) {
                return reference.evaluate(variables);
            }
        }
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for captures in pattern.captures_iter(text) {
        let Some(matched) = captures.get(0) else {
            continue;
        };
        pieces.push(Piece::Text(text[last..matched.start()].to_string()));
        last = matched.end();

        match Reference::from_captures(&captures) {
            Some(reference) => pieces.push(Piece::Reference(reference.evaluate(variables)?)),
            None => pieces.push(Piece::Text("${".to_string())),
        }
    }
    if last == 0 && pieces.is_empty() {
        return Ok(Deferred::Value(Value::String(text.to_string())));
    }
    pieces.push(Piece::Text(text[last..].to_string()));

    if pieces.iter().all(|piece| match piece {
        Piece::Text(_) => true,
        Piece::Reference(deferred) => deferred.is_ready(),
    }) {
        let mut rendered = String::new();
        for piece in pieces {
            match piece {
                Piece::Text(text) => rendered.push_str(&text),
                Piece::Reference(Deferred::Value(value)) => rendered.push_str(&render(&value)),
                Piece::Reference(_) => {}
            }
        }
        return Ok(Deferred::Value(Value::String(rendered)));
    }

    Ok(Deferred::from_future(async move {
        let parts = join_all(pieces.into_iter().map(|piece| async move {
            match piece {
                Piece::Text(text) => Ok(text),
                Piece::Reference(deferred) => {
                    crate::deferred::resolve(deferred).await.map(|v| render(&v))
                }
            }
        }))
        .await;
        let mut rendered = String::new();
        for part in parts {
            rendered.push_str(&part?);
        }
        Ok(Value::String(rendered))
    }))
}
