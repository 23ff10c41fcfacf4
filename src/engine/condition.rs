//! Condition evaluation for `@if`, `@elif` and `@while`
//!
//! Evaluation is a fixed-order scan: boolean literal, `exists("path")`,
//! `and`, `or`, prefix `not`, the comparison operators, then plain
//! truthiness. The logical operators are found by that scan order, not by
//! precedence: `a or b and c` splits on `and` first because `and` is
//! checked before `or`.
//!
//! Operators are only recognised outside quotes. Variable references are
//! resolved once per operand, so text produced by substitution is never
//! parsed or looked up again.

use std::path::Path;

use crate::context::{is_valid_identifier, VariableStore};
use crate::error::{BatchError, Result};
use crate::parser::strip_quotes;

/// Comparison operators in the order they are tried
const OPERATORS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];

/// Evaluates conditions against a variable store
pub struct ConditionEvaluator<'a> {
    vars: &'a VariableStore,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(vars: &'a VariableStore) -> Self {
        Self { vars }
    }

    /// Evaluate a condition
    pub fn evaluate(&self, condition: &str) -> Result<bool> {
        self.evaluate_expr(condition)
    }

    fn evaluate_expr(&self, text: &str) -> Result<bool> {
        let text = text.trim();

        if let Some(value) = boolean_literal(text) {
            return Ok(value);
        }

        if let Some(exists) = self.exists_call(text)? {
            return Ok(exists);
        }

        if let Some(operands) = split_outside_quotes(text, " and ") {
            for operand in operands {
                if !self.evaluate_expr(operand)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }

        if let Some(operands) = split_outside_quotes(text, " or ") {
            for operand in operands {
                if self.evaluate_expr(operand)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        if let Some(rest) = text.strip_prefix("not ") {
            return Ok(!self.evaluate_expr(rest)?);
        }

        if let Some(result) = self.comparison(text)? {
            return Ok(result);
        }

        let resolved = self.vars.resolve(text);
        let resolved = resolved.trim();
        Ok(boolean_literal(resolved).unwrap_or(!resolved.is_empty()))
    }

    /// `Ok(None)` when the text is not a lone `exists(...)` call
    fn exists_call(&self, text: &str) -> Result<Option<bool>> {
        let Some(inner) = text.strip_prefix("exists(") else {
            return Ok(None);
        };

        if let Some(path) = inner.strip_suffix(')').and_then(|arg| quoted_literal(arg.trim())) {
            let path = self.vars.resolve(path);
            return Ok(Some(Path::new(&path).exists()));
        }

        // exists(...) at the head of an `and`/`or` chain
        if find_outside_quotes(text, " and ").is_some() || find_outside_quotes(text, " or ").is_some() {
            return Ok(None);
        }

        Err(BatchError::Evaluation(format!(
            "exists() expects a single quoted path, got: {}",
            text
        )))
    }

    fn comparison(&self, text: &str) -> Result<Option<bool>> {
        for op in OPERATORS {
            if let Some(idx) = find_outside_quotes(text, op) {
                let left = self.operand(&text[..idx]);
                let right = self.operand(&text[idx + op.len()..]);
                return compare(&left, op, &right).map(Some);
            }
        }
        Ok(None)
    }

    /// A bare identifier names a variable; anything else is resolved and
    /// has one pair of surrounding quotes stripped.
    fn operand(&self, raw: &str) -> String {
        let raw = raw.trim();
        if is_valid_identifier(raw) {
            return self.vars.get(raw, "");
        }
        let resolved = self.vars.resolve(raw);
        strip_quotes(resolved.trim()).to_string()
    }
}

fn boolean_literal(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" | "\"\"" | "''" => Some(false),
        _ => None,
    }
}

/// Body of `"..."` or `'...'` when `text` is exactly one quoted literal
fn quoted_literal(text: &str) -> Option<&str> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = text.strip_prefix(quote)?.strip_suffix(quote)?;
    (!body.contains(quote)).then_some(body)
}

/// Byte offset of the first `pattern` that is not inside quotes
fn find_outside_quotes(text: &str, pattern: &str) -> Option<usize> {
    let mut quote = None;
    for (idx, c) in text.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => quote = Some(c),
            None if text[idx..].starts_with(pattern) => return Some(idx),
            None => {}
        }
    }
    None
}

/// Split on every unquoted `separator`; `None` when there is none
fn split_outside_quotes<'t>(text: &'t str, separator: &str) -> Option<Vec<&'t str>> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(idx) = find_outside_quotes(rest, separator) {
        parts.push(&rest[..idx]);
        rest = &rest[idx + separator.len()..];
    }
    if parts.is_empty() {
        return None;
    }
    parts.push(rest);
    Some(parts)
}

fn compare(left: &str, op: &str, right: &str) -> Result<bool> {
    if let (Ok(l), Ok(r)) = (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
        return Ok(match op {
            "==" => l == r,
            "!=" => l != r,
            ">=" => l >= r,
            "<=" => l <= r,
            ">" => l > r,
            "<" => l < r,
            _ => unreachable_operator(op)?,
        });
    }

    match op {
        "==" => Ok(left == right),
        "!=" => Ok(left != right),
        _ => Err(BatchError::Evaluation(format!(
            "operator '{}' needs numeric operands, got '{}' and '{}'",
            op, left, right
        ))),
    }
}

fn unreachable_operator(op: &str) -> Result<bool> {
    Err(BatchError::Evaluation(format!("unknown operator '{}'", op)))
}
