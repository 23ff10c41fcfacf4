//! Typed directive bodies
//!
//! The line parser keeps directive bodies as raw text. They are turned into
//! a [`Directive`] here, on demand, by the validator and the engine.

use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};
use crate::parser::ast::ScriptLine;
use crate::parser::lines::strip_quotes;

/// Policy applied when a line fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    Continue,
    Abort,
}

impl ErrorPolicy {
    pub fn from_flag(continue_on_error: bool) -> Self {
        if continue_on_error {
            ErrorPolicy::Continue
        } else {
            ErrorPolicy::Abort
        }
    }

    pub fn continues(self) -> bool {
        self == ErrorPolicy::Continue
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorPolicy::Continue => write!(f, "continue"),
            ErrorPolicy::Abort => write!(f, "abort"),
        }
    }
}

/// A parsed `@directive`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    Set { name: String, value: String },
    Unset { name: String },
    Echo { text: String },
    Export { name: String, value: String },
    OnError(ErrorPolicy),
    If { condition: String },
    Elif { condition: String },
    Else,
    EndIf,
    Foreach { var: String, list: String },
    EndForeach,
    While { condition: String },
    EndWhile,
    Try,
    Catch,
    Finally,
    EndTry,
}

impl Directive {
    /// Parse the directive on `line`
    pub fn parse(line: &ScriptLine) -> Result<Directive> {
        let keyword = line
            .keyword()
            .ok_or_else(|| BatchError::parse(line.line_number, "not a directive line"))?;
        let body = line.directive_body();
        let n = line.line_number;

        match keyword {
            "set" => {
                let (name, value) = parse_assignment(n, "@set", body)?;
                Ok(Directive::Set { name, value })
            }
            "export" => {
                let (name, value) = parse_assignment(n, "@export", body)?;
                Ok(Directive::Export { name, value })
            }
            "unset" => {
                if body.is_empty() || body.split_whitespace().count() != 1 {
                    return Err(BatchError::parse(n, "@unset expects exactly one variable name"));
                }
                Ok(Directive::Unset {
                    name: body.to_string(),
                })
            }
            "echo" => Ok(Directive::Echo {
                text: strip_quotes(body).to_string(),
            }),
            "onerror" => match body.to_lowercase().as_str() {
                "continue" => Ok(Directive::OnError(ErrorPolicy::Continue)),
                "abort" => Ok(Directive::OnError(ErrorPolicy::Abort)),
                other => Err(BatchError::parse(
                    n,
                    format!("@onerror expects 'continue' or 'abort', got '{}'", other),
                )),
            },
            "if" => Ok(Directive::If {
                condition: require_condition(n, "@if", body)?,
            }),
            "elif" => Ok(Directive::Elif {
                condition: require_condition(n, "@elif", body)?,
            }),
            "while" => Ok(Directive::While {
                condition: require_condition(n, "@while", body)?,
            }),
            "foreach" => parse_foreach(n, body),
            "else" => no_arguments(n, "@else", body, Directive::Else),
            "endif" => no_arguments(n, "@endif", body, Directive::EndIf),
            "endforeach" => no_arguments(n, "@endforeach", body, Directive::EndForeach),
            "endwhile" => no_arguments(n, "@endwhile", body, Directive::EndWhile),
            "try" => no_arguments(n, "@try", body, Directive::Try),
            "catch" => no_arguments(n, "@catch", body, Directive::Catch),
            "finally" => no_arguments(n, "@finally", body, Directive::Finally),
            "endtry" => no_arguments(n, "@endtry", body, Directive::EndTry),
            "" => Err(BatchError::parse(n, "missing directive name after '@'")),
            other => Err(BatchError::parse(n, format!("unknown directive '@{}'", other))),
        }
    }
}

fn parse_assignment(line: usize, directive: &str, body: &str) -> Result<(String, String)> {
    let (name, value) = body
        .split_once('=')
        .ok_or_else(|| BatchError::parse(line, format!("{} expects NAME = value", directive)))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(BatchError::parse(
            line,
            format!("{} is missing a variable name", directive),
        ));
    }
    Ok((name.to_string(), strip_quotes(value.trim()).to_string()))
}

fn require_condition(line: usize, directive: &str, body: &str) -> Result<String> {
    if body.is_empty() {
        return Err(BatchError::parse(
            line,
            format!("{} requires a condition", directive),
        ));
    }
    Ok(body.to_string())
}

fn parse_foreach(line: usize, body: &str) -> Result<Directive> {
    let mut parts = body.splitn(2, char::is_whitespace);
    let var = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim_start();

    let list = rest
        .strip_prefix("in")
        .filter(|after| after.is_empty() || after.starts_with(char::is_whitespace))
        .map(str::trim);

    match list {
        Some(list) if !var.is_empty() => Ok(Directive::Foreach {
            var: var.to_string(),
            list: list.to_string(),
        }),
        _ => Err(BatchError::parse(line, "@foreach expects VAR in <list>")),
    }
}

fn no_arguments(line: usize, directive: &str, body: &str, parsed: Directive) -> Result<Directive> {
    if body.is_empty() {
        Ok(parsed)
    } else {
        Err(BatchError::parse(
            line,
            format!("{} takes no arguments", directive),
        ))
    }
}
