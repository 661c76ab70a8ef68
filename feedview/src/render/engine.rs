//! Template engines.
//!
//! The pipeline treats template expansion as a pure function of a template
//! string and a JSON context. [`ExpressionTemplateEngine`] implements the
//! interpolation subset of the `<%= %>` template dialect that view
//! definitions are written in.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::errors::TemplateError;

/// Expands a template against a context.
pub trait TemplateEngine: Send + Sync {
    /// Renders `template` with `context`.
    fn render(&self, template: &str, context: &Value) -> Result<String, TemplateError>;
}

#[allow(clippy::expect_used)]
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<%([=-]?)(.*?)%>").expect("tag pattern compiles"));

#[allow(clippy::expect_used)]
static SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_$][A-Za-z0-9_$]*)((?:\[\d+\])*)$").expect("segment pattern compiles")
});

/// Interpolating engine for `<%= path %>` (raw) and `<%- path %>` (escaped).
///
/// Paths are dotted property chains with optional `[n]` indices, resolved
/// against the context. `length` on an array, string or object yields its
/// size. Missing properties are errors, as are evaluation blocks (`<% %>`),
/// which this engine does not execute.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionTemplateEngine;

impl ExpressionTemplateEngine {
    /// Creates a new engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for ExpressionTemplateEngine {
    fn render(&self, template: &str, context: &Value) -> Result<String, TemplateError> {
        let mut output = String::with_capacity(template.len());
        let mut tail = 0;

        for caps in TAG.captures_iter(template) {
            let (Some(whole), Some(flag), Some(expr)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            output.push_str(&template[tail..whole.start()]);
            tail = whole.end();

            let expr = expr.as_str().trim();
            let value = match flag.as_str() {
                "=" => stringify(&resolve(context, expr)?),
                "-" => escape_html(&stringify(&resolve(context, expr)?)),
                _ => {
                    return Err(TemplateError::new(format!(
                        "evaluation blocks are not supported: <%{expr}%>"
                    )))
                }
            };
            output.push_str(&value);
        }

        let rest = &template[tail..];
        if let Some(pos) = rest.find("<%") {
            return Err(TemplateError::new(format!(
                "unterminated tag at offset {}",
                tail + pos
            )));
        }
        output.push_str(rest);
        Ok(output)
    }
}

enum Step<'a> {
    Property(&'a str),
    Index(usize),
}

fn parse_path(expr: &str) -> Result<Vec<Step<'_>>, TemplateError> {
    if expr.is_empty() {
        return Err(TemplateError::new("empty expression"));
    }
    let mut steps = Vec::new();
    for segment in expr.split('.') {
        let caps = SEGMENT
            .captures(segment.trim())
            .ok_or_else(|| TemplateError::new(format!("unsupported expression '{expr}'")))?;
        if let Some(name) = caps.get(1) {
            steps.push(Step::Property(name.as_str()));
        }
        if let Some(indices) = caps.get(2) {
            for index in indices.as_str().split(['[', ']']).filter(|s| !s.is_empty()) {
                let index = index
                    .parse()
                    .map_err(|_| TemplateError::new(format!("bad index in '{expr}'")))?;
                steps.push(Step::Index(index));
            }
        }
    }
    Ok(steps)
}

fn resolve(context: &Value, expr: &str) -> Result<Value, TemplateError> {
    let steps = parse_path(expr)?;
    let mut current = context;

    for (position, step) in steps.iter().enumerate() {
        let is_last = position + 1 == steps.len();
        current = match (step, current) {
            (Step::Property(name), Value::Object(map)) if map.contains_key(*name) => &map[*name],
            (Step::Property("length"), Value::Array(items)) if is_last => {
                return Ok(Value::from(items.len()))
            }
            (Step::Property("length"), Value::String(s)) if is_last => {
                return Ok(Value::from(s.chars().count()))
            }
            (Step::Property("length"), Value::Object(map)) if is_last => {
                return Ok(Value::from(map.len()))
            }
            (Step::Property(name), _) => {
                return Err(TemplateError::new(format!(
                    "'{expr}' references missing field '{name}'"
                )))
            }
            (Step::Index(index), Value::Array(items)) => items.get(*index).ok_or_else(|| {
                TemplateError::new(format!("'{expr}' index {index} is out of range"))
            })?,
            (Step::Index(index), _) => {
                return Err(TemplateError::new(format!(
                    "'{expr}' indexes a non-array with [{index}]"
                )))
            }
        };
    }

    Ok(current.clone())
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
