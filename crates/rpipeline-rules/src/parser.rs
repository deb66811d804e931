//! YAML -> rule document parser.
//!
//! Handles:
//! - Single and multi-document YAML (`---` separated, one rule per document)
//! - Expression nodes (literals, fields, variables, calls, operators)
//! - Directory-based rule collection loading

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::ast::*;
use crate::error::{Result, RuleParseError};

const RULE_KEYS: &[&str] = &["title", "id", "description", "when", "then"];

// =============================================================================
// Public API
// =============================================================================

/// Parse a YAML string containing one or more rule documents.
///
/// A document that fails to parse is recorded in
/// [`RuleCollection::errors`] and the remaining documents still load.
pub fn parse_rule_yaml(yaml: &str) -> Result<RuleCollection> {
    let mut collection = RuleCollection::new();

    for doc in serde_yaml::Deserializer::from_str(yaml) {
        let value = match Value::deserialize(doc) {
            Ok(v) => v,
            Err(e) => {
                collection.errors.push(format!("YAML parse error: {e}"));
                continue;
            }
        };

        // `---` at the end of a file produces an empty document
        if value.is_null() {
            continue;
        }

        match parse_rule_document(&value) {
            Ok(rule) => collection.rules.push(rule),
            Err(e) => collection.errors.push(e.to_string()),
        }
    }

    Ok(collection)
}

/// Parse rule documents from a file.
pub fn parse_rule_file(path: &Path) -> Result<RuleCollection> {
    let content = std::fs::read_to_string(path)?;
    parse_rule_yaml(&content)
}

/// Parse all rule YAML files from a directory (recursively).
///
/// Files are visited in name order so the resulting rule order is stable.
pub fn parse_rule_directory(dir: &Path) -> Result<RuleCollection> {
    let mut collection = RuleCollection::new();

    fn walk(dir: &Path, collection: &mut RuleCollection) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                walk(&path, collection)?;
            } else if is_rule_file(&path) {
                match parse_rule_file(&path) {
                    Ok(sub) => collection.extend(sub),
                    Err(e) => collection.errors.push(format!("{}: {e}", path.display())),
                }
            }
        }
        Ok(())
    }

    walk(dir, &mut collection)?;
    Ok(collection)
}

/// Parse a file or a directory, whichever `path` points to.
pub fn parse_rule_path(path: &Path) -> Result<RuleCollection> {
    if path.is_dir() {
        parse_rule_directory(path)
    } else {
        parse_rule_file(path)
    }
}

pub(crate) fn is_rule_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml" | "yaml")
    )
}

// =============================================================================
// Rule documents
// =============================================================================

/// Parse a single YAML value into a [`RuleDocument`].
pub fn parse_rule_document(value: &Value) -> Result<RuleDocument> {
    let m = value
        .as_mapping()
        .ok_or_else(|| RuleParseError::InvalidRule("Expected a YAML mapping".into()))?;

    for key in m.keys() {
        let key = key.as_str().unwrap_or("");
        if !RULE_KEYS.contains(&key) {
            return Err(RuleParseError::InvalidRule(format!("unknown key '{key}'")));
        }
    }

    let title = get_str(m, "title")
        .ok_or_else(|| RuleParseError::MissingField("title".into()))?
        .to_string();

    let condition = match m.get(val_key("when")) {
        Some(v) => parse_expr(v)?,
        None => ExprNode::bool(true),
    };

    let statements = match m.get(val_key("then")) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(seq)) => seq.iter().map(parse_expr).collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(RuleParseError::InvalidRule(format!(
                "'then' of rule '{title}' must be a list of statements"
            )));
        }
    };

    Ok(RuleDocument {
        title,
        id: get_str(m, "id").map(|s| s.to_string()),
        description: get_str(m, "description").map(|s| s.to_string()),
        condition,
        statements,
    })
}

// =============================================================================
// Expression nodes
// =============================================================================

/// Parse one expression node.
///
/// Scalars are literals; mappings are keyed by the node kind
/// (`call`, `field`, `var`, `let`, `not`, `and`, `or`, `map`, or a
/// comparison operator such as `eq`).
pub fn parse_expr(value: &Value) -> Result<ExprNode> {
    match value {
        Value::Null => Ok(ExprNode::Literal(Literal::Null)),
        Value::Bool(b) => Ok(ExprNode::Literal(Literal::Bool(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ExprNode::Literal(Literal::Integer(i)))
            } else if let Some(f) = n.as_f64() {
                Ok(ExprNode::Literal(Literal::Float(f)))
            } else {
                Err(RuleParseError::InvalidExpression(format!(
                    "number out of range: {n}"
                )))
            }
        }
        Value::String(s) => Ok(ExprNode::Literal(Literal::String(s.clone()))),
        Value::Sequence(_) => Err(RuleParseError::InvalidExpression(
            "a bare list is not an expression".into(),
        )),
        Value::Tagged(tagged) => Err(RuleParseError::InvalidExpression(format!(
            "unsupported YAML tag {}",
            tagged.tag
        ))),
        Value::Mapping(m) => parse_node(m),
    }
}

fn parse_node(m: &Mapping) -> Result<ExprNode> {
    if m.contains_key(val_key("call")) {
        expect_keys(m, &["call", "args"])?;
        let function = get_str(m, "call")
            .ok_or_else(|| RuleParseError::InvalidExpression("'call' must name a function".into()))?
            .to_string();
        let args = match m.get(val_key("args")) {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Mapping(args)) => parse_named_nodes(args, &function)?,
            Some(_) => {
                return Err(RuleParseError::InvalidExpression(format!(
                    "arguments of '{function}' must be a mapping"
                )));
            }
        };
        return Ok(ExprNode::Call { function, args });
    }

    if m.contains_key(val_key("let")) {
        expect_keys(m, &["let", "value"])?;
        let name = identifier(m, "let")?;
        let value = m.get(val_key("value")).ok_or_else(|| {
            RuleParseError::InvalidExpression(format!("'let {name}' needs a value"))
        })?;
        return Ok(ExprNode::Let {
            name,
            value: Box::new(parse_expr(value)?),
        });
    }

    if m.len() != 1 {
        return Err(RuleParseError::InvalidExpression(format!(
            "expected a single node key, found {}",
            join_keys(m)
        )));
    }

    let Some((key, value)) = m.iter().next() else {
        return Err(RuleParseError::InvalidExpression("empty mapping".into()));
    };
    let key = key.as_str().unwrap_or("");

    match key {
        "field" => Ok(ExprNode::Field(identifier(m, "field")?)),
        "var" => Ok(ExprNode::Variable(identifier(m, "var")?)),
        "not" => Ok(ExprNode::Not(Box::new(parse_expr(value)?))),
        "and" => Ok(ExprNode::And(parse_operands(key, value)?)),
        "or" => Ok(ExprNode::Or(parse_operands(key, value)?)),
        "map" => match value {
            Value::Mapping(entries) => Ok(ExprNode::Map(parse_named_nodes(entries, "map")?)),
            _ => Err(RuleParseError::InvalidExpression(
                "'map' must be a mapping".into(),
            )),
        },
        other => {
            let op = ComparisonOp::from_str(other).ok_or_else(|| {
                RuleParseError::InvalidExpression(format!("unknown node kind '{other}'"))
            })?;
            let mut operands = parse_operands(other, value)?;
            if operands.len() != 2 {
                return Err(RuleParseError::InvalidExpression(format!(
                    "'{other}' takes exactly two operands, got {}",
                    operands.len()
                )));
            }
            let rhs = operands.pop();
            let lhs = operands.pop();
            match (lhs, rhs) {
                (Some(lhs), Some(rhs)) => Ok(ExprNode::Compare {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }),
                _ => Err(RuleParseError::InvalidExpression(format!(
                    "'{other}' takes exactly two operands"
                ))),
            }
        }
    }
}

fn parse_operands(kind: &str, value: &Value) -> Result<Vec<ExprNode>> {
    let seq = value.as_sequence().ok_or_else(|| {
        RuleParseError::InvalidExpression(format!("'{kind}' must be a list of operands"))
    })?;
    if seq.is_empty() {
        return Err(RuleParseError::InvalidExpression(format!(
            "'{kind}' must not be empty"
        )));
    }
    seq.iter().map(parse_expr).collect()
}

fn parse_named_nodes(m: &Mapping, owner: &str) -> Result<BTreeMap<String, ExprNode>> {
    let mut nodes = BTreeMap::new();
    for (k, v) in m {
        let name = k.as_str().ok_or_else(|| {
            RuleParseError::InvalidExpression(format!("keys of '{owner}' must be strings"))
        })?;
        nodes.insert(name.to_string(), parse_expr(v)?);
    }
    Ok(nodes)
}

fn identifier(m: &Mapping, key: &str) -> Result<String> {
    match get_str(m, key) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(RuleParseError::InvalidExpression(format!(
            "'{key}' must be a non-empty name"
        ))),
    }
}

fn expect_keys(m: &Mapping, allowed: &[&str]) -> Result<()> {
    for key in m.keys() {
        let key = key.as_str().unwrap_or("");
        if !allowed.contains(&key) {
            return Err(RuleParseError::InvalidExpression(format!(
                "unexpected key '{key}' next to '{}'",
                allowed[0]
            )));
        }
    }
    Ok(())
}

fn join_keys(m: &Mapping) -> String {
    m.keys()
        .map(|k| k.as_str().unwrap_or("?"))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Helpers
// =============================================================================

fn val_key(s: &str) -> Value {
    Value::String(s.to_string())
}

fn get_str<'a>(m: &'a Mapping, key: &str) -> Option<&'a str> {
    m.get(val_key(key)).and_then(|v| v.as_str())
}
