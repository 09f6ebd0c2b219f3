use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::DaliError;

lazy_static! {
    static ref MACRO_RX: Regex =
        Regex::new(r"^\s*##([0-9a-zA-Z_\-]+)\s*\((.*)\)\s*$").unwrap();
}

/// A macro handler receives its raw argument list and the document root,
/// and produces the replacement value for the leaf.
type MacroFn = fn(&[&str], &Value) -> Result<Value, DaliError>;

lazy_static! {
    // Registry of macro identifiers to handlers. New macros plug in here
    // without touching the traversal.
    static ref MACROS: HashMap<&'static str, MacroFn> = {
        let mut table: HashMap<&'static str, MacroFn> = HashMap::new();
        table.insert("length", macro_length);
        table
    };
}

/// `##length(ref)` resolves its argument as a reference and yields the
/// element count of the resolved collection.
fn macro_length(args: &[&str], root: &Value) -> Result<Value, DaliError> {
    let target = args
        .first()
        .ok_or_else(|| DaliError::UnresolvedReference("##length with no argument".to_string()))?;
    let resolved = expand_reference(target, root)?;
    let count = match &resolved {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(text) => text.len(),
        _ => {
            return Err(DaliError::UnresolvedReference(format!(
                "##length target {} is not a collection",
                target
            )))
        }
    };
    Ok(Value::from(count as u64))
}

/// Rewrites every string leaf of the document in place, expanding macro
/// invocations and `$$` references. Lookups go against a snapshot of the
/// root taken before the walk, so the result does not depend on traversal
/// order.
pub fn resolve_document(doc: &mut Value) -> Result<(), DaliError> {
    let root = doc.clone();
    walk(doc, &root)
}

fn walk(node: &mut Value, root: &Value) -> Result<(), DaliError> {
    match node {
        Value::Array(items) => {
            for item in items.iter_mut() {
                resolve_node(item, root)?;
            }
        }
        Value::Object(map) => {
            for (_, value) in map.iter_mut() {
                resolve_node(value, root)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn resolve_node(node: &mut Value, root: &Value) -> Result<(), DaliError> {
    if node.is_array() || node.is_object() {
        return walk(node, root);
    }
    if let Value::String(leaf) = node {
        let resolved = resolve_leaf(leaf, root)?;
        *node = resolved;
    }
    Ok(())
}

/// Expands a single string leaf. Both micro-languages are matched against
/// the original leaf text; when a leaf reads as a reference, the reference
/// result wins over any macro expansion.
fn resolve_leaf(leaf: &str, root: &Value) -> Result<Value, DaliError> {
    let expanded = expand_macros(leaf, root)?;
    if is_reference(leaf) {
        return expand_reference(leaf, root);
    }
    Ok(expanded)
}

fn is_reference(text: &str) -> bool {
    text.split('.').next().is_some_and(|head| head.starts_with("$$"))
}

/// Resolves a `$$name.path.segments` token by indexing into the document.
/// Any missing key along the path is fatal.
fn expand_reference(token: &str, root: &Value) -> Result<Value, DaliError> {
    let token = token.trim();
    let mut parts = token.split('.');
    let head = parts.next().unwrap_or("");
    if !head.starts_with("$$") {
        return Err(DaliError::UnresolvedReference(token.to_string()));
    }

    let key = &head[2..];
    let mut current = root
        .get(key)
        .ok_or_else(|| DaliError::UnresolvedReference(token.to_string()))?;
    debug!("found {} as top level key", key);

    for segment in parts {
        current = current
            .as_object()
            .and_then(|map| map.get(segment))
            .ok_or_else(|| DaliError::UnresolvedReference(token.to_string()))?;
    }
    Ok(current.clone())
}

/// Expands a full-string macro invocation, dispatching through the
/// registry. Text that is not a macro, or names an unregistered macro,
/// passes through unchanged.
fn expand_macros(leaf: &str, root: &Value) -> Result<Value, DaliError> {
    let Some(caps) = MACRO_RX.captures(leaf) else {
        return Ok(Value::String(leaf.to_string()));
    };
    let identifier = &caps[1];
    let args: Vec<&str> = if caps[2].is_empty() {
        Vec::new()
    } else {
        caps[2].split(',').map(str::trim).collect()
    };

    match MACROS.get(identifier) {
        Some(handler) => handler(&args, root),
        None => Ok(Value::String(leaf.to_string())),
    }
}
