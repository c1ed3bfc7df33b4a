// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input-template resolution.
//!
//! A template value is literal JSON, except strings containing
//! `${scope.key[.key…]}` references. The scope is `initial`, the id of a
//! previously completed step, or a named workflow variable. Resolution is a
//! pure function of (template, initial context, result cache, variables);
//! a missing reference resolves to JSON null.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Lookup sources for one resolution pass.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub initial: &'a Value,
    pub results: &'a HashMap<String, Value>,
    pub variables: &'a HashMap<String, Value>,
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r"\$\{([A-Za-z0-9_.-]+)\}") {
        Ok(re) => re,
        // Literal pattern; cannot fail.
        Err(_) => unreachable!("reference pattern is a valid literal"),
    })
}

/// Resolve every reference in `template`, recursing through objects and
/// arrays.
pub fn resolve_template(template: &Value, ctx: &TemplateContext<'_>) -> Value {
    match template {
        Value::String(s) => resolve_string(s, ctx),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), resolve_template(v, ctx))).collect())
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| resolve_template(item, ctx)).collect())
        }
        other => other.clone(),
    }
}

fn resolve_string(s: &str, ctx: &TemplateContext<'_>) -> Value {
    let re = reference_re();

    // A string that is exactly one reference takes the referenced value
    // verbatim, preserving its JSON type.
    if let Some(captures) = re.captures(s) {
        if let Some(whole) = captures.get(0) {
            if whole.start() == 0 && whole.end() == s.len() {
                return lookup(&captures[1], ctx);
            }
        }
    }

    // Otherwise substitute each reference's string rendering in place.
    if !re.is_match(s) {
        return Value::String(s.to_string());
    }
    let replaced = re.replace_all(s, |captures: &regex::Captures<'_>| {
        render(&lookup(&captures[1], ctx))
    });
    Value::String(replaced.into_owned())
}

fn lookup(reference: &str, ctx: &TemplateContext<'_>) -> Value {
    let mut parts = reference.split('.');
    let Some(scope) = parts.next() else {
        return Value::Null;
    };
    let rest: Vec<&str> = parts.collect();

    let root: Option<&Value> = if scope == "initial" {
        Some(ctx.initial)
    } else if let Some(result) = ctx.results.get(scope) {
        Some(result)
    } else {
        ctx.variables.get(scope)
    };
    let Some(mut current) = root else {
        return Value::Null;
    };

    for key in rest {
        let next = match current {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
