//! JSON style sink (spec.md §4.I / §6).

use crate::escape::json_escape;
use crate::tree::{Atomic, EncNode};

fn render_atomic(out: &mut String, atom: &Atomic) {
    match atom {
        Atomic::Void => out.push_str("null"),
        Atomic::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Atomic::Int(i) => out.push_str(&i.to_string()),
        Atomic::Double(d) => out.push_str(&d.to_string()),
        Atomic::String(s) => out.push_str(&json_escape(s)),
    }
}

fn render_node(out: &mut String, node: &EncNode) {
    match node {
        EncNode::Atomic(a) => render_atomic(out, a),
        EncNode::Struct(children) => render_struct(out, children),
    }
}

/// Children with an identical, non-`None` name collapse into one JSON array
/// value at that key; an all-`None`-named list renders as a bare JSON
/// array, matching the reverse of the JSON-ingestion array rule in
/// spec.md §4.D.
fn render_struct(out: &mut String, children: &[(Option<String>, EncNode)]) {
    if children.iter().all(|(name, _)| name.is_none()) {
        out.push('[');
        for (i, (_, node)) in children.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            render_node(out, node);
        }
        out.push(']');
        return;
    }

    out.push('{');
    let mut i = 0;
    let mut first_key = true;
    while i < children.len() {
        let name = children[i].0.clone();
        let mut j = i + 1;
        while j < children.len() && children[j].0 == name {
            j += 1;
        }
        if !first_key {
            out.push(',');
        }
        first_key = false;
        out.push_str(&json_escape(name.as_deref().unwrap_or("")));
        out.push(':');
        if j - i > 1 {
            out.push('[');
            for (k, (_, node)) in children[i..j].iter().enumerate() {
                if k > 0 {
                    out.push(',');
                }
                render_node(out, node);
            }
            out.push(']');
        } else {
            render_node(out, &children[i].1);
        }
        i = j;
    }
    out.push('}');
}

/// Render `tree` as the JSON body. `root_name`, if set, wraps the whole
/// document in a single-key object (spec.md §4.I / §6 "JSON: object with
/// optional single-key root").
pub fn render(tree: &EncNode, root_name: Option<&str>, beautify: bool) -> String {
    let mut compact = String::new();
    match root_name {
        Some(name) => {
            compact.push('{');
            compact.push_str(&json_escape(name));
            compact.push(':');
            render_node(&mut compact, tree);
            compact.push('}');
        }
        None => render_node(&mut compact, tree),
    }
    if beautify {
        beautify_json(&compact)
    } else {
        compact
    }
}

/// A minimal re-indenting pass over the compact rendering above -- the
/// bracket/ comma structure it produces is regular enough that a
/// string-scanning beautifier (rather than a second tree walk) is enough.
fn beautify_json(compact: &str) -> String {
    let mut out = String::with_capacity(compact.len() * 2);
    let mut depth = 0usize;
    let mut in_string = false;
    let mut chars = compact.chars().peekable();
    let indent = |d: usize| "  ".repeat(d);

    while let Some(c) = chars.next() {
        match c {
            '"' if !in_string => {
                in_string = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\\' if in_string => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '{' | '[' if !in_string => {
                out.push(c);
                let is_empty = matches!(chars.peek(), Some('}') | Some(']'));
                if !is_empty {
                    depth += 1;
                    out.push('\n');
                    out.push_str(&indent(depth));
                }
            }
            '}' | ']' if !in_string => {
                let was_empty = out.ends_with('{') || out.ends_with('[');
                if !was_empty {
                    depth = depth.saturating_sub(1);
                    out.push('\n');
                    out.push_str(&indent(depth));
                }
                out.push(c);
            }
            ',' if !in_string => {
                out.push(c);
                out.push('\n');
                out.push_str(&indent(depth));
            }
            ':' if !in_string => {
                out.push(c);
                out.push(' ');
            }
            other => out.push(other),
        }
    }
    out
}
