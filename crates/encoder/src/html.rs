//! HTML5 style sink (spec.md §4.I / §6): a `<!DOCTYPE html>` prologue, a
//! `<head>` built from the caller's fragment plus a `<meta charset>`, and
//! the document body wrapping the root element in `<div class="root-name">`
//! (spec.md §4 "Supplemented features").

use ligature_alloc::Encoding;

use crate::escape::xml_escape;
use crate::tree::{Atomic, EncNode};

fn render_member(out: &mut String, name: &str, node: &EncNode) {
    if let EncNode::Struct(children) = node {
        if !children.is_empty() && children.iter().all(|(n, _)| n.is_none()) {
            for (_, child) in children {
                render_member(out, name, child);
            }
            return;
        }
    }
    out.push_str(&format!(r#"<div class="{}">"#, xml_escape(name)));
    match node {
        EncNode::Atomic(a) => out.push_str(&xml_escape(&a.as_display_string())),
        EncNode::Struct(children) => render_children(out, children),
    }
    out.push_str("</div>");
}

fn render_children(out: &mut String, children: &[(Option<String>, EncNode)]) {
    for (name, node) in children {
        match name {
            Some(n) => render_member(out, n, node),
            None => match node {
                EncNode::Atomic(a) => out.push_str(&xml_escape(&a.as_display_string())),
                EncNode::Struct(inner) => render_children(out, inner),
            },
        }
    }
}

/// Render a full HTML5 document. `html_head` is the caller-supplied
/// `<head>` fragment (spec.md §6's `RequestAttributes::html_head`); the body
/// is always `<div class="root-name">...</div>`.
pub fn render(tree: &EncNode, root_name: &str, encoding: Encoding, html_head: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    out.push_str(&format!(r#"<meta charset="{}">"#, encoding.canonical_name()));
    out.push('\n');
    if let Some(head) = html_head {
        out.push_str(head);
        out.push('\n');
    }
    out.push_str("</head>\n<body>\n");
    render_member(&mut out, root_name, tree);
    out.push_str("\n</body>\n</html>");
    out
}
