//! XML style sink (spec.md §4.I / §6): a `<?xml ...?>` prologue, a
//! configurable root element, and standard entity escaping.

use ligature_alloc::Encoding;

use crate::escape::xml_escape;
use crate::tree::{Atomic, EncNode};

fn push_indent(out: &mut String, beautify: bool, depth: usize) {
    if beautify {
        out.push('\n');
        out.push_str(&"  ".repeat(depth));
    }
}

/// Render one named member. An all-unnamed-children `Struct` (an array, per
/// spec.md §4.D's ingestion rule in reverse) repeats `name` as the tag for
/// every element instead of wrapping them in a synthetic container.
fn render_member(out: &mut String, name: &str, node: &EncNode, depth: usize, beautify: bool) {
    if let EncNode::Struct(children) = node {
        if !children.is_empty() && children.iter().all(|(n, _)| n.is_none()) {
            for (_, child) in children {
                render_member(out, name, child, depth, beautify);
            }
            return;
        }
    }
    push_indent(out, beautify, depth);
    match node {
        EncNode::Atomic(a) => {
            out.push('<');
            out.push_str(name);
            out.push('>');
            out.push_str(&xml_escape(&a.as_display_string()));
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        EncNode::Struct(children) => {
            out.push('<');
            out.push_str(name);
            out.push('>');
            render_children(out, children, depth + 1, beautify);
            push_indent(out, beautify, depth);
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }
}

fn render_children(out: &mut String, children: &[(Option<String>, EncNode)], depth: usize, beautify: bool) {
    for (name, node) in children {
        match name {
            Some(n) => render_member(out, n, node, depth, beautify),
            None => {
                push_indent(out, beautify, depth);
                match node {
                    EncNode::Atomic(a) => out.push_str(&xml_escape(&a.as_display_string())),
                    EncNode::Struct(inner) => render_children(out, inner, depth, beautify),
                }
            }
        }
    }
}

/// Render `tree` as a complete XML document: prologue + `root_name` root
/// element wrapping the tree's children.
pub fn render(tree: &EncNode, root_name: &str, encoding: Encoding, beautify: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!(r#"<?xml version="1.0" encoding="{}"?>"#, encoding.canonical_name()));
    match tree {
        EncNode::Atomic(a) => {
            out.push('<');
            out.push_str(root_name);
            out.push('>');
            out.push_str(&xml_escape(&a.as_display_string()));
            out.push_str("</");
            out.push_str(root_name);
            out.push('>');
        }
        EncNode::Struct(children) => {
            out.push('<');
            out.push_str(root_name);
            out.push('>');
            render_children(&mut out, children, 1, beautify);
            push_indent(&mut out, beautify, 0);
            out.push_str("</");
            out.push_str(root_name);
            out.push('>');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_prologue_and_root_element() {
        let tree = EncNode::Struct(vec![("title".to_string().into(), EncNode::Atomic(Atomic::String("Hi".into())))]);
        let xml = render(&tree, "result", Encoding::Utf8, false);
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains("<title>Hi</title>"));
        assert!(xml.ends_with("</result>"));
    }

    #[test]
    fn array_member_repeats_its_tag() {
        let tree = EncNode::Struct(vec![(
            "tags".to_string().into(),
            EncNode::Struct(vec![
                (None, EncNode::Atomic(Atomic::String("a".into()))),
                (None, EncNode::Atomic(Atomic::String("b".into()))),
            ]),
        )]);
        let xml = render(&tree, "result", Encoding::Utf8, false);
        assert_eq!(xml.matches("<tags>").count(), 2);
    }

    #[test]
    fn content_is_entity_escaped() {
        let tree = EncNode::Atomic(Atomic::String("<a & b>".into()));
        let xml = render(&tree, "r", Encoding::Utf8, false);
        assert!(xml.contains("&lt;a &amp; b&gt;"));
    }
}
