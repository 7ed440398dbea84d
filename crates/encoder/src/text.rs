//! Plain-text style sink: indented `key: value` form (spec.md §6), with the
//! concrete indentation/array rule from spec.md §4 "Supplemented features"
//! (`requestResult_text.cpp`): two spaces per nesting level, arrays as
//! repeated `key: value` lines rather than bracketed lists.

use crate::tree::{Atomic, EncNode};

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn render_member(out: &mut String, name: &str, node: &EncNode, depth: usize) {
    if let EncNode::Struct(children) = node {
        if !children.is_empty() && children.iter().all(|(n, _)| n.is_none()) {
            for (_, child) in children {
                render_member(out, name, child, depth);
            }
            return;
        }
    }
    match node {
        EncNode::Atomic(a) => {
            out.push_str(&indent(depth));
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&a.as_display_string());
            out.push('\n');
        }
        EncNode::Struct(children) => {
            out.push_str(&indent(depth));
            out.push_str(name);
            out.push_str(":\n");
            render_children(out, children, depth + 1);
        }
    }
}

fn render_children(out: &mut String, children: &[(Option<String>, EncNode)], depth: usize) {
    for (name, node) in children {
        match name {
            Some(n) => render_member(out, n, node, depth),
            None => match node {
                EncNode::Atomic(a) => {
                    out.push_str(&indent(depth));
                    out.push_str(&a.as_display_string());
                    out.push('\n');
                }
                EncNode::Struct(inner) => render_children(out, inner, depth),
            },
        }
    }
}

pub fn render(tree: &EncNode, root_name: Option<&str>) -> String {
    let mut out = String::new();
    match (root_name, tree) {
        (Some(name), node) => render_member(&mut out, name, node, 0),
        (None, EncNode::Struct(children)) => render_children(&mut out, children, 0),
        (None, EncNode::Atomic(a)) => out.push_str(&a.as_display_string()),
    }
    out.trim_end_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_structures_indent_two_spaces_per_level() {
        let tree = EncNode::Struct(vec![(
            "doc".to_string().into(),
            EncNode::Struct(vec![("title".to_string().into(), EncNode::Atomic(Atomic::String("Hi".into())))]),
        )]);
        let text = render(&tree, None);
        assert_eq!(text, "doc:\n  title: Hi");
    }

    #[test]
    fn arrays_render_as_repeated_lines() {
        let tree = EncNode::Struct(vec![(
            "tags".to_string().into(),
            EncNode::Struct(vec![
                (None, EncNode::Atomic(Atomic::String("a".into()))),
                (None, EncNode::Atomic(Atomic::String("b".into()))),
            ]),
        )]);
        let text = render(&tree, None);
        assert_eq!(text, "tags: a\ntags: b");
    }
}
