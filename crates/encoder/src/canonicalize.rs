//! Deterministic-output canonicalization (spec.md §4 "Supplemented
//! features", scenario 4 in §8): sort a struct's named children by key
//! before rendering, so key order in the source document never leaks into
//! the response. Array children (an all-`None`-named run) keep their
//! original order -- only object-like key ordering is made deterministic.

use crate::tree::EncNode;

pub fn canonicalize(node: EncNode) -> EncNode {
    match node {
        EncNode::Atomic(a) => EncNode::Atomic(a),
        EncNode::Struct(children) => {
            let mut canon: Vec<(Option<String>, EncNode)> =
                children.into_iter().map(|(name, child)| (name, canonicalize(child))).collect();
            if !canon.iter().all(|(name, _)| name.is_none()) {
                canon.sort_by(|a, b| a.0.cmp(&b.0));
            }
            EncNode::Struct(canon)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Atomic;

    #[test]
    fn sorts_unordered_keys_stably() {
        let tree = EncNode::Struct(vec![
            ("b".to_string().into(), EncNode::Atomic(Atomic::Int(1))),
            ("a".to_string().into(), EncNode::Atomic(Atomic::Int(2))),
            ("c".to_string().into(), EncNode::Atomic(Atomic::Int(3))),
        ]);
        let EncNode::Struct(sorted) = canonicalize(tree) else { panic!() };
        let names: Vec<_> = sorted.iter().map(|(n, _)| n.clone().unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn leaves_array_order_untouched() {
        let tree = EncNode::Struct(vec![
            (None, EncNode::Atomic(Atomic::Int(2))),
            (None, EncNode::Atomic(Atomic::Int(1))),
        ]);
        let EncNode::Struct(children) = canonicalize(tree) else { panic!() };
        assert!(matches!(children[0].1, EncNode::Atomic(Atomic::Int(2))));
    }
}
