//! The shared recursive walker spec.md §4.I (and the design note in §9)
//! describes: one pass over a [`Serialization`] (or a bare [`ValueVariant`])
//! builds an intermediate [`EncNode`] tree that every style sink then
//! renders without needing to understand the bracket grammar itself.

use std::collections::HashMap;

use ligature_alloc::Allocator;
use ligature_errors::{constants::MAX_ITERATOR_EXPANSION, Error, ErrorCode, Result};
use ligature_value::serialization::Tag;
use ligature_value::{Serialization, SerializationIter, StructInterface, ValueVariant};

/// A rendered atomic leaf. Kept typed (rather than pre-stringified) so each
/// sink can apply its own number/string/bool formatting rules (JSON numbers
/// unquoted, XML/text always textual, ...).
#[derive(Debug, Clone)]
pub enum Atomic {
    Void,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl Atomic {
    /// The rendering every non-JSON sink uses uniformly.
    pub fn as_display_string(&self) -> String {
        match self {
            Atomic::Void => String::new(),
            Atomic::Bool(b) => b.to_string(),
            Atomic::Int(i) => i.to_string(),
            Atomic::Double(d) => d.to_string(),
            Atomic::String(s) => s.clone(),
        }
    }
}

/// One node of the tree a [`Serialization`] is flattened into.
#[derive(Debug, Clone)]
pub enum EncNode {
    Atomic(Atomic),
    /// Named or unnamed children, in document order. A child with `name ==
    /// None` marks an array element; see the style sinks for how mixed/
    /// all-`None` runs render as arrays.
    Struct(Vec<(Option<String>, EncNode)>),
}

/// Build the tree rooted at `ser`, as if `ser`'s own node list were already
/// inside an open bracket (there is no synthetic top-level name).
pub fn build_tree<'a>(
    ser: &Serialization<'a>,
    alloc: &'a Allocator,
    structs: &HashMap<u32, StructInterface>,
    max_depth: usize,
) -> Result<EncNode> {
    build_tree_at(ser, alloc, structs, 0, max_depth)
}

fn build_tree_at<'a>(
    ser: &Serialization<'a>,
    alloc: &'a Allocator,
    structs: &HashMap<u32, StructInterface>,
    depth: usize,
    max_depth: usize,
) -> Result<EncNode> {
    let mut it = ser.iter();
    let children = build_children(&mut it, alloc, structs, None, depth, max_depth)?;
    Ok(EncNode::Struct(children))
}

fn build_children<'a>(
    it: &mut SerializationIter<'_, 'a>,
    alloc: &'a Allocator,
    structs: &HashMap<u32, StructInterface>,
    own_structid: Option<u32>,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<(Option<String>, EncNode)>> {
    if depth > max_depth {
        return Err(Error::new(ErrorCode::MaxRecursionDepthReached, "result tree nests too deep to render"));
    }

    let mut children: Vec<(Option<String>, EncNode)> = Vec::new();
    loop {
        match it.tag() {
            Tag::Close => {
                it.advance_one();
                break;
            }
            Tag::Name => {
                let name = it.name().map(str::to_string);
                it.advance_one();
                let node = build_one_value(it, alloc, structs, depth, max_depth)?;
                children.push((name, node));
            }
            Tag::Value | Tag::Open => {
                let node = build_one_value(it, alloc, structs, depth, max_depth)?;
                children.push((None, node));
            }
        }
    }

    if let Some(id) = own_structid {
        if children.iter().all(|(name, _)| name.is_none()) && !children.is_empty() {
            let iface = structs.get(&id).ok_or_else(|| {
                Error::new(
                    ErrorCode::MissingStructureDescription,
                    format!("struct id {id} has no registered StructInterface and its block carries no Name nodes"),
                )
            })?;
            for (i, (name, _)) in children.iter_mut().enumerate() {
                *name = iface.name_of(i).map(str::to_string);
            }
        }
    }

    Ok(children)
}

/// Consume one `Value` or `Open ... Close` element at the cursor and return
/// its tree node, expanding nested `Serialization`/`Iterator` payloads.
fn build_one_value<'a>(
    it: &mut SerializationIter<'_, 'a>,
    alloc: &'a Allocator,
    structs: &HashMap<u32, StructInterface>,
    depth: usize,
    max_depth: usize,
) -> Result<EncNode> {
    match it.tag() {
        Tag::Open => {
            let structid = it.structid();
            it.advance_one();
            let children = build_children(it, alloc, structs, structid, depth + 1, max_depth)?;
            Ok(EncNode::Struct(children))
        }
        Tag::Value => {
            let value = it
                .value()
                .ok_or_else(|| Error::new(ErrorCode::LogicError, "Value node missing payload"))?
                .clone();
            it.advance_one();
            value_to_node(&value, alloc, structs, depth, max_depth)
        }
        Tag::Close => Err(Error::new(ErrorCode::SyntaxError, "Name not followed by a value")),
        Tag::Name => Err(Error::new(ErrorCode::SyntaxError, "unexpected Name following Name")),
    }
}

fn value_to_node<'a>(
    value: &ValueVariant<'a>,
    alloc: &'a Allocator,
    structs: &HashMap<u32, StructInterface>,
    depth: usize,
    max_depth: usize,
) -> Result<EncNode> {
    match value {
        ValueVariant::Void => Ok(EncNode::Atomic(Atomic::Void)),
        ValueVariant::Bool(b) => Ok(EncNode::Atomic(Atomic::Bool(*b))),
        ValueVariant::Int(i) => Ok(EncNode::Atomic(Atomic::Int(*i))),
        ValueVariant::Double(d) => Ok(EncNode::Atomic(Atomic::Double(*d))),
        ValueVariant::String(_) => Ok(EncNode::Atomic(Atomic::String(value.tostring(alloc)?.to_string()))),
        ValueVariant::Serialization(sub) => build_tree_at(sub, alloc, structs, depth + 1, max_depth),
        ValueVariant::Iterator(handle) => {
            let mut elements = Vec::new();
            let mut expanded = 0usize;
            loop {
                if expanded >= MAX_ITERATOR_EXPANSION {
                    break;
                }
                match handle.next_tuple()? {
                    None => break,
                    Some(fields) => {
                        let mut members = Vec::with_capacity(fields.len());
                        for field in &fields {
                            members.push((field.name.clone(), EncNode::Atomic(owned_atom(&field.value, alloc))));
                        }
                        elements.push((None, EncNode::Struct(members)));
                        expanded += 1;
                    }
                }
            }
            Ok(EncNode::Struct(elements))
        }
        ValueVariant::HostObject(_) => Err(Error::new(
            ErrorCode::TypeError,
            "cannot render a host object directly; bind it to a named result instead",
        )),
    }
}

fn owned_atom(atom: &ligature_value::OwnedAtom, _alloc: &Allocator) -> Atomic {
    use ligature_value::OwnedAtom::*;
    match atom {
        Void => Atomic::Void,
        Double(d) => Atomic::Double(*d),
        Int(i) => Atomic::Int(*i),
        Bool(b) => Atomic::Bool(*b),
        String(bytes, _enc) => Atomic::String(String::from_utf8_lossy(bytes).into_owned()),
        HostObject(_) => Atomic::Void,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligature_alloc::Encoding;
    use ligature_value::StringValue;

    #[test]
    fn flat_struct_builds_named_children() {
        let alloc = Allocator::new();
        let ser = Serialization::new();
        ser.push_name(alloc.copy_string("a"));
        ser.push_value(ValueVariant::Int(1));

        let tree = build_tree(&ser, &alloc, &HashMap::new(), 200).unwrap();
        let EncNode::Struct(children) = tree else { panic!("expected struct") };
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0.as_deref(), Some("a"));
    }

    #[test]
    fn unnamed_siblings_stay_unnamed_without_a_structid() {
        let alloc = Allocator::new();
        let ser = Serialization::new();
        ser.push_value(ValueVariant::Int(1));
        ser.push_value(ValueVariant::Int(2));

        let tree = build_tree(&ser, &alloc, &HashMap::new(), 200).unwrap();
        let EncNode::Struct(children) = tree else { panic!("expected struct") };
        assert!(children.iter().all(|(n, _)| n.is_none()));
    }

    #[test]
    fn structid_without_an_interface_is_missing_structure_description() {
        let alloc = Allocator::new();
        let ser = Serialization::new();
        ser.push_open_struct(7);
        ser.push_value(ValueVariant::Int(1));
        ser.push_close();

        let err = build_tree(&ser, &alloc, &HashMap::new(), 200).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingStructureDescription);
    }

    #[test]
    fn structid_with_a_registered_interface_names_members_positionally() {
        let alloc = Allocator::new();
        let ser = Serialization::new();
        ser.push_open_struct(7);
        ser.push_value(ValueVariant::Int(1));
        ser.push_value(ValueVariant::String(StringValue::new(b"x", Encoding::Utf8)));
        ser.push_close();

        let mut structs = HashMap::new();
        structs.insert(7, StructInterface::new(vec!["id".to_string(), "name".to_string()]));
        let tree = build_tree(&ser, &alloc, &structs, 200).unwrap();
        let EncNode::Struct(outer) = tree else { panic!() };
        let EncNode::Struct(members) = &outer[0].1 else { panic!("expected struct member") };
        assert_eq!(members[0].0.as_deref(), Some("id"));
        assert_eq!(members[1].0.as_deref(), Some("name"));
    }
}
