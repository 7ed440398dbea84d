//! Deep-copying values across `Allocator` boundaries, as required when a
//! variable is captured into a context's private arena or a call result is
//! folded into a different scope than the one that produced it.
//!
//! Host objects and iterators are reference-counted handles, so "deep copy"
//! for them is a policy decision rather than a byte copy: `move_host_objects`
//! controls whether the destination allocator also retains a clone (tying
//! its lifetime to the destination) or whether the source allocator remains
//! the sole long-term owner.

use ligature_alloc::Allocator;
use ligature_errors::{constants::MAX_ITERATOR_EXPANSION, Error, ErrorCode, Result};

use crate::host::{OwnedAtom, OwnedField};
use crate::serialization::Serialization;
use crate::value::{StringValue, ValueVariant};

/// Deep-copy an atomic value (not `Serialization` or `Iterator`) into
/// `alloc`. Strings are re-copied byte-for-byte in their declared encoding;
/// host objects are cloned, and retained by `alloc` when `move_host_objects`
/// is set.
pub fn deepcopy_atomic<'dst>(
    value: &ValueVariant<'_>,
    alloc: &'dst Allocator,
    move_host_objects: bool,
) -> Result<ValueVariant<'dst>> {
    match value {
        ValueVariant::Void => Ok(ValueVariant::Void),
        ValueVariant::Double(d) => Ok(ValueVariant::Double(*d)),
        ValueVariant::Int(i) => Ok(ValueVariant::Int(*i)),
        ValueVariant::Bool(b) => Ok(ValueVariant::Bool(*b)),
        ValueVariant::String(s) => {
            let copied = alloc.copy_bytes(s.bytes);
            Ok(ValueVariant::String(StringValue::new(copied, s.encoding)))
        }
        ValueVariant::HostObject(host) => {
            let cloned = host.clone();
            if move_host_objects {
                alloc.retain(cloned.clone());
            }
            Ok(ValueVariant::HostObject(cloned))
        }
        other => Err(Error::new(
            ErrorCode::LogicError,
            format!("{} is not an atomic value", other.type_name()),
        )),
    }
}

fn owned_atom_to_value<'dst>(atom: &OwnedAtom, alloc: &'dst Allocator) -> ValueVariant<'dst> {
    match atom {
        OwnedAtom::Void => ValueVariant::Void,
        OwnedAtom::Double(d) => ValueVariant::Double(*d),
        OwnedAtom::Int(i) => ValueVariant::Int(*i),
        OwnedAtom::Bool(b) => ValueVariant::Bool(*b),
        OwnedAtom::String(bytes, encoding) => {
            ValueVariant::String(StringValue::new(alloc.copy_bytes(bytes), *encoding))
        }
        OwnedAtom::HostObject(host) => ValueVariant::HostObject(host.clone()),
    }
}

/// Deep-copy every node of `src` into `dest`, an already-constructed
/// `Serialization` the caller owns for at least `'dst`. Nested
/// `Serialization` values are inlined as `Open ... Close` blocks; iterators
/// are expanded into the same shape, bounded by `MAX_ITERATOR_EXPANSION`.
pub fn deep_copy_nodes<'dst>(
    src: &Serialization<'_>,
    dest: &Serialization<'dst>,
    alloc: &'dst Allocator,
    move_host_objects: bool,
) -> Result<()> {
    use crate::serialization::Tag;

    let mut it = src.iter();
    while !it.eof() {
        match it.tag() {
            Tag::Open => match it.structid() {
                Some(id) => dest.push_open_struct(id),
                None => dest.push_open(),
            },
            Tag::Close => dest.push_close(),
            Tag::Name => {
                let name = it.name().unwrap_or("");
                dest.push_name(alloc.copy_string(name));
            }
            Tag::Value => {
                let v = it
                    .value()
                    .ok_or_else(|| Error::new(ErrorCode::LogicError, "Value node missing payload"))?;
                copy_value_node(v, dest, alloc, move_host_objects)?;
            }
        }
        it.skip()?;
    }
    Ok(())
}

fn copy_value_node<'dst>(
    value: &ValueVariant<'_>,
    dest: &Serialization<'dst>,
    alloc: &'dst Allocator,
    move_host_objects: bool,
) -> Result<()> {
    match value {
        ValueVariant::Serialization(sub) => {
            dest.push_open();
            deep_copy_nodes(sub, dest, alloc, move_host_objects)?;
            dest.push_close();
            Ok(())
        }
        ValueVariant::Iterator(handle) => {
            let mut expanded = 0usize;
            loop {
                if expanded >= MAX_ITERATOR_EXPANSION {
                    // A longer-than-cap iterator is truncated silently, not
                    // treated as an error: see the boundary-behavior property
                    // that bounds iterator expansion.
                    break;
                }
                match handle.next_tuple()? {
                    None => break,
                    Some(fields) => {
                        dest.push_open();
                        push_owned_fields(&fields, dest, alloc);
                        dest.push_close();
                        expanded += 1;
                    }
                }
            }
            Ok(())
        }
        atomic => {
            let copied = deepcopy_atomic(atomic, alloc, move_host_objects)?;
            dest.push_value(copied);
            Ok(())
        }
    }
}

fn push_owned_fields<'dst>(fields: &[OwnedField], dest: &Serialization<'dst>, alloc: &'dst Allocator) {
    for field in fields {
        if let Some(name) = &field.name {
            dest.push_name(alloc.copy_string(name));
        }
        dest.push_value(owned_atom_to_value(&field.value, alloc));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligature_alloc::Encoding;

    #[test]
    fn deepcopy_atomic_copies_strings_into_the_destination_arena() {
        let src_alloc = Allocator::new();
        let dst_alloc = Allocator::new();
        let bytes = src_alloc.copy_string("hello").as_bytes();
        let v = ValueVariant::String(StringValue::new(bytes, Encoding::Utf8));

        let copied = deepcopy_atomic(&v, &dst_alloc, false).unwrap();
        match copied {
            ValueVariant::String(s) => assert_eq!(s.bytes, b"hello"),
            _ => panic!("expected a string"),
        }
    }

    #[test]
    fn deep_copy_nodes_inlines_nested_serializations() {
        let alloc = Allocator::new();
        let inner = Serialization::new();
        inner.push_value(ValueVariant::Int(1));

        let outer = Serialization::new();
        outer.push_name(alloc.copy_string("items"));
        outer.push_value(ValueVariant::Serialization(&inner));

        let dest = Serialization::new();
        deep_copy_nodes(&outer, &dest, &alloc, false).unwrap();

        let mut it = dest.iter();
        assert_eq!(it.name(), Some("items"));
        it.skip().unwrap();
        assert_eq!(it.tag(), crate::serialization::Tag::Open);
        it.skip().unwrap();
        assert!(it.eof());
    }
}
