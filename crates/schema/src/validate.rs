//! Drive a compiled schema over a document's linearized event stream,
//! validating structure and building a typed `Serialization` as spec.md
//! §4.E describes.

use ligature_alloc::{Allocator, Encoding};
use ligature_document::{ContentType, DocumentParser, EventKind};
use ligature_errors::{constants::MAX_RECURSION_DEPTH, Error, ErrorCode, Result};
use ligature_value::{double_to_int, parse_number, Number, Serialization, StringValue, ValueVariant};

use crate::dsl::{Field, FieldType};
use crate::SchemaMap;

/// One step of the flat stream `schema_parse` walks, reusing the document's
/// own event vocabulary so schema validation needs no separate parse pass.
#[derive(Debug, Clone)]
struct Ev {
    kind: EventKind,
    text: Option<String>,
}

/// One immediate child of a struct scope, with enough information to
/// recurse into it without re-scanning from the top each time.
enum ChildKind {
    /// An `Open .. Close` span; `start`/`end` bound the content between them
    /// (exclusive of both brackets).
    Element { start: usize, end: usize },
    Attribute { value: String },
    BareValue { value: String },
}

struct Child {
    name: String,
    kind: ChildKind,
}

fn find_matching_close(events: &[Ev], open_idx: usize) -> Result<usize> {
    let mut depth = 1usize;
    let mut i = open_idx + 1;
    while i < events.len() {
        match events[i].kind {
            EventKind::Open => depth += 1,
            EventKind::Close => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(Error::new(ErrorCode::UnexpectedEof, "unterminated element while validating against schema"))
}

/// Collect the immediate children of the scope starting at `start`, stopping
/// at the first `Close` that belongs to the enclosing scope (or at end of
/// input for the document root).
fn children_of(events: &[Ev], start: usize) -> Result<Vec<Child>> {
    let mut out = Vec::new();
    let mut i = start;
    loop {
        match events.get(i) {
            None => return Ok(out),
            Some(ev) => match ev.kind {
                EventKind::Close => return Ok(out),
                EventKind::Open => {
                    let name = ev.text.clone().unwrap_or_default();
                    let end = find_matching_close(events, i)?;
                    out.push(Child { name, kind: ChildKind::Element { start: i + 1, end } });
                    i = end + 1;
                }
                EventKind::AttributeName => {
                    let name = ev.text.clone().unwrap_or_default();
                    let value = events.get(i + 1).and_then(|v| v.text.clone()).unwrap_or_default();
                    out.push(Child { name, kind: ChildKind::Attribute { value } });
                    i += 2;
                }
                EventKind::Value => {
                    out.push(Child {
                        name: "#text".to_string(),
                        kind: ChildKind::BareValue { value: ev.text.clone().unwrap_or_default() },
                    });
                    i += 1;
                }
                EventKind::None => i += 1,
            },
        }
    }
}

fn atomic_text(events: &[Ev], child: &Child) -> Result<String> {
    match &child.kind {
        ChildKind::Attribute { value } | ChildKind::BareValue { value } => Ok(value.clone()),
        ChildKind::Element { start, end } => events[*start..*end]
            .iter()
            .find(|e| e.kind == EventKind::Value)
            .and_then(|e| e.text.clone())
            .ok_or_else(|| {
                Error::new(ErrorCode::AtomicValueExpected, format!("'{}' has no scalar value", child.name))
            }),
    }
}

fn push_atomic<'a>(ty: &FieldType, text: &str, alloc: &'a Allocator, dest: &Serialization<'a>) -> Result<()> {
    let value = match ty {
        FieldType::Integer => match parse_number(text)? {
            Number::Int(i) => ValueVariant::Int(i),
            Number::Double(d) => ValueVariant::Int(double_to_int(d)?),
        },
        FieldType::Float => match parse_number(text)? {
            Number::Int(i) => ValueVariant::Double(i as f64),
            Number::Double(d) => ValueVariant::Double(d),
        },
        FieldType::String => {
            let bytes = alloc.copy_string(text).as_bytes();
            ValueVariant::String(StringValue::new(bytes, Encoding::Utf8))
        }
        _ => unreachable!("push_atomic only called for primitive field types"),
    };
    dest.push_value(value);
    Ok(())
}

fn push_value<'a>(
    ty: &FieldType,
    events: &[Ev],
    child: &Child,
    map: &SchemaMap,
    alloc: &'a Allocator,
    dest: &Serialization<'a>,
    depth: usize,
) -> Result<()> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::new(ErrorCode::MaxRecursionDepthReached, "schema nesting too deep"));
    }
    match ty {
        FieldType::Integer | FieldType::Float | FieldType::String => {
            let text = atomic_text(events, child)?;
            push_atomic(ty, &text, alloc, dest)
        }
        FieldType::Struct(fields) => push_nested(fields, events, child, map, alloc, dest, depth),
        FieldType::Ref(name) => {
            let referenced = map
                .fields(name)
                .ok_or_else(|| Error::new(ErrorCode::AddressedItemNotFound, format!("unknown schema '{name}'")))?;
            push_nested(referenced, events, child, map, alloc, dest, depth)
        }
        FieldType::Array(_) => Err(Error::new(
            ErrorCode::LogicError,
            "nested arrays are not part of the schema grammar",
        )),
    }
}

fn push_nested<'a>(
    fields: &[Field],
    events: &[Ev],
    child: &Child,
    map: &SchemaMap,
    alloc: &'a Allocator,
    dest: &Serialization<'a>,
    depth: usize,
) -> Result<()> {
    match &child.kind {
        ChildKind::Element { start, end } => {
            let children = children_of(&events[..*end], *start)?;
            dest.push_open();
            validate_struct(fields, events, &children, map, alloc, dest, depth + 1)?;
            dest.push_close();
            Ok(())
        }
        _ => Err(Error::new(ErrorCode::TypeError, format!("'{}' must be a structure", child.name))),
    }
}

fn validate_struct<'a>(
    fields: &[Field],
    events: &[Ev],
    children: &[Child],
    map: &SchemaMap,
    alloc: &'a Allocator,
    dest: &Serialization<'a>,
    depth: usize,
) -> Result<()> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::new(ErrorCode::MaxRecursionDepthReached, "schema nesting too deep"));
    }
    for field in fields {
        let matches: Vec<&Child> = children.iter().filter(|c| c.name == field.name).collect();
        match &field.ty {
            FieldType::Array(inner) => {
                dest.push_name(alloc.copy_string(&field.name));
                dest.push_open();
                for m in &matches {
                    push_value(inner, events, m, map, alloc, dest, depth + 1)?;
                }
                dest.push_close();
            }
            other => {
                if let Some(m) = matches.first() {
                    dest.push_name(alloc.copy_string(&field.name));
                    push_value(other, events, m, map, alloc, dest, depth + 1)?;
                }
            }
        }
    }
    Ok(())
}

/// Parse `content` against the named schema, appending the typed result into
/// `dest` (an already-constructed `Serialization` the caller owns). Mirrors
/// `schema_parse` (spec.md §4.E): `with_root` controls whether the
/// document's single top-level element is an unnamed wrapper to skip past
/// (true) or whether the schema's fields match the document's top-level
/// children directly (false).
pub fn schema_parse<'a>(
    map: &SchemaMap,
    name: &str,
    with_root: bool,
    content_type: Option<ContentType>,
    encoding: Option<Encoding>,
    content: &[u8],
    alloc: &'a Allocator,
    dest: &Serialization<'a>,
) -> Result<()> {
    let fields = map
        .fields(name)
        .ok_or_else(|| Error::new(ErrorCode::UnknownSchema, format!("no schema named '{name}'")))?;

    let mut parser = DocumentParser::new(alloc, content, encoding, content_type)?;
    let mut events = Vec::new();
    loop {
        let (kind, value) = parser.next();
        if kind == EventKind::None {
            break;
        }
        let text = match value {
            Some(v) => Some(v.tostring(alloc)?.to_string()),
            None => None,
        };
        events.push(Ev { kind, text });
    }

    let start = if with_root {
        match events.first().map(|e| e.kind) {
            Some(EventKind::Open) => 1,
            _ => 0,
        }
    } else {
        0
    };

    let children = children_of(&events, start)?;
    validate_struct(fields, &events, &children, map, alloc, dest, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SchemaMap;
    use ligature_value::serialization::Tag;

    #[test]
    fn validates_and_types_the_spec_example_document() {
        let src = r#"
            item_schema = {
              name = string,
              count = integer,
              price = float,
              tags = { { string } }
            }
        "#;
        let map = SchemaMap::parse(src).unwrap();
        let alloc = Allocator::new();
        let doc = br#"{"name":"widget","count":3,"price":9.5,"tags":["a","b"]}"#;
        let dest = Serialization::new();
        schema_parse(&map, "item_schema", false, None, None, doc, &alloc, &dest).unwrap();

        let mut it = dest.iter();
        assert_eq!(it.name(), Some("name"));
        it.skip().unwrap();
        match it.value() {
            Some(ValueVariant::String(s)) => assert_eq!(s.bytes, b"widget"),
            other => panic!("expected a string, got {other:?}"),
        }
        it.skip().unwrap();
        assert_eq!(it.name(), Some("count"));
        it.skip().unwrap();
        assert!(matches!(it.value(), Some(ValueVariant::Int(3))));
    }

    #[test]
    fn array_field_expands_to_repeated_elements() {
        let src = "a = { tags = { { string } } }";
        let map = SchemaMap::parse(src).unwrap();
        let alloc = Allocator::new();
        let dest = Serialization::new();
        schema_parse(&map, "a", false, None, None, br#"{"tags":["x","y"]}"#, &alloc, &dest).unwrap();

        let mut it = dest.iter();
        assert_eq!(it.name(), Some("tags"));
        it.skip().unwrap();
        assert_eq!(it.tag(), Tag::Open);
        it.skip().unwrap();
        assert!(matches!(it.value(), Some(ValueVariant::String(_))));
    }

    #[test]
    fn unknown_schema_name_is_reported() {
        let map = SchemaMap::parse("a = { x = integer }").unwrap();
        let alloc = Allocator::new();
        let dest = Serialization::new();
        let err = schema_parse(&map, "missing", false, None, None, b"{}", &alloc, &dest).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownSchema);
    }

    #[test]
    fn unresolved_inner_reference_is_reported_at_compile_time() {
        let err = SchemaMap::parse("a = { owner = (nope) }").unwrap_err();
        assert_eq!(err.code, ErrorCode::AddressedItemNotFound);
    }
}
