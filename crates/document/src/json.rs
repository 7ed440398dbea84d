//! Linearize a parsed JSON document into the shared event vocabulary, per
//! the mapping rules in spec.md §4.D.

use ligature_errors::{Error, ErrorCode, Result};
use serde_json::Value;

use crate::event::RawEvent;

/// Parse `content` as JSON and linearize it into a flat event list. Parse
/// failures surface `serde_json`'s line/column translated to a byte offset.
pub fn linearize(content: &str) -> Result<Vec<RawEvent>> {
    let root: Value = serde_json::from_str(content).map_err(|e| {
        let pos = byte_offset_of(content, e.line(), e.column());
        Error::new(ErrorCode::SyntaxError, e.to_string()).at(pos as u64)
    })?;
    let mut events = Vec::new();
    recurse_unnamed(&root, &mut events)?;
    Ok(events)
}

fn byte_offset_of(content: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, l) in content.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            return offset + column.saturating_sub(1);
        }
        offset += l.len();
    }
    offset
}

fn atomic_text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(Error::new(
            ErrorCode::AttributeNotAtomic,
            format!("expected an atomic JSON value, found {other}"),
        )),
    }
}

/// Dispatch a named member per spec.md §4.D: `-foo` keys become attribute
/// pairs, `#text` becomes a bare `Value`, array-valued keys repeat
/// `Open/Close` once per element, a `null` value becomes an empty
/// `Open/Close`, and anything else opens/recurses/closes.
fn emit_named(name: &str, value: &Value, events: &mut Vec<RawEvent>) -> Result<()> {
    if let Some(attr) = name.strip_prefix('-') {
        events.push(RawEvent::attribute_name(attr));
        events.push(RawEvent::attribute_value(atomic_text(value)?));
        return Ok(());
    }
    if name == "#text" {
        events.push(RawEvent::value(atomic_text(value)?));
        return Ok(());
    }
    match value {
        Value::Array(items) => {
            for item in items {
                events.push(RawEvent::open(name));
                recurse_unnamed(item, events)?;
                events.push(RawEvent::close());
            }
        }
        Value::Null => {
            events.push(RawEvent::open(name));
            events.push(RawEvent::close());
        }
        Value::Object(map) => {
            events.push(RawEvent::open(name));
            for (k, v) in map {
                emit_named(k, v, events)?;
            }
            events.push(RawEvent::close());
        }
        atomic => {
            events.push(RawEvent::open(name));
            events.push(RawEvent::value(atomic_text(atomic)?));
            events.push(RawEvent::close());
        }
    }
    Ok(())
}

/// Emit a value that arrived with no key of its own: the document root, or
/// one element of an array. Anonymous arrays synthesize 1-based integer
/// names for their elements; an object's members are emitted directly
/// (without an extra wrapping bracket, since the caller already opened one
/// for this position); a bare null drops silently, matching the source
/// library's handling of unnamed null array entries.
fn recurse_unnamed(value: &Value, events: &mut Vec<RawEvent>) -> Result<()> {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                emit_named(k, v, events)?;
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                let name = (idx + 1).to_string();
                events.push(RawEvent::open(name));
                recurse_unnamed(item, events)?;
                events.push(RawEvent::close());
            }
        }
        Value::Null => {}
        atomic => events.push(RawEvent::value(atomic_text(atomic)?)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn attribute_key_becomes_attribute_pair() {
        let events = linearize(r#"{"Doc":{"-id":"7","title":"Hi"}}"#).unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Open,
                EventKind::AttributeName,
                EventKind::AttributeValue,
                EventKind::Open,
                EventKind::Value,
                EventKind::Close,
                EventKind::Close,
            ]
        );
    }

    #[test]
    fn text_key_becomes_bare_value() {
        let events = linearize(r#"{"Doc":{"#text":"hi"}}"#).unwrap();
        assert!(events.iter().any(|e| e.kind == EventKind::Value && e.text.as_deref() == Some("hi")));
        assert!(!events.iter().any(|e| e.kind == EventKind::Open && e.text.as_deref() == Some("#text")));
    }

    #[test]
    fn array_repeats_the_key_per_element() {
        let events = linearize(r#"{"items":[1,2,3]}"#).unwrap();
        let opens: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::Open)
            .filter_map(|e| e.text.clone())
            .collect();
        assert_eq!(opens, vec!["items", "items", "items"]);
    }

    #[test]
    fn anonymous_array_synthesizes_one_based_indices() {
        let events = linearize(r#"{"matrix":[[1,2]]}"#).unwrap();
        let opens: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::Open)
            .filter_map(|e| e.text.clone())
            .collect();
        assert_eq!(opens, vec!["matrix", "1"]);
    }

    #[test]
    fn null_non_attribute_key_opens_and_closes_immediately() {
        let events = linearize(r#"{"maybe":null}"#).unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Open, EventKind::Close]);
    }

    #[test]
    fn malformed_json_reports_a_position() {
        let err = linearize("{\"a\": }").unwrap_err();
        assert_eq!(err.code, ErrorCode::SyntaxError);
        assert!(err.position.is_some());
    }
}
