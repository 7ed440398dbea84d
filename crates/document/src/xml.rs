//! Linearize an XML document (already transcoded to UTF-8) into the shared
//! event vocabulary via `quick-xml`'s streaming reader.

use ligature_errors::{Error, ErrorCode, Result};
use quick_xml::events::Event as QEvent;
use quick_xml::reader::Reader;

use crate::event::RawEvent;

/// Scan `content` (a UTF-8 XML document) into a flat event list: each start
/// tag becomes `Open` followed by its attributes as `AttributeName`/
/// `AttributeValue` pairs, each end tag (and each self-closing tag,
/// immediately) becomes `Close`, and text nodes become `Value`.
pub fn linearize(content: &str) -> Result<Vec<RawEvent>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    let mut events = Vec::new();

    loop {
        let pos = reader.buffer_position();
        match reader.read_event() {
            Ok(QEvent::Start(e)) => {
                let name = decode(e.name().as_ref())?;
                events.push(RawEvent::open(name));
                push_attributes(&e, &mut events)?;
            }
            Ok(QEvent::Empty(e)) => {
                let name = decode(e.name().as_ref())?;
                events.push(RawEvent::open(name));
                push_attributes(&e, &mut events)?;
                events.push(RawEvent::close());
            }
            Ok(QEvent::End(_)) => {
                events.push(RawEvent::close());
            }
            Ok(QEvent::Text(e)) => {
                let text = e
                    .decode()
                    .map_err(|err| Error::new(ErrorCode::SyntaxError, err.to_string()).at(pos as u64))?;
                if !text.trim().is_empty() {
                    events.push(RawEvent::value(text.into_owned()));
                }
            }
            Ok(QEvent::CData(e)) => {
                let text = decode(&e)?;
                events.push(RawEvent::value(text));
            }
            Ok(QEvent::Eof) => break,
            // Declarations, comments, and processing instructions carry no
            // request data and are skipped.
            Ok(_) => {}
            Err(err) => {
                let window = crate::event::visualize_fault(&events, events.len());
                let message = if window.is_empty() {
                    err.to_string()
                } else {
                    format!("{err} (near: {window})")
                };
                return Err(Error::new(ErrorCode::SyntaxError, message).at(pos as u64));
            }
        }
    }
    Ok(events)
}

fn push_attributes(
    tag: &quick_xml::events::BytesStart<'_>,
    events: &mut Vec<RawEvent>,
) -> Result<()> {
    for attr in tag.attributes() {
        let attr = attr.map_err(|e| Error::new(ErrorCode::SyntaxError, e.to_string()))?;
        let name = decode(attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| Error::new(ErrorCode::SyntaxError, e.to_string()))?;
        events.push(RawEvent::attribute_name(name));
        events.push(RawEvent::attribute_value(value.into_owned()));
    }
    Ok(())
}

fn decode(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| Error::new(ErrorCode::EncodingError, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn start_tag_then_attributes_then_content_then_close() {
        let events = linearize(r#"<Doc id="7">Hi</Doc>"#).unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Open,
                EventKind::AttributeName,
                EventKind::AttributeValue,
                EventKind::Value,
                EventKind::Close,
            ]
        );
    }

    #[test]
    fn self_closing_tag_opens_and_closes_immediately() {
        let events = linearize(r#"<a><b/></a>"#).unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Open, EventKind::Open, EventKind::Close, EventKind::Close]);
    }

    #[test]
    fn malformed_xml_reports_a_position() {
        let err = linearize("<a><b></a>").unwrap_err();
        assert_eq!(err.code, ErrorCode::SyntaxError);
    }
}
