//! `DocumentParser`: the single entry point that sniffs, transcodes, and
//! linearizes an input document into the shared event vocabulary, and hands
//! out each event's value wrapped in a `ValueVariant` bound to a caller's
//! `Allocator` -- the same arena every downstream component (schema,
//! automaton, executor) already threads its own allocations through.

use ligature_alloc::{Allocator, Encoding};
use ligature_errors::{Error, ErrorCode, Result};
use ligature_value::{StringValue, ValueVariant};

use crate::event::{visualize_fault, EventKind, RawEvent};
use crate::sniff::{detect_bom, guess_content_type, guess_string_encoding, ContentType};
use crate::{json, xml};

/// A linearized document, ready to be consumed one event at a time.
pub struct DocumentParser<'a> {
    alloc: &'a Allocator,
    events: Vec<RawEvent>,
    pos: usize,
    content_type: ContentType,
}

impl<'a> DocumentParser<'a> {
    /// Parse `bytes` into an event stream. `encoding` and `content_type`
    /// pin down what would otherwise be sniffed; pass `None` for either to
    /// use the sniffing rules in [`crate::sniff`].
    pub fn new(
        alloc: &'a Allocator,
        bytes: &[u8],
        encoding: Option<Encoding>,
        content_type: Option<ContentType>,
    ) -> Result<Self> {
        let body = match detect_bom(bytes) {
            Some((_, bom_len)) => &bytes[bom_len..],
            None => bytes,
        };
        let src_encoding = encoding.unwrap_or_else(|| guess_string_encoding(bytes));
        let utf8 = ligature_value::transcode::tostring_enc(body, src_encoding, Encoding::Utf8)?;
        let text = String::from_utf8(utf8)
            .map_err(|e| Error::new(ErrorCode::EncodingError, e.to_string()))?;

        let content_type = content_type.unwrap_or_else(|| guess_content_type(text.as_bytes()));
        let events = match content_type {
            ContentType::Xml => xml::linearize(&text)?,
            ContentType::Json => json::linearize(&text)?,
            ContentType::Unknown => {
                return Err(Error::new(
                    ErrorCode::UnknownContentType,
                    "could not determine whether the document is XML or JSON",
                ))
            }
        };

        Ok(DocumentParser { alloc, events, pos: 0, content_type })
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// The event-count position reached so far -- the same counter the
    /// `RequestAutomaton` increments per consumed event and tags every
    /// `Scope` with.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Consume and return the next event. Past the last event, yields
    /// `(EventKind::None, None)` indefinitely rather than erroring.
    pub fn next(&mut self) -> (EventKind, Option<ValueVariant<'a>>) {
        let Some(ev) = self.events.get(self.pos) else {
            return (EventKind::None, None);
        };
        self.pos += 1;
        let value = ev.text.as_ref().map(|text| {
            let bytes = self.alloc.copy_string(text).as_bytes();
            ValueVariant::String(StringValue::new(bytes, Encoding::Utf8))
        });
        (ev.kind, value)
    }

    /// A compact rendering of the tokens around the current position, for
    /// correlating an execution-time failure back to the document.
    pub fn fault_visualization(&self) -> String {
        visualize_fault(&self.events, self.pos)
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.events.len()
    }
}
