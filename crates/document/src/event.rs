//! The five-event vocabulary both document formats are linearized into.

/// One step of the document event stream. `None` is the sentinel a parser
/// returns past exhaustion (mirroring `papuga_DocumentElementType_None`);
/// production code should treat a `None` the same way a `SerializationIter`
/// at `eof` is treated -- as a clean stop, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    AttributeName,
    AttributeValue,
    Open,
    Close,
    Value,
    None,
}

/// One parsed token: a `kind` plus the owned UTF-8 text it carries (a tag
/// name for `Open`, an attribute name for `AttributeName`, rendered content
/// for `AttributeValue`/`Value`; `Close` and `None` carry nothing).
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub kind: EventKind,
    pub text: Option<String>,
}

impl RawEvent {
    pub fn open(name: impl Into<String>) -> Self {
        RawEvent { kind: EventKind::Open, text: Some(name.into()) }
    }
    pub fn close() -> Self {
        RawEvent { kind: EventKind::Close, text: None }
    }
    pub fn attribute_name(name: impl Into<String>) -> Self {
        RawEvent { kind: EventKind::AttributeName, text: Some(name.into()) }
    }
    pub fn attribute_value(value: impl Into<String>) -> Self {
        RawEvent { kind: EventKind::AttributeValue, text: Some(value.into()) }
    }
    pub fn value(value: impl Into<String>) -> Self {
        RawEvent { kind: EventKind::Value, text: Some(value.into()) }
    }
}

/// Render up to 7 events on either side of `fault_index` (the index of the
/// first event that does not exist -- i.e. parsing stopped after
/// `events.len()` good events), with `<!>` marking the fault position, as
/// spec.md §4.D describes for parse-failure diagnostics.
pub fn visualize_fault(events: &[RawEvent], fault_index: usize) -> String {
    const WINDOW: usize = 7;
    let start = fault_index.saturating_sub(WINDOW);
    let end = (fault_index + WINDOW).min(events.len());
    let mut out = String::new();
    for (i, ev) in events.iter().enumerate().take(end).skip(start) {
        if i == fault_index {
            out.push_str("<!>");
        }
        out.push_str(&describe(ev));
        out.push(' ');
    }
    if fault_index >= events.len() {
        out.push_str("<!>");
    }
    out.trim_end().to_string()
}

fn describe(ev: &RawEvent) -> String {
    match ev.kind {
        EventKind::AttributeName => format!("@{}", ev.text.as_deref().unwrap_or("")),
        EventKind::AttributeValue => format!("={}", ev.text.as_deref().unwrap_or("")),
        EventKind::Open => format!("<{}>", ev.text.as_deref().unwrap_or("")),
        EventKind::Close => "</>".to_string(),
        EventKind::Value => format!("\"{}\"", ev.text.as_deref().unwrap_or("")),
        EventKind::None => "#".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_the_fault_position_in_the_window() {
        let events = vec![RawEvent::open("a"), RawEvent::value("1"), RawEvent::close()];
        let text = visualize_fault(&events, 3);
        assert!(text.ends_with("<!>"));
        assert!(text.contains("<a>"));
    }
}
