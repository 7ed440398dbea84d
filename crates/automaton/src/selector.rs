//! The XPath-subset selector language spec.md §4.F describes: absolute
//! (`/a/b`) and descendant (`//x`) axes, an attribute axis (`@k`), a
//! tag-close pseudostep (`~` appended to the final segment), and a choice
//! union (`{a,b,c}`) at any one segment.
//!
//! A compiled [`Selector`] is matched against the stack of currently-open
//! element names, not against a whole document at once -- the automaton is
//! streaming, so matching is driven incrementally as the document parser
//! emits `Open`/`Close`/`AttributeName`/`AttributeValue`/`Value` events.

use ligature_errors::{Error, ErrorCode, Result};

#[derive(Debug, Clone)]
enum NameMatch {
    Literal(String),
    Choice(Vec<String>),
}

impl NameMatch {
    fn matches(&self, name: &str) -> bool {
        match self {
            NameMatch::Literal(n) => n == name,
            NameMatch::Choice(options) => options.iter().any(|o| o == name),
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    /// `/name` -- must match the very next stack element.
    Child(NameMatch),
    /// `//name` -- matches `name` at or after the current position, skipping
    /// zero or more intervening elements.
    Descendant(NameMatch),
}

/// A compiled selector expression. `attribute` is set when the final
/// segment was `@name` (the selector targets an attribute of the element
/// the remaining segments identify, not the element itself). `close` marks
/// a trailing `~` tag-close pseudostep, accepted for source compatibility;
/// this implementation already finalizes every `Scope` at the matching
/// element's `Close` event, so the flag carries no further runtime effect
/// here (see DESIGN.md).
#[derive(Debug, Clone)]
pub struct Selector {
    segments: Vec<Segment>,
    attribute: Option<String>,
    pub close: bool,
    pub source: String,
}

/// Parse one selector expression. Only absolute (`/...`) forms are
/// accepted, matching the `/a/b`, `//x`, `/a/@k`, `/a/{b,c}` examples in
/// spec.md §4.F / §6.
pub fn parse_selector(expr: &str) -> Result<Selector> {
    let trimmed = expr.trim();
    if !trimmed.starts_with('/') {
        return Err(Error::new(
            ErrorCode::SyntaxError,
            format!("selector '{expr}' must be an absolute or descendant path starting with '/'"),
        ));
    }
    let tokens: Vec<&str> = trimmed.split('/').collect();
    // tokens[0] is always "" because the expression starts with '/'.
    let mut segments = Vec::new();
    let mut attribute = None;
    let mut close = false;
    let mut descendant_pending = false;

    let last_index = tokens.len() - 1;
    for (i, raw) in tokens.iter().enumerate().skip(1) {
        if raw.is_empty() {
            descendant_pending = true;
            continue;
        }
        let is_last = i == last_index;
        let mut token = *raw;
        if is_last && token.ends_with('~') {
            close = true;
            token = &token[..token.len() - 1];
        }
        if let Some(name) = token.strip_prefix('@') {
            if !is_last {
                return Err(Error::new(
                    ErrorCode::SyntaxError,
                    format!("selector '{expr}': '@{name}' attribute axis must be the final segment"),
                ));
            }
            attribute = Some(name.to_string());
            continue;
        }
        let name_match = if token.starts_with('{') && token.ends_with('}') && token.len() >= 2 {
            let inner = &token[1..token.len() - 1];
            NameMatch::Choice(inner.split(',').map(|s| s.trim().to_string()).collect())
        } else {
            NameMatch::Literal(token.to_string())
        };
        segments.push(if descendant_pending {
            Segment::Descendant(name_match)
        } else {
            Segment::Child(name_match)
        });
        descendant_pending = false;
    }

    Ok(Selector { segments, attribute, close, source: expr.to_string() })
}

impl Selector {
    pub fn is_attribute(&self) -> bool {
        self.attribute.is_some()
    }

    pub fn attribute_name(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// True if `stack` (element names from the document root down) is
    /// exactly the element (or, for an attribute selector, the element
    /// owning the attribute) this selector identifies.
    pub fn matches(&self, stack: &[String]) -> bool {
        match_segments(&self.segments, stack)
    }

    /// The deepest prefix length of `stack` that satisfies this selector,
    /// or `None` if no prefix (including the empty one, for a root-scoped
    /// selector with no segments) matches. Used to find the enclosing scope
    /// a value belongs to when its `select` selector targets something
    /// nested more deeply than its `scope` selector.
    pub fn deepest_matching_prefix(&self, stack: &[String]) -> Option<usize> {
        for depth in (0..=stack.len()).rev() {
            if self.matches(&stack[..depth]) {
                return Some(depth);
            }
        }
        None
    }
}

fn match_segments(segments: &[Segment], stack: &[String]) -> bool {
    match segments.split_first() {
        None => stack.is_empty(),
        Some((Segment::Child(nm), rest)) => match stack.split_first() {
            Some((head, tail)) => nm.matches(head) && match_segments(rest, tail),
            None => false,
        },
        Some((Segment::Descendant(nm), rest)) => {
            for start in 0..stack.len() {
                if nm.matches(&stack[start]) && match_segments(rest, &stack[start + 1..]) {
                    return true;
                }
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_matches_exact_stack() {
        let sel = parse_selector("/Doc/title").unwrap();
        assert!(sel.matches(&["Doc".into(), "title".into()]));
        assert!(!sel.matches(&["Doc".into()]));
        assert!(!sel.matches(&["Doc".into(), "title".into(), "extra".into()]));
    }

    #[test]
    fn descendant_skips_intervening_elements() {
        let sel = parse_selector("//x").unwrap();
        assert!(sel.matches(&["x".into()]));
        assert!(sel.matches(&["a".into(), "b".into(), "x".into()]));
        assert!(!sel.matches(&["a".into(), "x".into(), "b".into()]));
    }

    #[test]
    fn attribute_axis_must_be_final() {
        let sel = parse_selector("/Doc/@id").unwrap();
        assert!(sel.is_attribute());
        assert_eq!(sel.attribute_name(), Some("id"));
        assert!(sel.matches(&["Doc".into()]));

        assert!(parse_selector("/Doc/@id/more").is_err());
    }

    #[test]
    fn choice_union_matches_any_alternative() {
        let sel = parse_selector("/Doc/{title,subtitle}").unwrap();
        assert!(sel.matches(&["Doc".into(), "title".into()]));
        assert!(sel.matches(&["Doc".into(), "subtitle".into()]));
        assert!(!sel.matches(&["Doc".into(), "body".into()]));
    }

    #[test]
    fn close_pseudostep_is_parsed_and_stripped() {
        let sel = parse_selector("/Doc~").unwrap();
        assert!(sel.close);
        assert!(sel.matches(&["Doc".into()]));
    }

    #[test]
    fn deepest_matching_prefix_finds_the_nearest_enclosing_scope() {
        let sel = parse_selector("/Doc").unwrap();
        assert_eq!(sel.deepest_matching_prefix(&["Doc".into(), "title".into()]), Some(1));
        let root = parse_selector("/").unwrap();
        assert_eq!(root.deepest_matching_prefix(&["Doc".into()]), Some(0));
    }

    #[test]
    fn rejects_relative_expressions() {
        assert!(parse_selector("a/b").is_err());
    }
}
