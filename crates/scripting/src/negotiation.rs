//! Output content negotiation: the Accept-header bitset a handler is built
//! with (spec.md §6's `accepted_doctype_set`/`accepted_encoding_set`), and
//! the "first observation wins, later conflict falls back to the Accept
//! set" policy spec.md §4.J describes for the `content`/`doctype`/
//! `encoding` builtins.

use ligature_alloc::Encoding;
use ligature_encoder::OutputFormat;

/// A bitset over the four response styles, built up by parsing an HTTP
/// `Accept` header. Unlike `ligature_document::ContentType`, which only
/// distinguishes the two document *input* shapes (XML/JSON), this also
/// carries HTML5 and Text since those are output-only styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoctypeSet(u8);

impl DoctypeSet {
    pub const NONE: DoctypeSet = DoctypeSet(0);
    pub const XML: DoctypeSet = DoctypeSet(1 << 0);
    pub const JSON: DoctypeSet = DoctypeSet(1 << 1);
    pub const HTML5: DoctypeSet = DoctypeSet(1 << 2);
    pub const TEXT: DoctypeSet = DoctypeSet(1 << 3);
    pub const ALL: DoctypeSet = DoctypeSet(0b1111);

    pub fn of(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Xml => Self::XML,
            OutputFormat::Json => Self::JSON,
            OutputFormat::Html5 => Self::HTML5,
            OutputFormat::Text => Self::TEXT,
        }
    }

    pub fn union(self, other: Self) -> Self {
        DoctypeSet(self.0 | other.0)
    }

    pub fn contains(self, format: OutputFormat) -> bool {
        self.0 & Self::of(format).0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The first acceptable format in a fixed preference order (JSON first,
    /// matching the teacher's own default response style), or `None` if
    /// this set accepts nothing.
    pub fn first(self) -> Option<OutputFormat> {
        [OutputFormat::Json, OutputFormat::Xml, OutputFormat::Html5, OutputFormat::Text]
            .into_iter()
            .find(|&f| self.contains(f))
    }
}

impl Default for DoctypeSet {
    fn default() -> Self {
        Self::ALL
    }
}

/// Map one bare media type (no `;q=...` parameter, already lowercased) to
/// the doctype bits it implies. `application/octet-stream` names `Unknown`
/// and contributes no bit, as spec.md §6 specifies. Combined types like
/// `application/json+xml` are split on `+` and each half is resolved
/// independently, their bits unioned.
fn media_type_bits(media_type: &str) -> DoctypeSet {
    match media_type {
        "application/json" => DoctypeSet::JSON,
        "application/xml" | "text/xml" => DoctypeSet::XML,
        "application/xhtml+xml" | "text/html" => DoctypeSet::HTML5,
        "text/plain" => DoctypeSet::TEXT,
        "application/octet-stream" => DoctypeSet::NONE,
        "*/*" => DoctypeSet::ALL,
        combined if combined.contains('+') => {
            combined.split('+').fold(DoctypeSet::NONE, |acc, part| acc.union(token_bits(part)))
        }
        _ => DoctypeSet::NONE,
    }
}

/// Resolve a bare token (either a full media type or one half of a `+`
/// combined one) against the handful of keywords the combined forms use.
fn token_bits(token: &str) -> DoctypeSet {
    match token.trim() {
        "json" | "application/json" => DoctypeSet::JSON,
        "xml" | "application/xml" => DoctypeSet::XML,
        "html" | "xhtml" | "text/html" => DoctypeSet::HTML5,
        "plain" | "text/plain" => DoctypeSet::TEXT,
        _ => DoctypeSet::NONE,
    }
}

/// Parse a comma-separated `Accept` header value into a [`DoctypeSet`].
/// `q` parameters and surrounding whitespace are ignored; preference order
/// beyond "acceptable at all" is not modeled, matching spec.md §6's
/// description of the set as a bitset rather than a ranked list.
pub fn parse_http_accept(header: &str) -> DoctypeSet {
    header
        .split(',')
        .map(|item| item.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .filter(|item| !item.is_empty())
        .fold(DoctypeSet::NONE, |acc, media_type| acc.union(media_type_bits(&media_type)))
}

/// Resolve an explicit doctype name (as passed to the `doctype(raw)`
/// builtin, or parsed from a document's own declared type) to an
/// [`OutputFormat`].
pub fn doctype_from_name(name: &str) -> Option<OutputFormat> {
    match name.trim().to_ascii_lowercase().as_str() {
        "xml" => Some(OutputFormat::Xml),
        "json" => Some(OutputFormat::Json),
        "html5" | "html" | "xhtml" => Some(OutputFormat::Html5),
        "text" | "plain" => Some(OutputFormat::Text),
        _ => None,
    }
}

/// Resolve an explicit encoding name (as passed to the `encoding(raw)`
/// builtin) to an [`Encoding`]. Host-endian names are not accepted here;
/// negotiated output always pins a concrete byte order.
pub fn encoding_from_name(name: &str) -> Option<Encoding> {
    let normalized: String = name.chars().filter(|c| *c != '-' && *c != '_' && *c != ' ').collect();
    match normalized.to_ascii_lowercase().as_str() {
        "utf8" => Some(Encoding::Utf8),
        "utf16be" => Some(Encoding::Utf16BE),
        "utf16le" => Some(Encoding::Utf16LE),
        "utf32be" => Some(Encoding::Utf32BE),
        "utf32le" => Some(Encoding::Utf32LE),
        "binary" => Some(Encoding::Binary),
        _ => None,
    }
}

/// The recognized options of `RequestAttributes` (spec.md §6), fixed for
/// the lifetime of one handler instance and shared read-only by every
/// request it serves.
#[derive(Debug, Clone)]
pub struct RequestAttributes {
    pub accepted_doctype_set: DoctypeSet,
    pub accepted_encoding_set: Vec<Encoding>,
    pub html_head: Option<String>,
    pub html_base_href: Option<String>,
    pub beautified_output: bool,
    pub deterministic_output: bool,
}

impl RequestAttributes {
    /// `papuga_init_RequestAttributes`'s defaults: accept everything, no
    /// HTML decoration, beautified and deterministic both off.
    pub fn new() -> Self {
        RequestAttributes {
            accepted_doctype_set: DoctypeSet::ALL,
            accepted_encoding_set: vec![Encoding::Utf8],
            html_head: None,
            html_base_href: None,
            beautified_output: false,
            deterministic_output: false,
        }
    }

    pub fn with_accept_header(mut self, header: &str) -> Self {
        self.accepted_doctype_set = parse_http_accept(header);
        self
    }

    /// Strip a trailing `/` or `*`, as spec.md §6 requires for
    /// `html_base_href`.
    pub fn with_html_base_href(mut self, href: impl Into<String>) -> Self {
        let href = href.into();
        let trimmed = href.trim_end_matches(['/', '*']).to_string();
        self.html_base_href = Some(trimmed);
        self
    }
}

impl Default for RequestAttributes {
    fn default() -> Self {
        Self::new()
    }
}

/// A single observed or negotiated (doctype, encoding) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub format: OutputFormat,
    pub encoding: Encoding,
}

/// Tracks the running result of `content`/`doctype`/`encoding` calls made
/// by a script during one request, per spec.md §4.J's "first observation
/// selects output defaults; a later conflicting observation falls back to
/// the Accept set's first compatible type" rule.
#[derive(Debug, Default)]
pub struct ContentNegotiation {
    doctype: Option<OutputFormat>,
    encoding: Option<Encoding>,
}

impl ContentNegotiation {
    pub fn new() -> Self {
        ContentNegotiation::default()
    }

    /// Record an observed doctype. The first call wins; a later call naming
    /// a *different* doctype falls back to `attrs`'s Accept set instead of
    /// overwriting the first observation.
    pub fn observe_doctype(&mut self, attrs: &RequestAttributes, format: OutputFormat) {
        match self.doctype {
            None => self.doctype = Some(format),
            Some(existing) if existing != format => self.doctype = attrs.accepted_doctype_set.first(),
            Some(_) => {}
        }
    }

    pub fn observe_encoding(&mut self, encoding: Encoding) {
        if self.encoding.is_none() {
            self.encoding = Some(encoding);
        }
    }

    /// Resolve to a concrete (format, encoding) pair, falling back to the
    /// handler's Accept set (or JSON/UTF-8) when nothing was ever observed.
    pub fn resolve(&self, attrs: &RequestAttributes) -> Negotiated {
        let format = self
            .doctype
            .or_else(|| attrs.accepted_doctype_set.first())
            .unwrap_or(OutputFormat::Json);
        let encoding = self.encoding.unwrap_or_else(|| attrs.accepted_encoding_set.first().copied().unwrap_or(Encoding::Utf8));
        Negotiated { format, encoding }
    }
}
