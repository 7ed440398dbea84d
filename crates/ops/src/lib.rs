//! `ligature-ops`: the top-level façade spec.md §4 describes end to end --
//! parse a request document, drive it over a compiled [`RequestAutomaton`],
//! execute its scheduled calls against an embedder's [`HostMethodTable`],
//! and render whatever survives in the [`RequestContext`] back out in the
//! negotiated response style. Everything this crate does is wiring: every
//! real decision (selector matching, argument resolution, call scheduling,
//! tree rendering) already lives in the component crate that owns it.

pub mod accept;
pub mod logger;
pub mod pipeline;

pub use accept::AcceptSet;
pub use logger::{RequestLogger, TracingLogger};
pub use pipeline::{handle_request, PipelineOptions};

pub use ligature_alloc::{Allocator, Encoding};
pub use ligature_automaton::{Request, RequestAutomaton};
pub use ligature_context::RequestContext;
pub use ligature_document::ContentType;
pub use ligature_encoder::OutputFormat;
pub use ligature_errors::{Error, ErrorCode, Result};
pub use ligature_executor::{execute_request, serialize_request_result, HostMethodTable};
pub use ligature_scripting::{parse_http_accept, ContentNegotiation, Negotiated, RequestAttributes};
