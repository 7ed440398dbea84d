//! The HTTP `Accept` header bitset, spec.md §6's `accepted_doctype_set`.
//! The parsing and bit logic already live in `ligature-scripting` (the
//! scripted handler negotiates content the same way the façade's own
//! non-scripted calls do); this module just gives the façade's own name to
//! the same type rather than duplicating it.

pub use ligature_scripting::DoctypeSet as AcceptSet;
pub use ligature_scripting::{doctype_from_name, encoding_from_name, parse_http_accept};
