//! `RequestContext` and `RequestContextPool`: the named-variable bag a
//! request's constructed values and host-object handles live in, and the
//! copy-on-write map of named contexts that a pool of requests shares, per
//! spec.md §4.G.

pub mod context;
pub mod pool;

pub use context::{validate_name, RequestContext};
pub use pool::RequestContextPool;
