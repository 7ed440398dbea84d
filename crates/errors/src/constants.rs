//! Resource bounds referenced by several components. Kept in one place so
//! tests and callers can assert against the same numbers the runtime enforces.

/// An iterator value is driven to exhaustion at most this many times when it
/// must be materialized (deep copy, result encoding). A producing iterator
/// longer than the cap is truncated with no error.
pub const MAX_ITERATOR_EXPANSION: usize = 100;

/// Recursion depth ceiling shared by the schema compiler and the result
/// encoder's tree walker.
pub const MAX_RECURSION_DEPTH: usize = 200;

/// Upper bound on the number of argument slots a single call definition may
/// declare. Enforced at automaton-build time.
pub const MAX_NOF_ARGUMENTS: usize = 32;

/// Upper bound on the number of values a host method call may return.
pub const MAX_NOF_RETURNS: usize = 8;

/// Upper bound on the number of outbound delegate requests a single script
/// invocation of the scripted handler may enqueue.
pub const MAX_NOF_DELEGATES: usize = 256;

/// Number of (tag, value) node slots per allocated `Serialization` chunk.
pub const NODE_CHUNK_SIZE: usize = 128;

/// Maximum number of schemas a single `SchemaMap` source may define.
pub const MAX_NOF_SCHEMAS: usize = 64;
