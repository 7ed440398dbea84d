//! The value model shared by every component that reads or builds request
//! data: the tagged-union [`ValueVariant`], the bracket-structured
//! [`Serialization`] node list it can nest inside, and the host-object /
//! iterator handles both may carry.
//!
//! `ValueVariant` and `Serialization` are mutually recursive -- a `Value`
//! node's payload may itself be a `Serialization` reference, and a
//! `Serialization`'s nodes carry `ValueVariant`s -- so they live in one
//! crate rather than two that would need a dependency cycle.

pub mod deepcopy;
pub mod host;
pub mod number;
pub mod serialization;
pub mod transcode;
pub mod value;

pub use deepcopy::{deep_copy_nodes, deepcopy_atomic};
pub use host::{ClassId, HostIterator, HostObject, IteratorHandle, OwnedAtom, OwnedField};
pub use number::{double_to_int, parse as parse_number, parse_bool, Number, MAX_SAFE_INT_DOUBLE};
pub use serialization::{print_node, Node, Serialization, SerializationIter, StructInterface, Tag};
pub use value::{StringValue, ValueVariant};
