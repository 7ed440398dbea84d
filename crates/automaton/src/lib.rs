//! `ligature-automaton`: the compiled request automaton spec.md §4.F
//! describes -- a set of selector-addressed values, structures, and method
//! calls, driven over one document's event stream by [`request::Request`]
//! and scheduled into an execution order by [`RequestAutomaton::group_rank_of`]
//! plus `Request::schedule`.
//!
//! This crate resolves `ArgSource::Item` occurrences (values and structures
//! addressed by selector) against a document's events; it does not depend on
//! `ligature-context`, so resolving `ArgSource::Var` (a named context
//! variable) and the final struct-synthesis recursion that can mix both
//! kinds of source are the executor's job.

pub mod builder;
pub mod classdef;
pub mod request;
pub mod schema_description;
pub mod scope;
pub mod selector;

use fxhash::FxHashMap;

pub use builder::{ArgSource, CallDef, ResolveType, RequestAutomatonBuilder, StructDef, StructMember, ValueDef};
pub use classdef::{ClassDef, ClassTable};
pub use ligature_value::ClassId;
pub use request::{Request, ScheduledCall, StructOccurrence, ValueOccurrence};
pub use schema_description::SchemaDescription;
pub use scope::Scope;
pub use selector::{parse_selector, Selector};

/// The compiled, immutable form of a request automaton. Built once per
/// distinct request shape via [`RequestAutomatonBuilder::done`] and then
/// reused across many [`Request`] runs over different documents.
pub struct RequestAutomaton {
    pub(crate) calls: Vec<CallDef>,
    pub(crate) structures: Vec<StructDef>,
    pub(crate) values: Vec<ValueDef>,
    pub classes: ClassTable,
    pub description: SchemaDescription,
    pub(crate) group_rank: FxHashMap<u32, u32>,
}

impl RequestAutomaton {
    pub fn builder() -> RequestAutomatonBuilder {
        RequestAutomatonBuilder::new()
    }

    pub fn call_def(&self, idx: usize) -> Option<&CallDef> {
        self.calls.get(idx)
    }

    pub fn struct_def(&self, idx: usize) -> Option<&StructDef> {
        self.structures.get(idx)
    }

    pub fn value_def(&self, idx: usize) -> Option<&ValueDef> {
        self.values.get(idx)
    }

    pub fn calls(&self) -> &[CallDef] {
        &self.calls
    }

    pub fn structures(&self) -> &[StructDef] {
        &self.structures
    }

    pub fn values(&self) -> &[ValueDef] {
        &self.values
    }

    /// The group's rank for scheduling purposes, i.e. the position its
    /// `open_group` call first appeared at among all groups used in this
    /// automaton. Calls with no explicit group always sort after any
    /// explicitly grouped call tied on `scope_end` (see DESIGN.md).
    pub fn group_rank_of(&self, call: &CallDef) -> u32 {
        match call.group {
            Some(g) => self.group_rank.get(&g).copied().unwrap_or(u32::MAX),
            None => u32::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_rank_defaults_ungrouped_calls_to_the_back() {
        let mut b = RequestAutomaton::builder();
        b.open_group(5);
        let grouped = b.add_call("/Doc/c1", ClassId(1), 1, None, "r1", 0).unwrap();
        b.close_group().unwrap();
        let ungrouped = b.add_call("/Doc/c2", ClassId(1), 2, None, "r2", 0).unwrap();
        let automaton = b.done().unwrap();

        let grouped_rank = automaton.group_rank_of(automaton.call_def(grouped).unwrap());
        let ungrouped_rank = automaton.group_rank_of(automaton.call_def(ungrouped).unwrap());
        assert!(grouped_rank < ungrouped_rank);
    }
}
