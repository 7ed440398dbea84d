//! Argument resolution: turning one call's (or one structure's) declared
//! `ArgSource` slots into concrete `ValueVariant`s, per spec.md §4.F's
//! resolver description. `ligature-automaton` stops at exposing the raw
//! `values_for`/`structures_for` occurrence maps; this module adds the
//! `RequestContext` variable lookups and the scope-nearness search its own
//! doc comment defers to this crate.

use ligature_alloc::Allocator;
use ligature_automaton::{ArgSource, CallDef, Request, ResolveType, Scope};
use ligature_context::RequestContext;
use ligature_errors::{Error, ErrorCode, Result};
use ligature_value::{deep_copy_nodes, deepcopy_atomic, Serialization, ValueVariant};

enum Candidate<'a> {
    Value(Scope, ValueVariant<'a>),
    Struct(Scope, usize),
}

impl Candidate<'_> {
    fn scope(&self) -> Scope {
        match self {
            Candidate::Value(s, _) => *s,
            Candidate::Struct(s, _) => *s,
        }
    }
}

fn candidates_for<'a>(itemid: u32, request: &Request<'a>) -> Vec<Candidate<'a>> {
    let mut out: Vec<Candidate<'a>> =
        request.values_for(itemid).iter().map(|occ| Candidate::Value(occ.scope, occ.value.clone())).collect();
    out.extend(request.structures_for(itemid).iter().map(|occ| Candidate::Struct(occ.scope, occ.struct_index)));
    out
}

fn span(scope: Scope) -> u64 {
    scope.to - scope.from
}

/// Bounds how many tag-depths separate the resolver from a candidate
/// occurrence. `Scope` only carries event counts, not a tracked tree depth;
/// this uses the distance between the two scopes' closing event counts as
/// that proxy (see DESIGN.md's Open Question note on `maxTagDiff`).
fn within_tag_diff(search: Scope, candidate: Scope, max_tag_diff: Option<u32>) -> bool {
    match max_tag_diff {
        None => true,
        Some(max) => search.to.abs_diff(candidate.to) <= max as u64,
    }
}

/// The nearest candidate enclosed by (or equal to) `search` -- ties on span
/// are `AmbiguousReference`, per spec.md §4.F.
fn resolve_nearest_enclosed(search: Scope, candidates: &[Candidate<'_>], max_tag_diff: Option<u32>) -> Result<Option<usize>> {
    pick_nearest(candidates, max_tag_diff, |c| search.encloses(&c.scope()), search)
}

/// The nearest ancestor candidate whose scope encloses `search` (an
/// `Inherited` slot walks upward rather than inward).
fn resolve_nearest_enclosing(search: Scope, candidates: &[Candidate<'_>], max_tag_diff: Option<u32>) -> Result<Option<usize>> {
    pick_nearest(candidates, max_tag_diff, |c| c.scope().encloses(&search), search)
}

fn pick_nearest(
    candidates: &[Candidate<'_>],
    max_tag_diff: Option<u32>,
    admits: impl Fn(&Candidate<'_>) -> bool,
    search: Scope,
) -> Result<Option<usize>> {
    let mut best: Option<usize> = None;
    let mut best_span = u64::MAX;
    let mut tie = false;
    for (idx, c) in candidates.iter().enumerate() {
        if !admits(c) || !within_tag_diff(search, c.scope(), max_tag_diff) {
            continue;
        }
        let s = span(c.scope());
        match s.cmp(&best_span) {
            std::cmp::Ordering::Less => {
                best = Some(idx);
                best_span = s;
                tie = false;
            }
            std::cmp::Ordering::Equal => tie = true,
            std::cmp::Ordering::Greater => {}
        }
    }
    if tie {
        return Err(Error::new(ErrorCode::AmbiguousReference, "more than one equally near item matches this argument"));
    }
    Ok(best)
}

/// Deep-copy an arbitrary value into `alloc`, mirroring
/// `ligature-context`'s private `clone_into` helper: every resolved
/// argument gets its own copy in the call's fresh scratch allocator rather
/// than aliasing the document's or the context's.
pub(crate) fn copy_value<'call>(value: &ValueVariant<'_>, alloc: &'call Allocator) -> Result<ValueVariant<'call>> {
    match value {
        ValueVariant::Serialization(ser) => {
            let dest = alloc.retain(Serialization::new());
            deep_copy_nodes(ser, dest, alloc, false)?;
            Ok(ValueVariant::Serialization(dest))
        }
        ValueVariant::Iterator(_) => {
            let wrapper = Serialization::new();
            wrapper.push_value(value.clone());
            let dest = alloc.retain(Serialization::new());
            deep_copy_nodes(&wrapper, dest, alloc, false)?;
            Ok(ValueVariant::Serialization(dest))
        }
        other => deepcopy_atomic(other, alloc, false),
    }
}

fn materialize<'call>(
    candidate: &Candidate<'_>,
    request: &Request<'_>,
    context: &RequestContext,
    alloc: &'call Allocator,
) -> Result<ValueVariant<'call>> {
    match candidate {
        Candidate::Value(_, v) => copy_value(v, alloc),
        Candidate::Struct(scope, idx) => synthesize_struct(*idx, *scope, request, context, alloc),
    }
}

fn resolve_array<'call>(
    search: Scope,
    candidates: &[Candidate<'_>],
    request: &Request<'_>,
    context: &RequestContext,
    alloc: &'call Allocator,
    max_tag_diff: Option<u32>,
    require_non_empty: bool,
) -> Result<ValueVariant<'call>> {
    let mut matched: Vec<&Candidate<'_>> = candidates
        .iter()
        .filter(|c| search.encloses(&c.scope()) && within_tag_diff(search, c.scope(), max_tag_diff))
        .collect();
    matched.sort_by_key(|c| (c.scope().from, c.scope().to));
    if require_non_empty && matched.is_empty() {
        return Err(Error::new(ErrorCode::ValueUndefined, "array argument requires at least one matching item"));
    }
    let ser = alloc.retain(Serialization::new());
    for c in matched {
        let v = materialize(c, request, context, alloc)?;
        ser.push_value(v);
    }
    Ok(ValueVariant::Serialization(ser))
}

fn resolve_item<'call>(
    itemid: u32,
    resolve: ResolveType,
    max_tag_diff: Option<u32>,
    search: Scope,
    request: &Request<'_>,
    context: &RequestContext,
    alloc: &'call Allocator,
) -> Result<ValueVariant<'call>> {
    let candidates = candidates_for(itemid, request);
    match resolve {
        ResolveType::Required => match resolve_nearest_enclosed(search, &candidates, max_tag_diff)? {
            Some(idx) => materialize(&candidates[idx], request, context, alloc),
            None => Err(Error::new(ErrorCode::ValueUndefined, format!("required item {itemid} is missing"))),
        },
        ResolveType::Optional => match resolve_nearest_enclosed(search, &candidates, max_tag_diff)? {
            Some(idx) => materialize(&candidates[idx], request, context, alloc),
            None => Ok(ValueVariant::Void),
        },
        ResolveType::Inherited => match resolve_nearest_enclosing(search, &candidates, max_tag_diff)? {
            Some(idx) => materialize(&candidates[idx], request, context, alloc),
            None => Err(Error::new(ErrorCode::ValueUndefined, format!("inherited item {itemid} has no enclosing occurrence"))),
        },
        ResolveType::Array => resolve_array(search, &candidates, request, context, alloc, max_tag_diff, false),
        ResolveType::ArrayNonEmpty => resolve_array(search, &candidates, request, context, alloc, max_tag_diff, true),
    }
}

/// Resolve one `ArgSource`, whether it belongs to a call's argument slot or
/// a structure's member -- both search the same occurrence maps, only the
/// search `Scope` (the call's own scope, or the enclosing struct
/// occurrence's scope) differs.
pub(crate) fn resolve_source<'call>(
    source: &ArgSource,
    search: Scope,
    request: &Request<'_>,
    context: &RequestContext,
    alloc: &'call Allocator,
) -> Result<ValueVariant<'call>> {
    match source {
        ArgSource::Var(name) => {
            let v = context
                .get_variable(name)
                .ok_or_else(|| Error::new(ErrorCode::ValueUndefined, format!("variable '{name}' is not defined")))?;
            copy_value(v, alloc)
        }
        ArgSource::Item { itemid, resolve, max_tag_diff } => {
            resolve_item(*itemid, *resolve, *max_tag_diff, search, request, context, alloc)
        }
    }
}

/// Structure synthesis (spec.md §4.F's closing paragraph): re-walk a
/// `StructDef`'s member declarations against the struct occurrence's own
/// scope, emitting a `Serialization` with named or unnamed members per the
/// declaration.
fn synthesize_struct<'call>(
    struct_index: usize,
    scope: Scope,
    request: &Request<'_>,
    context: &RequestContext,
    alloc: &'call Allocator,
) -> Result<ValueVariant<'call>> {
    let def = request
        .automaton()
        .struct_def(struct_index)
        .ok_or_else(|| Error::new(ErrorCode::AddressedItemNotFound, "no such structure definition"))?;
    let ser = alloc.retain(Serialization::new());
    for member in &def.members {
        let value = resolve_source(&member.source, scope, request, context, alloc)?;
        if let Some(name) = &member.name {
            ser.push_name(alloc.copy_string(name));
        }
        ser.push_value(value);
    }
    Ok(ValueVariant::Serialization(ser))
}

/// Resolve every argument slot of one scheduled call.
pub fn resolve_call_args<'call>(
    call: &CallDef,
    scope: Scope,
    request: &Request<'_>,
    context: &RequestContext,
    alloc: &'call Allocator,
) -> Result<Vec<ValueVariant<'call>>> {
    call.args
        .iter()
        .map(|slot| {
            let source = slot
                .as_ref()
                .ok_or_else(|| Error::new(ErrorCode::NofArgsError, "call has an unbound argument slot"))?;
            resolve_source(source, scope, request, context, alloc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligature_alloc::Allocator;
    use ligature_automaton::{ClassId, RequestAutomaton};
    use ligature_document::{DocumentParser, EventKind};

    fn drive<'a>(automaton: &'a RequestAutomaton, alloc: &'a Allocator, json: &'static [u8]) -> Request<'a> {
        let mut parser = DocumentParser::new(alloc, json, None, None).unwrap();
        let mut request = Request::new(automaton);
        loop {
            let (kind, value) = parser.next();
            if kind == EventKind::None {
                break;
            }
            request.feed(kind, value).unwrap();
        }
        request.finish().unwrap();
        request
    }

    #[test]
    fn required_resolves_the_single_enclosed_value() {
        let mut builder = RequestAutomaton::builder();
        builder.add_value("/Doc", "/Doc/title", 1).unwrap();
        let call = builder.add_call("/Doc", ClassId(1), 0, None, "result", 1).unwrap();
        builder.set_call_arg_item(call, 0, 1, ResolveType::Required, None).unwrap();
        let automaton = builder.done().unwrap();

        let alloc = Allocator::new();
        let request = drive(&automaton, &alloc, br#"{"Doc":{"title":"Hi"}}"#);
        let schedule = request.schedule().unwrap();
        let call_def = request.automaton().call_def(schedule[0].call_index).unwrap();
        let context = RequestContext::new();

        let call_alloc = Allocator::new();
        let args = resolve_call_args(call_def, schedule[0].scope, &request, &context, &call_alloc).unwrap();
        assert_eq!(args[0].tostring(&call_alloc).unwrap(), "Hi");
    }

    #[test]
    fn required_missing_item_is_value_undefined() {
        let mut builder = RequestAutomaton::builder();
        builder.add_value("/Doc", "/Doc/title", 1).unwrap();
        let call = builder.add_call("/Doc", ClassId(1), 0, None, "result", 1).unwrap();
        builder.set_call_arg_item(call, 0, 1, ResolveType::Required, None).unwrap();
        let automaton = builder.done().unwrap();

        let alloc = Allocator::new();
        let request = drive(&automaton, &alloc, br#"{"Doc":{}}"#);
        let schedule = request.schedule().unwrap();
        let call_def = request.automaton().call_def(schedule[0].call_index).unwrap();
        let context = RequestContext::new();

        let call_alloc = Allocator::new();
        let err = resolve_call_args(call_def, schedule[0].scope, &request, &context, &call_alloc).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueUndefined);
    }

    #[test]
    fn array_collects_every_enclosed_occurrence_in_order() {
        let mut builder = RequestAutomaton::builder();
        builder.add_value("/Doc", "/Doc/tag", 1).unwrap();
        let call = builder.add_call("/Doc", ClassId(1), 0, None, "result", 1).unwrap();
        builder.set_call_arg_item(call, 0, 1, ResolveType::Array, None).unwrap();
        let automaton = builder.done().unwrap();

        let alloc = Allocator::new();
        let request = drive(&automaton, &alloc, br#"{"Doc":{"tag":["a","b","c"]}}"#);
        let schedule = request.schedule().unwrap();
        let call_def = request.automaton().call_def(schedule[0].call_index).unwrap();
        let context = RequestContext::new();

        let call_alloc = Allocator::new();
        let args = resolve_call_args(call_def, schedule[0].scope, &request, &context, &call_alloc).unwrap();
        let ValueVariant::Serialization(ser) = &args[0] else { panic!("expected a serialization") };
        assert_eq!(ser.len(), 3);
    }

    #[test]
    fn var_source_pulls_from_the_request_context() {
        let mut builder = RequestAutomaton::builder();
        let call = builder.add_call("/Doc", ClassId(1), 1, Some("self"), "result", 1).unwrap();
        builder.set_call_arg_var(call, 0, "n").unwrap();
        let automaton = builder.done().unwrap();

        let alloc = Allocator::new();
        let request = drive(&automaton, &alloc, br#"{"Doc":{}}"#);
        let schedule = request.schedule().unwrap();
        let call_def = request.automaton().call_def(schedule[0].call_index).unwrap();
        let context = RequestContext::new();
        context.define_variable("n", &ValueVariant::Int(9)).unwrap();

        let call_alloc = Allocator::new();
        let args = resolve_call_args(call_def, schedule[0].scope, &request, &context, &call_alloc).unwrap();
        assert_eq!(args[0].toint().unwrap(), 9);
    }
}
