//! The automaton's definition API: `add_call`/`add_structure`/`add_value`
//! plus their slot setters, `open_group`/`close_group`, and `done()`, as
//! spec.md §4.F describes. Consumed once per automaton; `done()` compiles
//! the declared selectors and hands back an immutable [`RequestAutomaton`].

use fxhash::FxHashMap;

use ligature_errors::{constants::MAX_NOF_ARGUMENTS, Error, ErrorCode, Result};
use ligature_value::ClassId;

use crate::classdef::ClassTable;
use crate::schema_description::SchemaDescription;
use crate::selector::{parse_selector, Selector};
use crate::RequestAutomaton;

/// How an argument slot or structure member resolves its value at call
/// time, per spec.md §4.F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveType {
    Required,
    Optional,
    Inherited,
    Array,
    ArrayNonEmpty,
}

/// Where one argument slot (or structure member) draws its value from:
/// either a named context variable, or an automaton item resolved against
/// the call's scope.
#[derive(Debug, Clone)]
pub enum ArgSource {
    Var(String),
    Item { itemid: u32, resolve: ResolveType, max_tag_diff: Option<u32> },
}

#[derive(Debug, Clone)]
pub struct ValueDef {
    pub itemid: u32,
    pub scope_expr: Selector,
    pub select_expr: Selector,
}

#[derive(Debug, Clone)]
pub struct StructMember {
    pub name: Option<String>,
    pub source: ArgSource,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub itemid: u32,
    pub expr: Selector,
    pub members: Vec<StructMember>,
}

#[derive(Debug, Clone)]
pub struct CallDef {
    pub expr: Selector,
    pub classid: ClassId,
    pub funcid: u32,
    pub self_var: Option<String>,
    pub result_var: String,
    pub args: Vec<Option<ArgSource>>,
    pub group: Option<u32>,
    pub append: bool,
    pub prioritize: bool,
}

impl CallDef {
    /// `funcid == 0` is the constructor convention spec.md §4.H names.
    pub fn is_constructor(&self) -> bool {
        self.funcid == 0
    }
}

pub struct RequestAutomatonBuilder {
    calls: Vec<CallDef>,
    structures: Vec<StructDef>,
    values: Vec<ValueDef>,
    classes: ClassTable,
    description: SchemaDescription,
    group_stack: Vec<u32>,
}

impl RequestAutomatonBuilder {
    pub fn new() -> Self {
        RequestAutomatonBuilder {
            calls: Vec::new(),
            structures: Vec::new(),
            values: Vec::new(),
            classes: ClassTable::new(),
            description: SchemaDescription::new(),
            group_stack: Vec::new(),
        }
    }

    pub fn register_class(&mut self, id: ClassId, name: impl Into<String>) -> &mut Self {
        self.classes.register(id, name);
        self
    }

    pub fn open_group(&mut self, groupid: u32) {
        self.group_stack.push(groupid);
    }

    pub fn close_group(&mut self) -> Result<()> {
        self.group_stack
            .pop()
            .map(|_| ())
            .ok_or_else(|| Error::new(ErrorCode::ExecutionOrder, "close_group with no matching open_group"))
    }

    fn current_group(&self) -> Option<u32> {
        self.group_stack.last().copied()
    }

    pub fn add_value(&mut self, scope_expr: &str, select_expr: &str, itemid: u32) -> Result<()> {
        let scope = parse_selector(scope_expr)?;
        let select = parse_selector(select_expr)?;
        self.description.record_value(itemid, scope_expr, select_expr);
        self.values.push(ValueDef { itemid, scope_expr: scope, select_expr: select });
        Ok(())
    }

    /// Returns the structure's index, used by [`Self::set_structure_element`].
    pub fn add_structure(&mut self, expr: &str, itemid: u32, n_members: usize) -> Result<usize> {
        let sel = parse_selector(expr)?;
        let idx = self.structures.len();
        self.structures.push(StructDef { itemid, expr: sel, members: Vec::with_capacity(n_members) });
        Ok(idx)
    }

    pub fn set_structure_element(
        &mut self,
        struct_idx: usize,
        name: Option<&str>,
        source: ArgSource,
    ) -> Result<()> {
        let def = self
            .structures
            .get_mut(struct_idx)
            .ok_or_else(|| Error::new(ErrorCode::AddressedItemNotFound, "no such structure index"))?;
        def.members.push(StructMember { name: name.map(String::from), source });
        Ok(())
    }

    /// Returns the call's index, used by [`Self::set_call_arg_var`] /
    /// [`Self::set_call_arg_item`] / [`Self::mark_append`] /
    /// [`Self::prioritize_last_call`].
    pub fn add_call(
        &mut self,
        expr: &str,
        classid: ClassId,
        funcid: u32,
        self_var: Option<&str>,
        result_var: &str,
        nargs: usize,
    ) -> Result<usize> {
        if nargs > MAX_NOF_ARGUMENTS {
            return Err(Error::new(
                ErrorCode::NofArgsError,
                format!("call '{expr}' declares {nargs} arguments, more than the {MAX_NOF_ARGUMENTS} limit"),
            ));
        }
        let sel = parse_selector(expr)?;
        let idx = self.calls.len();
        self.description.record_call(
            expr,
            format!(
                "class {} func {} -> {}",
                classid.0,
                funcid,
                result_var
            ),
        );
        self.calls.push(CallDef {
            expr: sel,
            classid,
            funcid,
            self_var: self_var.map(String::from),
            result_var: result_var.to_string(),
            args: vec![None; nargs],
            group: self.current_group(),
            append: false,
            prioritize: false,
        });
        Ok(idx)
    }

    fn call_mut(&mut self, call_idx: usize) -> Result<&mut CallDef> {
        self.calls
            .get_mut(call_idx)
            .ok_or_else(|| Error::new(ErrorCode::AddressedItemNotFound, "no such call index"))
    }

    fn set_arg(&mut self, call_idx: usize, slot: usize, source: ArgSource) -> Result<()> {
        let call = self.call_mut(call_idx)?;
        let dest = call
            .args
            .get_mut(slot)
            .ok_or_else(|| Error::new(ErrorCode::NofArgsError, format!("argument slot {slot} out of range")))?;
        if dest.is_some() {
            return Err(Error::new(
                ErrorCode::MixedConstruction,
                format!("argument slot {slot} is already bound"),
            ));
        }
        *dest = Some(source);
        Ok(())
    }

    pub fn set_call_arg_var(&mut self, call_idx: usize, slot: usize, varname: &str) -> Result<()> {
        self.set_arg(call_idx, slot, ArgSource::Var(varname.to_string()))
    }

    pub fn set_call_arg_item(
        &mut self,
        call_idx: usize,
        slot: usize,
        itemid: u32,
        resolve: ResolveType,
        max_tag_diff: Option<u32>,
    ) -> Result<()> {
        self.set_arg(call_idx, slot, ArgSource::Item { itemid, resolve, max_tag_diff })
    }

    /// Supplemented feature: a call marked `append` folds repeated results
    /// into a `Serialization` on its `resultVar` instead of overwriting it.
    pub fn mark_append(&mut self, call_idx: usize) -> Result<()> {
        self.call_mut(call_idx)?.append = true;
        Ok(())
    }

    /// Supplemented feature (`requestAutomaton.cpp`): the most recently
    /// added call executes before other calls tied on `(scope, group)`.
    pub fn prioritize_last_call(&mut self) -> Result<()> {
        self.calls
            .last_mut()
            .ok_or_else(|| Error::new(ErrorCode::LogicError, "no call has been added yet"))?
            .prioritize = true;
        Ok(())
    }

    /// Finalize the builder. Rejects an unbalanced `open_group`/
    /// `close_group` nesting and any call with an unbound argument slot.
    pub fn done(self) -> Result<RequestAutomaton> {
        if !self.group_stack.is_empty() {
            return Err(Error::new(ErrorCode::ExecutionOrder, "open_group without a matching close_group"));
        }
        for (idx, call) in self.calls.iter().enumerate() {
            if call.args.iter().any(Option::is_none) {
                return Err(Error::new(
                    ErrorCode::NofArgsError,
                    format!("call #{idx} ('{}') has an unbound argument slot", call.expr.source),
                ));
            }
        }

        let mut description = self.description;
        for def in &self.structures {
            description.record_structure(def.itemid, &def.expr.source, &collect_member_names(def));
        }

        let mut group_rank = FxHashMap::default();
        let mut next_rank = 0u32;
        for call in &self.calls {
            if let Some(g) = call.group {
                group_rank.entry(g).or_insert_with(|| {
                    let rank = next_rank;
                    next_rank += 1;
                    rank
                });
            }
        }

        Ok(RequestAutomaton {
            calls: self.calls,
            structures: self.structures,
            values: self.values,
            classes: self.classes,
            description,
            group_rank,
        })
    }
}

impl Default for RequestAutomatonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_member_names(def: &StructDef) -> Vec<String> {
    def.members.iter().map(|m| m.name.clone().unwrap_or_default()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_call_rejects_too_many_arguments() {
        let mut b = RequestAutomatonBuilder::new();
        let err = b.add_call("/Doc", ClassId(1), 0, None, "result", MAX_NOF_ARGUMENTS + 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::NofArgsError);
    }

    #[test]
    fn done_rejects_unbound_argument_slots() {
        let mut b = RequestAutomatonBuilder::new();
        b.add_call("/Doc", ClassId(1), 0, None, "result", 1).unwrap();
        let err = b.done().unwrap_err();
        assert_eq!(err.code, ErrorCode::NofArgsError);
    }

    #[test]
    fn done_rejects_unbalanced_groups() {
        let mut b = RequestAutomatonBuilder::new();
        b.open_group(1);
        let err = b.done().unwrap_err();
        assert_eq!(err.code, ErrorCode::ExecutionOrder);
    }

    #[test]
    fn set_arg_twice_is_mixed_construction() {
        let mut b = RequestAutomatonBuilder::new();
        let call = b.add_call("/Doc", ClassId(1), 0, None, "result", 1).unwrap();
        b.set_call_arg_var(call, 0, "title").unwrap();
        let err = b.set_call_arg_var(call, 0, "other").unwrap_err();
        assert_eq!(err.code, ErrorCode::MixedConstruction);
    }
}
