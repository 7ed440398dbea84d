//! `RequestContext`: an ordered, named bag of variables private to one
//! request (or one pool entry inherited by many), each carrying the
//! inherit-count spec.md §4.G uses to decide what gets exported into a
//! response and what a child context absorbs from a parent.

use std::cell::RefCell;

use ligature_alloc::Allocator;
use ligature_errors::{Error, ErrorCode, Result};
use ligature_value::{deep_copy_nodes, deepcopy_atomic, HostObject, Serialization, ValueVariant};

/// `[A-Za-z0-9_][A-Za-z0-9_]*`, as spec.md §4.G requires; names beginning
/// with `_` additionally mark the variable as local (never exported by
/// [`RequestContext::list_variables`] or absorbed by [`RequestContext::inherit`]).
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let ok = matches!(chars.next(), Some(c) if c.is_ascii_alphanumeric() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok && !name.is_empty() {
        Ok(())
    } else {
        Err(Error::new(ErrorCode::InvalidRequest, format!("'{name}' is not a valid variable name")))
    }
}

pub fn is_local(name: &str) -> bool {
    name.starts_with('_')
}

/// A variable entry. `value` is erased to `'static` internally -- see
/// [`RequestContext`]'s safety note -- and only ever handed back out with a
/// lifetime tied to `&self`.
struct VarEntry {
    name: String,
    value: ValueVariant<'static>,
    inherit_count: u32,
}

/// A named mapping `name -> (value, inherit_count)`, backed by its own
/// private [`Allocator`]. Every variable is deep-copied into that allocator
/// at [`RequestContext::define_variable`] time, so the context is the sole
/// owner of everything it holds -- including any `HostObject` it captures,
/// whose destructor now runs when this context (and its allocator) drops.
///
/// # Safety
/// `VarEntry::value` is stored with its borrowed lifetime erased to
/// `'static` because a context's allocator and its variable list must live
/// in the same `struct` without a self-referential lifetime parameter. Every
/// value reachable from `value` was deep-copied into `self.alloc` by
/// [`RequestContext::define_variable`] or [`RequestContext::inherit`], so it
/// is valid for exactly as long as `self` is; every public accessor narrows
/// the erased lifetime back down to `&self`'s before returning it, so no
/// caller ever observes a `'static` borrow that outlives the context.
pub struct RequestContext {
    alloc: Allocator,
    vars: RefCell<Vec<Box<VarEntry>>>,
}

impl RequestContext {
    pub fn new() -> Self {
        RequestContext { alloc: Allocator::new(), vars: RefCell::new(Vec::new()) }
    }

    /// Deep-copy `value` into this context's private allocator and bind it
    /// to `name`, moving ownership of any `HostObject` it carries into the
    /// context. Overwrites a prior definition of the same name.
    pub fn define_variable(&self, name: &str, value: &ValueVariant<'_>) -> Result<()> {
        validate_name(name)?;
        let copied = clone_into(value, &self.alloc, true)?;
        // SAFETY: see the struct-level safety note; `copied` was just built
        // in `self.alloc`.
        let erased: ValueVariant<'static> = unsafe { std::mem::transmute(copied) };

        let mut vars = self.vars.borrow_mut();
        if let Some(existing) = vars.iter_mut().find(|v| v.name == name) {
            existing.value = erased;
            existing.inherit_count = 0;
        } else {
            vars.push(Box::new(VarEntry { name: name.to_string(), value: erased, inherit_count: 0 }));
        }
        Ok(())
    }

    /// A borrowed pointer to the named variable, living as long as `&self`.
    pub fn get_variable(&self, name: &str) -> Option<&ValueVariant<'_>> {
        let vars = self.vars.borrow();
        let entry = vars.iter().find(|v| v.name == name)?;
        let ptr: *const ValueVariant<'static> = &entry.value;
        // SAFETY: `entry` lives in a `Box` that is never moved once pushed
        // (the outer `Vec` only grows by appending new `Box`es), and its
        // referents live in `self.alloc`, which outlives `self`.
        Some(unsafe { &*(ptr as *const ValueVariant<'_>) })
    }

    pub fn inherit_count_of(&self, name: &str) -> Option<u32> {
        self.vars.borrow().iter().find(|v| v.name == name).map(|v| v.inherit_count)
    }

    /// Names of every non-local variable whose inherit count is at most
    /// `max_inherit`.
    pub fn list_variables(&self, max_inherit: u32) -> Vec<String> {
        self.vars
            .borrow()
            .iter()
            .filter(|v| !is_local(&v.name) && v.inherit_count <= max_inherit)
            .map(|v| v.name.clone())
            .collect()
    }

    /// Append `value` onto the `Serialization` bound to `name`, creating an
    /// empty one first if `name` is not yet defined. Used by the executor for
    /// calls marked *append* (spec.md §4.H), where repeated calls accumulate
    /// into one result variable instead of overwriting it.
    pub fn append_to_serialization(&self, name: &str, value: &ValueVariant<'_>) -> Result<()> {
        validate_name(name)?;
        let copied = clone_into(value, &self.alloc, true)?;
        // SAFETY: see the struct-level safety note; `copied` was just built
        // in `self.alloc`.
        let erased: ValueVariant<'static> = unsafe { std::mem::transmute(copied) };

        let mut vars = self.vars.borrow_mut();
        match vars.iter_mut().find(|v| v.name == name) {
            Some(existing) => match &existing.value {
                ValueVariant::Serialization(ser) => {
                    ser.push_value(erased);
                }
                _ => {
                    return Err(Error::new(
                        ErrorCode::MixedConstruction,
                        format!("'{name}' is already bound to a non-serialization value"),
                    ))
                }
            },
            None => {
                let ser: &Serialization<'static> = self.alloc.retain(Serialization::new());
                ser.push_value(erased);
                vars.push(Box::new(VarEntry {
                    name: name.to_string(),
                    value: ValueVariant::Serialization(ser),
                    inherit_count: 0,
                }));
            }
        }
        Ok(())
    }

    /// Merge every non-local variable of `parent` that this context does not
    /// already define into self, bumping its inherit count by one over the
    /// parent's. A name already present with a *different* value is a
    /// `DuplicateDefinition`; present with an equal value is left alone.
    pub fn inherit(&self, parent: &RequestContext) -> Result<()> {
        let parent_entries: Vec<(String, ValueVariant<'_>, u32)> = parent
            .vars
            .borrow()
            .iter()
            .filter(|v| !is_local(&v.name))
            .map(|v| (v.name.clone(), v.value.clone(), v.inherit_count))
            .collect();

        for (name, value, count) in parent_entries {
            let conflict = {
                let vars = self.vars.borrow();
                vars.iter().find(|v| v.name == name).map(|v| !same_value(&v.value, &value))
            };
            match conflict {
                Some(true) => {
                    return Err(Error::new(
                        ErrorCode::DuplicateDefinition,
                        format!("'{name}' is already defined with a different value"),
                    ))
                }
                Some(false) => continue,
                None => {
                    let copied = clone_into(&value, &self.alloc, false)?;
                    // SAFETY: see the struct-level safety note.
                    let erased: ValueVariant<'static> = unsafe { std::mem::transmute(copied) };
                    self.vars.borrow_mut().push(Box::new(VarEntry {
                        name,
                        value: erased,
                        inherit_count: count + 1,
                    }));
                }
            }
        }
        Ok(())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Pragmatic resolution of "same value pointer": atomics compare by value
/// and `HostObject`s by shared-handle identity; composite values are never
/// equal since they are always deep-copied rather than aliased.
fn same_value(a: &ValueVariant<'_>, b: &ValueVariant<'_>) -> bool {
    use ValueVariant::*;
    match (a, b) {
        (Void, Void) => true,
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (Double(x), Double(y)) => x == y,
        (String(x), String(y)) => x.encoding == y.encoding && x.bytes == y.bytes,
        (HostObject(x), HostObject(y)) => x.is_same(y),
        _ => false,
    }
}

/// Deep-copy an arbitrary `ValueVariant` -- atomic, `Serialization`, or
/// `Iterator` -- into `alloc`. Iterators are expanded into a `Serialization`
/// in the process, matching [`ligature_value::deepcopy`]'s treatment of
/// iterator-valued nodes.
fn clone_into<'dst>(
    value: &ValueVariant<'_>,
    alloc: &'dst Allocator,
    move_host_objects: bool,
) -> Result<ValueVariant<'dst>> {
    match value {
        ValueVariant::Serialization(ser) => {
            let dest = alloc.retain(Serialization::new());
            deep_copy_nodes(ser, dest, alloc, move_host_objects)?;
            Ok(ValueVariant::Serialization(dest))
        }
        ValueVariant::Iterator(_) => {
            let wrapper = Serialization::new();
            wrapper.push_value(value.clone());
            let dest = alloc.retain(Serialization::new());
            deep_copy_nodes(&wrapper, dest, alloc, move_host_objects)?;
            Ok(ValueVariant::Serialization(dest))
        }
        other => deepcopy_atomic(other, alloc, move_host_objects),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligature_alloc::Encoding;
    use ligature_value::StringValue;

    #[test]
    fn validate_name_rejects_leading_punctuation() {
        assert!(validate_name("abc_1").is_ok());
        assert!(validate_name("_local").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("has space").is_err());
    }

    #[test]
    fn define_and_get_round_trips_an_atomic_value() {
        let ctx = RequestContext::new();
        ctx.define_variable("n", &ValueVariant::Int(7)).unwrap();
        assert_eq!(ctx.get_variable("n").unwrap().toint().unwrap(), 7);
        assert!(ctx.get_variable("missing").is_none());
    }

    #[test]
    fn define_variable_copies_strings_into_its_own_allocator() {
        let source_alloc = Allocator::new();
        let ctx = RequestContext::new();
        let bytes = source_alloc.copy_string("hello").as_bytes();
        let v = ValueVariant::String(StringValue::new(bytes, Encoding::Utf8));
        ctx.define_variable("s", &v).unwrap();
        drop(source_alloc);
        assert_eq!(ctx.get_variable("s").unwrap().tostring(&Allocator::new()).unwrap(), "hello");
    }

    #[test]
    fn list_variables_excludes_locals() {
        let ctx = RequestContext::new();
        ctx.define_variable("result", &ValueVariant::Int(1)).unwrap();
        ctx.define_variable("_scratch", &ValueVariant::Int(2)).unwrap();
        let names = ctx.list_variables(0);
        assert_eq!(names, vec!["result".to_string()]);
    }

    #[test]
    fn inherit_merges_non_conflicting_variables_and_bumps_count() {
        let parent = RequestContext::new();
        parent.define_variable("shared", &ValueVariant::Int(1)).unwrap();
        parent.define_variable("_hidden", &ValueVariant::Int(2)).unwrap();

        let child = RequestContext::new();
        child.inherit(&parent).unwrap();

        assert_eq!(child.get_variable("shared").unwrap().toint().unwrap(), 1);
        assert!(child.get_variable("_hidden").is_none());
        assert_eq!(child.inherit_count_of("shared"), Some(1));
    }

    #[test]
    fn inherit_rejects_conflicting_redefinition() {
        let parent = RequestContext::new();
        parent.define_variable("x", &ValueVariant::Int(1)).unwrap();

        let child = RequestContext::new();
        child.define_variable("x", &ValueVariant::Int(2)).unwrap();

        let err = child.inherit(&parent).unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateDefinition);
    }

    #[test]
    fn append_to_serialization_accumulates_across_calls() {
        let ctx = RequestContext::new();
        ctx.append_to_serialization("rows", &ValueVariant::Int(1)).unwrap();
        ctx.append_to_serialization("rows", &ValueVariant::Int(2)).unwrap();

        let ValueVariant::Serialization(ser) = ctx.get_variable("rows").unwrap() else {
            panic!("expected a serialization");
        };
        assert_eq!(ser.len(), 2);
    }

    #[test]
    fn append_to_serialization_rejects_a_non_serialization_name() {
        let ctx = RequestContext::new();
        ctx.define_variable("n", &ValueVariant::Int(1)).unwrap();
        let err = ctx.append_to_serialization("n", &ValueVariant::Int(2)).unwrap_err();
        assert_eq!(err.code, ErrorCode::MixedConstruction);
    }

    #[test]
    fn inherit_is_idempotent_for_equal_values() {
        let parent = RequestContext::new();
        parent.define_variable("x", &ValueVariant::Int(1)).unwrap();

        let child = RequestContext::new();
        child.define_variable("x", &ValueVariant::Int(1)).unwrap();
        child.inherit(&parent).unwrap();
        assert_eq!(child.get_variable("x").unwrap().toint().unwrap(), 1);
    }
}
