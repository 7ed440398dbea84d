//! `serialize_request_result`: spec.md §4.H's closing operation -- collect
//! every non-local, never-inherited, non-`HostObject` variable left in a
//! finished request's context into the response `Serialization` the
//! result encoder renders.

use ligature_alloc::Allocator;
use ligature_context::RequestContext;
use ligature_errors::Result;
use ligature_value::{Serialization, ValueVariant};

use crate::args::copy_value;

/// Build the response structure: one `Name`/`Value` (or `Name`/`Open...Close`)
/// pair per surviving variable, in `list_variables`' order. A `HostObject`
/// carries no serializable representation and is skipped, the same as a
/// variable some call captured purely for later reuse.
pub fn serialize_request_result<'dst>(context: &RequestContext, alloc: &'dst Allocator) -> Result<&'dst Serialization<'dst>> {
    let ser = alloc.retain(Serialization::new());
    for name in context.list_variables(0) {
        let value = context.get_variable(&name).expect("a listed variable is always defined");
        if matches!(value, ValueVariant::HostObject(_)) {
            continue;
        }
        let copied = copy_value(value, alloc)?;
        ser.push_name(alloc.copy_string(&name));
        ser.push_value(copied);
    }
    Ok(ser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligature_value::ValueVariant;

    #[test]
    fn collects_non_local_zero_inherit_variables() {
        let context = RequestContext::new();
        context.define_variable("title", &ValueVariant::Int(7)).unwrap();
        context.define_variable("_scratch", &ValueVariant::Int(1)).unwrap();

        let alloc = Allocator::new();
        let ser = serialize_request_result(&context, &alloc).unwrap();
        assert_eq!(ser.len(), 2);
        let mut it = ser.iter();
        assert_eq!(it.name(), Some("title"));
    }

    #[test]
    fn inherited_variables_are_excluded() {
        let parent = RequestContext::new();
        parent.define_variable("shared", &ValueVariant::Int(1)).unwrap();
        let child = RequestContext::new();
        child.inherit(&parent).unwrap();

        let alloc = Allocator::new();
        let ser = serialize_request_result(&child, &alloc).unwrap();
        assert!(ser.is_empty());
    }
}
