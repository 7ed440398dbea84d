//! `ScriptValue`: an owned, `Send`-safe tree the scripting runtime trades
//! across the Lua boundary. `ligature_value::ValueVariant` borrows from an
//! `Allocator` and its `HostObject` wraps a non-`Send` `Rc`, so it cannot be
//! captured inside the `'static + Send` closures `mlua`'s `send` feature
//! requires of registered functions; every Lua-reachable global instead
//! closes over this type, or over plain `Copy` tags, and the conversion to
//! and from `ValueVariant`/`EncNode` happens locally within one call, never
//! stored past it.

use mlua::{Lua, Value as LuaValue};

use ligature_encoder::{Atomic, EncNode};
use ligature_errors::{Error, ErrorCode, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Void,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    /// A Lua array-like table: consecutive integer keys starting at 1.
    Array(Vec<ScriptValue>),
    /// A Lua table with at least one non-integer (or non-consecutive) key.
    Struct(Vec<(String, ScriptValue)>),
}

impl ScriptValue {
    pub fn struct1(key: impl Into<String>, value: ScriptValue) -> Self {
        ScriptValue::Struct(vec![(key.into(), value)])
    }

    /// Convert into the intermediate tree the result encoder's style sinks
    /// render, losing nothing a JSON-ish Lua value could carry.
    pub fn into_enc_node(self) -> EncNode {
        match self {
            ScriptValue::Void => EncNode::Atomic(Atomic::Void),
            ScriptValue::Bool(b) => EncNode::Atomic(Atomic::Bool(b)),
            ScriptValue::Int(i) => EncNode::Atomic(Atomic::Int(i)),
            ScriptValue::Double(d) => EncNode::Atomic(Atomic::Double(d)),
            ScriptValue::String(s) => EncNode::Atomic(Atomic::String(s)),
            ScriptValue::Array(items) => {
                EncNode::Struct(items.into_iter().map(|item| (None, item.into_enc_node())).collect())
            }
            ScriptValue::Struct(fields) => {
                EncNode::Struct(fields.into_iter().map(|(name, value)| (Some(name), value.into_enc_node())).collect())
            }
        }
    }
}

/// Read one Lua value into a [`ScriptValue`], recursing into tables.
/// Function, userdata, thread and light-userdata values have no
/// serializable shape and are rejected with `TypeError`.
pub fn from_lua(value: &LuaValue) -> Result<ScriptValue> {
    match value {
        LuaValue::Nil => Ok(ScriptValue::Void),
        LuaValue::Boolean(b) => Ok(ScriptValue::Bool(*b)),
        LuaValue::Integer(i) => Ok(ScriptValue::Int(*i)),
        LuaValue::Number(d) => Ok(ScriptValue::Double(*d)),
        LuaValue::String(s) => {
            let text = s.to_str().map_err(|e| Error::new(ErrorCode::EncodingError, e.to_string()))?;
            Ok(ScriptValue::String(text.to_string()))
        }
        LuaValue::Table(table) => {
            let len = table.raw_len();
            let mut is_array = len > 0;
            if is_array {
                for pair in table.clone().pairs::<LuaValue, LuaValue>() {
                    let (key, _) = pair.map_err(|e| Error::new(ErrorCode::BindingLanguageError, e.to_string()))?;
                    match key {
                        LuaValue::Integer(i) if i >= 1 && (i as usize) <= len => {}
                        _ => {
                            is_array = false;
                            break;
                        }
                    }
                }
            }
            if is_array {
                let mut items = Vec::with_capacity(len);
                for i in 1..=len {
                    let item: LuaValue = table.get(i).map_err(|e| Error::new(ErrorCode::BindingLanguageError, e.to_string()))?;
                    items.push(from_lua(&item)?);
                }
                Ok(ScriptValue::Array(items))
            } else {
                let mut fields = Vec::new();
                for pair in table.clone().pairs::<LuaValue, LuaValue>() {
                    let (key, value) = pair.map_err(|e| Error::new(ErrorCode::BindingLanguageError, e.to_string()))?;
                    let name = match key {
                        LuaValue::String(s) => s.to_str().map_err(|e| Error::new(ErrorCode::EncodingError, e.to_string()))?.to_string(),
                        LuaValue::Integer(i) => i.to_string(),
                        LuaValue::Number(d) => d.to_string(),
                        other => {
                            return Err(Error::new(
                                ErrorCode::TypeError,
                                format!("table key of type '{}' cannot be rendered", other.type_name()),
                            ))
                        }
                    };
                    fields.push((name, from_lua(&value)?));
                }
                Ok(ScriptValue::Struct(fields))
            }
        }
        other => Err(Error::new(ErrorCode::TypeError, format!("cannot convert a Lua {} to a result value", other.type_name()))),
    }
}

/// Build a Lua value back out of a [`ScriptValue`], the inverse of
/// [`from_lua`], used to hand delegate results and `schema()` output back
/// to the running script.
pub fn to_lua(lua: &Lua, value: &ScriptValue) -> mlua::Result<LuaValue> {
    match value {
        ScriptValue::Void => Ok(LuaValue::Nil),
        ScriptValue::Bool(b) => Ok(LuaValue::Boolean(*b)),
        ScriptValue::Int(i) => Ok(LuaValue::Integer(*i)),
        ScriptValue::Double(d) => Ok(LuaValue::Number(*d)),
        ScriptValue::String(s) => Ok(LuaValue::String(lua.create_string(s)?)),
        ScriptValue::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.set(i + 1, to_lua(lua, item)?)?;
            }
            Ok(LuaValue::Table(table))
        }
        ScriptValue::Struct(fields) => {
            let table = lua.create_table()?;
            for (name, value) in fields {
                table.set(name.as_str(), to_lua(lua, value)?)?;
            }
            Ok(LuaValue::Table(table))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ligature_encoder::EncNode;
    use mlua::Lua;

    #[test]
    fn array_like_tables_round_trip_as_arrays() {
        let lua = Lua::new();
        let table = lua.create_table().unwrap();
        table.set(1, "a").unwrap();
        table.set(2, "b").unwrap();
        let parsed = from_lua(&LuaValue::Table(table)).unwrap();
        assert!(matches!(parsed, ScriptValue::Array(items) if items.len() == 2));
    }

    #[test]
    fn string_keyed_tables_become_structs() {
        let lua = Lua::new();
        let table = lua.create_table().unwrap();
        table.set("v", 7i64).unwrap();
        let parsed = from_lua(&LuaValue::Table(table)).unwrap();
        let ScriptValue::Struct(fields) = parsed else { panic!("expected struct") };
        assert_eq!(fields[0].0, "v");
        assert_eq!(fields[0].1, ScriptValue::Int(7));
    }

    #[test]
    fn into_enc_node_preserves_shape() {
        let v = ScriptValue::struct1("root", ScriptValue::Array(vec![ScriptValue::Int(1), ScriptValue::Int(2)]));
        let EncNode::Struct(fields) = v.into_enc_node() else { panic!() };
        assert_eq!(fields[0].0.as_deref(), Some("root"));
    }

    #[test]
    fn function_values_are_rejected() {
        let lua = Lua::new();
        let f = lua.create_function(|_, ()| Ok(())).unwrap();
        let err = from_lua(&LuaValue::Function(f)).unwrap_err();
        assert_eq!(err.code, ligature_errors::ErrorCode::TypeError);
    }
}
