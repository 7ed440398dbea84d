//! `RequestContextPool`: a `(type, name) -> RequestContext` map mutated by
//! whole-map copy-on-write, so lookups never need a reader lock -- per
//! spec.md §4.G / §5's "rare writes, frequent reads" shared-resource policy.

use std::cell::RefCell;
use std::rc::Rc;

use fxhash::FxHashMap;

use crate::context::RequestContext;

type Key = (String, String);
type Map = FxHashMap<Key, Rc<RequestContext>>;

/// Readers call [`RequestContextPool::snapshot`] once and keep iterating the
/// returned `Rc<Map>` even if the pool is mutated concurrently; they see a
/// consistent view for as long as they hold it.
pub struct RequestContextPool {
    map: RefCell<Rc<Map>>,
}

impl RequestContextPool {
    pub fn new() -> Self {
        RequestContextPool { map: RefCell::new(Rc::new(FxHashMap::default())) }
    }

    /// A reference-counted snapshot of the current `(type, name) ->
    /// context` map, stable against later writer mutation.
    pub fn snapshot(&self) -> Rc<Map> {
        Rc::clone(&self.map.borrow())
    }

    pub fn get(&self, type_: &str, name: &str) -> Option<Rc<RequestContext>> {
        self.map.borrow().get(&(type_.to_string(), name.to_string())).cloned()
    }

    /// Install `context` under `(type, name)`, replacing the whole map with
    /// a clone that has the one entry updated.
    pub fn transfer_context(&self, type_: &str, name: &str, context: Rc<RequestContext>) {
        let mut next = (**self.map.borrow()).clone();
        next.insert((type_.to_string(), name.to_string()), context);
        *self.map.borrow_mut() = Rc::new(next);
    }

    pub fn remove_context(&self, type_: &str, name: &str) -> Option<Rc<RequestContext>> {
        let mut next = (**self.map.borrow()).clone();
        let removed = next.remove(&(type_.to_string(), name.to_string()));
        *self.map.borrow_mut() = Rc::new(next);
        removed
    }

    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RequestContextPool {
    fn default() -> Self {
        Self::new()
    }
}
