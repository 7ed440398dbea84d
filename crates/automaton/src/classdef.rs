//! `classdef`: a compact `classid -> name` table, used both for
//! `TypeError`/`MissingSelf` diagnostics that name the expected class and by
//! the executor's constructor dispatch (spec.md §4 "Supplemented features").

use ligature_value::ClassId;

pub struct ClassDef {
    pub id: ClassId,
    pub name: String,
}

#[derive(Default)]
pub struct ClassTable {
    defs: Vec<ClassDef>,
}

impl ClassTable {
    pub fn new() -> Self {
        ClassTable::default()
    }

    pub fn register(&mut self, id: ClassId, name: impl Into<String>) {
        self.defs.push(ClassDef { id, name: name.into() });
    }

    pub fn name_of(&self, id: ClassId) -> Option<&str> {
        self.defs.iter().find(|d| d.id == id).map(|d| d.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_resolves_class_names() {
        let mut table = ClassTable::new();
        table.register(ClassId(1), "Doc");
        assert_eq!(table.name_of(ClassId(1)), Some("Doc"));
        assert_eq!(table.name_of(ClassId(2)), None);
    }
}
