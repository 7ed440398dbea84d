//! `SchemaDescription`: a by-product recorder, populated alongside
//! [`crate::builder::RequestAutomatonBuilder`]'s `add_call`/`add_structure`/
//! `add_value`, that exists purely for introspection -- documentation tools
//! or a `--describe` CLI flag can render the set of paths an automaton
//! accepts, or a skeleton example document, without re-deriving it from the
//! compiled selector automaton (spec.md §4 "Supplemented features").

#[derive(Debug, Clone)]
struct ValueEntry {
    itemid: u32,
    scope_expr: String,
    select_expr: String,
}

#[derive(Debug, Clone)]
struct StructEntry {
    itemid: u32,
    expr: String,
    members: Vec<String>,
}

#[derive(Debug, Clone)]
struct CallEntry {
    expr: String,
    description: String,
}

#[derive(Debug, Default)]
pub struct SchemaDescription {
    values: Vec<ValueEntry>,
    structures: Vec<StructEntry>,
    calls: Vec<CallEntry>,
}

impl SchemaDescription {
    pub fn new() -> Self {
        SchemaDescription::default()
    }

    pub fn record_value(&mut self, itemid: u32, scope_expr: &str, select_expr: &str) {
        self.values.push(ValueEntry {
            itemid,
            scope_expr: scope_expr.to_string(),
            select_expr: select_expr.to_string(),
        });
    }

    pub fn record_structure(&mut self, itemid: u32, expr: &str, members: &[String]) {
        self.structures.push(StructEntry { itemid, expr: expr.to_string(), members: members.to_vec() });
    }

    pub fn record_call(&mut self, expr: &str, description: impl Into<String>) {
        self.calls.push(CallEntry { expr: expr.to_string(), description: description.into() });
    }

    /// Every selector expression this automaton's builder declared, in
    /// declaration order -- the union of value, structure, and call paths.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        out.extend(self.values.iter().map(|v| v.select_expr.as_str()));
        out.extend(self.structures.iter().map(|s| s.expr.as_str()));
        out.extend(self.calls.iter().map(|c| c.expr.as_str()));
        out
    }

    /// A human-readable skeleton of every path this automaton accepts, one
    /// line per declared item, sorted for deterministic output. Not a
    /// real example document -- just enough to see the shape at a glance.
    pub fn render_example(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for v in &self.values {
            lines.push(format!("{} (item {}, scope {})", v.select_expr, v.itemid, v.scope_expr));
        }
        for s in &self.structures {
            lines.push(format!("{} (struct item {}, members: {})", s.expr, s.itemid, s.members.join(", ")));
        }
        for c in &self.calls {
            lines.push(format!("{} -> {}", c.expr, c.description));
        }
        lines.sort();
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_example_lists_every_declared_item() {
        let mut desc = SchemaDescription::new();
        desc.record_value(1, "/Doc", "/Doc/title");
        desc.record_call("/Doc", "Doc.new(title)");
        let rendered = desc.render_example();
        assert!(rendered.contains("/Doc/title"));
        assert!(rendered.contains("Doc.new(title)"));
    }
}
