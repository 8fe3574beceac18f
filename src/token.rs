//! Identifier interning.
//!
//! Every name in a Rill AST — variables, fields, methods, status string
//! literals, even synthesized decimal constants — is an `Ident` index into a
//! shared `IdMap`. The checker compares identifiers by index and only touches
//! the string table when synthesizing new constant expressions or printing
//! diagnostics.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ident(pub u32);

#[derive(Debug, Default)]
pub struct IdMap {
    names: Vec<String>,
    by_name: HashMap<String, Ident>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `name`, returning the existing `Ident` if already present.
    pub fn insert(&mut self, name: &str) -> Ident {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = Ident(self.names.len() as u32);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<Ident> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: Ident) -> &str {
        self.names
            .get(id.0 as usize)
            .map(String::as_str)
            .unwrap_or("")
    }
}
