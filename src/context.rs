/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2021 Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::algebra::Symbol;
use std::collections::HashMap;

/// Issues and tracks every named unknown of a derivation run.
///
/// The context replaces a process wide registry: it is created by the derivation process and
/// threaded through every constructor which needs new symbols. Reusing a name does not fail, since
/// a symbol's identity is its name, but it is logged and reported by [`DerivationContext::collisions`].
#[derive(Clone, Debug, Default)]
pub struct DerivationContext {
    names: Vec<String>,
    symbols: HashMap<String, Symbol>,
}

impl DerivationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a named unknown and records its name.
    pub fn create_symbol(&mut self, name: &str) -> Symbol {
        if let Some(existing) = self.symbols.get(name) {
            warn!("symbol `{name}` was already issued, both uses refer to the same unknown");
            self.names.push(name.to_string());
            return existing.clone();
        }
        let symbol = Symbol::new(name);
        self.names.push(name.to_string());
        self.symbols.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn create_symbols(&mut self, names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|name| self.create_symbol(name)).collect()
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).cloned()
    }

    /// Every issued name, in issue order, including repeated names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Names which were issued more than once.
    pub fn collisions(&self) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut collisions = Vec::new();
        for name in &self.names {
            let count = counts.entry(name.as_str()).or_insert(0);
            *count += 1;
            if *count == 2 {
                collisions.push(name.clone());
            }
        }
        collisions
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}
