//! Symbols and name resolution across a file and its dependencies.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::lex::{Token, DIFF_KEYWORD};
use crate::proof::{Assertion, Theorem};
use crate::term::TermCtor;

#[derive(Debug)]
pub struct TypeDef {
    pub name: Arc<Token>,
}

#[derive(Debug, Clone)]
pub enum Symbol {
    Type(Arc<TypeDef>),
    Term(Arc<TermCtor>),
    Axiom(Arc<Assertion>),
    Thm(Arc<Theorem>),
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Type(def) => def.name.as_str(),
            Symbol::Term(ctor) => &ctor.name,
            Symbol::Axiom(axiom) => &axiom.name,
            Symbol::Thm(thm) => &thm.assertion.name,
        }
    }

    /// The shape an axiom or theorem exposes to proof steps.
    pub fn as_assertion(&self) -> Option<&Arc<Assertion>> {
        match self {
            Symbol::Axiom(axiom) => Some(axiom),
            Symbol::Thm(thm) => Some(&thm.assertion),
            Symbol::Type(_) | Symbol::Term(_) => None,
        }
    }
}

/// Symbols of one file, in declaration order.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&i| &self.symbols[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn insert(&mut self, symbol: Symbol) {
        self.index.insert(symbol.name().to_owned(), self.symbols.len());
        self.symbols.push(symbol);
    }
}

/// The table being filled plus the read-only tables of earlier files, in dependency order.
#[derive(Debug)]
pub struct Scope<'a> {
    table: SymbolTable,
    deps: &'a [Arc<SymbolTable>],
}

impl<'a> Scope<'a> {
    pub fn new(deps: &'a [Arc<SymbolTable>]) -> Self {
        Self {
            table: SymbolTable::default(),
            deps,
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.table
            .get(name)
            .or_else(|| self.deps.iter().find_map(|dep| dep.get(name)))
    }

    /// Checks that `name` could be declared without inserting anything.
    pub fn check_fresh(&self, name: &str) -> Result<(), ErrorKind> {
        if name == DIFF_KEYWORD {
            return Err(ErrorKind::DiffIsKeyword);
        }
        if self.resolve(name).is_some() {
            return Err(ErrorKind::DupName);
        }
        Ok(())
    }

    pub fn declare(&mut self, symbol: Symbol) -> Result<(), ErrorKind> {
        self.check_fresh(symbol.name())?;
        self.table.insert(symbol);
        Ok(())
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn into_table(self) -> SymbolTable {
        self.table
    }
}
