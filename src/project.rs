//! Several files compiled against each other in a fixed dependency order.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cmd::{compile, Cmd};
use crate::error::CompileError;
use crate::lex::{tokenize, File, Token};
use crate::parse::{ParseError, Parser};
use crate::scope::SymbolTable;

/// Everything kept about one compiled file.
#[derive(Debug)]
pub struct Unit {
    pub file: Arc<File>,
    /// Including comments, with roles filled in by the compiler.
    pub tokens: Vec<Arc<Token>>,
    pub cmds: Vec<Cmd>,
    pub table: Arc<SymbolTable>,
    pub parse_errors: Vec<ParseError>,
    pub errors: Vec<CompileError>,
}

impl Unit {
    pub fn is_clean(&self) -> bool {
        self.parse_errors.is_empty() && self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Project {
    order: Vec<String>,
    units: HashMap<String, Unit>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// A file sees the symbols of every file listed before it.
    pub fn set_dependency_order<I, S>(&mut self, files: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = files.into_iter().map(Into::into).collect();
    }

    /// Earlier files of the order that have been compiled so far.
    fn deps(&self, file_id: &str) -> Vec<Arc<SymbolTable>> {
        let Some(index) = self.order.iter().position(|f| f == file_id) else {
            return vec![];
        };
        self.order[..index]
            .iter()
            .filter_map(|f| self.units.get(f))
            .map(|unit| Arc::clone(&unit.table))
            .collect()
    }

    /// Lexes, parses and compiles `source`, replacing any earlier result for `file_id`.
    pub fn compile_source(&mut self, file_id: &str, source: impl Into<String>) -> &Unit {
        let file = Arc::new(File::new(file_id, source));
        let tokens = tokenize(Arc::clone(&file));
        let (cmds, parse_errors) = Parser::new(&tokens).cmds();
        let deps = self.deps(file_id);
        let compiled = compile(&cmds, &deps);
        log::info!(
            "compiled {}: {} deps, {} symbols, {} parse errors, {} errors",
            file_id,
            deps.len(),
            compiled.table.len(),
            parse_errors.len(),
            compiled.errors.len()
        );
        let unit = Unit {
            file,
            tokens,
            cmds,
            table: Arc::new(compiled.table),
            parse_errors,
            errors: compiled.errors,
        };
        self.units.insert(file_id.to_owned(), unit);
        &self.units[file_id]
    }

    pub fn unit(&self, file_id: &str) -> Option<&Unit> {
        self.units.get(file_id)
    }

    pub fn symbols(&self, file_id: &str) -> Option<&Arc<SymbolTable>> {
        self.units.get(file_id).map(|unit| &unit.table)
    }

    /// Compile errors of a file, sorted by position. Empty for unknown files.
    pub fn errors(&self, file_id: &str) -> &[CompileError] {
        self.units
            .get(file_id)
            .map(|unit| unit.errors.as_slice())
            .unwrap_or_default()
    }
}
