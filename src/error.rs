use std::fmt::Display;
use std::sync::Arc;

use easy_ext::ext;
use thiserror::Error;

use crate::lex::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DupName,
    DiffIsKeyword,
    TypeDefMissing,
    NotType,
    DupArgName,
    TermDefMissing,
    AxiomThmDefMissing,
    TooManyArg,
    TooLessArg,
    ArgTypeError,
    ProofOpUseless,
    ProofDiffError,
    ThmWithoutValidProof,
}

impl ErrorKind {
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::DupName => "name is already defined",
            ErrorKind::DiffIsKeyword => "`#diff` is a keyword and cannot be used as a name",
            ErrorKind::TypeDefMissing => "type is not defined",
            ErrorKind::NotType => "name does not denote a type",
            ErrorKind::DupArgName => "parameter name is used twice",
            ErrorKind::TermDefMissing => "term is not defined",
            ErrorKind::AxiomThmDefMissing => "axiom or theorem is not defined",
            ErrorKind::TooManyArg => "too many arguments",
            ErrorKind::TooLessArg => "too few arguments",
            ErrorKind::ArgTypeError => "argument has the wrong type",
            ErrorKind::ProofOpUseless => "proof step does not discharge any goal",
            ErrorKind::ProofDiffError => "proof step violates a distinctness condition",
            ErrorKind::ThmWithoutValidProof => "theorem has no valid proof",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {} `{}` at {}", .kind.message(), .token.as_str(), .token.source_info)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub token: Arc<Token>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, token: &Arc<Token>) -> Self {
        Self {
            kind,
            token: Arc::clone(token),
        }
    }

    /// (start line, start column, end line, end column)
    pub fn position(&self) -> (usize, usize, usize, usize) {
        let (line, column) = self.token.source_info.line_column();
        let (end_line, end_column) = self.token.source_info.end_line_column();
        (line, column, end_line, end_column)
    }
}

#[ext(CompileErrorsExt)]
pub impl [CompileError] {
    /// Stable: errors reported against the same token keep their emission order.
    fn sort_by_position(&mut self) {
        self.sort_by_key(CompileError::position);
    }

    fn count_kind(&self, kind: ErrorKind) -> usize {
        self.iter().filter(|e| e.kind == kind).count()
    }

    fn kinds(&self) -> Vec<ErrorKind> {
        self.iter().map(|e| e.kind).collect()
    }
}
