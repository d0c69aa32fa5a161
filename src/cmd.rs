use std::collections::HashSet;
use std::sync::Arc;

use crate::diff::{self, DiffSet};
use crate::error::{CompileError, CompileErrorsExt, ErrorKind};
use crate::lex::{Token, TokenRole};
use crate::proof::{self, Assertion, ProofStep, Theorem};
use crate::scope::{Scope, Symbol, SymbolTable, TypeDef};
use crate::term::{Instantiator, ParamPair, Term, TermCtor};

/// An unresolved expression: a name applied to zero or more sub-expressions.
#[derive(Debug, Clone)]
pub struct Expr {
    pub root: Arc<Token>,
    pub children: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub enum Cmd {
    Type(CmdType),
    Term(CmdTerm),
    Axiom(CmdAxiom),
    Thm(CmdThm),
}

#[derive(Clone, Debug)]
pub struct CmdType {
    pub names: Vec<Arc<Token>>,
}

#[derive(Clone, Debug)]
pub struct CmdTerm {
    pub ty: Arc<Token>,
    pub name: Arc<Token>,
    pub params: Vec<ParamPair>,
    pub body: Vec<Arc<Token>>,
}

#[derive(Clone, Debug)]
pub struct CmdAxiom {
    pub name: Arc<Token>,
    pub params: Vec<ParamPair>,
    pub conclusions: Vec<Expr>,
    pub hypotheses: Vec<Expr>,
    pub diffs: Vec<Vec<Arc<Token>>>,
}

#[derive(Clone, Debug)]
pub struct CmdThm {
    pub name: Arc<Token>,
    pub params: Vec<ParamPair>,
    pub conclusions: Vec<Expr>,
    pub hypotheses: Vec<Expr>,
    pub diffs: Vec<Vec<Arc<Token>>>,
    pub proof: Vec<Expr>,
}

/// The result of compiling one file.
#[derive(Debug)]
pub struct Compiled {
    pub table: SymbolTable,
    /// Sorted by source position.
    pub errors: Vec<CompileError>,
}

/// Compiles the declarations of one file against the tables of its dependencies.
pub fn compile(cmds: &[Cmd], deps: &[Arc<SymbolTable>]) -> Compiled {
    let mut eval = Eval::new(deps);
    for cmd in cmds {
        eval.run_cmd(cmd);
    }
    eval.finish()
}

/// Per-file compiler state. A failing declaration is reported and skipped; nothing aborts the file.
#[derive(Debug)]
pub struct Eval<'a> {
    scope: Scope<'a>,
    errors: Vec<CompileError>,
}

impl<'a> Eval<'a> {
    pub fn new(deps: &'a [Arc<SymbolTable>]) -> Self {
        Self {
            scope: Scope::new(deps),
            errors: vec![],
        }
    }

    pub fn scope(&self) -> &Scope<'a> {
        &self.scope
    }

    /// Errors in the order they were found.
    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    pub fn finish(self) -> Compiled {
        let mut errors = self.errors;
        errors.sort_by_position();
        Compiled {
            table: self.scope.into_table(),
            errors,
        }
    }

    fn error(&mut self, kind: ErrorKind, token: &Arc<Token>) {
        self.errors.push(CompileError::new(kind, token));
    }

    fn check_type(&mut self, token: &Arc<Token>) -> bool {
        match self.scope.resolve(token.as_str()) {
            None => {
                self.error(ErrorKind::TypeDefMissing, token);
                false
            }
            Some(Symbol::Type(_)) => true,
            Some(_) => {
                self.error(ErrorKind::NotType, token);
                false
            }
        }
    }

    fn check_name(&mut self, token: &Arc<Token>) -> bool {
        match self.scope.check_fresh(token.as_str()) {
            Ok(()) => true,
            Err(kind) => {
                self.error(kind, token);
                false
            }
        }
    }

    fn check_params(&mut self, params: &[ParamPair]) -> bool {
        let mut seen = HashSet::new();
        for param in params {
            if !self.check_type(&param.ty) || !self.check_name(&param.name) {
                return false;
            }
            if !seen.insert(param.name()) {
                self.error(ErrorKind::DupArgName, &param.name);
                return false;
            }
        }
        true
    }

    fn declare(&mut self, symbol: Symbol, token: &Arc<Token>) {
        if let Err(kind) = self.scope.declare(symbol) {
            self.error(kind, token);
        }
    }

    fn instantiate_all(&mut self, params: &[ParamPair], exprs: &[Expr]) -> Option<Vec<Term>> {
        let instantiator = Instantiator::new(&self.scope, params);
        let mut terms = Vec::with_capacity(exprs.len());
        for expr in exprs {
            terms.push(instantiator.instantiate(expr, &mut self.errors)?);
        }
        Some(terms)
    }

    pub fn run_cmd(&mut self, cmd: &Cmd) {
        match cmd {
            Cmd::Type(cmd) => self.run_type_cmd(cmd),
            Cmd::Term(cmd) => self.run_term_cmd(cmd),
            Cmd::Axiom(cmd) => self.run_axiom_cmd(cmd),
            Cmd::Thm(cmd) => self.run_thm_cmd(cmd),
        }
    }

    fn run_type_cmd(&mut self, cmd: &CmdType) {
        for name in &cmd.names {
            if self.check_name(name) {
                let def = TypeDef {
                    name: Arc::clone(name),
                };
                self.declare(Symbol::Type(Arc::new(def)), name);
            }
        }
    }

    fn run_term_cmd(&mut self, cmd: &CmdTerm) {
        if !self.check_type(&cmd.ty) || !self.check_name(&cmd.name) {
            return;
        }
        if !self.check_params(&cmd.params) {
            return;
        }
        let ctor = TermCtor::new(
            Arc::clone(&cmd.name),
            cmd.ty.as_str(),
            cmd.params.clone(),
            &cmd.body,
        );
        self.declare(Symbol::Term(Arc::new(ctor)), &cmd.name);
    }

    /// Shared by axioms and theorems: name, parameters, conclusions, hypotheses.
    fn assertion(
        &mut self,
        name: &Arc<Token>,
        params: &[ParamPair],
        conclusions: &[Expr],
        hypotheses: &[Expr],
        diffs: &[Vec<Arc<Token>>],
    ) -> Option<Assertion> {
        if !self.check_name(name) || !self.check_params(params) {
            return None;
        }
        let conclusions = self.instantiate_all(params, conclusions)?;
        let hypotheses = self.instantiate_all(params, hypotheses)?;
        let diff_groups = diffs
            .iter()
            .map(|group| group.iter().map(|t| t.as_str().to_owned()).collect())
            .collect::<Vec<Vec<String>>>();
        let diffs = DiffSet::from_groups(&diff_groups);
        Some(Assertion {
            name: name.as_str().to_owned(),
            token: Arc::clone(name),
            params: params.to_vec(),
            conclusions,
            hypotheses,
            diff_groups,
            diffs,
        })
    }

    fn run_axiom_cmd(&mut self, cmd: &CmdAxiom) {
        let Some(axiom) = self.assertion(
            &cmd.name,
            &cmd.params,
            &cmd.conclusions,
            &cmd.hypotheses,
            &cmd.diffs,
        ) else {
            return;
        };
        self.declare(Symbol::Axiom(Arc::new(axiom)), &cmd.name);
    }

    fn run_thm_cmd(&mut self, cmd: &CmdThm) {
        let Some(assertion) = self.assertion(
            &cmd.name,
            &cmd.params,
            &cmd.conclusions,
            &cmd.hypotheses,
            &cmd.diffs,
        ) else {
            return;
        };
        let steps = cmd
            .proof
            .iter()
            .filter_map(|expr| self.proof_step(expr, &assertion))
            .collect::<Vec<_>>();
        let verification = proof::verify(
            &assertion.conclusions,
            &assertion.hypotheses,
            &steps,
            &mut self.errors,
        );
        let valid = verification.valid;
        log::debug!(
            "theorem {}: {} steps, valid = {}",
            assertion.name,
            steps.len(),
            valid
        );
        let thm = Theorem {
            assertion: Arc::new(assertion),
            steps,
            verification,
        };
        self.declare(Symbol::Thm(Arc::new(thm)), &cmd.name);
        if !valid {
            self.error(ErrorKind::ThmWithoutValidProof, &cmd.name);
        }
    }

    /// Resolves one application in a proof body. Unusable argument slots become holes so the
    /// step can still be replayed and offered suggestions for.
    fn proof_step(&mut self, expr: &Expr, thm: &Assertion) -> Option<ProofStep> {
        let callee = &expr.root;
        let rule = match self.scope.resolve(callee.as_str()) {
            Some(symbol @ (Symbol::Axiom(_) | Symbol::Thm(_))) => {
                callee.set_role(if matches!(symbol, Symbol::Axiom(_)) {
                    TokenRole::Axiom
                } else {
                    TokenRole::Thm
                });
                symbol.as_assertion().map(Arc::clone)?
            }
            _ => {
                self.error(ErrorKind::AxiomThmDefMissing, callee);
                return None;
            }
        };
        if expr.children.len() > rule.params.len() {
            self.error(ErrorKind::TooManyArg, callee);
        } else if expr.children.len() < rule.params.len() {
            self.error(ErrorKind::TooLessArg, callee);
        }

        let instantiator = Instantiator::new(&self.scope, &thm.params);
        let children = expr
            .children
            .iter()
            .map(|child| instantiator.instantiate(child, &mut self.errors))
            .collect::<Vec<_>>();
        let mut args = Vec::with_capacity(rule.params.len());
        for (i, param) in rule.params.iter().enumerate() {
            match children.get(i) {
                Some(Some(arg)) if arg.ty() == param.ty() => args.push(Some(arg.clone())),
                Some(Some(_)) => {
                    self.errors.push(CompileError::new(
                        ErrorKind::ArgTypeError,
                        &expr.children[i].root,
                    ));
                    args.push(None);
                }
                _ => args.push(None),
            }
        }

        let mut step = ProofStep::with_holes(Arc::clone(callee), rule, args);
        step.diff_errors = diff::violations(&step.applied.diffs, &thm.diffs, &thm.param_names());
        for _ in &step.diff_errors {
            self.error(ErrorKind::ProofDiffError, callee);
        }
        Some(step)
    }
}
