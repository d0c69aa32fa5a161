//! Proof replay: a theorem's goals are rewritten step by step until nothing is left.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::iter::zip;
use std::sync::Arc;

use crate::diff::{self, DiffSet};
use crate::error::{CompileError, ErrorKind};
use crate::lex::Token;
use crate::term::{mk_hole, ParamPair, Term};

/// The statement shared by axioms and theorems.
#[derive(Debug)]
pub struct Assertion {
    pub name: String,
    pub token: Arc<Token>,
    pub params: Vec<ParamPair>,
    pub conclusions: Vec<Term>,
    pub hypotheses: Vec<Term>,
    pub diff_groups: Vec<Vec<String>>,
    pub diffs: DiffSet,
}

/// What an assertion states once its parameters are bound.
#[derive(Debug, Clone)]
pub struct Applied {
    pub conclusions: Vec<Term>,
    pub hypotheses: Vec<Term>,
    pub diffs: DiffSet,
}

impl Assertion {
    pub fn bindings(&self, args: &[Term]) -> HashMap<String, Term> {
        zip(&self.params, args)
            .map(|(param, arg)| (param.name().to_owned(), arg.clone()))
            .collect()
    }

    pub fn apply(&self, args: &[Term]) -> Applied {
        let bindings = self.bindings(args);
        Applied {
            conclusions: self.conclusions.iter().map(|t| t.subst(&bindings)).collect(),
            hypotheses: self.hypotheses.iter().map(|t| t.subst(&bindings)).collect(),
            diffs: diff::propagate(&self.diff_groups, &bindings),
        }
    }

    pub fn param_names(&self) -> HashSet<&str> {
        self.params.iter().map(ParamPair::name).collect()
    }
}

/// A candidate filling of a step's placeholders, keyed by placeholder name.
pub type Suggestion = BTreeMap<String, Term>;

#[derive(Debug, Clone)]
pub struct ProofStep {
    pub callee: Arc<Token>,
    pub rule: Arc<Assertion>,
    /// One per formal parameter of `rule`; missing or ill-typed ones are holes.
    pub args: Vec<Term>,
    pub applied: Applied,
    pub diff_errors: Vec<(String, String)>,
}

impl ProofStep {
    pub fn new(callee: Arc<Token>, rule: Arc<Assertion>, args: Vec<Term>) -> Self {
        let applied = rule.apply(&args);
        Self {
            callee,
            rule,
            args,
            applied,
            diff_errors: vec![],
        }
    }

    /// Fills the missing argument slots with placeholders named after the formal parameters.
    pub fn with_holes(callee: Arc<Token>, rule: Arc<Assertion>, args: Vec<Option<Term>>) -> Self {
        let args = rule
            .params
            .iter()
            .enumerate()
            .map(|(i, param)| match args.get(i) {
                Some(Some(arg)) => arg.clone(),
                _ => mk_hole(param.name(), param.ty()),
            })
            .collect();
        Self::new(callee, rule, args)
    }

    pub fn uses_holes(&self) -> bool {
        self.args.iter().any(Term::is_hole)
    }

    pub fn conclusions(&self) -> &[Term] {
        &self.applied.conclusions
    }

    pub fn hypotheses(&self) -> &[Term] {
        &self.applied.hypotheses
    }

    /// Replays the step with its placeholders replaced by `suggestion`.
    pub fn materialize(&self, suggestion: &Suggestion) -> Applied {
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                Term::Hole(hole) => suggestion
                    .get(&hole.name)
                    .cloned()
                    .unwrap_or_else(|| arg.clone()),
                _ => arg.clone(),
            })
            .collect::<Vec<_>>();
        self.rule.apply(&args)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Verification {
    /// Goal list after each step.
    pub snapshots: Vec<Vec<Term>>,
    /// Candidate fillings per step.
    pub suggestions: Vec<Vec<Suggestion>>,
    pub valid: bool,
}

#[derive(Debug)]
pub struct Theorem {
    pub assertion: Arc<Assertion>,
    pub steps: Vec<ProofStep>,
    pub verification: Verification,
}

/// Rewrites `goals` with one step. `None` if the step discharges nothing.
fn advance(goals: &[Term], step: &ProofStep, assumed: &HashSet<&str>) -> Option<Vec<Term>> {
    let proved: HashSet<&str> = step.conclusions().iter().map(Term::canonical).collect();
    let mut discharged = false;
    let mut carried = vec![];
    for goal in goals {
        if proved.contains(goal.canonical()) {
            discharged = true;
        } else if !assumed.contains(goal.canonical()) {
            carried.push(goal.clone());
        }
    }
    if !discharged {
        return None;
    }
    let mut next: Vec<Term> = step
        .hypotheses()
        .iter()
        .filter(|h| !assumed.contains(h.canonical()))
        .cloned()
        .collect();
    next.extend(carried);
    Some(next)
}

pub fn verify(
    goals: &[Term],
    hypotheses: &[Term],
    steps: &[ProofStep],
    errors: &mut Vec<CompileError>,
) -> Verification {
    let assumed: HashSet<&str> = hypotheses.iter().map(Term::canonical).collect();
    let mut current = goals.to_vec();
    let mut verification = Verification::default();
    for step in steps {
        match advance(&current, step, &assumed) {
            None => {
                errors.push(CompileError::new(ErrorKind::ProofOpUseless, &step.callee));
                verification.suggestions.push(suggestions(&current, step));
            }
            Some(next) => {
                current = next;
                if step.uses_holes() {
                    verification.suggestions.push(vec![own_holes(step)]);
                } else {
                    verification.suggestions.push(vec![]);
                }
            }
        }
        if log::log_enabled!(log::Level::Debug) {
            let goals = current.iter().map(Term::display).collect::<Vec<_>>();
            log::debug!("after {}: [{}]", step.callee.as_str(), goals.join(", "));
        }
        verification.snapshots.push(current.clone());
    }
    verification.valid = current.is_empty();
    verification
}

/// Structural match of `pattern` against `target`; holes in `pattern` bind to subtrees.
pub fn unify(pattern: &Term, target: &Term) -> Option<Suggestion> {
    let mut suggestion = Suggestion::new();
    let mut queue = VecDeque::from([(pattern, target)]);
    while let Some((p, t)) = queue.pop_front() {
        match p {
            Term::Hole(hole) => {
                if let Some(prev) = suggestion.get(&hole.name) {
                    if prev != t {
                        return None;
                    }
                }
                suggestion.insert(hole.name.clone(), t.clone());
            }
            Term::Var(_) | Term::App(_) => {
                if p.head() != t.head() || p.args().len() != t.args().len() {
                    return None;
                }
                queue.extend(zip(p.args(), t.args()));
            }
        }
    }
    log::trace!("unified {} with {}", pattern.display(), target.display());
    Some(suggestion)
}

/// Every way a step's conclusions could match the outstanding goals, goal by goal.
pub fn suggestions(goals: &[Term], step: &ProofStep) -> Vec<Suggestion> {
    let mut acc = vec![];
    for goal in goals {
        for conclusion in step.conclusions() {
            if let Some(suggestion) = unify(conclusion, goal) {
                acc.push(suggestion);
            }
        }
    }
    acc
}

/// For a step that made progress with placeholders: offer the placeholders themselves.
pub fn own_holes(step: &ProofStep) -> Suggestion {
    step.args
        .iter()
        .filter(|arg| arg.is_hole())
        .map(|arg| (arg.head().to_owned(), arg.clone()))
        .collect()
}
