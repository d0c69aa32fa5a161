use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::iter::zip;
use std::sync::Arc;

use crate::cmd::Expr;
use crate::error::{CompileError, ErrorKind};
use crate::lex::{Token, TokenRole};
use crate::scope::{Scope, Symbol};

/// A formal parameter `Type name` of a term, axiom or theorem.
#[derive(Debug, Clone)]
pub struct ParamPair {
    pub ty: Arc<Token>,
    pub name: Arc<Token>,
}

impl ParamPair {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn ty(&self) -> &str {
        self.ty.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Lit(String),
    Arg(usize),
}

#[derive(Debug)]
pub struct TermCtor {
    pub name: String,
    pub token: Arc<Token>,
    pub ty: String,
    pub params: Vec<ParamPair>,
    pub template: Vec<Fragment>,
}

impl TermCtor {
    /// Builds the content template from the body tokens. Parameter tokens become
    /// placeholders; runs of other tokens are glued into one literal.
    pub fn new(token: Arc<Token>, ty: &str, params: Vec<ParamPair>, body: &[Arc<Token>]) -> Self {
        let mut template: Vec<Fragment> = vec![];
        for word in body {
            if let Some(index) = params.iter().position(|p| p.name() == word.as_str()) {
                word.set_role(TokenRole::Param);
                template.push(Fragment::Arg(index));
            } else if let Some(Fragment::Lit(last)) = template.last_mut() {
                last.push_str(word.as_str());
            } else {
                template.push(Fragment::Lit(word.as_str().to_owned()));
            }
        }
        Self {
            name: token.as_str().to_owned(),
            token,
            ty: ty.to_owned(),
            params,
            template,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    fn expand(&self, args: &[Term]) -> String {
        let mut s = String::new();
        for fragment in &self.template {
            match fragment {
                Fragment::Lit(lit) => s.push_str(lit),
                Fragment::Arg(index) => s.push_str(args[*index].display()),
            }
        }
        s
    }

    fn canonical(&self, args: &[Term]) -> String {
        if args.is_empty() {
            return self.name.clone();
        }
        let args = args.iter().map(Term::canonical).collect::<Vec<_>>();
        format!("{}({})", self.name, args.join(","))
    }
}

/// An instantiated term. Nodes are immutable and shared; rebuilding always allocates a new parent.
#[derive(Debug, Clone)]
pub enum Term {
    /// A reference to a formal parameter.
    Var(Arc<TermVar>),
    App(Arc<TermApp>),
    /// Stands in for a proof-step argument that was not supplied.
    Hole(Arc<TermHole>),
}

#[derive(Debug)]
pub struct TermVar {
    pub name: String,
    pub ty: String,
}

#[derive(Debug)]
pub struct TermApp {
    pub ctor: Arc<TermCtor>,
    pub args: Vec<Term>,
    display: String,
    canonical: String,
}

#[derive(Debug)]
pub struct TermHole {
    pub name: String,
    pub ty: String,
}

pub fn mk_var(name: impl Into<String>, ty: impl Into<String>) -> Term {
    Term::Var(Arc::new(TermVar {
        name: name.into(),
        ty: ty.into(),
    }))
}

pub fn mk_hole(name: impl Into<String>, ty: impl Into<String>) -> Term {
    Term::Hole(Arc::new(TermHole {
        name: name.into(),
        ty: ty.into(),
    }))
}

pub fn mk_app(ctor: Arc<TermCtor>, args: Vec<Term>) -> Term {
    debug_assert_eq!(ctor.arity(), args.len());
    let display = ctor.expand(&args);
    let canonical = ctor.canonical(&args);
    Term::App(Arc::new(TermApp {
        ctor,
        args,
        display,
        canonical,
    }))
}

impl Term {
    pub fn display(&self) -> &str {
        match self {
            Term::Var(var) => &var.name,
            Term::App(app) => &app.display,
            Term::Hole(hole) => &hole.name,
        }
    }

    /// `ctor(arg,...)` form; two terms are the same iff their canonical strings are.
    pub fn canonical(&self) -> &str {
        match self {
            Term::Var(var) => &var.name,
            Term::App(app) => &app.canonical,
            Term::Hole(hole) => &hole.name,
        }
    }

    pub fn ty(&self) -> &str {
        match self {
            Term::Var(var) => &var.ty,
            Term::App(app) => &app.ctor.ty,
            Term::Hole(hole) => &hole.ty,
        }
    }

    /// The name at the root: parameter, constructor or placeholder.
    pub fn head(&self) -> &str {
        match self {
            Term::Var(var) => &var.name,
            Term::App(app) => &app.ctor.name,
            Term::Hole(hole) => &hole.name,
        }
    }

    pub fn args(&self) -> &[Term] {
        match self {
            Term::App(app) => &app.args,
            Term::Var(_) | Term::Hole(_) => &[],
        }
    }

    pub fn is_hole(&self) -> bool {
        matches!(self, Term::Hole(_))
    }

    pub fn subst(&self, bindings: &HashMap<String, Term>) -> Term {
        match self {
            Term::Var(var) => match bindings.get(&var.name) {
                Some(value) => value.clone(),
                None => self.clone(),
            },
            Term::Hole(_) => self.clone(),
            Term::App(app) => {
                if app.args.is_empty() {
                    return self.clone();
                }
                let args = app.args.iter().map(|arg| arg.subst(bindings)).collect();
                mk_app(Arc::clone(&app.ctor), args)
            }
        }
    }

    /// Names at the leaves. Nullary constructors contribute their display text.
    pub fn leaves(&self) -> BTreeSet<String> {
        let mut acc = BTreeSet::new();
        self.collect_leaves(&mut acc);
        acc
    }

    fn collect_leaves(&self, acc: &mut BTreeSet<String>) {
        let args = self.args();
        if args.is_empty() {
            acc.insert(self.display().to_owned());
            return;
        }
        for arg in args {
            arg.collect_leaves(acc);
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Term {}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Resolves expression trees against the formal parameters of one declaration.
pub struct Instantiator<'s, 'a> {
    scope: &'s Scope<'a>,
    params: &'s [ParamPair],
}

impl<'s, 'a> Instantiator<'s, 'a> {
    pub fn new(scope: &'s Scope<'a>, params: &'s [ParamPair]) -> Self {
        Self { scope, params }
    }

    pub fn instantiate(&self, expr: &Expr, errors: &mut Vec<CompileError>) -> Option<Term> {
        let root = &expr.root;
        if let Some(param) = self.params.iter().find(|p| p.name() == root.as_str()) {
            root.set_role(TokenRole::Param);
            if !expr.children.is_empty() {
                errors.push(CompileError::new(ErrorKind::TooManyArg, root));
                return None;
            }
            return Some(mk_var(param.name(), param.ty()));
        }

        let Some(Symbol::Term(ctor)) = self.scope.resolve(root.as_str()) else {
            errors.push(CompileError::new(ErrorKind::TermDefMissing, root));
            return None;
        };
        let ctor = Arc::clone(ctor);
        if expr.children.len() > ctor.arity() {
            errors.push(CompileError::new(ErrorKind::TooManyArg, root));
            return None;
        }
        if expr.children.len() < ctor.arity() {
            errors.push(CompileError::new(ErrorKind::TooLessArg, root));
            return None;
        }
        root.set_role(if ctor.arity() == 0 {
            TokenRole::Const
        } else {
            TokenRole::Term
        });

        // every child reports its own errors before the first mismatch aborts
        let children = expr
            .children
            .iter()
            .map(|child| self.instantiate(child, errors))
            .collect::<Vec<_>>();
        let mut args = Vec::with_capacity(children.len());
        for (child, param) in zip(children, &ctor.params) {
            match child {
                Some(arg) if arg.ty() == param.ty() => args.push(arg),
                _ => {
                    errors.push(CompileError::new(ErrorKind::ArgTypeError, root));
                    return None;
                }
            }
        }
        Some(mk_app(ctor, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::{Cmd, Eval};
    use crate::lex::{tokenize, File};
    use crate::parse::Parser;

    struct Fixture {
        eval: Eval<'static>,
    }

    impl Fixture {
        fn new(source: &str) -> Self {
            let tokens = tokenize(Arc::new(File::new("<fixture>", source.to_owned())));
            let (cmds, parse_errors) = Parser::new(&tokens).cmds();
            assert!(parse_errors.is_empty(), "{parse_errors:?}");
            let mut eval = Eval::new(&[]);
            for cmd in &cmds {
                eval.run_cmd(cmd);
            }
            assert!(eval.errors().is_empty(), "{:?}", eval.errors());
            Self { eval }
        }

        fn ctor(&self, name: &str) -> Arc<TermCtor> {
            match self.eval.scope().resolve(name) {
                Some(Symbol::Term(ctor)) => Arc::clone(ctor),
                _ => panic!("no term constructor {name}"),
            }
        }

        /// Instantiates `input` as the conclusion of a throwaway axiom over `params`.
        fn instantiate(&self, params: &str, input: &str) -> (Option<Term>, Vec<ErrorKind>) {
            let source = format!("axiom scratch({params}) {{ |- {input} }}");
            let tokens = tokenize(Arc::new(File::new("<scratch>", source)));
            let (cmds, _) = Parser::new(&tokens).cmds();
            let Cmd::Axiom(axiom) = &cmds[0] else {
                panic!("expected axiom");
            };
            let mut errors = vec![];
            let term = Instantiator::new(self.eval.scope(), &axiom.params)
                .instantiate(&axiom.conclusions[0], &mut errors);
            (term, errors.iter().map(|e| e.kind).collect())
        }
    }

    const PRELUDE: &str = "
        type Prop Set
        term Prop imp(Prop p0, Prop p1) { (p0 -> p1) }
        term Prop forall(Set s0, Prop p0) { (∀ s0, p0) }
        term Prop top() { T }
    ";

    #[test]
    fn template_glues_literals() {
        let fixture = Fixture::new(PRELUDE);
        let imp = fixture.ctor("imp");
        assert_eq!(
            imp.template,
            vec![
                Fragment::Lit("(".to_owned()),
                Fragment::Arg(0),
                Fragment::Lit("->".to_owned()),
                Fragment::Arg(1),
                Fragment::Lit(")".to_owned()),
            ]
        );
        assert_eq!(fixture.ctor("top").template, vec![Fragment::Lit("T".to_owned())]);
    }

    #[test]
    fn display_and_canonical_forms() {
        let fixture = Fixture::new(PRELUDE);
        let (term, errors) =
            fixture.instantiate("Set x, Prop p, Prop q", "imp(p, forall(x, imp(q, top)))");
        assert!(errors.is_empty());
        let term = term.unwrap();
        assert_eq!(term.display(), "(p->(∀x,(q->T)))");
        assert_eq!(term.canonical(), "imp(p,forall(x,imp(q,top)))");
        assert_eq!(term.ty(), "Prop");
        assert_eq!(term.head(), "imp");
    }

    #[test]
    fn canonical_distinguishes_ambiguous_display() {
        let fixture = Fixture::new(
            "type Prop
             term Prop cat(Prop a, Prop b) { a b }",
        );
        let (left, _) = fixture.instantiate("Prop x, Prop y, Prop z", "cat(cat(x, y), z)");
        let (right, _) = fixture.instantiate("Prop x, Prop y, Prop z", "cat(x, cat(y, z))");
        let (left, right) = (left.unwrap(), right.unwrap());
        assert_eq!(left.display(), right.display());
        assert_ne!(left, right);
    }

    #[test]
    fn arity_errors() {
        let fixture = Fixture::new(PRELUDE);
        let (term, errors) = fixture.instantiate("Prop p", "imp(p)");
        assert!(term.is_none());
        assert_eq!(errors, vec![ErrorKind::TooLessArg]);

        let (_, errors) = fixture.instantiate("Prop p", "imp(p, p, p)");
        assert_eq!(errors, vec![ErrorKind::TooManyArg]);

        let (_, errors) = fixture.instantiate("Prop p", "p(p)");
        assert_eq!(errors, vec![ErrorKind::TooManyArg]);
    }

    #[test]
    fn type_errors_are_reported_on_the_parent() {
        let fixture = Fixture::new(PRELUDE);
        let (term, errors) = fixture.instantiate("Prop p, Set x", "forall(p, x)");
        assert!(term.is_none());
        assert_eq!(errors, vec![ErrorKind::ArgTypeError]);

        let (_, errors) = fixture.instantiate("Prop p", "imp(p, nothing)");
        assert_eq!(
            errors,
            vec![ErrorKind::TermDefMissing, ErrorKind::ArgTypeError]
        );
    }

    #[test]
    fn substitution_shares_bound_values() {
        let fixture = Fixture::new(PRELUDE);
        let (template, _) = fixture.instantiate("Prop p0, Prop p1", "imp(p0, imp(p0, p1))");
        let (value, _) = fixture.instantiate("Set x, Prop q", "forall(x, q)");
        let (template, value) = (template.unwrap(), value.unwrap());
        let bindings = HashMap::from([("p0".to_owned(), value.clone())]);
        let result = template.subst(&bindings);
        assert_eq!(result.canonical(), "imp(forall(x,q),imp(forall(x,q),p1))");
        assert_eq!(result.display(), "((∀x,q)->((∀x,q)->p1))");
        let (Term::App(first), Term::App(shared)) = (&result.args()[0], &value) else {
            panic!("expected applications");
        };
        assert!(Arc::ptr_eq(first, shared));
        // substituting again is a no-op
        assert_eq!(result.subst(&bindings), result);
    }

    #[test]
    fn leaves_collect_parameters_and_constants() {
        let fixture = Fixture::new(PRELUDE);
        let (term, _) = fixture.instantiate("Set x, Prop p", "imp(p, forall(x, top))");
        let leaves = term.unwrap().leaves();
        assert_eq!(
            leaves.into_iter().collect::<Vec<_>>(),
            vec!["T".to_owned(), "p".to_owned(), "x".to_owned()]
        );
    }
}
