use std::fmt::Display;

use crate::error::CompileError;
use crate::proof::{Suggestion, Theorem};
use crate::term::Term;

/// `kind: message` followed by the source excerpt with carets under the offending token.
pub fn render_error(error: &CompileError) -> String {
    format!(
        "{}: {}\n{}",
        error.kind,
        error.kind.message(),
        error.token.source_info
    )
}

pub fn render_theorem(thm: &Theorem) -> String {
    Trace(thm).to_string()
}

fn show(term: &Term) -> String {
    match term {
        Term::Hole(hole) => format!("?{}", hole.name),
        _ => term.display().to_owned(),
    }
}

fn show_all<'a>(terms: impl IntoIterator<Item = &'a Term>, sep: &str) -> String {
    terms.into_iter().map(show).collect::<Vec<_>>().join(sep)
}

fn show_suggestion(suggestion: &Suggestion) -> String {
    suggestion
        .iter()
        .map(|(name, value)| format!("{} := {}", name, show(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

struct Trace<'a>(&'a Theorem);

impl Display for Trace<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Theorem {
            assertion,
            steps,
            verification,
        } = self.0;
        let params = assertion
            .params
            .iter()
            .map(|p| format!("{} {}", p.ty(), p.name()))
            .collect::<Vec<_>>();
        writeln!(f, "thm {}({})", assertion.name, params.join(", "))?;
        for group in &assertion.diff_groups {
            writeln!(f, "  #diff {}", group.join(" "))?;
        }
        for hyp in &assertion.hypotheses {
            writeln!(f, "  -| {}", show(hyp))?;
        }
        for concl in &assertion.conclusions {
            writeln!(f, "  |- {}", show(concl))?;
        }
        for (i, step) in steps.iter().enumerate() {
            write!(f, "  {}. {}", i + 1, step.callee.as_str())?;
            if !step.args.is_empty() {
                write!(f, "({})", show_all(&step.args, ", "))?;
            }
            writeln!(f)?;
            if let Some(goals) = verification.snapshots.get(i) {
                if goals.is_empty() {
                    writeln!(f, "     goals: (none)")?;
                } else {
                    writeln!(f, "     goals: {}", show_all(goals, ", "))?;
                }
            }
            for (a, b) in &step.diff_errors {
                writeln!(f, "     diff violated: {} {}", a, b)?;
            }
            for suggestion in verification.suggestions.get(i).into_iter().flatten() {
                writeln!(f, "     suggestion: {}", show_suggestion(suggestion))?;
            }
        }
        if verification.valid {
            write!(f, "  valid")
        } else {
            write!(f, "  invalid")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cmd::compile;
    use crate::lex::{tokenize, File};
    use crate::parse::Parser;
    use crate::scope::Symbol;

    const PRELUDE: &str = "
type Prop
term Prop imp(Prop p0, Prop p1) { (p0 -> p1) }
axiom ax-mp(Prop p0, Prop p1) { -| p0 -| imp(p0, p1) |- p1 }
";

    fn trace(source: &str) -> String {
        let tokens = tokenize(Arc::new(File::new("<test>", format!("{PRELUDE}{source}"))));
        let (cmds, _) = Parser::new(&tokens).cmds();
        let compiled = compile(&cmds, &[]);
        match compiled.table.get("t") {
            Some(Symbol::Thm(thm)) => render_theorem(thm),
            _ => panic!("theorem was not registered"),
        }
    }

    #[test]
    fn error_with_excerpt() {
        let tokens = tokenize(Arc::new(File::new("<test>", "type Prop Prop")));
        let (cmds, _) = Parser::new(&tokens).cmds();
        let compiled = compile(&cmds, &[]);
        assert_eq!(
            render_error(&compiled.errors[0]),
            "DupName: name is already defined\n<test>:1:11\n\ntype Prop Prop\n          ^^^^\n"
        );
    }

    #[test]
    fn valid_trace() {
        let out = trace("thm t(Prop a, Prop b) { -| a -| imp(a, b) |- b } = { ax-mp(a, b) }");
        insta::assert_snapshot!(out, @r"
        thm t(Prop a, Prop b)
          -| a
          -| (a->b)
          |- b
          1. ax-mp(a, b)
             goals: (none)
          valid
        ");
    }

    #[test]
    fn trace_with_holes_and_suggestions() {
        let out = trace("thm t(Prop a, Prop b) { -| a -| imp(a, b) |- b } = { ax-mp }");
        insta::assert_snapshot!(out, @r"
        thm t(Prop a, Prop b)
          -| a
          -| (a->b)
          |- b
          1. ax-mp(?p0, ?p1)
             goals: b
             suggestion: p1 := b
          invalid
        ");
    }
}
