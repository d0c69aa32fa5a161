use anyhow::{anyhow, Context};

pub mod cmd;
pub mod diff;
pub mod error;
pub mod lex;
pub mod parse;
pub mod print;
pub mod project;
pub mod proof;
pub mod scope;
pub mod term;

pub use error::{CompileError, ErrorKind};
pub use project::{Project, Unit};

/// Fails with the first diagnostic of the unit, if any.
pub fn check(unit: &Unit) -> anyhow::Result<()> {
    if let Some(err) = unit.parse_errors.first() {
        return Err(anyhow!("{err}")).with_context(|| {
            format!(
                "{} parse errors in {}",
                unit.parse_errors.len(),
                unit.file.name()
            )
        });
    }
    if let Some(err) = unit.errors.first() {
        return Err(err.clone())
            .with_context(|| format!("{} errors in {}", unit.errors.len(), unit.file.name()));
    }
    Ok(())
}

/// Compiles a single self-contained source text.
pub fn process(input: &str) -> anyhow::Result<()> {
    let mut project = Project::new();
    let unit = project.compile_source("<input>", input);
    check(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_reports_the_first_error() {
        assert!(process("type Prop").is_ok());
        let err = process("type Prop\ntype Prop").unwrap_err();
        assert_eq!(err.to_string(), "1 errors in <input>");
        let cause = err.downcast_ref::<CompileError>().unwrap();
        assert_eq!(cause.kind, ErrorKind::DupName);
        assert_eq!(cause.position(), (2, 6, 2, 10));

        let err = process("thm").unwrap_err();
        assert_eq!(err.to_string(), "1 parse errors in <input>");

        let err = process("type Prop\nthm t(Prop p) { |- ∀").unwrap_err();
        assert_eq!(err.to_string(), "1 parse errors in <input>");
    }
}
