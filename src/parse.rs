use std::sync::Arc;

use thiserror::Error;

use crate::cmd::{Cmd, CmdAxiom, CmdTerm, CmdThm, CmdType, Expr};
use crate::lex::{SourceInfo, Token, TokenKind, DIFF_KEYWORD};
use crate::term::ParamPair;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("parse error: {message} at {source_info}")]
    Parse {
        message: String,
        source_info: String,
    },
    #[error("unexpected end of input at {source_info}")]
    Eof { source_info: String },
}

/// The parts shared by `axiom` and `thm` headers.
#[derive(Default)]
struct Sections {
    conclusions: Vec<Expr>,
    hypotheses: Vec<Expr>,
    diffs: Vec<Vec<Arc<Token>>>,
}

fn is_decl_keyword(token: &Token) -> bool {
    token.is_keyword()
        && matches!(
            token.as_str().to_ascii_lowercase().as_str(),
            "type" | "term" | "axiom" | "thm"
        )
}

pub struct Parser<'a> {
    tokens: Vec<&'a Arc<Token>>,
    position: usize,
}

impl<'a> Parser<'a> {
    /// Comments are dropped here; they stay in the token list for highlighting.
    pub fn new(tokens: &'a [Arc<Token>]) -> Self {
        Self {
            tokens: tokens.iter().filter(|t| !t.is_comment()).collect(),
            position: 0,
        }
    }

    fn fail<R>(token: &Token, message: impl Into<String>) -> Result<R, ParseError> {
        Err(ParseError::Parse {
            message: message.into(),
            source_info: token.source_info.to_string(),
        })
    }

    fn eof_error(&self) -> ParseError {
        let source_info = match self.tokens.last() {
            Some(token) => SourceInfo::eof(Arc::clone(token.source_info.file())).to_string(),
            None => "end of input".to_owned(),
        };
        ParseError::Eof { source_info }
    }

    fn peek_opt(&self) -> Option<&'a Arc<Token>> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    pub fn eof_opt(&self) -> bool {
        self.peek_opt().is_none()
    }

    fn any_token(&mut self) -> Result<&'a Arc<Token>, ParseError> {
        let token = self.peek_opt().ok_or_else(|| self.eof_error())?;
        self.advance();
        Ok(token)
    }

    fn word(&mut self) -> Result<Arc<Token>, ParseError> {
        let token = self.any_token()?;
        if !token.is_word() {
            return Self::fail(token, "expected word");
        }
        Ok(Arc::clone(token))
    }

    fn word_opt(&mut self) -> Option<Arc<Token>> {
        let token = self.peek_opt()?;
        if token.is_word() {
            self.advance();
            return Some(Arc::clone(token));
        }
        None
    }

    fn expect_word(&mut self, text: &str) -> Result<(), ParseError> {
        let token = self.any_token()?;
        if token.kind == TokenKind::Word && token.as_str() == text {
            return Ok(());
        }
        Self::fail(token, format!("expected '{}'", text))
    }

    fn expect_symbol(&mut self, sym: &str) -> Result<(), ParseError> {
        let token = self.any_token()?;
        if token.kind == TokenKind::Separator && token.as_str() == sym {
            return Ok(());
        }
        Self::fail(token, format!("expected symbol '{}'", sym))
    }

    fn expect_symbol_opt(&mut self, sym: &str) -> Option<&'a Arc<Token>> {
        let token = self.peek_opt()?;
        if token.kind == TokenKind::Separator && token.as_str() == sym {
            self.advance();
            return Some(token);
        }
        None
    }

    fn keyword(&mut self) -> Result<&'a Arc<Token>, ParseError> {
        let token = self.any_token()?;
        if !token.is_keyword() {
            return Self::fail(token, "expected keyword");
        }
        Ok(token)
    }

    /// A declared name. `#diff` gets through so that the compiler can reject it with a
    /// proper error.
    fn name(&mut self) -> Result<Arc<Token>, ParseError> {
        let token = self.any_token()?;
        if token.is_word() || (token.is_keyword() && token.as_str() == DIFF_KEYWORD) {
            return Ok(Arc::clone(token));
        }
        Self::fail(token, "expected name")
    }

    /// e.g. `"(Prop p0, Set s0)"`
    fn params(&mut self) -> Result<Vec<ParamPair>, ParseError> {
        self.expect_symbol("(")?;
        let mut params = vec![];
        if self.expect_symbol_opt(")").is_some() {
            return Ok(params);
        }
        loop {
            let ty = self.word()?;
            let name = self.word()?;
            params.push(ParamPair { ty, name });
            if self.expect_symbol_opt(",").is_none() {
                break;
            }
        }
        self.expect_symbol(")")?;
        Ok(params)
    }

    /// e.g. `"imp(p0, forall(s0, p0))"`
    pub fn expr(&mut self) -> Result<Expr, ParseError> {
        let root = self.word()?;
        let mut children = vec![];
        if self.expect_symbol_opt("(").is_some() {
            if self.expect_symbol_opt(")").is_none() {
                loop {
                    children.push(self.expr()?);
                    if self.expect_symbol_opt(",").is_none() {
                        break;
                    }
                }
                self.expect_symbol(")")?;
            }
        }
        Ok(Expr { root, children })
    }

    fn exprs(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![];
        while self.peek_opt().is_some_and(|t| t.is_word()) {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn sections(&mut self) -> Result<Sections, ParseError> {
        let mut sections = Sections::default();
        self.expect_symbol("{")?;
        while self.expect_symbol_opt("}").is_none() {
            let token = self.keyword()?;
            match token.as_str() {
                DIFF_KEYWORD => {
                    let mut group = vec![];
                    while let Some(word) = self.word_opt() {
                        group.push(word);
                    }
                    sections.diffs.push(group);
                }
                "-|" => sections.hypotheses.extend(self.exprs()?),
                "|-" => sections.conclusions.extend(self.exprs()?),
                _ => return Self::fail(token, "expected '#diff', '-|' or '|-'"),
            }
        }
        Ok(sections)
    }

    fn type_cmd(&mut self, token: &Token) -> Result<CmdType, ParseError> {
        let mut names = vec![];
        while let Some(name) = self.word_opt() {
            names.push(name);
        }
        if names.is_empty() {
            return Self::fail(token, "expected at least one type name");
        }
        Ok(CmdType { names })
    }

    fn term_cmd(&mut self) -> Result<CmdTerm, ParseError> {
        let ty = self.word()?;
        let name = self.name()?;
        let params = self.params()?;
        self.expect_symbol("{")?;
        let mut body = vec![];
        loop {
            let token = self.any_token()?;
            match (token.kind, token.as_str()) {
                (TokenKind::Separator, "}") => break,
                (TokenKind::Separator, "{") | (TokenKind::Keyword, _) => {
                    return Self::fail(token, "unexpected token in term body");
                }
                _ => body.push(Arc::clone(token)),
            }
        }
        Ok(CmdTerm {
            ty,
            name,
            params,
            body,
        })
    }

    fn axiom_cmd(&mut self) -> Result<CmdAxiom, ParseError> {
        let name = self.name()?;
        let params = self.params()?;
        let Sections {
            conclusions,
            hypotheses,
            diffs,
        } = self.sections()?;
        Ok(CmdAxiom {
            name,
            params,
            conclusions,
            hypotheses,
            diffs,
        })
    }

    fn thm_cmd(&mut self) -> Result<CmdThm, ParseError> {
        let name = self.name()?;
        let params = self.params()?;
        let Sections {
            conclusions,
            hypotheses,
            diffs,
        } = self.sections()?;
        self.expect_word("=")?;
        self.expect_symbol("{")?;
        let proof = self.exprs()?;
        self.expect_symbol("}")?;
        Ok(CmdThm {
            name,
            params,
            conclusions,
            hypotheses,
            diffs,
            proof,
        })
    }

    pub fn cmd(&mut self) -> Result<Cmd, ParseError> {
        let keyword = self.keyword()?;
        let cmd = match keyword.as_str().to_ascii_lowercase().as_str() {
            "type" => Cmd::Type(self.type_cmd(keyword)?),
            "term" => Cmd::Term(self.term_cmd()?),
            "axiom" => Cmd::Axiom(self.axiom_cmd()?),
            "thm" => Cmd::Thm(self.thm_cmd()?),
            _ => return Self::fail(keyword, "expected declaration"),
        };
        Ok(cmd)
    }

    /// Parses the whole input. A malformed declaration is reported and skipped up to the next
    /// declaration keyword.
    pub fn cmds(mut self) -> (Vec<Cmd>, Vec<ParseError>) {
        let mut cmds = vec![];
        let mut errors = vec![];
        while !self.eof_opt() {
            let start = self.position;
            match self.cmd() {
                Ok(cmd) => cmds.push(cmd),
                Err(err) => {
                    log::debug!("{err}");
                    errors.push(err);
                    self.position = start + 1;
                    while self.peek_opt().is_some_and(|t| !is_decl_keyword(t)) {
                        self.advance();
                    }
                }
            }
        }
        (cmds, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::{tokenize, File};

    fn parse(input: &str) -> (Vec<Cmd>, Vec<ParseError>) {
        let tokens = tokenize(Arc::new(File::new("<test>", input.to_owned())));
        Parser::new(&tokens).cmds()
    }

    fn show(expr: &Expr) -> String {
        if expr.children.is_empty() {
            return expr.root.as_str().to_owned();
        }
        let children = expr.children.iter().map(show).collect::<Vec<_>>();
        format!("{}[{}]", expr.root.as_str(), children.join(" "))
    }

    #[test]
    fn declarations() {
        let (cmds, errors) = parse(
            "type Prop Set
             term Prop imp(Prop p0, Prop p1) { (p0 -> p1) }
             /* modus ponens */
             axiom ax-mp(Prop p0, Prop p1) { -| p0 -| imp(p0, p1) |- p1 }
             thm id(Prop p) { |- imp(p, p) } = { ax-1(p, p) ax-mp }",
        );
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(cmds.len(), 4);

        let Cmd::Type(ty) = &cmds[0] else { panic!() };
        assert_eq!(ty.names.len(), 2);

        let Cmd::Term(term) = &cmds[1] else { panic!() };
        assert_eq!(term.name.as_str(), "imp");
        assert_eq!(term.params.len(), 2);
        let body = term.body.iter().map(|t| t.as_str()).collect::<Vec<_>>();
        assert_eq!(body, vec!["(", "p0", "->", "p1", ")"]);

        let Cmd::Axiom(axiom) = &cmds[2] else { panic!() };
        assert_eq!(
            axiom.hypotheses.iter().map(show).collect::<Vec<_>>(),
            vec!["p0", "imp[p0 p1]"]
        );
        assert_eq!(axiom.conclusions.iter().map(show).collect::<Vec<_>>(), vec!["p1"]);

        let Cmd::Thm(thm) = &cmds[3] else { panic!() };
        assert_eq!(
            thm.proof.iter().map(show).collect::<Vec<_>>(),
            vec!["ax-1[p p]", "ax-mp"]
        );
    }

    #[test]
    fn diff_groups_and_empty_parens() {
        let (cmds, errors) = parse("axiom ax-5(Set s0, Prop p0) { #diff s0 p0 #diff |- top() }");
        assert!(errors.is_empty(), "{errors:?}");
        let Cmd::Axiom(axiom) = &cmds[0] else { panic!() };
        assert_eq!(axiom.diffs.len(), 2);
        assert_eq!(axiom.diffs[0].len(), 2);
        assert!(axiom.diffs[1].is_empty());
        assert!(axiom.conclusions[0].children.is_empty());
    }

    #[test]
    fn diff_keyword_is_accepted_as_a_name() {
        let (cmds, errors) = parse("term Prop #diff() { x }");
        assert!(errors.is_empty(), "{errors:?}");
        let Cmd::Term(term) = &cmds[0] else { panic!() };
        assert_eq!(term.name.as_str(), "#diff");
    }

    #[test]
    fn recovers_at_the_next_declaration() {
        let (cmds, errors) = parse(
            "type Prop
             thm broken(Prop p) { |- p }
             axiom ok(Prop p) { |- p }
             term Prop ( { }
             TYPE Set",
        );
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            &errors[0],
            ParseError::Parse { message, .. } if message == "expected '='"
        ));
        let kinds = cmds
            .iter()
            .map(|cmd| match cmd {
                Cmd::Type(_) => "type",
                Cmd::Term(_) => "term",
                Cmd::Axiom(_) => "axiom",
                Cmd::Thm(_) => "thm",
            })
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec!["type", "axiom", "type"]);
    }

    #[test]
    fn truncated_input() {
        let (cmds, errors) = parse("axiom a(Prop p) { |- p");
        assert!(cmds.is_empty());
        assert!(matches!(errors[..], [ParseError::Eof { .. }]));
    }

    #[test]
    fn truncated_on_a_multibyte_char() {
        let (cmds, errors) = parse("type Prop\nterm Prop neg(Prop p) { ¬");
        assert_eq!(cmds.len(), 1);
        let [ParseError::Eof { source_info }] = &errors[..] else {
            panic!("expected end of input, got {errors:?}");
        };
        assert!(source_info.starts_with("<test>:2:25\n"), "{source_info}");
        assert!(source_info.ends_with("{ ¬\n                        ^\n"));

        let (_, errors) = parse("type Prop\nthm t(Prop p) { |- ∀");
        assert_eq!(errors.len(), 1);
    }
}
