use std::iter::FusedIterator;
use std::ops::Range;
use std::sync::{Arc, OnceLock};

use once_cell::sync::Lazy;
use regex::Regex;

/// The keyword introducing a variable-distinctness group. It can never be a symbol name.
pub const DIFF_KEYWORD: &str = "#diff";

#[derive(Debug)]
pub struct File {
    name: String,
    contents: String,
    lines: Vec<usize>,
}

impl File {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        let name = name.into();
        let contents = contents.into();
        let mut lines = vec![0];
        for (idx, ch) in contents.char_indices() {
            if ch == '\n' {
                lines.push(idx + ch.len_utf8());
            }
        }
        Self {
            name,
            contents,
            lines,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn line_column_at(&self, offset: usize) -> (usize, usize) {
        let mut offset = offset.min(self.contents.len());
        while !self.contents.is_char_boundary(offset) {
            offset -= 1;
        }
        let line_index = match self.lines.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index.saturating_sub(1),
        };
        let line_start = self.lines.get(line_index).copied().unwrap_or(0);
        let column = self.contents[line_start..offset].chars().count() + 1;
        (line_index + 1, column)
    }

    pub fn line(&self, line: usize) -> &str {
        if line == 0 || line > self.lines.len() {
            return "";
        }
        let start = self.lines[line - 1];
        let end = if let Some(next_start) = self.lines.get(line) {
            let mut end = *next_start;
            if end > start && self.contents.as_bytes()[end - 1] == b'\n' {
                end -= 1;
            }
            end
        } else {
            self.contents.len()
        };
        &self.contents[start..end]
    }
}

#[derive(Debug, Clone)]
pub struct SourceInfo {
    range: Range<usize>,
    file: Arc<File>,
}

impl SourceInfo {
    pub fn new(file: Arc<File>, range: Range<usize>) -> Self {
        Self { range, file }
    }

    /// The last character of the file.
    pub fn eof(file: Arc<File>) -> Self {
        let len = file.len();
        let start = file.contents().char_indices().last().map_or(0, |(i, _)| i);
        Self::new(file, start..len)
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn file(&self) -> &Arc<File> {
        &self.file
    }

    fn as_str(&self) -> &str {
        self.file.contents().get(self.range.clone()).unwrap_or("")
    }

    pub fn line_column(&self) -> (usize, usize) {
        self.file.line_column_at(self.range.start)
    }

    pub fn end_line_column(&self) -> (usize, usize) {
        self.file.line_column_at(self.range.end)
    }
}

impl std::fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (line, column) = self.line_column();
        writeln!(f, "{}:{}:{}\n", self.file.name(), line, column)?;
        let line_text = self.file.line(line);
        writeln!(f, "{}", line_text)?;
        writeln!(
            f,
            "{}{}",
            " ".repeat(column - 1),
            "^".repeat(std::cmp::max(1, self.as_str().chars().count()))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,   // e.g. "axiom", "#diff", "|-"
    Word,      // e.g. "Prop", "ax-5", "->", "∀"
    Separator, // e.g. "(", "}", ","
    Comment,   // e.g. "// note", "/* block */"
}

/// What a token turned out to denote once names are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenRole {
    Param,
    Const,
    Term,
    Axiom,
    Thm,
}

#[derive(Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub source_info: SourceInfo,
    role: OnceLock<TokenRole>,
}

impl Token {
    pub fn new(kind: TokenKind, source_info: SourceInfo) -> Self {
        Self {
            kind,
            source_info,
            role: OnceLock::new(),
        }
    }

    pub fn is_keyword(&self) -> bool {
        self.kind == TokenKind::Keyword
    }

    pub fn is_word(&self) -> bool {
        self.kind == TokenKind::Word
    }

    pub fn is_separator(&self) -> bool {
        self.kind == TokenKind::Separator
    }

    pub fn is_comment(&self) -> bool {
        self.kind == TokenKind::Comment
    }

    pub fn as_str(&self) -> &str {
        self.source_info.as_str()
    }

    pub fn role(&self) -> Option<TokenRole> {
        self.role.get().copied()
    }

    /// The first annotation wins; a token denotes one thing.
    pub fn set_role(&self, role: TokenRole) {
        let _ = self.role.set(role);
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?} {}\n{}", self.kind, self.as_str(), self.source_info)
    }
}

#[derive(Debug, Clone)]
pub struct Lex {
    file: Arc<File>,
    position: usize,
}

impl Lex {
    pub fn new(file: Arc<File>) -> Self {
        Self { file, position: 0 }
    }

    fn advance(&mut self, bytes: usize) -> SourceInfo {
        let source_info =
            SourceInfo::new(Arc::clone(&self.file), self.position..self.position + bytes);
        self.position += bytes;
        source_info
    }
}

pub fn is_keyword(text: &str) -> bool {
    matches!(
        text,
        "type" | "term" | "axiom" | "thm" | "TYPE" | "TERM" | "AXIOM" | "THM" | "-|" | "|-"
    ) || text == DIFF_KEYWORD
}

impl Iterator for Lex {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        #[derive(PartialEq, Eq, Debug)]
        enum Kind {
            Space,
            Comment,
            Separator,
            Word,
        }

        static RE: Lazy<Regex> = Lazy::new(|| {
            let s = &[
                (Kind::Space, r"\s+"),
                (Kind::Comment, r"//[^\n]*|/\*(?s:.*?)\*/"),
                (Kind::Separator, r"[(){},]"),
                (Kind::Word, r"[^\s(){},]+"),
            ]
            .iter()
            .map(|(kind, re)| format!("(?P<{:?}>{})", kind, re))
            .collect::<Vec<_>>()
            .join("|");
            Regex::new(&format!("^(?:{})", s)).unwrap()
        });

        loop {
            if self.file.len() == self.position {
                return None;
            }
            let input = Arc::clone(&self.file);
            // whitespace and words together cover every character
            let cap = RE.captures(&input.contents()[self.position..])?;
            let len = cap.get(0).map_or(0, |m| m.len());

            if cap.name(&format!("{:?}", Kind::Space)).is_some() {
                self.advance(len);
                continue;
            }

            let source_info = self.advance(len);
            let kind = if cap.name(&format!("{:?}", Kind::Comment)).is_some() {
                TokenKind::Comment
            } else if cap.name(&format!("{:?}", Kind::Separator)).is_some() {
                TokenKind::Separator
            } else if is_keyword(source_info.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Word
            };
            return Some(Token::new(kind, source_info));
        }
    }
}

impl FusedIterator for Lex {}

/// Lexes the whole file into the shared token list the parser and compiler annotate.
pub fn tokenize(file: Arc<File>) -> Vec<Arc<Token>> {
    Lex::new(file).map(Arc::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Arc<Token>> {
        tokenize(Arc::new(File::new("<test>", input.to_owned())))
    }

    fn kinds_and_texts(tokens: &[Arc<Token>]) -> Vec<(TokenKind, &str)> {
        tokens.iter().map(|t| (t.kind, t.as_str())).collect()
    }

    #[test]
    fn term_declaration() {
        let tokens = lex("term Prop imp(Prop p0, Prop p1) { (p0 -> p1) }");
        assert_eq!(
            kinds_and_texts(&tokens),
            vec![
                (TokenKind::Keyword, "term"),
                (TokenKind::Word, "Prop"),
                (TokenKind::Word, "imp"),
                (TokenKind::Separator, "("),
                (TokenKind::Word, "Prop"),
                (TokenKind::Word, "p0"),
                (TokenKind::Separator, ","),
                (TokenKind::Word, "Prop"),
                (TokenKind::Word, "p1"),
                (TokenKind::Separator, ")"),
                (TokenKind::Separator, "{"),
                (TokenKind::Separator, "("),
                (TokenKind::Word, "p0"),
                (TokenKind::Word, "->"),
                (TokenKind::Word, "p1"),
                (TokenKind::Separator, ")"),
                (TokenKind::Separator, "}"),
            ]
        );
    }

    #[test]
    fn comments_and_markers() {
        let tokens = lex("/*\n* block\n*/ #diff s0 p0 // line\n|- imp(p0, q)");
        assert_eq!(
            kinds_and_texts(&tokens),
            vec![
                (TokenKind::Comment, "/*\n* block\n*/"),
                (TokenKind::Keyword, "#diff"),
                (TokenKind::Word, "s0"),
                (TokenKind::Word, "p0"),
                (TokenKind::Comment, "// line"),
                (TokenKind::Keyword, "|-"),
                (TokenKind::Word, "imp"),
                (TokenKind::Separator, "("),
                (TokenKind::Word, "p0"),
                (TokenKind::Separator, ","),
                (TokenKind::Word, "q"),
                (TokenKind::Separator, ")"),
            ]
        );
    }

    #[test]
    fn hyphenated_names_are_single_words() {
        let tokens = lex("ax-mp -| ∀");
        assert_eq!(
            kinds_and_texts(&tokens),
            vec![
                (TokenKind::Word, "ax-mp"),
                (TokenKind::Keyword, "-|"),
                (TokenKind::Word, "∀"),
            ]
        );
    }

    #[test]
    fn upper_case_keywords() {
        let tokens = lex("TYPE Prop");
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Word);
    }

    #[test]
    fn positions_count_chars() {
        let tokens = lex("type Prop\n  ∀ x");
        assert_eq!(tokens[2].source_info.line_column(), (2, 3));
        assert_eq!(tokens[3].source_info.line_column(), (2, 5));
    }

    #[test]
    fn eof_covers_a_whole_trailing_char() {
        let file = Arc::new(File::new("<test>", "type Prop\n∀"));
        let eof = SourceInfo::eof(Arc::clone(&file));
        assert_eq!(eof.range(), 10..13);
        assert_eq!(eof.line_column(), (2, 1));
        assert_eq!(eof.to_string(), "<test>:2:1\n\n∀\n^\n");
        // an offset inside a char is counted from the char's start
        assert_eq!(file.line_column_at(11), (2, 1));
    }

    #[test]
    fn role_is_written_once() {
        let tokens = lex("x");
        assert_eq!(tokens[0].role(), None);
        tokens[0].set_role(TokenRole::Param);
        tokens[0].set_role(TokenRole::Term);
        assert_eq!(tokens[0].role(), Some(TokenRole::Param));
    }
}
