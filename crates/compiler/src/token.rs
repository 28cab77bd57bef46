//! Config-language tokenizer.
//!
//! Line-oriented scan against an ordered regex table built once per
//! process. Whitespace other than newlines is elided; every source line
//! produces a trailing `Newline` token so the parsers can use newlines
//! as statement separators. Comments run from `#` to end of line and
//! produce no token. Lines and columns are 1-based; a token's column is
//! the position of its first non-whitespace character.

use std::sync::LazyLock;

use regex::Regex;
use surefire_core::Error;

use crate::diag::ConfigError;

const ERR_CATEGORY: &str = "tokenizer error";

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `[Name]`; the token text is the name without brackets.
    Section,
    /// `.NAME`; the token text keeps the dot.
    Label,
    Identifier,
    Operator,
    /// Numeric literal or `true`/`false`/`TRUE`/`FALSE`; kept as text
    /// and parsed during expression compilation.
    Constant,
    Colon,
    Comma,
    Newline,
    LParen,
    RParen,
    LBrace,
    RBrace,
    /// `@NAME`; the token text keeps the `@`.
    Annotation,
}

/// One token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based line, or -1 for synthesized tokens.
    pub line: i32,
    /// 1-based column, or -1 for synthesized tokens.
    pub col: i32,
}

impl Token {
    /// A token with no source position, used for nodes the parser
    /// synthesizes (e.g. the `AND` of an expanded relational chain).
    pub fn synthetic(kind: TokenKind, text: &str) -> Token {
        Token {
            kind,
            text: text.to_string(),
            line: -1,
            col: -1,
        }
    }

    /// Kind and text match.
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

// Ordered rule table; order is significant (constants before
// identifiers, multi-character operators before their prefixes).
static TOKEN_RULES: LazyLock<Vec<(TokenKind, Regex)>> = LazyLock::new(|| {
    let rule = |kind, pattern| (kind, Regex::new(pattern).expect("token rule"));
    vec![
        rule(TokenKind::Section, r"^\[[A-Za-z][A-Za-z0-9_/]*\]"),
        rule(TokenKind::Label, r"^\.[A-Za-z][A-Za-z0-9_]*"),
        rule(TokenKind::Annotation, r"^@[A-Za-z][A-Za-z0-9_]*"),
        rule(
            TokenKind::Constant,
            r"^(?:(?:true|false|TRUE|FALSE)\b|[0-9]*\.?[0-9]+)",
        ),
        rule(TokenKind::Identifier, r"^[A-Za-z][A-Za-z0-9_]*"),
        rule(TokenKind::Operator, r"^(?:==|!=|<=|>=|->|=|<|>|\+|-|\*|/)"),
        rule(TokenKind::Colon, r"^:"),
        rule(TokenKind::Comma, r"^,"),
        rule(TokenKind::LParen, r"^\("),
        rule(TokenKind::RParen, r"^\)"),
        rule(TokenKind::LBrace, r"^\{"),
        rule(TokenKind::RBrace, r"^\}"),
    ]
});

// Word operators are tokenized as identifiers and re-tagged.
const WORD_OPERATORS: [&str; 6] = ["AND", "and", "OR", "or", "NOT", "not"];

/// Tokenize a config source. Fails with `TokInvalid` at the first
/// character that matches no rule.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ConfigError> {
    let mut toks = Vec::new();
    for (line_idx, line) in source.lines().enumerate() {
        let line_num = (line_idx + 1) as i32;
        tokenize_line(line, line_num, &mut toks)?;
        toks.push(Token {
            kind: TokenKind::Newline,
            text: "(newline)".to_string(),
            line: line_num,
            col: (line.len() + 1) as i32,
        });
    }
    Ok(toks)
}

fn tokenize_line(line: &str, line_num: i32, toks: &mut Vec<Token>) -> Result<(), ConfigError> {
    let bytes = line.as_bytes();
    let mut idx = 0;

    while idx < bytes.len() {
        // Skip insignificant whitespace.
        if matches!(bytes[idx], b' ' | b'\t' | b'\r') {
            idx += 1;
            continue;
        }

        // Comments run to end of line.
        if bytes[idx] == b'#' {
            break;
        }

        let rest = &line[idx..];
        let mut matched = false;
        for (kind, re) in TOKEN_RULES.iter() {
            if let Some(m) = re.find(rest) {
                let mut kind = *kind;
                let mut text = m.as_str();
                if kind == TokenKind::Section {
                    text = &text[1..text.len() - 1];
                } else if kind == TokenKind::Identifier && WORD_OPERATORS.contains(&text) {
                    kind = TokenKind::Operator;
                }
                toks.push(Token {
                    kind,
                    text: text.to_string(),
                    line: line_num,
                    col: (idx + 1) as i32,
                });
                idx += m.end();
                matched = true;
                break;
            }
        }

        if !matched {
            return Err(ConfigError::new(
                Error::TokInvalid,
                ERR_CATEGORY,
                "invalid token",
                line_num,
                (idx + 1) as i32,
            ));
        }
    }

    Ok(())
}

/// A forward cursor over a token slice, with slicing for the
/// section/label/block parsers.
#[derive(Debug, Clone)]
pub struct TokenCursor<'a> {
    toks: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(toks: &'a [Token]) -> TokenCursor<'a> {
        TokenCursor { toks, pos: 0 }
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.toks.len()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.toks.len());
    }

    /// The current token, if any.
    pub fn peek(&self) -> Option<&'a Token> {
        self.toks.get(self.pos)
    }

    /// Kind of the current token.
    pub fn kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    /// Text of the current token, or "" at end of input.
    pub fn text(&self) -> &'a str {
        self.peek().map(|t| t.text.as_str()).unwrap_or("")
    }

    /// Take and return the current token.
    pub fn take(&mut self) -> Option<&'a Token> {
        let tok = self.toks.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Skip newline tokens.
    pub fn eat_newlines(&mut self) {
        while self.kind() == Some(TokenKind::Newline) {
            self.pos += 1;
        }
    }

    /// Index of the next token at or after the cursor whose kind is in
    /// `kinds`, or the slice length if none.
    pub fn find(&self, kinds: &[TokenKind]) -> usize {
        let mut idx = self.pos;
        while idx < self.toks.len() && !kinds.contains(&self.toks[idx].kind) {
            idx += 1;
        }
        idx
    }

    /// Sub-slice `[start, end)` of the underlying tokens.
    pub fn slice(&self, start: usize, end: usize) -> &'a [Token] {
        &self.toks[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(toks: &[Token]) -> Vec<TokenKind> {
        toks.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_section_label_and_element_line() {
        let toks = tokenize("[Foo]\n.ENTRY\nI32 foo @READ_ONLY\n").unwrap();
        assert_eq!(
            kinds(&toks),
            vec![
                TokenKind::Section,
                TokenKind::Newline,
                TokenKind::Label,
                TokenKind::Newline,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Annotation,
                TokenKind::Newline,
            ]
        );
        assert_eq!(toks[0].text, "Foo");
        assert_eq!(toks[2].text, ".ENTRY");
        assert_eq!(toks[6].text, "@READ_ONLY");
    }

    #[test]
    fn test_positions_are_one_based() {
        let toks = tokenize("  foo = 1.5\n").unwrap();
        assert_eq!((toks[0].line, toks[0].col), (1, 3));
        assert_eq!((toks[1].line, toks[1].col), (1, 7));
        assert_eq!((toks[2].line, toks[2].col), (1, 9));
        assert_eq!(toks[2].kind, TokenKind::Constant);
        assert_eq!(toks[2].text, "1.5");
    }

    #[test]
    fn test_operators_longest_match() {
        let toks = tokenize("a <= b == c -> d\n").unwrap();
        let ops: Vec<&str> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(ops, vec!["<=", "==", "->"]);
    }

    #[test]
    fn test_word_operators_retagged() {
        let toks = tokenize("a AND not b or c\n").unwrap();
        assert_eq!(toks[1].kind, TokenKind::Operator);
        assert_eq!(toks[2].kind, TokenKind::Operator);
        assert_eq!(toks[4].kind, TokenKind::Operator);
        // Plain identifiers stay identifiers.
        assert_eq!(toks[0].kind, TokenKind::Identifier);
        assert_eq!(toks[3].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_boolean_constants_need_word_boundary() {
        let toks = tokenize("true truex TRUE\n").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Constant);
        assert_eq!(toks[1].kind, TokenKind::Identifier);
        assert_eq!(toks[2].kind, TokenKind::Constant);
    }

    #[test]
    fn test_comments_produce_no_tokens() {
        let toks = tokenize("foo # trailing words = 1\n# whole line\n").unwrap();
        assert_eq!(
            kinds(&toks),
            vec![TokenKind::Identifier, TokenKind::Newline, TokenKind::Newline]
        );
    }

    #[test]
    fn test_invalid_character_position() {
        let err = tokenize("foo = 1\nbar ? 2\n").unwrap_err();
        assert_eq!(err.code(), Error::TokInvalid);
        assert_eq!((err.line(), err.col()), (2, 5));
    }

    #[test]
    fn test_legacy_region_section() {
        let toks = tokenize("[REGION/Telemetry]\n").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Section);
        assert_eq!(toks[0].text, "REGION/Telemetry");
    }
}
