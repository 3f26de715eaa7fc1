//! Tokenizer for the component-markup dialect.
//!
//! The lexer is deliberately shallow: it distinguishes identifiers, string
//! and template literals, numbers and single-character punctuation, and it
//! is comment- and string-aware so that binding analysis never sees text
//! that the runtime would not. Template interpolations (`${...}`) are
//! re-lexed so identifier references inside them are visible.

use serde::Serialize;

/// Kind of a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    /// Identifier or keyword.
    Ident,
    /// String literal (single or double quoted). `text` holds the unquoted value.
    Str,
    /// Template literal. `text` holds the raw contents between backticks.
    Template,
    /// Numeric literal.
    Number,
    /// Single punctuation character.
    Punct,
}

/// One lexed token with its source position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Lexeme; for `Str` the unquoted value, for `Punct` the character.
    pub text: String,
    /// 1-based source line.
    pub line: usize,
    /// 1-based source column.
    pub column: usize,
}

impl Token {
    /// Whether this token is the given punctuation character.
    pub fn is_punct(&self, ch: char) -> bool {
        self.kind == TokenKind::Punct && self.text.len() == ch.len_utf8() && self.text.starts_with(ch)
    }

    /// Whether this token is the given identifier.
    pub fn is_ident(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == word
    }
}

/// Result of tokenizing: tokens lexed so far plus any lexical errors.
#[derive(Debug, Default)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub errors: Vec<String>,
}

/// Tokenizes component-markup source.
///
/// Never fails outright: unterminated strings and comments are recorded as
/// errors and lexing resumes at end of input.
pub fn tokenize(source: &str) -> LexOutput {
    let mut lexer = Lexer::new(source);
    lexer.run();
    LexOutput {
        tokens: lexer.tokens,
        errors: lexer.errors,
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    errors: Vec<String>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, ch)) = next {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn push(&mut self, kind: TokenKind, text: String, line: usize, column: usize) {
        self.tokens.push(Token {
            kind,
            text,
            line,
            column,
        });
    }

    fn run(&mut self) {
        while let Some(ch) = self.peek() {
            let line = self.line;
            let column = self.column;
            match ch {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' => self.slash(line, column),
                '\'' | '"' => self.string(ch, line, column),
                '`' => self.template(line, column),
                c if c.is_ascii_digit() => self.number(line, column),
                c if is_ident_start(c) => self.ident(line, column),
                _ => {
                    self.bump();
                    self.push(TokenKind::Punct, ch.to_string(), line, column);
                }
            }
        }
    }

    fn slash(&mut self, line: usize, column: usize) {
        self.bump();
        match self.peek() {
            Some('/') => {
                while let Some(ch) = self.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.bump();
                }
            }
            Some('*') => {
                self.bump();
                let mut closed = false;
                while let Some((_, ch)) = self.bump() {
                    if ch == '*' && self.peek() == Some('/') {
                        self.bump();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    self.errors
                        .push(format!("unterminated block comment at line {line}"));
                }
            }
            _ => self.push(TokenKind::Punct, "/".to_string(), line, column),
        }
    }

    fn string(&mut self, quote: char, line: usize, column: usize) {
        self.bump();
        let mut value = String::new();
        let mut closed = false;
        while let Some((_, ch)) = self.bump() {
            match ch {
                '\\' => {
                    if let Some((_, escaped)) = self.bump() {
                        value.push(escaped);
                    }
                }
                c if c == quote => {
                    closed = true;
                    break;
                }
                '\n' => {
                    // Generated code sometimes forgets the closing quote;
                    // stop at the line break instead of eating the file.
                    self.errors
                        .push(format!("unterminated string literal at line {line}"));
                    closed = true;
                    break;
                }
                c => value.push(c),
            }
        }
        if !closed {
            self.errors
                .push(format!("unterminated string literal at line {line}"));
        }
        self.push(TokenKind::Str, value, line, column);
    }

    fn template(&mut self, line: usize, column: usize) {
        self.bump();
        let mut raw = String::new();
        let mut closed = false;
        while let Some((_, ch)) = self.bump() {
            match ch {
                '\\' => {
                    raw.push(ch);
                    if let Some((_, escaped)) = self.bump() {
                        raw.push(escaped);
                    }
                }
                '`' => {
                    closed = true;
                    break;
                }
                '$' if self.peek() == Some('{') => {
                    raw.push(ch);
                    self.bump();
                    raw.push('{');
                    let interp_line = self.line;
                    let interp_column = self.column;
                    let interp = self.consume_interpolation(&mut raw, line);
                    // Re-lex the interpolation so references inside it are
                    // visible to binding analysis.
                    let inner = tokenize(&interp);
                    for mut token in inner.tokens {
                        token.line = interp_line + token.line - 1;
                        if token.line == interp_line {
                            token.column += interp_column - 1;
                        }
                        self.tokens.push(token);
                    }
                }
                c => raw.push(c),
            }
        }
        if !closed {
            self.errors
                .push(format!("unterminated template literal at line {line}"));
        }
        self.push(TokenKind::Template, raw, line, column);
    }

    fn consume_interpolation(&mut self, raw: &mut String, line: usize) -> String {
        let mut depth = 1usize;
        let mut inner = String::new();
        while let Some((_, ch)) = self.bump() {
            match ch {
                '{' => {
                    depth += 1;
                    inner.push(ch);
                    raw.push(ch);
                }
                '}' => {
                    depth -= 1;
                    raw.push(ch);
                    if depth == 0 {
                        return inner;
                    }
                    inner.push(ch);
                }
                c => {
                    inner.push(c);
                    raw.push(c);
                }
            }
        }
        self.errors
            .push(format!("unterminated template interpolation at line {line}"));
        inner
    }

    fn number(&mut self, line: usize, column: usize) {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' {
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, text, line, column);
    }

    fn ident(&mut self, line: usize, column: usize) {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if is_ident_continue(ch) {
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        debug_assert!(!text.is_empty());
        self.push(TokenKind::Ident, text, line, column);
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idents(source: &str) -> Vec<String> {
        tokenize(source)
            .tokens
            .into_iter()
            .filter(|t| t.kind == TokenKind::Ident)
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_skips_comments_and_strings() {
        let out = idents("// useState in a comment\nconst a = 'useEffect';\n/* useRef */ b");
        assert_eq!(out, vec!["const", "a", "b"]);
    }

    #[test]
    fn test_sees_template_interpolations() {
        let out = idents("const msg = `count is ${count + offset}`;");
        assert!(out.contains(&"count".to_string()));
        assert!(out.contains(&"offset".to_string()));
        // Words in the literal part stay invisible.
        assert!(!out.contains(&"is".to_string()));
    }

    #[test]
    fn test_positions_are_one_based() {
        let out = tokenize("a\n  b");
        assert_eq!(out.tokens[0].line, 1);
        assert_eq!(out.tokens[0].column, 1);
        assert_eq!(out.tokens[1].line, 2);
        assert_eq!(out.tokens[1].column, 3);
    }

    #[test]
    fn test_unterminated_string_is_reported_not_fatal() {
        let out = tokenize("const a = 'oops\nconst b = 1;");
        assert!(!out.errors.is_empty());
        assert!(out.tokens.iter().any(|t| t.is_ident("b")));
    }
}
