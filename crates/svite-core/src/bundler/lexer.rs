//! A small JavaScript tokenizer.
//!
//! Produces just enough structure for import/export analysis: identifiers,
//! punctuators and literals with byte spans and their bracket nesting depth.
//! Comments and whitespace are dropped. Regex literals are told apart from
//! division by looking at the previous token.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Punct,
    Str,
    /// A whole template, or one piece of it split at `${` / `}`.
    Template,
    Number,
    Regex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// Bracket nesting depth. Openers and closers carry the depth outside them.
    pub depth: u32,
    /// A line terminator appears between this token and the previous one.
    pub newline_before: bool,
}

impl Token {
    #[must_use]
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start..self.end]
    }

    #[must_use]
    pub fn is_punct(&self, source: &str, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text(source) == punct
    }

    #[must_use]
    pub fn is_ident(&self, source: &str, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text(source) == name
    }

    /// A string literal, or a template without substitutions.
    #[must_use]
    pub fn is_static_string(&self, source: &str) -> bool {
        match self.kind {
            TokenKind::Str => true,
            TokenKind::Template => {
                let text = self.text(source);
                text.len() >= 2 && text.starts_with('`') && text.ends_with('`')
            }
            _ => false,
        }
    }
}

/// Tokenizer failure with a 1-indexed position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.line, self.column)
    }
}

impl std::error::Error for LexError {}

/// 1-indexed line and column of a byte offset.
#[must_use]
pub fn line_col(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line as u32, column as u32)
}

/// Tokenize `source`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

/// Keywords after which a `/` starts a regular expression.
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

#[derive(Debug, Clone, Copy)]
enum Delim {
    Paren(usize),
    Bracket(usize),
    Brace(usize),
    TemplateExpr(usize),
}

impl Delim {
    fn offset(self) -> usize {
        match self {
            Self::Paren(o) | Self::Bracket(o) | Self::Brace(o) | Self::TemplateExpr(o) => o,
        }
    }

    fn opener(self) -> &'static str {
        match self {
            Self::Paren(_) => "(",
            Self::Bracket(_) => "[",
            Self::Brace(_) => "{",
            Self::TemplateExpr(_) => "${",
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
    stack: Vec<Delim>,
    newline: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
            stack: Vec::new(),
            newline: false,
        }
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> LexError {
        let (line, column) = line_col(self.src, offset);
        LexError {
            message: message.into(),
            offset,
            line,
            column,
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            start,
            end,
            depth: self.stack.len() as u32,
            newline_before: std::mem::take(&mut self.newline),
        });
        self.pos = end;
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        if self.src.starts_with("#!") {
            self.pos = self.src.find('\n').unwrap_or(self.src.len());
        }

        loop {
            self.skip_trivia()?;
            let Some(c) = self.peek(0) else { break };
            let start = self.pos;

            match c {
                b'"' | b'\'' => self.string(c)?,
                b'`' => self.template(start)?,
                b'0'..=b'9' => self.number(),
                b'.' if self.peek(1).is_some_and(|b| b.is_ascii_digit()) => self.number(),
                b'.' if self.src[start..].starts_with("...") => {
                    self.push(TokenKind::Punct, start, start + 3);
                }
                b'=' if self.peek(1) == Some(b'>') => self.push(TokenKind::Punct, start, start + 2),
                b'/' if self.regex_allowed() => self.regex()?,
                b'(' => self.open(Delim::Paren(start)),
                b'[' => self.open(Delim::Bracket(start)),
                b'{' => self.open(Delim::Brace(start)),
                b')' | b']' | b'}' => self.close(c)?,
                c if is_ident_start(c) => self.ident(),
                c if c >= 0x80 => {
                    // Non-ASCII outside whitespace is part of an identifier.
                    self.ident();
                }
                _ => self.push(TokenKind::Punct, start, start + 1),
            }
        }

        if let Some(open) = self.stack.last() {
            let msg = match open {
                Delim::TemplateExpr(_) => "Unterminated template literal".to_string(),
                other => format!("Unclosed '{}'", other.opener()),
            };
            return Err(self.error(msg, open.offset()));
        }

        Ok(self.tokens)
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek(0) {
            match c {
                b'\n' | b'\r' => {
                    self.newline = true;
                    self.pos += 1;
                }
                b' ' | b'\t' | 0x0b | 0x0c => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => {
                    self.pos = self.src[self.pos..]
                        .find('\n')
                        .map_or(self.src.len(), |i| self.pos + i);
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    let start = self.pos;
                    let Some(end) = self.src[start + 2..].find("*/") else {
                        return Err(self.error("Unterminated comment", start));
                    };
                    if self.src[start..start + 2 + end].contains('\n') {
                        self.newline = true;
                    }
                    self.pos = start + 2 + end + 2;
                }
                c if c >= 0x80 => {
                    let Some(ch) = self.src[self.pos..].chars().next() else {
                        break;
                    };
                    if !ch.is_whitespace() {
                        break;
                    }
                    if matches!(ch, '\u{2028}' | '\u{2029}') {
                        self.newline = true;
                    }
                    self.pos += ch.len_utf8();
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        let text = prev.text(self.src);
        match prev.kind {
            TokenKind::Punct => !matches!(text, ")" | "]" | "}"),
            TokenKind::Ident => REGEX_PREFIX_KEYWORDS.contains(&text),
            TokenKind::Template => text.ends_with("${"),
            TokenKind::Str | TokenKind::Number | TokenKind::Regex => false,
        }
    }

    fn open(&mut self, delim: Delim) {
        let start = self.pos;
        self.push(TokenKind::Punct, start, start + 1);
        self.stack.push(delim);
    }

    fn close(&mut self, c: u8) -> Result<(), LexError> {
        let start = self.pos;
        let Some(top) = self.stack.pop() else {
            return Err(self.error(format!("Unexpected '{}'", c as char), start));
        };

        match (top, c) {
            (Delim::Paren(_), b')') | (Delim::Bracket(_), b']') | (Delim::Brace(_), b'}') => {
                self.push(TokenKind::Punct, start, start + 1);
                Ok(())
            }
            (Delim::TemplateExpr(_), b'}') => self.template(start),
            (open, _) => {
                let (line, column) = line_col(self.src, open.offset());
                Err(self.error(
                    format!(
                        "Unexpected '{}', expected closing for '{}' opened at {line}:{column}",
                        c as char,
                        open.opener(),
                    ),
                    start,
                ))
            }
        }
    }

    fn string(&mut self, quote: u8) -> Result<(), LexError> {
        let start = self.pos;
        let mut i = start + 1;
        while let Some(&b) = self.bytes.get(i) {
            match b {
                b'\\' => {
                    i += if self.bytes.get(i + 1) == Some(&b'\r') && self.bytes.get(i + 2) == Some(&b'\n') {
                        3
                    } else {
                        2
                    };
                }
                b'\n' | b'\r' => break,
                b if b == quote => {
                    self.push(TokenKind::Str, start, i + 1);
                    return Ok(());
                }
                _ => i += 1,
            }
        }
        Err(self.error("Unterminated string literal", start))
    }

    /// Scan a template piece starting at a backtick or at the `}` closing a substitution.
    fn template(&mut self, start: usize) -> Result<(), LexError> {
        let mut i = start + 1;
        while let Some(&b) = self.bytes.get(i) {
            match b {
                b'\\' => i += 2,
                b'`' => {
                    self.push(TokenKind::Template, start, i + 1);
                    return Ok(());
                }
                b'$' if self.bytes.get(i + 1) == Some(&b'{') => {
                    self.push(TokenKind::Template, start, i + 2);
                    self.stack.push(Delim::TemplateExpr(start));
                    return Ok(());
                }
                _ => i += 1,
            }
        }
        Err(self.error("Unterminated template literal", start))
    }

    fn regex(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let mut i = start + 1;
        let mut in_class = false;
        loop {
            match self.bytes.get(i) {
                None | Some(b'\n' | b'\r') => {
                    return Err(self.error("Unterminated regular expression", start));
                }
                Some(b'\\') => i += 2,
                Some(b'[') => {
                    in_class = true;
                    i += 1;
                }
                Some(b']') => {
                    in_class = false;
                    i += 1;
                }
                Some(b'/') if !in_class => {
                    i += 1;
                    break;
                }
                Some(_) => i += 1,
            }
        }
        while self.bytes.get(i).is_some_and(|&b| is_ident_part(b)) {
            i += 1;
        }
        self.push(TokenKind::Regex, start, i);
        Ok(())
    }

    fn number(&mut self) {
        let start = self.pos;
        let hex = self.src[start..].starts_with("0x") || self.src[start..].starts_with("0X");
        let mut i = start;
        while let Some(&b) = self.bytes.get(i) {
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' {
                i += 1;
            } else if (b == b'+' || b == b'-')
                && !hex
                && matches!(self.bytes.get(i - 1), Some(b'e' | b'E'))
            {
                i += 1;
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, start, i);
    }

    fn ident(&mut self) {
        let start = self.pos;
        let mut i = start + self.src[start..].chars().next().map_or(1, char::len_utf8);
        while let Some(&b) = self.bytes.get(i) {
            if is_ident_part(b) {
                i += 1;
            } else if b >= 0x80 {
                let ch = self.src[i..].chars().next().unwrap_or(' ');
                if ch.is_whitespace() {
                    break;
                }
                i += ch.len_utf8();
            } else {
                break;
            }
        }
        self.push(TokenKind::Ident, start, i);
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b == b'#' || b == b'\\'
}

fn is_ident_part(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b == b'\\'
}

/// Decode the value of a string literal or substitution-free template token.
#[must_use]
pub fn string_value(text: &str) -> String {
    let inner = if text.len() >= 2 { &text[1..text.len() - 1] } else { "" };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|&c| c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some('\n') | None => {}
            Some(other) => out.push(other),
        }
    }
    out
}
