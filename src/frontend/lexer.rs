//! Lexer for cylang
//!
//! Converts source code into a lazy stream of tokens. Lexing stops at the
//! first malformed token.
//!
//! A `/` is read as the start of a regular expression literal when the
//! previous token cannot end an operand, and as division otherwise. The
//! parser can ask for a `/` to be re-read as a regular expression where
//! it expects an operand after `)` or `}`.

use crate::frontend::ast::AssignOp;
use crate::frontend::token::{Token, TokenClass, TokenKind};
use crate::utils::{Error, Result, Span};

/// The lexer state
pub struct Lexer {
    /// Source code as characters
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    line: usize,
    column: usize,
    /// Start of current token
    start: usize,
    start_line: usize,
    start_column: usize,
    /// Whether a line terminator was skipped before the current token
    newline_before: bool,
    /// Whether a `/` here starts a regular expression
    regex_allowed: bool,
    /// Set once end of input or an error has been produced
    finished: bool,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            start: 0,
            start_line: 1,
            start_column: 1,
            newline_before: false,
            regex_allowed: true,
            finished: false,
        }
    }

    /// Get the current character without advancing
    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    /// Get the next character without advancing
    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn mark_start(&mut self) {
        self.start = self.pos;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    /// Create a span from start to current position
    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos, self.start_line, self.start_column)
    }

    /// Create a token with the current span
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span(), self.newline_before)
    }

    /// Skip whitespace and comments
    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(c) = self.peek() {
            match c {
                c if is_line_terminator(c) => {
                    self.newline_before = true;
                    self.advance();
                }
                // Zs separators, tab, VT, FF, NBSP and the byte order mark
                c if c.is_whitespace() || c == '\u{FEFF}' => {
                    self.advance();
                }
                // Line comment
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if is_line_terminator(c) {
                            break;
                        }
                        self.advance();
                    }
                }
                // Block comment
                '/' if self.peek_next() == Some('*') => {
                    self.mark_start();
                    self.advance();
                    self.advance();
                    loop {
                        match (self.peek(), self.peek_next()) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(c), _) if is_line_terminator(c) => {
                                self.newline_before = true;
                                self.advance();
                            }
                            (Some(_), _) => {
                                self.advance();
                            }
                            (None, _) => {
                                return Err(Error::UnterminatedComment {
                                    span: Span::new(
                                        self.start,
                                        self.start + 2,
                                        self.start_line,
                                        self.start_column,
                                    ),
                                });
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.source[self.start..self.pos].iter().collect();
        let kind = TokenKind::keyword_from_str(&text).unwrap_or(TokenKind::Ident(text));
        self.make_token(kind)
    }

    fn malformed_number(&self, reason: &str) -> Error {
        Error::InvalidNumber {
            reason: reason.to_string(),
            span: self.make_span(),
        }
    }

    fn consume_digits(&mut self) -> usize {
        let mut count = 0;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    /// Read a number literal (integer, decimal, exponent or hex)
    fn read_number(&mut self) -> Result<Token> {
        let value = if self.peek() == Some('0') && matches!(self.peek_next(), Some('x') | Some('X')) {
            self.advance(); // 0
            self.advance(); // x

            let mut value = 0f64;
            let mut digits = 0;
            while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                value = value * 16.0 + f64::from(d);
                digits += 1;
                self.advance();
            }
            if digits == 0 {
                return Err(self.malformed_number("missing hexadecimal digits"));
            }
            value
        } else {
            self.consume_digits();

            // A '.' belongs to the number only when a digit follows
            if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
                self.consume_digits();
            }

            if matches!(self.peek(), Some('e') | Some('E')) {
                self.advance();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.advance();
                }
                if self.consume_digits() == 0 {
                    return Err(self.malformed_number("missing exponent digits"));
                }
            }

            let text: String = self.source[self.start..self.pos].iter().collect();
            text.parse::<f64>()
                .map_err(|_| self.malformed_number("unparseable value"))?
        };

        if self.peek().map_or(false, is_ident_continue) {
            self.advance();
            return Err(self.malformed_number("identifier starts immediately after number"));
        }
        if !value.is_finite() {
            return Err(self.malformed_number("value out of range"));
        }

        Ok(self.make_token(TokenKind::Number(value)))
    }

    fn read_hex_escape(&mut self, digits: usize) -> Result<char> {
        let escape_start = self.pos;
        let escape_line = self.line;
        let escape_column = self.column;
        let mut code = 0u32;
        for _ in 0..digits {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(d) => {
                    code = code * 16 + d;
                    self.advance();
                }
                None => {
                    return Err(Error::InvalidEscape {
                        span: Span::new(escape_start, self.pos, escape_line, escape_column),
                    })
                }
            }
        }
        char::from_u32(code).ok_or(Error::InvalidEscape {
            span: Span::new(escape_start, self.pos, escape_line, escape_column),
        })
    }

    /// Reported at the opening quote
    fn unterminated_string(&self) -> Error {
        Error::UnterminatedString {
            span: Span::new(self.start, self.start + 1, self.start_line, self.start_column),
        }
    }

    /// Read a string literal delimited by `quote`
    fn read_string(&mut self, quote: char) -> Result<Token> {
        self.advance(); // consume opening quote

        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n' | '\r') => return Err(self.unterminated_string()),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let Some(c) = self.advance() else {
                        return Err(self.unterminated_string());
                    };
                    match c {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'b' => value.push('\u{0008}'),
                        'f' => value.push('\u{000C}'),
                        'v' => value.push('\u{000B}'),
                        '0' => value.push('\0'),
                        'x' => value.push(self.read_hex_escape(2)?),
                        'u' => value.push(self.read_hex_escape(4)?),
                        // Line continuation
                        '\r' => {
                            self.eat('\n');
                        }
                        '\n' | '\u{2028}' | '\u{2029}' => {}
                        other => value.push(other),
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        Ok(self.make_token(TokenKind::String(value)))
    }

    fn compound(&mut self, plain: TokenKind, op: AssignOp) -> TokenKind {
        if self.eat('=') {
            TokenKind::CompoundAssign(op)
        } else {
            plain
        }
    }

    /// Read the body and flags of a regular expression whose opening `/`
    /// starts at `self.start` and has been consumed
    fn read_regex(&mut self) -> Result<Token> {
        let mut in_class = false;
        loop {
            match self.peek() {
                None => return Err(self.unterminated_regex()),
                Some(c) if is_line_terminator(c) => return Err(self.unterminated_regex()),
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some(c) if !is_line_terminator(c) => {
                            self.advance();
                        }
                        _ => return Err(self.unterminated_regex()),
                    }
                }
                Some('/') if !in_class => break,
                Some(c) => {
                    match c {
                        '[' => in_class = true,
                        ']' => in_class = false,
                        _ => {}
                    }
                    self.advance();
                }
            }
        }
        let pattern: String = self.source[self.start + 1..self.pos].iter().collect();
        self.advance(); // closing slash

        let flags_start = self.pos;
        while self.peek().map_or(false, is_ident_continue) {
            self.advance();
        }
        let flags: String = self.source[flags_start..self.pos].iter().collect();
        let mut seen = String::new();
        let valid = flags.chars().all(|flag| {
            let fresh = REGEX_FLAGS.contains(flag) && !seen.contains(flag);
            seen.push(flag);
            fresh
        });
        if !valid {
            return Err(Error::InvalidRegexFlags {
                flags,
                span: self.make_span(),
            });
        }

        Ok(self.make_token(TokenKind::RegExp { pattern, flags }))
    }

    /// Reported at the opening slash
    fn unterminated_regex(&self) -> Error {
        Error::UnterminatedRegex {
            span: Span::new(self.start, self.start + 1, self.start_line, self.start_column),
        }
    }

    /// Re-read a `/` or `/=` token as the start of a regular expression.
    /// Only valid while `slash` is the most recent token produced.
    pub fn rescan_regex(&mut self, slash: &Token) -> Result<Token> {
        self.start = slash.span.start;
        self.start_line = slash.span.line;
        self.start_column = slash.span.column;
        // Resume right after the slash, which also covers a `/=` token
        self.pos = slash.span.start + 1;
        self.line = slash.span.line;
        self.column = slash.span.column + 1;
        self.newline_before = slash.newline_before;
        let token = self.read_regex()?;
        self.regex_allowed = false;
        Ok(token)
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        let token = self.scan_token()?;
        self.regex_allowed = regex_may_follow(&token.kind);
        Ok(token)
    }

    fn scan_token(&mut self) -> Result<Token> {
        self.newline_before = false;
        self.skip_whitespace()?;
        self.mark_start();

        let Some(c) = self.peek() else {
            return Ok(self.make_token(TokenKind::Eof));
        };

        // Identifiers and keywords
        if is_ident_start(c) {
            return Ok(self.read_identifier());
        }

        // Numbers
        if c.is_ascii_digit() || (c == '.' && self.peek_next().map_or(false, |n| n.is_ascii_digit())) {
            return self.read_number();
        }

        // String literals
        if c == '"' || c == '\'' {
            return self.read_string(c);
        }

        self.advance();

        // Operators and punctuation
        let kind = match c {
            '+' => {
                if self.eat('+') {
                    TokenKind::PlusPlus
                } else {
                    self.compound(TokenKind::Plus, AssignOp::AddAssign)
                }
            }
            '-' => {
                if self.eat('-') {
                    TokenKind::MinusMinus
                } else {
                    self.compound(TokenKind::Minus, AssignOp::SubAssign)
                }
            }
            '*' => self.compound(TokenKind::Star, AssignOp::MulAssign),
            '/' if self.regex_allowed => return self.read_regex(),
            '/' => self.compound(TokenKind::Slash, AssignOp::DivAssign),
            '%' => self.compound(TokenKind::Percent, AssignOp::ModAssign),
            '^' => self.compound(TokenKind::Caret, AssignOp::BitXorAssign),
            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::NeEq
                    } else {
                        TokenKind::Ne
                    }
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.eat('<') {
                    self.compound(TokenKind::Shl, AssignOp::ShlAssign)
                } else if self.eat('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('>') {
                    if self.eat('>') {
                        self.compound(TokenKind::UShr, AssignOp::UShrAssign)
                    } else {
                        self.compound(TokenKind::Shr, AssignOp::ShrAssign)
                    }
                } else if self.eat('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.eat('&') {
                    TokenKind::AndAnd
                } else {
                    self.compound(TokenKind::And, AssignOp::BitAndAssign)
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::OrOr
                } else {
                    self.compound(TokenKind::Or, AssignOp::BitOrAssign)
                }
            }
            '~' => TokenKind::Tilde,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            _ => {
                return Err(Error::UnexpectedChar {
                    ch: c,
                    span: self.make_span(),
                })
            }
        };

        Ok(self.make_token(kind))
    }
}

impl Iterator for Lexer {
    type Item = Result<Token>;

    /// Yields every token up to and including end of input, or the first error
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(token) if token.kind != TokenKind::Eof => {}
            _ => self.finished = true,
        }
        Some(result)
    }
}

/// Flags accepted after a regular expression literal
const REGEX_FLAGS: &str = "dgimsuy";

/// A `/` after a token that ends an operand is division
fn regex_may_follow(kind: &TokenKind) -> bool {
    match kind.class() {
        TokenClass::Identifier | TokenClass::Literal | TokenClass::EndOfInput => false,
        TokenClass::Keyword => !matches!(
            kind,
            TokenKind::This | TokenKind::Null | TokenKind::True | TokenKind::False
        ),
        TokenClass::Punctuation => !matches!(
            kind,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace
        ),
        TokenClass::Operator => !matches!(kind, TokenKind::PlusPlus | TokenKind::MinusMinus),
    }
}

/// LF, CR, LS and PS; only LF advances the line counter
fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub(crate) fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
