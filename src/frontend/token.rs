//! Token definitions for cylang

use std::fmt;

use crate::frontend::ast::{AssignOp, BinaryOp};
use crate::utils::Span;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator appeared between the previous token and this one
    pub newline_before: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, newline_before: bool) -> Self {
        Self { kind, span, newline_before }
    }
}

/// Broad token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Identifier,
    Keyword,
    Literal,
    Operator,
    Punctuation,
    EndOfInput,
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ============ Keywords ============
    Let,
    Const,
    Var,
    Function,
    If,
    Else,
    While,
    Do,
    For,
    In,
    Return,
    Break,
    Continue,
    Throw,
    Try,
    Catch,
    Finally,
    Switch,
    Case,
    Default,
    New,
    Delete,
    Typeof,
    Void,
    Instanceof,
    This,
    Null,
    True,
    False,

    // ============ Identifiers and Literals ============
    Ident(String),
    Number(f64),
    String(String),
    /// `/pattern/flags`
    RegExp { pattern: String, flags: String },

    // ============ Operators ============
    /// +
    Plus,
    /// ++
    PlusPlus,
    /// -
    Minus,
    /// --
    MinusMinus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// =
    Eq,
    /// ==
    EqEq,
    /// ===
    EqEqEq,
    /// !
    Not,
    /// !=
    Ne,
    /// !==
    NeEq,
    /// <
    Lt,
    /// <=
    Le,
    /// >
    Gt,
    /// >=
    Ge,
    /// <<
    Shl,
    /// >>
    Shr,
    /// >>>
    UShr,
    /// &
    And,
    /// &&
    AndAnd,
    /// |
    Or,
    /// ||
    OrOr,
    /// ^
    Caret,
    /// ~
    Tilde,
    /// ?
    Question,
    /// :
    Colon,
    /// =>
    Arrow,
    /// += -= *= /= %= <<= >>= >>>= &= |= ^=
    CompoundAssign(AssignOp),

    // ============ Punctuation ============
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,

    // ============ Special ============
    Eof,
}

impl TokenKind {
    pub fn class(&self) -> TokenClass {
        match self {
            TokenKind::Ident(_) => TokenClass::Identifier,
            TokenKind::Number(_) | TokenKind::String(_) | TokenKind::RegExp { .. } => {
                TokenClass::Literal
            }
            TokenKind::LParen
            | TokenKind::RParen
            | TokenKind::LBrace
            | TokenKind::RBrace
            | TokenKind::LBracket
            | TokenKind::RBracket
            | TokenKind::Comma
            | TokenKind::Semicolon
            | TokenKind::Dot => TokenClass::Punctuation,
            TokenKind::Eof => TokenClass::EndOfInput,
            kind if kind.keyword_text().is_some() => TokenClass::Keyword,
            _ => TokenClass::Operator,
        }
    }

    /// Try to convert an identifier to a keyword
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        match s {
            "let" => Some(TokenKind::Let),
            "const" => Some(TokenKind::Const),
            "var" => Some(TokenKind::Var),
            "function" => Some(TokenKind::Function),
            "if" => Some(TokenKind::If),
            "else" => Some(TokenKind::Else),
            "while" => Some(TokenKind::While),
            "do" => Some(TokenKind::Do),
            "for" => Some(TokenKind::For),
            "in" => Some(TokenKind::In),
            "return" => Some(TokenKind::Return),
            "break" => Some(TokenKind::Break),
            "continue" => Some(TokenKind::Continue),
            "throw" => Some(TokenKind::Throw),
            "try" => Some(TokenKind::Try),
            "catch" => Some(TokenKind::Catch),
            "finally" => Some(TokenKind::Finally),
            "switch" => Some(TokenKind::Switch),
            "case" => Some(TokenKind::Case),
            "default" => Some(TokenKind::Default),
            "new" => Some(TokenKind::New),
            "delete" => Some(TokenKind::Delete),
            "typeof" => Some(TokenKind::Typeof),
            "void" => Some(TokenKind::Void),
            "instanceof" => Some(TokenKind::Instanceof),
            "this" => Some(TokenKind::This),
            "null" => Some(TokenKind::Null),
            "true" => Some(TokenKind::True),
            "false" => Some(TokenKind::False),
            _ => None,
        }
    }

    /// Source text of a keyword token
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Let => "let",
            TokenKind::Const => "const",
            TokenKind::Var => "var",
            TokenKind::Function => "function",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Return => "return",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Throw => "throw",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::New => "new",
            TokenKind::Delete => "delete",
            TokenKind::Typeof => "typeof",
            TokenKind::Void => "void",
            TokenKind::Instanceof => "instanceof",
            TokenKind::This => "this",
            TokenKind::Null => "null",
            TokenKind::True => "true",
            TokenKind::False => "false",
            _ => return None,
        };
        Some(text)
    }

    /// Binary operator for this token (for precedence climbing).
    /// Returns None if not a binary operator.
    pub fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self {
            TokenKind::OrOr => BinaryOp::Or,
            TokenKind::AndAnd => BinaryOp::And,
            TokenKind::Or => BinaryOp::BitOr,
            TokenKind::Caret => BinaryOp::BitXor,
            TokenKind::And => BinaryOp::BitAnd,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::EqEqEq => BinaryOp::StrictEq,
            TokenKind::NeEq => BinaryOp::StrictNe,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Instanceof => BinaryOp::Instanceof,
            TokenKind::In => BinaryOp::In,
            TokenKind::Shl => BinaryOp::Shl,
            TokenKind::Shr => BinaryOp::Shr,
            TokenKind::UShr => BinaryOp::UShr,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            _ => return None,
        };
        Some(op)
    }

    /// Assignment operator, if this token is one
    pub fn assign_op(&self) -> Option<AssignOp> {
        match self {
            TokenKind::Eq => Some(AssignOp::Assign),
            TokenKind::CompoundAssign(op) => Some(*op),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(word) = self.keyword_text() {
            return write!(f, "`{}`", word);
        }
        let text = match self {
            TokenKind::Ident(name) => return write!(f, "identifier `{}`", name),
            TokenKind::Number(_) => "number",
            TokenKind::String(_) => "string",
            TokenKind::RegExp { .. } => "regular expression",
            TokenKind::Eof => "end of input",
            TokenKind::CompoundAssign(op) => return write!(f, "`{}`", op.as_str()),
            TokenKind::Plus => "`+`",
            TokenKind::PlusPlus => "`++`",
            TokenKind::Minus => "`-`",
            TokenKind::MinusMinus => "`--`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::Eq => "`=`",
            TokenKind::EqEq => "`==`",
            TokenKind::EqEqEq => "`===`",
            TokenKind::Not => "`!`",
            TokenKind::Ne => "`!=`",
            TokenKind::NeEq => "`!==`",
            TokenKind::Lt => "`<`",
            TokenKind::Le => "`<=`",
            TokenKind::Gt => "`>`",
            TokenKind::Ge => "`>=`",
            TokenKind::Shl => "`<<`",
            TokenKind::Shr => "`>>`",
            TokenKind::UShr => "`>>>`",
            TokenKind::And => "`&`",
            TokenKind::AndAnd => "`&&`",
            TokenKind::Or => "`|`",
            TokenKind::OrOr => "`||`",
            TokenKind::Caret => "`^`",
            TokenKind::Tilde => "`~`",
            TokenKind::Question => "`?`",
            TokenKind::Colon => "`:`",
            TokenKind::Arrow => "`=>`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Comma => "`,`",
            TokenKind::Semicolon => "`;`",
            TokenKind::Dot => "`.`",
            _ => "token",
        };
        f.write_str(text)
    }
}
