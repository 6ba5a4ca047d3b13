//! Abstract Syntax Tree definitions for cylang

use crate::utils::Span;

/// A complete program (compilation unit)
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
    /// Points where a `;` was inserted automatically
    pub inserted_semicolons: Vec<Span>,
    pub span: Span,
}

/// Identifier with location
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// Declaration keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

impl DeclKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclKind::Let => "let",
            DeclKind::Const => "const",
            DeclKind::Var => "var",
        }
    }
}

/// `let a = 1, b` style declaration
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: DeclKind,
    pub declarators: Vec<Declarator>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: Ident,
    pub init: Option<Expr>,
    pub span: Span,
}

/// Function declaration or expression
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<Ident>,
    pub params: Vec<Ident>,
    pub body: Block,
    pub span: Span,
}

/// Block of statements
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Initializer clause of a C-style `for`
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Decl(VarDecl),
    Expr(Expr),
}

/// Left side of `for (... in obj)` and `for (... of iterable)`
#[derive(Debug, Clone, PartialEq)]
pub enum ForTarget {
    Decl { kind: DeclKind, name: Ident, span: Span },
    Expr(Expr),
}

/// `in` walks property names, `of` walks iterated values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForEachKind {
    In,
    Of,
}

impl ForEachKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForEachKind::In => "in",
            ForEachKind::Of => "of",
        }
    }
}

/// Arrow function; the body is a block or a single expression
#[derive(Debug, Clone, PartialEq)]
pub struct Arrow {
    pub params: Vec<Ident>,
    pub body: ArrowBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Expr),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Ident,
    pub body: Block,
    pub span: Span,
}

/// `case test:` or `default:` (test is None)
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var(VarDecl),
    Function(Function),
    Expr {
        expr: Expr,
        span: Span,
    },
    Block(Block),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
        span: Span,
    },
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    ForEach {
        kind: ForEachKind,
        target: ForTarget,
        object: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Labeled {
        label: Ident,
        body: Box<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Break {
        label: Option<Ident>,
        span: Span,
    },
    Continue {
        label: Option<Ident>,
        span: Span,
    },
    Throw {
        value: Expr,
        span: Span,
    },
    Try {
        block: Block,
        handler: Option<CatchClause>,
        finalizer: Option<Block>,
        span: Span,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
        span: Span,
    },
    Empty {
        span: Span,
    },
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64, Span),
    String(String, Span),
    Bool(bool, Span),
    Null(Span),
    RegExp {
        pattern: String,
        flags: String,
        span: Span,
    },
}

impl Literal {
    pub fn span(&self) -> Span {
        match self {
            Literal::Number(_, span)
            | Literal::String(_, span)
            | Literal::Bool(_, span)
            | Literal::Null(span)
            | Literal::RegExp { span, .. } => *span,
        }
    }
}

/// Object literal key
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Ident(String),
    String(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: PropertyKey,
    pub value: Expr,
    pub span: Span,
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(Ident),
    This {
        span: Span,
    },
    /// `None` marks a hole, as in `[1, , 2]`
    Array {
        elements: Vec<Option<Expr>>,
        span: Span,
    },
    Object {
        properties: Vec<Property>,
        span: Span,
    },
    Function(Box<Function>),
    Arrow(Box<Arrow>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
        span: Span,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },
    Assign {
        target: Box<Expr>,
        op: AssignOp,
        value: Box<Expr>,
        span: Span,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        property: Ident,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    /// Comma operator; always holds at least two expressions
    Sequence {
        exprs: Vec<Expr>,
        span: Span,
    },
}

// ==================== Operators ====================

/// Precedence levels shared by the parser and the emitter
pub mod prec {
    pub const SEQUENCE: u8 = 0;
    pub const ASSIGN: u8 = 1;
    pub const CONDITIONAL: u8 = 2;
    pub const OR: u8 = 3;
    pub const AND: u8 = 4;
    pub const BIT_OR: u8 = 5;
    pub const BIT_XOR: u8 = 6;
    pub const BIT_AND: u8 = 7;
    pub const EQUALITY: u8 = 8;
    pub const RELATIONAL: u8 = 9;
    pub const SHIFT: u8 = 10;
    pub const ADDITIVE: u8 = 11;
    pub const MULTIPLICATIVE: u8 = 12;
    pub const PREFIX: u8 = 13;
    pub const POSTFIX: u8 = 14;
    pub const CALL: u8 = 15;
    pub const PRIMARY: u8 = 16;
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Logical
    Or,
    And,
    // Bitwise
    BitOr,
    BitXor,
    BitAnd,
    // Equality
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    // Relational
    Lt,
    Le,
    Gt,
    Ge,
    Instanceof,
    In,
    // Shift
    Shl,
    Shr,
    UShr,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn precedence(&self) -> u8 {
        use BinaryOp::*;
        match self {
            Or => prec::OR,
            And => prec::AND,
            BitOr => prec::BIT_OR,
            BitXor => prec::BIT_XOR,
            BitAnd => prec::BIT_AND,
            Eq | Ne | StrictEq | StrictNe => prec::EQUALITY,
            Lt | Le | Gt | Ge | Instanceof | In => prec::RELATIONAL,
            Shl | Shr | UShr => prec::SHIFT,
            Add | Sub => prec::ADDITIVE,
            Mul | Div | Mod => prec::MULTIPLICATIVE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use BinaryOp::*;
        match self {
            Or => "||",
            And => "&&",
            BitOr => "|",
            BitXor => "^",
            BitAnd => "&",
            Eq => "==",
            Ne => "!=",
            StrictEq => "===",
            StrictNe => "!==",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Instanceof => "instanceof",
            In => "in",
            Shl => "<<",
            Shr => ">>",
            UShr => ">>>",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
        }
    }
}

/// Prefix operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
    /// Numeric conversion (+)
    Plus,
    /// Logical not (!)
    Not,
    /// Bitwise not (~)
    BitNot,
    Typeof,
    Void,
    Delete,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Typeof => "typeof",
            UnaryOp::Void => "void",
            UnaryOp::Delete => "delete",
        }
    }
}

/// `++` / `--`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl UpdateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOp::Increment => "++",
            UpdateOp::Decrement => "--",
        }
    }
}

/// Assignment operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ShlAssign,
    ShrAssign,
    UShrAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
}

impl AssignOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
            AssignOp::ModAssign => "%=",
            AssignOp::ShlAssign => "<<=",
            AssignOp::ShrAssign => ">>=",
            AssignOp::UShrAssign => ">>>=",
            AssignOp::BitAndAssign => "&=",
            AssignOp::BitOrAssign => "|=",
            AssignOp::BitXorAssign => "^=",
        }
    }

    /// Operator applied by a compound assignment
    pub fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self {
            AssignOp::Assign => return None,
            AssignOp::AddAssign => BinaryOp::Add,
            AssignOp::SubAssign => BinaryOp::Sub,
            AssignOp::MulAssign => BinaryOp::Mul,
            AssignOp::DivAssign => BinaryOp::Div,
            AssignOp::ModAssign => BinaryOp::Mod,
            AssignOp::ShlAssign => BinaryOp::Shl,
            AssignOp::ShrAssign => BinaryOp::Shr,
            AssignOp::UShrAssign => BinaryOp::UShr,
            AssignOp::BitAndAssign => BinaryOp::BitAnd,
            AssignOp::BitOrAssign => BinaryOp::BitOr,
            AssignOp::BitXorAssign => BinaryOp::BitXor,
        };
        Some(op)
    }
}

// ==================== Helpers ====================

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(lit) => lit.span(),
            Expr::Ident(ident) => ident.span,
            Expr::Function(func) => func.span,
            Expr::Arrow(arrow) => arrow.span,
            Expr::This { span }
            | Expr::Array { span, .. }
            | Expr::Object { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Update { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. }
            | Expr::Sequence { span, .. } => *span,
        }
    }

    /// Binding strength of the outermost construct
    pub fn precedence(&self) -> u8 {
        match self {
            Expr::Sequence { .. } => prec::SEQUENCE,
            Expr::Assign { .. } | Expr::Arrow(_) => prec::ASSIGN,
            Expr::Conditional { .. } => prec::CONDITIONAL,
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => prec::PREFIX,
            Expr::Update { prefix: true, .. } => prec::PREFIX,
            Expr::Update { prefix: false, .. } => prec::POSTFIX,
            Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } | Expr::New { .. } => {
                prec::CALL
            }
            Expr::Literal(_)
            | Expr::Ident(_)
            | Expr::This { .. }
            | Expr::Array { .. }
            | Expr::Object { .. }
            | Expr::Function(_) => prec::PRIMARY,
        }
    }

    /// Identifiers, member accesses and index accesses may be assigned to
    pub fn is_assignment_target(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. })
    }
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Var(decl) => decl.span,
            Stmt::Function(func) => func.span,
            Stmt::Block(block) => block.span,
            Stmt::Expr { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::ForEach { span, .. }
            | Stmt::Labeled { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span, .. }
            | Stmt::Continue { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Empty { span } => *span,
        }
    }

    /// Loops, seen through any labels in front of them
    pub fn is_loop(&self) -> bool {
        match self {
            Stmt::While { .. } | Stmt::DoWhile { .. } | Stmt::For { .. } | Stmt::ForEach { .. } => {
                true
            }
            Stmt::Labeled { body, .. } => body.is_loop(),
            _ => false,
        }
    }
}

// ==================== Span Invariant ====================

/// Find the first node whose span escapes its parent's span
pub fn find_span_violation(program: &Program) -> Option<Span> {
    program
        .body
        .iter()
        .find_map(|stmt| stmt_violation(program.span, stmt))
}

fn child(parent: Span, span: Span) -> Option<Span> {
    if parent.contains(&span) {
        None
    } else {
        Some(span)
    }
}

fn stmt_violation(parent: Span, stmt: &Stmt) -> Option<Span> {
    let span = stmt.span();
    if let Some(bad) = child(parent, span) {
        return Some(bad);
    }
    match stmt {
        Stmt::Var(decl) => decl_violation(span, decl),
        Stmt::Function(func) => function_violation(span, func),
        Stmt::Expr { expr, .. } => expr_violation(span, expr),
        Stmt::Block(block) => stmts_violation(span, &block.stmts),
        Stmt::If { cond, then_branch, else_branch, .. } => expr_violation(span, cond)
            .or_else(|| stmt_violation(span, then_branch))
            .or_else(|| else_branch.as_ref().and_then(|e| stmt_violation(span, e))),
        Stmt::While { cond, body, .. } | Stmt::DoWhile { body, cond, .. } => {
            expr_violation(span, cond).or_else(|| stmt_violation(span, body))
        }
        Stmt::For { init, test, update, body, .. } => {
            let init = match init {
                Some(ForInit::Decl(decl)) => decl_violation(span, decl),
                Some(ForInit::Expr(expr)) => expr_violation(span, expr),
                None => None,
            };
            init.or_else(|| test.as_ref().and_then(|e| expr_violation(span, e)))
                .or_else(|| update.as_ref().and_then(|e| expr_violation(span, e)))
                .or_else(|| stmt_violation(span, body))
        }
        Stmt::ForEach { target, object, body, .. } => {
            let target = match target {
                ForTarget::Decl { span: decl_span, name, .. } => {
                    child(span, *decl_span).or_else(|| child(*decl_span, name.span))
                }
                ForTarget::Expr(expr) => expr_violation(span, expr),
            };
            target
                .or_else(|| expr_violation(span, object))
                .or_else(|| stmt_violation(span, body))
        }
        Stmt::Labeled { label, body, .. } => {
            child(span, label.span).or_else(|| stmt_violation(span, body))
        }
        Stmt::Return { value, .. } => value.as_ref().and_then(|e| expr_violation(span, e)),
        Stmt::Throw { value, .. } => expr_violation(span, value),
        Stmt::Try { block, handler, finalizer, .. } => child(span, block.span)
            .or_else(|| stmts_violation(block.span, &block.stmts))
            .or_else(|| {
                handler.as_ref().and_then(|h| {
                    child(span, h.span)
                        .or_else(|| child(h.span, h.param.span))
                        .or_else(|| child(h.span, h.body.span))
                        .or_else(|| stmts_violation(h.body.span, &h.body.stmts))
                })
            })
            .or_else(|| {
                finalizer.as_ref().and_then(|f| {
                    child(span, f.span).or_else(|| stmts_violation(f.span, &f.stmts))
                })
            }),
        Stmt::Switch { discriminant, cases, .. } => {
            expr_violation(span, discriminant).or_else(|| {
                cases.iter().find_map(|case| {
                    child(span, case.span)
                        .or_else(|| case.test.as_ref().and_then(|t| expr_violation(case.span, t)))
                        .or_else(|| stmts_violation(case.span, &case.body))
                })
            })
        }
        Stmt::Break { label, .. } | Stmt::Continue { label, .. } => {
            label.as_ref().and_then(|l| child(span, l.span))
        }
        Stmt::Empty { .. } => None,
    }
}

fn stmts_violation(parent: Span, stmts: &[Stmt]) -> Option<Span> {
    stmts.iter().find_map(|stmt| stmt_violation(parent, stmt))
}

fn decl_violation(parent: Span, decl: &VarDecl) -> Option<Span> {
    decl.declarators.iter().find_map(|d| {
        child(parent, d.span)
            .or_else(|| child(d.span, d.name.span))
            .or_else(|| d.init.as_ref().and_then(|e| expr_violation(d.span, e)))
    })
}

fn function_violation(parent: Span, func: &Function) -> Option<Span> {
    child(parent, func.span)
        .or_else(|| func.name.as_ref().and_then(|n| child(func.span, n.span)))
        .or_else(|| func.params.iter().find_map(|p| child(func.span, p.span)))
        .or_else(|| child(func.span, func.body.span))
        .or_else(|| stmts_violation(func.body.span, &func.body.stmts))
}

fn expr_violation(parent: Span, expr: &Expr) -> Option<Span> {
    let span = expr.span();
    if let Some(bad) = child(parent, span) {
        return Some(bad);
    }
    match expr {
        Expr::Literal(_) | Expr::Ident(_) | Expr::This { .. } => None,
        Expr::Array { elements, .. } => elements
            .iter()
            .flatten()
            .find_map(|e| expr_violation(span, e)),
        Expr::Object { properties, .. } => properties.iter().find_map(|p| {
            child(span, p.span).or_else(|| expr_violation(p.span, &p.value))
        }),
        Expr::Function(func) => function_violation(span, func),
        Expr::Arrow(arrow) => child(span, arrow.span)
            .or_else(|| arrow.params.iter().find_map(|p| child(arrow.span, p.span)))
            .or_else(|| match &arrow.body {
                ArrowBody::Expr(body) => expr_violation(arrow.span, body),
                ArrowBody::Block(block) => child(arrow.span, block.span)
                    .or_else(|| stmts_violation(block.span, &block.stmts)),
            }),
        Expr::Unary { operand, .. } => expr_violation(span, operand),
        Expr::Update { target, .. } => expr_violation(span, target),
        Expr::Binary { left, right, .. } => {
            expr_violation(span, left).or_else(|| expr_violation(span, right))
        }
        Expr::Assign { target, value, .. } => {
            expr_violation(span, target).or_else(|| expr_violation(span, value))
        }
        Expr::Conditional { test, consequent, alternate, .. } => expr_violation(span, test)
            .or_else(|| expr_violation(span, consequent))
            .or_else(|| expr_violation(span, alternate)),
        Expr::Member { object, property, .. } => {
            expr_violation(span, object).or_else(|| child(span, property.span))
        }
        Expr::Index { object, index, .. } => {
            expr_violation(span, object).or_else(|| expr_violation(span, index))
        }
        Expr::Call { callee, args, .. } | Expr::New { callee, args, .. } => {
            expr_violation(span, callee).or_else(|| args.iter().find_map(|a| expr_violation(span, a)))
        }
        Expr::Sequence { exprs, .. } => exprs.iter().find_map(|e| expr_violation(span, e)),
    }
}
