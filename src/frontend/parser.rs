//! Parser for cylang
//!
//! Recursive descent for statements, precedence climbing for binary
//! operators. Tokens are pulled lazily from the lexer with a single token
//! of lookahead, and parsing stops at the first error.

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// The parser
pub struct Parser {
    lexer: Lexer,
    current: Token,
    /// Span of the most recently consumed token
    prev_span: Span,
    depth: usize,
    max_depth: Option<usize>,
    /// Disables the `in` operator while parsing a `for` initializer
    no_in: bool,
    inserted_semicolons: Vec<Span>,
}

impl Parser {
    /// Create a new parser from a lexer
    pub fn new(mut lexer: Lexer) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            prev_span: Span::new(0, 0, 1, 1),
            current,
            depth: 0,
            max_depth: None,
            no_in: false,
            inserted_semicolons: Vec::new(),
        })
    }

    /// Limit how deeply statements and expressions may nest
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    // ==================== Helper Methods ====================

    fn current_kind(&self) -> &TokenKind {
        &self.current.kind
    }

    fn advance(&mut self) -> Result<Token> {
        let next = if self.is_at_end() {
            self.current.clone()
        } else {
            self.lexer.next_token()?
        };
        let token = std::mem::replace(&mut self.current, next);
        self.prev_span = token.span;
        Ok(token)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current_kind().to_string(),
            span: self.current.span,
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            self.advance()
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> Result<bool> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Span from `start` through the last consumed token
    fn span_from(&self, start: Span) -> Span {
        start.merge(&self.prev_span)
    }

    fn check_depth(&self) -> Result<()> {
        match self.max_depth {
            Some(limit) if self.depth >= limit => Err(Error::NestingTooDeep {
                limit,
                span: self.current.span,
            }),
            _ => Ok(()),
        }
    }

    /// Run `f` one nesting level deeper
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.check_depth()?;
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Run a loop that builds a left-leaning chain. Each link calls
    /// `deepen`, and the depth is restored once the chain is complete.
    fn chain<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.depth;
        let result = f(self);
        self.depth = saved;
        result
    }

    /// One more link in a chain started by `chain`
    fn deepen(&mut self) -> Result<()> {
        self.check_depth()?;
        self.depth += 1;
        Ok(())
    }

    fn allow_in<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = std::mem::replace(&mut self.no_in, false);
        let result = f(self);
        self.no_in = saved;
        result
    }

    fn with_no_in<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = std::mem::replace(&mut self.no_in, true);
        let result = f(self);
        self.no_in = saved;
        result
    }

    /// Terminate a statement, inserting a semicolon before `}`, end of
    /// input or a line break
    fn consume_semicolon(&mut self) -> Result<()> {
        if self.consume(&TokenKind::Semicolon)? {
            return Ok(());
        }
        if matches!(self.current_kind(), TokenKind::RBrace | TokenKind::Eof)
            || self.current.newline_before
        {
            self.inserted_semicolons.push(self.prev_span);
            return Ok(());
        }
        Err(self.unexpected("`;`"))
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        match self.current_kind() {
            TokenKind::Ident(name) => {
                let ident = Ident {
                    name: name.clone(),
                    span: self.current.span,
                };
                self.advance()?;
                Ok(ident)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Property names after `.` may also be keywords
    fn parse_property_name(&mut self) -> Result<Ident> {
        if let Some(word) = self.current_kind().keyword_text() {
            let ident = Ident {
                name: word.to_string(),
                span: self.current.span,
            };
            self.advance()?;
            return Ok(ident);
        }
        self.parse_ident()
    }

    // ==================== Statements ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_stmt()?);
        }

        let end = self.current.span.end;
        Ok(Program {
            body,
            inserted_semicolons: std::mem::take(&mut self.inserted_semicolons),
            span: Span::new(0, end, 1, 1),
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        self.nested(|p| p.parse_stmt_inner())
    }

    fn parse_stmt_inner(&mut self) -> Result<Stmt> {
        match self.current_kind() {
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let mut decl = self.parse_var_decl()?;
                self.consume_semicolon()?;
                decl.span = self.span_from(decl.span);
                Ok(Stmt::Var(decl))
            }
            TokenKind::Function => Ok(Stmt::Function(self.parse_function(true)?)),
            TokenKind::If => self.parse_if(),
            TokenKind::While => {
                let start = self.current.span;
                self.advance()?;
                let cond = self.parse_paren_expr()?;
                let body = self.parse_stmt()?;
                Ok(Stmt::While {
                    cond,
                    body: Box::new(body),
                    span: self.span_from(start),
                })
            }
            TokenKind::Do => {
                let start = self.current.span;
                self.advance()?;
                let body = self.parse_stmt()?;
                self.expect(TokenKind::While)?;
                let cond = self.parse_paren_expr()?;
                self.consume(&TokenKind::Semicolon)?;
                Ok(Stmt::DoWhile {
                    body: Box::new(body),
                    cond,
                    span: self.span_from(start),
                })
            }
            TokenKind::For => self.parse_for(),
            TokenKind::Return => {
                let start = self.current.span;
                self.advance()?;
                // The operand must start on the same line as `return`
                let value = if matches!(
                    self.current_kind(),
                    TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
                ) || self.current.newline_before
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return {
                    value,
                    span: self.span_from(start),
                })
            }
            TokenKind::Break => {
                let start = self.current.span;
                self.advance()?;
                let label = self.parse_jump_label()?;
                self.consume_semicolon()?;
                Ok(Stmt::Break {
                    label,
                    span: self.span_from(start),
                })
            }
            TokenKind::Continue => {
                let start = self.current.span;
                self.advance()?;
                let label = self.parse_jump_label()?;
                self.consume_semicolon()?;
                Ok(Stmt::Continue {
                    label,
                    span: self.span_from(start),
                })
            }
            TokenKind::Throw => {
                let start = self.current.span;
                self.advance()?;
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw {
                    value,
                    span: self.span_from(start),
                })
            }
            TokenKind::Try => self.parse_try(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Semicolon => {
                let span = self.current.span;
                self.advance()?;
                Ok(Stmt::Empty { span })
            }
            _ => {
                let expr = match self.parse_expression()? {
                    Expr::Ident(label) if self.check(&TokenKind::Colon) => {
                        return self.parse_labeled(label);
                    }
                    expr => expr,
                };
                self.consume_semicolon()?;
                Ok(Stmt::Expr {
                    span: expr.span().merge(&self.prev_span),
                    expr,
                })
            }
        }
    }

    fn parse_labeled(&mut self, label: Ident) -> Result<Stmt> {
        self.expect(TokenKind::Colon)?;
        // Declarations other than `var` cannot be labeled
        if matches!(
            self.current_kind(),
            TokenKind::Function | TokenKind::Let | TokenKind::Const
        ) {
            return Err(self.unexpected("statement"));
        }
        let body = self.parse_stmt()?;
        Ok(Stmt::Labeled {
            span: self.span_from(label.span),
            label,
            body: Box::new(body),
        })
    }

    /// The label after `break`/`continue` must sit on the same line
    fn parse_jump_label(&mut self) -> Result<Option<Ident>> {
        if matches!(self.current_kind(), TokenKind::Ident(_)) && !self.current.newline_before {
            Ok(Some(self.parse_ident()?))
        } else {
            Ok(None)
        }
    }

    fn parse_block(&mut self) -> Result<Block> {
        let start = self.current.span;
        self.expect(TokenKind::LBrace)?;

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_stmt()?);
        }

        self.expect(TokenKind::RBrace)?;

        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    fn parse_decl_kind(&mut self) -> Result<DeclKind> {
        let kind = match self.current_kind() {
            TokenKind::Let => DeclKind::Let,
            TokenKind::Const => DeclKind::Const,
            TokenKind::Var => DeclKind::Var,
            _ => return Err(self.unexpected("`let`, `const` or `var`")),
        };
        self.advance()?;
        Ok(kind)
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let start = self.current.span;
        let kind = self.parse_decl_kind()?;
        let first = self.parse_ident()?;
        self.parse_declarators(kind, start, first)
    }

    /// Parse the rest of a declaration whose first name is already read
    fn parse_declarators(&mut self, kind: DeclKind, start: Span, first: Ident) -> Result<VarDecl> {
        let mut declarators = Vec::new();
        let mut name = first;

        loop {
            let init = if self.consume(&TokenKind::Eq)? {
                Some(self.parse_assignment()?)
            } else {
                None
            };

            if kind == DeclKind::Const && init.is_none() {
                return Err(Error::MissingConstInitializer {
                    name: name.name,
                    span: name.span,
                });
            }

            declarators.push(Declarator {
                span: self.span_from(name.span),
                name,
                init,
            });

            if !self.consume(&TokenKind::Comma)? {
                break;
            }
            name = self.parse_ident()?;
        }

        Ok(VarDecl {
            kind,
            declarators,
            span: self.span_from(start),
        })
    }

    fn parse_function(&mut self, is_declaration: bool) -> Result<Function> {
        let start = self.current.span;
        self.expect(TokenKind::Function)?;

        let name = if is_declaration || matches!(self.current_kind(), TokenKind::Ident(_)) {
            Some(self.parse_ident()?)
        } else {
            None
        };

        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            params.push(self.parse_ident()?);
            if !self.consume(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let body = self.allow_in(|p| p.parse_block())?;

        Ok(Function {
            name,
            params,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_paren_expr(&mut self) -> Result<Expr> {
        self.expect(TokenKind::LParen)?;
        let expr = self.allow_in(|p| p.parse_expression())?;
        self.expect(TokenKind::RParen)?;
        Ok(expr)
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::If)?;

        let cond = self.parse_paren_expr()?;
        let then_branch = self.parse_stmt()?;

        let else_branch = if self.consume(&TokenKind::Else)? {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_branch: Box::new(then_branch),
            else_branch,
            span: self.span_from(start),
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;

        let init = match self.current_kind() {
            TokenKind::Semicolon => None,
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let decl_start = self.current.span;
                let kind = self.parse_decl_kind()?;
                let name = self.parse_ident()?;
                if let Some(each) = self.for_each_kind() {
                    self.advance()?;
                    let target = ForTarget::Decl {
                        kind,
                        span: decl_start.merge(&name.span),
                        name,
                    };
                    return self.finish_for_each(start, each, target);
                }
                let decl = self.with_no_in(|p| p.parse_declarators(kind, decl_start, name))?;
                Some(ForInit::Decl(decl))
            }
            _ => {
                let expr = self.with_no_in(|p| p.parse_expression())?;
                if let Some(each) = self.for_each_kind() {
                    if !expr.is_assignment_target() {
                        return Err(Error::InvalidAssignmentTarget { span: expr.span() });
                    }
                    self.advance()?;
                    return self.finish_for_each(start, each, ForTarget::Expr(expr));
                }
                Some(ForInit::Expr(expr))
            }
        };

        self.expect(TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.allow_in(|p| p.parse_expression())?)
        };
        self.expect(TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.allow_in(|p| p.parse_expression())?)
        };
        self.expect(TokenKind::RParen)?;

        let body = self.parse_stmt()?;
        Ok(Stmt::For {
            init,
            test,
            update,
            body: Box::new(body),
            span: self.span_from(start),
        })
    }

    /// `of` is a contextual keyword, only meaningful in a `for` header
    fn for_each_kind(&self) -> Option<ForEachKind> {
        match self.current_kind() {
            TokenKind::In => Some(ForEachKind::In),
            TokenKind::Ident(word) if word == "of" => Some(ForEachKind::Of),
            _ => None,
        }
    }

    fn finish_for_each(&mut self, start: Span, kind: ForEachKind, target: ForTarget) -> Result<Stmt> {
        let object = match kind {
            ForEachKind::In => self.allow_in(|p| p.parse_expression())?,
            ForEachKind::Of => self.allow_in(|p| p.parse_assignment())?,
        };
        self.expect(TokenKind::RParen)?;
        let body = self.parse_stmt()?;
        Ok(Stmt::ForEach {
            kind,
            target,
            object,
            body: Box::new(body),
            span: self.span_from(start),
        })
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::Try)?;
        let block = self.parse_block()?;

        let handler = if self.check(&TokenKind::Catch) {
            let catch_start = self.current.span;
            self.advance()?;
            self.expect(TokenKind::LParen)?;
            let param = self.parse_ident()?;
            self.expect(TokenKind::RParen)?;
            let body = self.parse_block()?;
            Some(CatchClause {
                param,
                body,
                span: self.span_from(catch_start),
            })
        } else {
            None
        };

        let finalizer = if self.consume(&TokenKind::Finally)? {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(Error::MissingHandler { span: start });
        }

        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
            span: self.span_from(start),
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::Switch)?;
        let discriminant = self.parse_paren_expr()?;
        self.expect(TokenKind::LBrace)?;

        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let case_start = self.current.span;
            let test = match self.current_kind() {
                TokenKind::Case => {
                    self.advance()?;
                    Some(self.parse_expression()?)
                }
                TokenKind::Default => {
                    if seen_default {
                        return Err(Error::DuplicateDefault { span: case_start });
                    }
                    seen_default = true;
                    self.advance()?;
                    None
                }
                _ => return Err(self.unexpected("`case` or `default`")),
            };
            self.expect(TokenKind::Colon)?;

            let mut body = Vec::new();
            while !matches!(
                self.current_kind(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                body.push(self.parse_stmt()?);
            }

            cases.push(SwitchCase {
                test,
                body,
                span: self.span_from(case_start),
            });
        }

        self.expect(TokenKind::RBrace)?;

        Ok(Stmt::Switch {
            discriminant,
            cases,
            span: self.span_from(start),
        })
    }

    // ==================== Expressions ====================

    /// Comma-separated expressions; a single one is returned as is
    pub fn parse_expression(&mut self) -> Result<Expr> {
        let first = self.parse_assignment()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let start = first.span();
        let mut exprs = vec![first];
        while self.consume(&TokenKind::Comma)? {
            exprs.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence {
            exprs,
            span: self.span_from(start),
        })
    }

    /// Assignment is right-associative
    fn parse_assignment(&mut self) -> Result<Expr> {
        self.nested(|p| {
            let start = p.current.span;
            let target = p.parse_conditional()?;
            if p.check(&TokenKind::Arrow) {
                return p.parse_arrow(start, target);
            }
            let Some(op) = p.current_kind().assign_op() else {
                return Ok(target);
            };
            if !target.is_assignment_target() {
                return Err(Error::InvalidAssignmentTarget { span: target.span() });
            }
            p.advance()?;

            let value = p.parse_assignment()?;
            Ok(Expr::Assign {
                span: target.span().merge(&value.span()),
                target: Box::new(target),
                op,
                value: Box::new(value),
            })
        })
    }

    /// `target` was parsed as an expression and turns out to be the
    /// parameter list of an arrow function
    fn parse_arrow(&mut self, start: Span, target: Expr) -> Result<Expr> {
        if self.current.newline_before {
            return Err(self.unexpected("`=>` on the same line as its parameters"));
        }
        let params = match target {
            Expr::Ident(param) => vec![param],
            Expr::Sequence { exprs, span } => exprs
                .into_iter()
                .map(|expr| match expr {
                    Expr::Ident(param) => Ok(param),
                    _ => Err(Error::InvalidArrowParameters { span }),
                })
                .collect::<Result<Vec<_>>>()?,
            other => return Err(Error::InvalidArrowParameters { span: other.span() }),
        };
        self.expect(TokenKind::Arrow)?;

        let body = if self.check(&TokenKind::LBrace) {
            ArrowBody::Block(self.allow_in(|p| p.parse_block())?)
        } else {
            ArrowBody::Expr(self.parse_assignment()?)
        };
        Ok(Expr::Arrow(Box::new(Arrow {
            params,
            body,
            span: self.span_from(start),
        })))
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let test = self.parse_binary(prec::OR)?;
        if !self.consume(&TokenKind::Question)? {
            return Ok(test);
        }

        let consequent = self.allow_in(|p| p.parse_assignment())?;
        self.expect(TokenKind::Colon)?;
        let alternate = self.parse_assignment()?;

        Ok(Expr::Conditional {
            span: test.span().merge(&alternate.span()),
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// Precedence climbing; every binary operator is left-associative
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        self.chain(|p| {
            let mut left = p.parse_unary()?;

            loop {
                let Some(op) = p.current_kind().binary_op() else {
                    break;
                };
                if op == BinaryOp::In && p.no_in {
                    break;
                }
                let op_prec = op.precedence();
                if op_prec < min_prec {
                    break;
                }

                p.deepen()?;
                p.advance()?;
                let right = p.parse_binary(op_prec + 1)?;
                left = Expr::Binary {
                    span: left.span().merge(&right.span()),
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                };
            }

            Ok(left)
        })
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let start = self.current.span;

        let op = match self.current_kind() {
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance()?;
            let operand = self.nested(|p| p.parse_unary())?;
            return Ok(Expr::Unary {
                op,
                span: start.merge(&operand.span()),
                operand: Box::new(operand),
            });
        }

        let update = match self.current_kind() {
            TokenKind::PlusPlus => Some(UpdateOp::Increment),
            TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(op) = update {
            self.advance()?;
            let target = self.nested(|p| p.parse_unary())?;
            if !target.is_assignment_target() {
                return Err(Error::InvalidAssignmentTarget { span: target.span() });
            }
            return Ok(Expr::Update {
                op,
                prefix: true,
                span: start.merge(&target.span()),
                target: Box::new(target),
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let expr = self.parse_call_member()?;

        // A line break before `++`/`--` ends the expression
        let op = match self.current_kind() {
            TokenKind::PlusPlus if !self.current.newline_before => UpdateOp::Increment,
            TokenKind::MinusMinus if !self.current.newline_before => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        if !expr.is_assignment_target() {
            return Err(Error::InvalidAssignmentTarget { span: expr.span() });
        }
        self.advance()?;

        Ok(Expr::Update {
            op,
            prefix: false,
            span: expr.span().merge(&self.prev_span),
            target: Box::new(expr),
        })
    }

    fn parse_call_member(&mut self) -> Result<Expr> {
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        self.chain(|p| {
            loop {
                if !matches!(
                    p.current_kind(),
                    TokenKind::Dot | TokenKind::LBracket | TokenKind::LParen
                ) {
                    break;
                }
                p.deepen()?;
                expr = if p.check(&TokenKind::LParen) {
                    let args = p.parse_arguments()?;
                    Expr::Call {
                        span: expr.span().merge(&p.prev_span),
                        callee: Box::new(expr),
                        args,
                    }
                } else {
                    p.parse_accessor(expr)?
                };
            }
            Ok(expr)
        })
    }

    /// `.name` or `[index]` applied to `object`
    fn parse_accessor(&mut self, object: Expr) -> Result<Expr> {
        if self.consume(&TokenKind::Dot)? {
            let property = self.parse_property_name()?;
            return Ok(Expr::Member {
                span: object.span().merge(&property.span),
                object: Box::new(object),
                property,
            });
        }

        self.expect(TokenKind::LBracket)?;
        let index = self.allow_in(|p| p.parse_expression())?;
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::Index {
            span: object.span().merge(&self.prev_span),
            object: Box::new(object),
            index: Box::new(index),
        })
    }

    /// `new Callee(args)`; the argument list is optional
    fn parse_new(&mut self) -> Result<Expr> {
        let start = self.current.span;
        self.expect(TokenKind::New)?;

        let mut callee = self.nested(|p| {
            if p.check(&TokenKind::New) {
                p.parse_new()
            } else {
                p.parse_primary()
            }
        })?;
        callee = self.chain(|p| {
            while matches!(p.current_kind(), TokenKind::Dot | TokenKind::LBracket) {
                p.deepen()?;
                callee = p.parse_accessor(callee)?;
            }
            Ok(callee)
        })?;

        let args = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        Ok(Expr::New {
            callee: Box::new(callee),
            args,
            span: self.span_from(start),
        })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            args.push(self.allow_in(|p| p.parse_assignment())?);
            if !self.consume(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current.clone();

        let expr = match token.kind {
            TokenKind::Number(n) => {
                self.advance()?;
                Expr::Literal(Literal::Number(n, token.span))
            }
            TokenKind::String(s) => {
                self.advance()?;
                Expr::Literal(Literal::String(s, token.span))
            }
            TokenKind::True | TokenKind::False => {
                self.advance()?;
                Expr::Literal(Literal::Bool(token.kind == TokenKind::True, token.span))
            }
            TokenKind::Null => {
                self.advance()?;
                Expr::Literal(Literal::Null(token.span))
            }
            TokenKind::This => {
                self.advance()?;
                Expr::This { span: token.span }
            }
            TokenKind::Ident(name) => {
                self.advance()?;
                Expr::Ident(Ident { name, span: token.span })
            }
            TokenKind::Function => Expr::Function(Box::new(self.parse_function(false)?)),

            // A `/` where an operand is expected starts a regular expression
            TokenKind::Slash | TokenKind::CompoundAssign(AssignOp::DivAssign) => {
                self.current = self.lexer.rescan_regex(&token)?;
                return self.parse_primary();
            }
            TokenKind::RegExp { pattern, flags } => {
                self.advance()?;
                Expr::Literal(Literal::RegExp {
                    pattern,
                    flags,
                    span: token.span,
                })
            }

            // Parenthesized
            TokenKind::LParen => {
                self.advance()?;
                // `()` is only an empty arrow parameter list, which
                // `parse_assignment` picks up at the `=>`
                if self.consume(&TokenKind::RParen)? {
                    if !self.check(&TokenKind::Arrow) {
                        return Err(self.unexpected("`=>`"));
                    }
                    return Ok(Expr::Sequence {
                        exprs: Vec::new(),
                        span: self.span_from(token.span),
                    });
                }
                let inner = self.allow_in(|p| p.parse_expression())?;
                self.expect(TokenKind::RParen)?;
                inner
            }

            // Array literal
            TokenKind::LBracket => {
                self.advance()?;
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
                    if self.consume(&TokenKind::Comma)? {
                        elements.push(None);
                        continue;
                    }
                    elements.push(Some(self.allow_in(|p| p.parse_assignment())?));
                    if !self.consume(&TokenKind::Comma)? {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Expr::Array {
                    elements,
                    span: self.span_from(token.span),
                }
            }

            // Object literal
            TokenKind::LBrace => {
                self.advance()?;
                let mut properties = Vec::new();
                while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
                    properties.push(self.parse_property()?);
                    if !self.consume(&TokenKind::Comma)? {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                Expr::Object {
                    properties,
                    span: self.span_from(token.span),
                }
            }

            _ => return Err(self.unexpected("expression")),
        };

        Ok(expr)
    }

    fn parse_property(&mut self) -> Result<Property> {
        let key_span = self.current.span;
        let key = match self.current_kind() {
            TokenKind::Ident(name) => PropertyKey::Ident(name.clone()),
            TokenKind::String(s) => PropertyKey::String(s.clone()),
            TokenKind::Number(n) => PropertyKey::Number(*n),
            kind => match kind.keyword_text() {
                Some(word) => PropertyKey::Ident(word.to_string()),
                None => return Err(self.unexpected("property name")),
            },
        };
        self.advance()?;
        self.expect(TokenKind::Colon)?;
        let value = self.allow_in(|p| p.parse_assignment())?;

        Ok(Property {
            key,
            span: key_span.merge(&value.span()),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ErrorKind;

    fn parse(source: &str) -> Result<Program> {
        let lexer = Lexer::new(source);
        let mut parser = Parser::new(lexer)?;
        parser.parse_program()
    }

    fn parse_expr(source: &str) -> Expr {
        let program = parse(source).unwrap();
        match program.body.into_iter().next() {
            Some(Stmt::Expr { expr, .. }) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_program() {
        let program = parse("").unwrap();
        assert!(program.body.is_empty());
        assert!(program.inserted_semicolons.is_empty());
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expr("1 + 2 * 3;");
        let Expr::Binary { op: BinaryOp::Add, right, .. } = expr else {
            panic!("expected addition at the root");
        };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_left_associative() {
        let expr = parse_expr("a - b - c;");
        let Expr::Binary { left, right, .. } = expr else {
            panic!("expected binary");
        };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
        assert!(matches!(*right, Expr::Ident(_)));
    }

    #[test]
    fn test_assignment_right_associative() {
        let expr = parse_expr("a = b = c;");
        let Expr::Assign { target, value, .. } = expr else {
            panic!("expected assignment");
        };
        assert!(matches!(*target, Expr::Ident(ref i) if i.name == "a"));
        assert!(matches!(*value, Expr::Assign { .. }));
    }

    #[test]
    fn test_conditional_nests_right() {
        let expr = parse_expr("a ? b : c ? d : e;");
        let Expr::Conditional { alternate, .. } = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*alternate, Expr::Conditional { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("1 = 2;").unwrap_err();
        assert!(matches!(err, Error::InvalidAssignmentTarget { .. }));
        let err = parse("f()++;").unwrap_err();
        assert!(matches!(err, Error::InvalidAssignmentTarget { .. }));
    }

    #[test]
    fn test_unexpected_token_reports_expected_and_found() {
        let err = parse("let = 1;").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert_eq!(err.to_string(), "Expected identifier, found `=`");
        assert_eq!(err.span().unwrap().column, 5);
    }

    #[test]
    fn test_automatic_semicolons() {
        let program = parse("let a = 1\nlet b = 2").unwrap();
        assert_eq!(program.body.len(), 2);
        assert_eq!(program.inserted_semicolons.len(), 2);

        let err = parse("let a = 1 let b = 2").unwrap_err();
        assert!(matches!(err, Error::UnexpectedToken { ref expected, .. } if expected == "`;`"));
    }

    #[test]
    fn test_return_operand_on_same_line() {
        let program = parse("function f() { return\n1; }").unwrap();
        let Stmt::Function(func) = &program.body[0] else {
            panic!("expected function");
        };
        assert!(matches!(func.body.stmts[0], Stmt::Return { value: None, .. }));
        assert!(matches!(func.body.stmts[1], Stmt::Expr { .. }));
    }

    #[test]
    fn test_postfix_requires_same_line() {
        let program = parse("x\n++y").unwrap();
        assert_eq!(program.body.len(), 2);
        assert!(matches!(
            program.body[1],
            Stmt::Expr { expr: Expr::Update { prefix: true, .. }, .. }
        ));
    }

    #[test]
    fn test_for_variants() {
        let program = parse(
            "for (let i = 0; i < 3; i++) {} for (let k in o) {} for (x.y in o); for (;;) break; for (const v of a) {} for (of of list);",
        )
        .unwrap();
        assert!(matches!(program.body[0], Stmt::For { init: Some(ForInit::Decl(_)), .. }));
        assert!(matches!(
            program.body[1],
            Stmt::ForEach { kind: ForEachKind::In, target: ForTarget::Decl { .. }, .. }
        ));
        assert!(matches!(
            program.body[2],
            Stmt::ForEach { kind: ForEachKind::In, target: ForTarget::Expr(_), .. }
        ));
        assert!(matches!(program.body[3], Stmt::For { init: None, test: None, update: None, .. }));
        assert!(matches!(
            program.body[4],
            Stmt::ForEach { kind: ForEachKind::Of, target: ForTarget::Decl { kind: DeclKind::Const, .. }, .. }
        ));
        assert!(matches!(
            program.body[5],
            Stmt::ForEach { kind: ForEachKind::Of, target: ForTarget::Expr(Expr::Ident(_)), .. }
        ));
    }

    #[test]
    fn test_for_of_takes_a_single_expression() {
        let err = parse("for (const v of a, b) {}").unwrap_err();
        assert!(matches!(err, Error::UnexpectedToken { ref expected, .. } if expected == "`)`"));

        let program = parse("for (k in a, b);").unwrap();
        assert!(matches!(
            program.body[0],
            Stmt::ForEach { kind: ForEachKind::In, object: Expr::Sequence { .. }, .. }
        ));
    }

    #[test]
    fn test_in_allowed_inside_parens_of_for_init() {
        let program = parse("for (let a = (k in o); a;) {}").unwrap();
        let Stmt::For { init: Some(ForInit::Decl(decl)), .. } = &program.body[0] else {
            panic!("expected C-style for");
        };
        assert!(matches!(
            decl.declarators[0].init,
            Some(Expr::Binary { op: BinaryOp::In, .. })
        ));
    }

    #[test]
    fn test_const_requires_initializer() {
        let err = parse("const x;").unwrap_err();
        assert!(matches!(err, Error::MissingConstInitializer { .. }));
    }

    #[test]
    fn test_try_requires_handler() {
        let err = parse("try {}").unwrap_err();
        assert!(matches!(err, Error::MissingHandler { .. }));
        assert!(parse("try {} finally {}").is_ok());
    }

    #[test]
    fn test_switch() {
        let program = parse("switch (x) { case 1: a(); break; default: b(); }").unwrap();
        let Stmt::Switch { cases, .. } = &program.body[0] else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].body.len(), 2);
        assert!(cases[1].test.is_none());

        let err = parse("switch (x) { default: default: }").unwrap_err();
        assert!(matches!(err, Error::DuplicateDefault { .. }));
    }

    #[test]
    fn test_new_and_member_chains() {
        let expr = parse_expr("new a.b(1).c;");
        let Expr::Member { object, property, .. } = expr else {
            panic!("expected member");
        };
        assert_eq!(property.name, "c");
        let Expr::New { callee, args, .. } = *object else {
            panic!("expected new");
        };
        assert_eq!(args.len(), 1);
        assert!(matches!(*callee, Expr::Member { .. }));
    }

    #[test]
    fn test_object_literal_keys() {
        let expr = parse_expr("({default: 1, 'two': 2, 3: three});");
        let Expr::Object { properties, .. } = expr else {
            panic!("expected object");
        };
        assert_eq!(properties[0].key, PropertyKey::Ident("default".into()));
        assert_eq!(properties[1].key, PropertyKey::String("two".into()));
        assert_eq!(properties[2].key, PropertyKey::Number(3.0));
    }

    #[test]
    fn test_nesting_limit() {
        let source = format!("{}1{};", "(".repeat(64), ")".repeat(64));
        let mut parser = Parser::new(Lexer::new(&source)).unwrap().with_max_depth(Some(16));
        let err = parser.parse_program().unwrap_err();
        assert!(matches!(err, Error::NestingTooDeep { limit: 16, .. }));
    }

    #[test]
    fn test_long_chains_count_toward_nesting() {
        let source = format!("x{};", "+1".repeat(200_000));
        let mut parser = Parser::new(Lexer::new(&source)).unwrap().with_max_depth(Some(64));
        let err = parser.parse_program().unwrap_err();
        assert!(matches!(err, Error::NestingTooDeep { limit: 64, .. }));

        let source = format!("o{};", ".a".repeat(200_000));
        let mut parser = Parser::new(Lexer::new(&source)).unwrap().with_max_depth(Some(64));
        let err = parser.parse_program().unwrap_err();
        assert!(matches!(err, Error::NestingTooDeep { limit: 64, .. }));

        let source = format!("new o{};", "[0]".repeat(1_000));
        let mut parser = Parser::new(Lexer::new(&source)).unwrap().with_max_depth(Some(64));
        assert!(parser.parse_program().is_err());

        // The depth is given back once a chain ends
        let source = format!("f(){};\n", ".a".repeat(40)).repeat(50);
        let mut parser = Parser::new(Lexer::new(&source)).unwrap().with_max_depth(Some(64));
        assert_eq!(parser.parse_program().unwrap().body.len(), 50);
    }

    #[test]
    fn test_comma_operator() {
        let expr = parse_expr("a = 1, b = 2, c;");
        let Expr::Sequence { exprs, .. } = expr else {
            panic!("expected sequence");
        };
        assert_eq!(exprs.len(), 3);
        assert!(matches!(exprs[0], Expr::Assign { .. }));

        // Arguments and declarators keep their own commas
        let expr = parse_expr("f(a, (b, c));");
        let Expr::Call { args, .. } = expr else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1], Expr::Sequence { .. }));
    }

    #[test]
    fn test_labels() {
        let program = parse("outer: for (;;) { inner: while (x) { continue outer; break inner; } }").unwrap();
        let Stmt::Labeled { label, body, .. } = &program.body[0] else {
            panic!("expected labeled statement");
        };
        assert_eq!(label.name, "outer");
        assert!(body.is_loop());

        // A label on the next line is a new statement
        let program = parse("while (x) { break\nfoo; }").unwrap();
        let Stmt::While { body, .. } = &program.body[0] else {
            panic!("expected while");
        };
        let Stmt::Block(block) = body.as_ref() else {
            panic!("expected block");
        };
        assert!(matches!(block.stmts[0], Stmt::Break { label: None, .. }));
        assert_eq!(block.stmts.len(), 2);

        assert!(parse("l: function f() {}").is_err());
        assert!(parse("l: let x = 1;").is_err());
        assert!(parse("l: var x = 1;").is_ok());
    }

    #[test]
    fn test_array_holes() {
        let expr = parse_expr("[, 1, , 2,];");
        let Expr::Array { elements, .. } = expr else {
            panic!("expected array");
        };
        assert_eq!(elements.len(), 4);
        assert!(elements[0].is_none());
        assert!(elements[1].is_some());
        assert!(elements[2].is_none());
        assert!(elements[3].is_some());

        let Expr::Array { elements, .. } = parse_expr("[,];") else {
            panic!("expected array");
        };
        assert_eq!(elements, vec![None]);
    }

    #[test]
    fn test_arrow_functions() {
        let Expr::Arrow(arrow) = parse_expr("(a, b) => a + b;") else {
            panic!("expected arrow");
        };
        assert_eq!(arrow.params.len(), 2);
        assert!(matches!(arrow.body, ArrowBody::Expr(Expr::Binary { .. })));

        let Expr::Arrow(arrow) = parse_expr("() => { return 1; };") else {
            panic!("expected arrow");
        };
        assert!(arrow.params.is_empty());
        assert!(matches!(arrow.body, ArrowBody::Block(_)));

        let Expr::Assign { value, .. } = parse_expr("f = x => y => x;") else {
            panic!("expected assignment");
        };
        let Expr::Arrow(outer) = *value else {
            panic!("expected arrow");
        };
        assert!(matches!(outer.body, ArrowBody::Expr(Expr::Arrow(_))));

        assert!(matches!(parse("(a, 1) => a;").unwrap_err(), Error::InvalidArrowParameters { .. }));
        assert!(matches!(parse("a + b => a;").unwrap_err(), Error::InvalidArrowParameters { .. }));
        assert!(parse("();").is_err());
        assert!(parse("a\n=> a;").is_err());
    }

    #[test]
    fn test_regex_after_closing_paren() {
        let program = parse("if (ok) /a|b/g.test(s);").unwrap();
        let Stmt::If { then_branch, .. } = &program.body[0] else {
            panic!("expected if");
        };
        let Stmt::Expr { expr: Expr::Call { callee, .. }, .. } = then_branch.as_ref() else {
            panic!("expected call");
        };
        let Expr::Member { object, .. } = callee.as_ref() else {
            panic!("expected member");
        };
        assert!(matches!(
            object.as_ref(),
            Expr::Literal(Literal::RegExp { pattern, flags, .. }) if pattern == "a|b" && flags == "g"
        ));

        assert!(matches!(parse_expr("a / b / c;"), Expr::Binary { op: BinaryOp::Div, .. }));
        assert!(matches!(parse_expr("x = /=/;"), Expr::Assign { .. }));
    }

    #[test]
    fn test_lexical_error_surfaces_through_parser() {
        let err = parse("let x = \"abc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LexicalError);
    }

    #[test]
    fn test_spans_nest() {
        let source = "function f(a) {\n  if (a) { return [a, , {k: a + 1}]; } else throw new Error('x');\n}\nl: for (let i = 0; i < 2; i++) f(i), g(x => /x/.test(x));\nfor (const v of [1]) break l;";
        let program = parse(source).unwrap();
        assert_eq!(find_span_violation(&program), None);
    }
}
