//! Emitter - serializes a program back to cylang source
//!
//! Compact mode produces a single line with the minimum whitespace needed
//! to keep tokens apart. Pretty mode lays statements out one per line with
//! four-space indentation. In both modes parentheses are inserted from
//! operator precedence alone, so re-parsing the output yields the same tree.

use crate::backend::writer::Writer;
use crate::config::EmitMode;
use crate::frontend::ast::*;

/// Emit a program in the requested mode
pub fn emit(program: &Program, mode: EmitMode) -> String {
    let mut emitter = Emitter::new(mode);
    emitter.emit_program(program);
    emitter.finish()
}

pub struct Emitter {
    w: Writer,
}

impl Emitter {
    pub fn new(mode: EmitMode) -> Self {
        Self { w: Writer::new(mode) }
    }

    pub fn emit_program(&mut self, program: &Program) {
        for stmt in &program.body {
            self.emit_stmt(stmt);
        }
    }

    pub fn finish(self) -> String {
        self.w.finish()
    }

    // ==================== Statements ====================

    /// Emit a statement; in pretty mode it ends with a newline
    fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(decl) => {
                self.emit_var_decl(decl, false);
                self.w.token(";");
                self.w.newline();
            }
            Stmt::Function(func) => {
                self.emit_function(func);
                self.w.newline();
            }
            Stmt::Expr { expr, .. } => {
                if starts_ambiguously(expr) {
                    self.w.token("(");
                    self.emit_expr(expr, prec::SEQUENCE);
                    self.w.token(")");
                } else {
                    self.emit_expr(expr, prec::SEQUENCE);
                }
                self.w.token(";");
                self.w.newline();
            }
            Stmt::Block(block) => {
                self.emit_block(block);
                self.w.newline();
            }
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.emit_if(cond, then_branch, else_branch.as_deref());
            }
            Stmt::While { cond, body, .. } => {
                self.keyword_paren("while");
                self.emit_expr(cond, prec::SEQUENCE);
                self.w.token(")");
                self.emit_body_line(body);
            }
            Stmt::DoWhile { body, cond, .. } => {
                self.w.token("do");
                if self.emit_body(body) {
                    self.w.space();
                }
                self.keyword_paren("while");
                self.emit_expr(cond, prec::SEQUENCE);
                self.w.token(")");
                self.w.token(";");
                self.w.newline();
            }
            Stmt::For { init, test, update, body, .. } => {
                self.keyword_paren("for");
                match init {
                    Some(ForInit::Decl(decl)) => self.emit_var_decl(decl, true),
                    Some(ForInit::Expr(expr)) => self.emit_guarded_in(expr, prec::SEQUENCE),
                    None => {}
                }
                self.w.token(";");
                if let Some(test) = test {
                    self.w.space();
                    self.emit_expr(test, prec::SEQUENCE);
                }
                self.w.token(";");
                if let Some(update) = update {
                    self.w.space();
                    self.emit_expr(update, prec::SEQUENCE);
                }
                self.w.token(")");
                self.emit_body_line(body);
            }
            Stmt::ForEach { kind, target, object, body, .. } => {
                self.keyword_paren("for");
                match target {
                    ForTarget::Decl { kind, name, .. } => {
                        self.w.token(kind.as_str());
                        self.w.space();
                        self.w.token(&name.name);
                    }
                    ForTarget::Expr(expr) => self.emit_expr(expr, prec::CALL),
                }
                self.w.space();
                self.w.token(kind.as_str());
                self.w.space();
                let min_prec = match kind {
                    ForEachKind::In => prec::SEQUENCE,
                    ForEachKind::Of => prec::ASSIGN,
                };
                self.emit_expr(object, min_prec);
                self.w.token(")");
                self.emit_body_line(body);
            }
            Stmt::Labeled { label, body, .. } => {
                self.w.token(&label.name);
                self.w.token(":");
                self.w.space();
                self.emit_stmt(body);
            }
            Stmt::Return { value, .. } => {
                self.w.token("return");
                if let Some(value) = value {
                    self.w.space();
                    self.emit_expr(value, prec::SEQUENCE);
                }
                self.w.token(";");
                self.w.newline();
            }
            Stmt::Break { label, .. } => self.emit_jump("break", label.as_ref()),
            Stmt::Continue { label, .. } => self.emit_jump("continue", label.as_ref()),
            Stmt::Throw { value, .. } => {
                self.w.token("throw");
                self.w.space();
                self.emit_expr(value, prec::SEQUENCE);
                self.w.token(";");
                self.w.newline();
            }
            Stmt::Try { block, handler, finalizer, .. } => {
                self.w.token("try");
                self.w.space();
                self.emit_block(block);
                if let Some(handler) = handler {
                    self.w.space();
                    self.keyword_paren("catch");
                    self.w.token(&handler.param.name);
                    self.w.token(")");
                    self.w.space();
                    self.emit_block(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.w.space();
                    self.w.token("finally");
                    self.w.space();
                    self.emit_block(finalizer);
                }
                self.w.newline();
            }
            Stmt::Switch { discriminant, cases, .. } => {
                self.keyword_paren("switch");
                self.emit_expr(discriminant, prec::SEQUENCE);
                self.w.token(")");
                self.w.space();
                self.w.token("{");
                if !cases.is_empty() {
                    self.w.newline();
                    self.w.indent();
                    for case in cases {
                        self.emit_case(case);
                    }
                    self.w.dedent();
                }
                self.w.token("}");
                self.w.newline();
            }
            Stmt::Empty { .. } => {
                self.w.token(";");
                self.w.newline();
            }
        }
    }

    fn emit_jump(&mut self, keyword: &str, label: Option<&Ident>) {
        self.w.token(keyword);
        if let Some(label) = label {
            self.w.space();
            self.w.token(&label.name);
        }
        self.w.token(";");
        self.w.newline();
    }

    /// `keyword (` with a layout space in between
    fn keyword_paren(&mut self, keyword: &str) {
        self.w.token(keyword);
        self.w.space();
        self.w.token("(");
    }

    fn emit_block(&mut self, block: &Block) {
        self.w.token("{");
        if !block.stmts.is_empty() {
            self.w.newline();
            self.w.indent();
            for stmt in &block.stmts {
                self.emit_stmt(stmt);
            }
            self.w.dedent();
        }
        self.w.token("}");
    }

    /// Emit the body of a compound statement. Blocks stay on the header
    /// line and are left open for a trailing keyword; returns whether the
    /// body was a block.
    fn emit_body(&mut self, body: &Stmt) -> bool {
        match body {
            Stmt::Block(block) => {
                self.w.space();
                self.emit_block(block);
                true
            }
            _ => {
                self.w.newline();
                self.w.indent();
                self.emit_stmt(body);
                self.w.dedent();
                false
            }
        }
    }

    fn emit_body_line(&mut self, body: &Stmt) {
        if self.emit_body(body) {
            self.w.newline();
        }
    }

    fn emit_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        self.keyword_paren("if");
        self.emit_expr(cond, prec::SEQUENCE);
        self.w.token(")");

        let Some(else_branch) = else_branch else {
            self.emit_body_line(then_branch);
            return;
        };

        // An `else` must not attach to an inner `if`
        let then_is_block = if has_dangling_if(then_branch) {
            self.w.space();
            self.w.token("{");
            self.w.newline();
            self.w.indent();
            self.emit_stmt(then_branch);
            self.w.dedent();
            self.w.token("}");
            true
        } else {
            self.emit_body(then_branch)
        };
        if then_is_block {
            self.w.space();
        }

        self.w.token("else");
        match else_branch {
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.w.space();
                self.emit_if(cond, then_branch, else_branch.as_deref());
            }
            _ => self.emit_body_line(else_branch),
        }
    }

    fn emit_case(&mut self, case: &SwitchCase) {
        match &case.test {
            Some(test) => {
                self.w.token("case");
                self.w.space();
                self.emit_expr(test, prec::SEQUENCE);
            }
            None => self.w.token("default"),
        }
        self.w.token(":");
        self.w.newline();
        self.w.indent();
        for stmt in &case.body {
            self.emit_stmt(stmt);
        }
        self.w.dedent();
    }

    /// Declaration without its terminating `;`. Inside a `for` header,
    /// initializers containing `in` are parenthesized.
    fn emit_var_decl(&mut self, decl: &VarDecl, in_for_header: bool) {
        self.w.token(decl.kind.as_str());
        self.w.space();
        for (i, declarator) in decl.declarators.iter().enumerate() {
            if i > 0 {
                self.w.token(",");
                self.w.space();
            }
            self.w.token(&declarator.name.name);
            if let Some(init) = &declarator.init {
                self.w.space();
                self.w.token("=");
                self.w.space();
                if in_for_header {
                    self.emit_guarded_in(init, prec::ASSIGN);
                } else {
                    self.emit_expr(init, prec::ASSIGN);
                }
            }
        }
    }

    fn emit_guarded_in(&mut self, expr: &Expr, min_prec: u8) {
        if contains_in(expr) {
            self.w.token("(");
            self.emit_expr(expr, prec::SEQUENCE);
            self.w.token(")");
        } else {
            self.emit_expr(expr, min_prec);
        }
    }

    fn emit_function(&mut self, func: &Function) {
        self.w.token("function");
        if let Some(name) = &func.name {
            self.w.token(&name.name);
        }
        self.w.token("(");
        for (i, param) in func.params.iter().enumerate() {
            if i > 0 {
                self.w.token(",");
                self.w.space();
            }
            self.w.token(&param.name);
        }
        self.w.token(")");
        self.w.space();
        self.emit_block(&func.body);
    }

    // ==================== Expressions ====================

    /// Emit `expr`, parenthesized when it binds looser than `min_prec`
    fn emit_expr(&mut self, expr: &Expr, min_prec: u8) {
        if expr.precedence() < min_prec {
            self.w.token("(");
            self.emit_expr_inner(expr);
            self.w.token(")");
        } else {
            self.emit_expr_inner(expr);
        }
    }

    fn emit_expr_inner(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(lit) => self.emit_literal(lit),
            Expr::Ident(ident) => self.w.token(&ident.name),
            Expr::This { .. } => self.w.token("this"),
            Expr::Array { elements, .. } => {
                self.w.token("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.w.token(",");
                        self.w.space();
                    }
                    if let Some(element) = element {
                        self.emit_expr(element, prec::ASSIGN);
                    }
                }
                // A trailing hole needs its own comma
                if matches!(elements.last(), Some(None)) {
                    self.w.token(",");
                }
                self.w.token("]");
            }
            Expr::Object { properties, .. } => {
                self.w.token("{");
                for (i, property) in properties.iter().enumerate() {
                    if i > 0 {
                        self.w.token(",");
                        self.w.space();
                    }
                    match &property.key {
                        PropertyKey::Ident(name) => self.w.token(name),
                        PropertyKey::String(s) => self.w.token(&quote_string(s)),
                        PropertyKey::Number(n) => self.w.token(&format_number(*n)),
                    }
                    self.w.token(":");
                    self.w.space();
                    self.emit_expr(&property.value, prec::ASSIGN);
                }
                self.w.token("}");
            }
            Expr::Function(func) => self.emit_function(func),
            Expr::Arrow(arrow) => self.emit_arrow(arrow),
            Expr::Sequence { exprs, .. } => self.emit_list(exprs),
            Expr::Unary { op, operand, .. } => {
                self.w.token(op.as_str());
                if matches!(op, UnaryOp::Typeof | UnaryOp::Void | UnaryOp::Delete) {
                    self.w.space();
                }
                self.emit_expr(operand, prec::PREFIX);
            }
            Expr::Update { op, prefix: true, target, .. } => {
                self.w.token(op.as_str());
                self.emit_expr(target, prec::PREFIX);
            }
            Expr::Update { op, prefix: false, target, .. } => {
                self.emit_expr(target, prec::POSTFIX);
                self.w.token(op.as_str());
            }
            Expr::Binary { left, op, right, .. } => {
                let op_prec = op.precedence();
                self.emit_expr(left, op_prec);
                self.w.space();
                self.w.token(op.as_str());
                self.w.space();
                self.emit_expr(right, op_prec + 1);
            }
            Expr::Assign { target, op, value, .. } => {
                self.emit_expr(target, prec::CALL);
                self.w.space();
                self.w.token(op.as_str());
                self.w.space();
                self.emit_expr(value, prec::ASSIGN);
            }
            Expr::Conditional { test, consequent, alternate, .. } => {
                self.emit_expr(test, prec::OR);
                self.w.space();
                self.w.token("?");
                self.w.space();
                self.emit_expr(consequent, prec::ASSIGN);
                self.w.space();
                self.w.token(":");
                self.w.space();
                self.emit_expr(alternate, prec::ASSIGN);
            }
            Expr::Member { object, property, .. } => {
                // `1.x` would read as a malformed number elsewhere
                if matches!(**object, Expr::Literal(Literal::Number(..))) {
                    self.w.token("(");
                    self.emit_expr(object, prec::ASSIGN);
                    self.w.token(")");
                } else {
                    self.emit_expr(object, prec::CALL);
                }
                self.w.token(".");
                self.w.token(&property.name);
            }
            Expr::Index { object, index, .. } => {
                self.emit_expr(object, prec::CALL);
                self.w.token("[");
                self.emit_expr(index, prec::SEQUENCE);
                self.w.token("]");
            }
            Expr::Call { callee, args, .. } => {
                self.emit_expr(callee, prec::CALL);
                self.w.token("(");
                self.emit_list(args);
                self.w.token(")");
            }
            Expr::New { callee, args, .. } => {
                self.w.token("new");
                if callee.precedence() < prec::CALL || contains_call(callee) {
                    self.w.token("(");
                    self.emit_expr(callee, prec::SEQUENCE);
                    self.w.token(")");
                } else {
                    self.emit_expr(callee, prec::CALL);
                }
                // Always emit the argument list so a following accessor
                // applies to the constructed value
                self.w.token("(");
                self.emit_list(args);
                self.w.token(")");
            }
        }
    }

    fn emit_arrow(&mut self, arrow: &Arrow) {
        match arrow.params.as_slice() {
            [param] => self.w.token(&param.name),
            params => {
                self.w.token("(");
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        self.w.token(",");
                        self.w.space();
                    }
                    self.w.token(&param.name);
                }
                self.w.token(")");
            }
        }
        self.w.space();
        self.w.token("=>");
        self.w.space();
        match &arrow.body {
            ArrowBody::Block(block) => self.emit_block(block),
            // A body starting with `{` would read as a block
            ArrowBody::Expr(body) if starts_ambiguously(body) => {
                self.w.token("(");
                self.emit_expr(body, prec::SEQUENCE);
                self.w.token(")");
            }
            ArrowBody::Expr(body) => self.emit_expr(body, prec::ASSIGN),
        }
    }

    fn emit_list(&mut self, items: &[Expr]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.w.token(",");
                self.w.space();
            }
            self.emit_expr(item, prec::ASSIGN);
        }
    }

    fn emit_literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Number(n, _) => self.w.token(&format_number(*n)),
            Literal::String(s, _) => self.w.token(&quote_string(s)),
            Literal::Bool(true, _) => self.w.token("true"),
            Literal::Bool(false, _) => self.w.token("false"),
            Literal::Null(_) => self.w.token("null"),
            Literal::RegExp { pattern, flags, .. } => self.w.regex(&format!("/{}/{}", pattern, flags)),
        }
    }
}

// ==================== Helpers ====================

/// Shortest decimal text that reads back as the same value
pub fn format_number(n: f64) -> String {
    format!("{}", n)
}

/// Double-quoted string literal with escapes
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{b}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || ('\u{7f}'..='\u{9f}').contains(&c) => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            '\u{2028}' | '\u{2029}' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Whether the statement's first token would be `{` or `function`
fn starts_ambiguously(expr: &Expr) -> bool {
    match expr {
        Expr::Object { .. } | Expr::Function(_) => true,
        Expr::Binary { left, .. } => starts_ambiguously(left),
        Expr::Assign { target, .. } => starts_ambiguously(target),
        Expr::Conditional { test, .. } => starts_ambiguously(test),
        Expr::Member { object, .. } | Expr::Index { object, .. } => starts_ambiguously(object),
        Expr::Call { callee, .. } => starts_ambiguously(callee),
        Expr::Update { prefix: false, target, .. } => starts_ambiguously(target),
        Expr::Sequence { exprs, .. } => exprs.first().is_some_and(starts_ambiguously),
        _ => false,
    }
}

/// Whether a `new` callee's accessor chain contains a call
fn contains_call(expr: &Expr) -> bool {
    match expr {
        Expr::Call { .. } => true,
        Expr::Member { object, .. } | Expr::Index { object, .. } => contains_call(object),
        _ => false,
    }
}

/// Whether an `in` operator appears anywhere outside nested functions
fn contains_in(expr: &Expr) -> bool {
    match expr {
        Expr::Binary { op: BinaryOp::In, .. } => true,
        Expr::Binary { left, right, .. } => contains_in(left) || contains_in(right),
        Expr::Assign { target, value, .. } => contains_in(target) || contains_in(value),
        Expr::Conditional { test, consequent, alternate, .. } => {
            contains_in(test) || contains_in(consequent) || contains_in(alternate)
        }
        Expr::Unary { operand, .. } => contains_in(operand),
        Expr::Update { target, .. } => contains_in(target),
        Expr::Array { elements, .. } => elements.iter().flatten().any(contains_in),
        Expr::Sequence { exprs, .. } => exprs.iter().any(contains_in),
        // A block body restores `in`; an expression body does not
        Expr::Arrow(arrow) => match &arrow.body {
            ArrowBody::Expr(body) => contains_in(body),
            ArrowBody::Block(_) => false,
        },
        Expr::Object { properties, .. } => properties.iter().any(|p| contains_in(&p.value)),
        Expr::Member { object, .. } => contains_in(object),
        Expr::Index { object, index, .. } => contains_in(object) || contains_in(index),
        Expr::Call { callee, args, .. } | Expr::New { callee, args, .. } => {
            contains_in(callee) || args.iter().any(contains_in)
        }
        Expr::Literal(_) | Expr::Ident(_) | Expr::This { .. } | Expr::Function(_) => false,
    }
}

/// Whether `stmt` ends in an `if` without `else` that a following `else`
/// would bind to
fn has_dangling_if(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::If { else_branch: None, .. } => true,
        Stmt::If { else_branch: Some(else_branch), .. } => has_dangling_if(else_branch),
        Stmt::While { body, .. }
        | Stmt::For { body, .. }
        | Stmt::ForEach { body, .. }
        | Stmt::Labeled { body, .. } => has_dangling_if(body),
        _ => false,
    }
}
