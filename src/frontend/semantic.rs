//! Semantic Analysis for cylang
//!
//! Performs:
//! - Scope construction and name resolution
//! - Constant and builtin assignment checks
//! - Placement checks for `break`, `continue` and `return`, and label
//!   resolution for the labeled forms
//! - Strict-mode findings (use before declaration, implicit coercion,
//!   unused bindings, `var`, inserted semicolons)
//!
//! Every finding is collected during a single pre-order walk. The earliest
//! error by source offset is reported; strict-mode findings become errors
//! under [`Validation::Strict`] and warnings otherwise.

use std::collections::HashMap;

use log::{debug, trace};

use crate::config::Validation;
use crate::frontend::ast::*;
use crate::utils::{Error, Result, Span};

/// Names available in every program
const BUILTINS: &[(&str, StaticType)] = &[
    ("undefined", StaticType::Unknown),
    ("NaN", StaticType::Number),
    ("Infinity", StaticType::Number),
    ("console", StaticType::Unknown),
    ("Math", StaticType::Unknown),
    ("JSON", StaticType::Unknown),
    ("Object", StaticType::Unknown),
    ("Array", StaticType::Unknown),
    ("String", StaticType::Unknown),
    ("Number", StaticType::Unknown),
    ("Boolean", StaticType::Unknown),
    ("Error", StaticType::Unknown),
    ("Date", StaticType::Unknown),
    ("parseInt", StaticType::Unknown),
    ("parseFloat", StaticType::Unknown),
    ("isNaN", StaticType::Unknown),
    ("isFinite", StaticType::Unknown),
];

// ==================== Static Types ====================

/// Statically known kind of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticType {
    Number,
    String,
    Boolean,
    Null,
    Unknown,
}

impl StaticType {
    pub fn name(&self) -> &'static str {
        match self {
            StaticType::Number => "number",
            StaticType::String => "string",
            StaticType::Boolean => "boolean",
            StaticType::Null => "null",
            StaticType::Unknown => "unknown",
        }
    }

    fn is_known(&self) -> bool {
        *self != StaticType::Unknown
    }

    /// Kind both sides share, if any
    fn join(self, other: StaticType) -> StaticType {
        if self == other {
            self
        } else {
            StaticType::Unknown
        }
    }
}

// ==================== Symbol Table ====================

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Builtin,
    Program,
    Function,
    Block,
    ForHead,
    Catch,
    /// Holds the name of a named function expression
    FunctionName,
}

/// Kind of symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Let,
    Const,
    Var,
    Function,
    FunctionName,
    Param,
    CatchParam,
    Builtin,
}

impl SymbolKind {
    /// Bindings that can never be reassigned
    pub fn is_constant(&self) -> bool {
        matches!(self, SymbolKind::Const | SymbolKind::Builtin | SymbolKind::FunctionName)
    }

    /// Bindings subject to the unused-binding rule
    fn reports_unused(&self) -> bool {
        matches!(
            self,
            SymbolKind::Let | SymbolKind::Const | SymbolKind::Var | SymbolKind::Function
        )
    }

    /// Bindings subject to the use-before-declaration rule
    fn has_declarator(&self) -> bool {
        matches!(self, SymbolKind::Let | SymbolKind::Const | SymbolKind::Var)
    }
}

/// Symbol information
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: StaticType,
    pub span: Span,
    /// Offset at which the declaration is complete
    pub ready_at: usize,
    /// Function or program scope that owns the declaration
    pub owner: ScopeId,
    pub used: bool,
}

/// A scope containing symbols
#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    symbols: HashMap<String, Symbol>,
}

/// Symbol table with nested scopes
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut symbols = HashMap::new();
        for (name, ty) in BUILTINS {
            symbols.insert(
                name.to_string(),
                Symbol {
                    name: name.to_string(),
                    kind: SymbolKind::Builtin,
                    ty: *ty,
                    span: Span::dummy(),
                    ready_at: 0,
                    owner: ScopeId(0),
                    used: false,
                },
            );
        }
        let global = Scope {
            parent: None,
            kind: ScopeKind::Builtin,
            symbols,
        };
        Self {
            scopes: vec![global],
            current: ScopeId(0),
        }
    }

    /// Enter a new scope
    pub fn enter_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(self.current),
            kind,
            symbols: HashMap::new(),
        });
        self.current = id;
        trace!("enter {:?} scope {}", kind, id.0);
        id
    }

    /// Exit the current scope
    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current.0].parent {
            self.current = parent;
        }
    }

    pub fn current_kind(&self) -> ScopeKind {
        self.scopes[self.current.0].kind
    }

    /// Nearest enclosing function or program scope
    pub fn function_scope(&self) -> ScopeId {
        let mut id = self.current;
        loop {
            let scope = &self.scopes[id.0];
            match (scope.kind, scope.parent) {
                (ScopeKind::Function | ScopeKind::Program, _) | (_, None) => return id,
                (_, Some(parent)) => id = parent,
            }
        }
    }

    /// Define a symbol in the current scope. A `var` may redeclare an
    /// earlier `var` or parameter.
    pub fn define(&mut self, symbol: Symbol) -> Result<()> {
        let scope = &mut self.scopes[self.current.0];
        if let Some(existing) = scope.symbols.get(&symbol.name) {
            if symbol.kind == SymbolKind::Var
                && matches!(existing.kind, SymbolKind::Var | SymbolKind::Param)
            {
                return Ok(());
            }
            return Err(Error::DuplicateDefinition {
                name: symbol.name,
                span: symbol.span,
            });
        }
        scope.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Look up a symbol, searching from current scope upward
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        let mut scope_id = Some(self.current);
        while let Some(id) = scope_id {
            if let Some(symbol) = self.scopes[id.0].symbols.get(name) {
                return Some(symbol);
            }
            scope_id = self.scopes[id.0].parent;
        }
        None
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        let mut scope_id = Some(self.current);
        while let Some(id) = scope_id {
            if self.scopes[id.0].symbols.contains_key(name) {
                return self.scopes[id.0].symbols.get_mut(name);
            }
            scope_id = self.scopes[id.0].parent;
        }
        None
    }

    /// Look up a symbol only in the current scope
    fn lookup_local_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.scopes[self.current.0].symbols.get_mut(name)
    }

    /// Bindings of the current scope that were never referenced
    fn unused_in_current(&self) -> Vec<&Symbol> {
        let mut unused: Vec<&Symbol> = self.scopes[self.current.0]
            .symbols
            .values()
            .filter(|s| s.kind.reports_unused() && !s.used && !s.name.starts_with('_'))
            .collect();
        unused.sort_by_key(|s| s.span.start);
        unused
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== Analysis Result ====================

/// An identifier reference and the declaration it resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub span: Span,
    /// `None` for builtins
    pub declaration: Option<Span>,
}

/// Result of a successful analysis
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Strict-mode findings, ordered by position
    pub warnings: Vec<Error>,
    pub references: Vec<Reference>,
}

// ==================== Semantic Analyzer ====================

/// Semantic analyzer
pub struct SemanticAnalyzer {
    symbols: SymbolTable,
    validation: Validation,
    errors: Vec<Error>,
    warnings: Vec<Error>,
    references: Vec<Reference>,
    loop_depth: usize,
    switch_depth: usize,
    function_depth: usize,
    /// Enclosing labels of the current function, and whether each names a loop
    labels: Vec<(String, bool)>,
}

impl SemanticAnalyzer {
    pub fn new(validation: Validation) -> Self {
        Self {
            symbols: SymbolTable::new(),
            validation,
            errors: Vec::new(),
            warnings: Vec::new(),
            references: Vec::new(),
            loop_depth: 0,
            switch_depth: 0,
            function_depth: 0,
            labels: Vec::new(),
        }
    }

    /// Analyze a program
    pub fn analyze(&mut self, program: &Program) -> Result<Analysis> {
        debug!(
            "analyzing {} statements ({:?} validation)",
            program.body.len(),
            self.validation
        );

        for span in &program.inserted_semicolons {
            self.strict_finding(Error::MissingSemicolon { span: *span });
        }

        self.symbols.enter_scope(ScopeKind::Program);
        self.hoist(&program.body, true);
        self.visit_stmts(&program.body);
        self.symbols.exit_scope();

        // Stable sorts keep discovery order for findings at the same offset
        let mut errors = std::mem::take(&mut self.errors);
        errors.sort_by_key(Error::offset);
        let mut warnings = std::mem::take(&mut self.warnings);
        warnings.sort_by_key(Error::offset);

        debug!("analysis found {} errors, {} warnings", errors.len(), warnings.len());

        match errors.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(Analysis {
                warnings,
                references: std::mem::take(&mut self.references),
            }),
        }
    }

    fn strict_finding(&mut self, finding: Error) {
        match self.validation {
            Validation::Strict => self.errors.push(finding),
            Validation::Standard => self.warnings.push(finding),
        }
    }

    // ==================== Declarations ====================

    fn declare(&mut self, name: &Ident, kind: SymbolKind, ready_at: usize) {
        let symbol = Symbol {
            name: name.name.clone(),
            kind,
            ty: StaticType::Unknown,
            span: name.span,
            ready_at,
            owner: self.symbols.function_scope(),
            used: false,
        };
        if let Err(err) = self.symbols.define(symbol) {
            self.errors.push(err);
        }
    }

    /// Bind the declarations of a statement list on scope entry
    fn hoist(&mut self, stmts: &[Stmt], function_level: bool) {
        for stmt in stmts {
            match stmt {
                Stmt::Var(decl) if decl.kind != DeclKind::Var => self.declare_lexical(decl),
                Stmt::Function(func) => {
                    if let Some(name) = &func.name {
                        self.declare(name, SymbolKind::Function, 0);
                    }
                }
                _ => {}
            }
        }

        if function_level {
            let mut vars = Vec::new();
            for stmt in stmts {
                collect_vars(stmt, &mut vars);
            }
            for (name, ready_at) in vars {
                self.declare(name, SymbolKind::Var, ready_at);
            }
        }
    }

    fn declare_lexical(&mut self, decl: &VarDecl) {
        let kind = match decl.kind {
            DeclKind::Const => SymbolKind::Const,
            _ => SymbolKind::Let,
        };
        for declarator in &decl.declarators {
            self.declare(&declarator.name, kind, declarator.span.end);
        }
    }

    /// Report unused bindings of the current scope, then leave it
    fn exit_scope(&mut self) {
        if !matches!(
            self.symbols.current_kind(),
            ScopeKind::Program | ScopeKind::Builtin
        ) {
            let unused: Vec<Error> = self
                .symbols
                .unused_in_current()
                .into_iter()
                .map(|s| Error::UnusedBinding {
                    name: s.name.clone(),
                    span: s.span,
                })
                .collect();
            for finding in unused {
                self.strict_finding(finding);
            }
        }
        self.symbols.exit_scope();
    }

    // ==================== Statements ====================

    fn visit_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.visit_stmt(stmt);
        }
    }

    fn visit_block(&mut self, block: &Block) {
        self.symbols.enter_scope(ScopeKind::Block);
        self.hoist(&block.stmts, false);
        self.visit_stmts(&block.stmts);
        self.exit_scope();
    }

    /// Body of a compound statement; a lone declaration gets its own scope
    fn visit_body(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.visit_block(block),
            Stmt::Var(_) | Stmt::Function(_) => {
                self.symbols.enter_scope(ScopeKind::Block);
                self.hoist(std::slice::from_ref(stmt), false);
                self.visit_stmt(stmt);
                self.exit_scope();
            }
            _ => self.visit_stmt(stmt),
        }
    }

    fn visit_loop_body(&mut self, stmt: &Stmt) {
        self.loop_depth += 1;
        self.visit_body(stmt);
        self.loop_depth -= 1;
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(decl) => self.visit_var_decl(decl),
            Stmt::Function(func) => self.visit_function(func, false),
            Stmt::Expr { expr, .. } => {
                self.visit_expr(expr);
            }
            Stmt::Block(block) => self.visit_block(block),
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.visit_expr(cond);
                self.visit_body(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_body(else_branch);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.visit_expr(cond);
                self.visit_loop_body(body);
            }
            Stmt::DoWhile { body, cond, .. } => {
                self.visit_loop_body(body);
                self.visit_expr(cond);
            }
            Stmt::For { init, test, update, body, .. } => {
                let head_scope = matches!(init, Some(ForInit::Decl(d)) if d.kind != DeclKind::Var);
                if head_scope {
                    self.symbols.enter_scope(ScopeKind::ForHead);
                }
                match init {
                    Some(ForInit::Decl(decl)) => {
                        if head_scope {
                            self.declare_lexical(decl);
                        }
                        self.visit_var_decl(decl);
                    }
                    Some(ForInit::Expr(expr)) => {
                        self.visit_expr(expr);
                    }
                    None => {}
                }
                if let Some(test) = test {
                    self.visit_expr(test);
                }
                if let Some(update) = update {
                    self.visit_expr(update);
                }
                self.visit_loop_body(body);
                if head_scope {
                    self.exit_scope();
                }
            }
            Stmt::ForEach { target, object, body, .. } => {
                match target {
                    ForTarget::Decl { kind: DeclKind::Var, span, .. } => {
                        self.strict_finding(Error::DiscouragedVar { span: *span });
                        self.visit_expr(object);
                        self.visit_loop_body(body);
                    }
                    ForTarget::Decl { kind, name, .. } => {
                        // The head binding shadows outer names in the object
                        // expression too, and is not ready until it is evaluated
                        self.symbols.enter_scope(ScopeKind::ForHead);
                        let symbol_kind = if *kind == DeclKind::Const {
                            SymbolKind::Const
                        } else {
                            SymbolKind::Let
                        };
                        self.declare(name, symbol_kind, object.span().end);
                        self.visit_expr(object);
                        self.visit_loop_body(body);
                        self.exit_scope();
                    }
                    ForTarget::Expr(expr) => {
                        self.visit_assign_target(expr);
                        self.visit_expr(object);
                        self.visit_loop_body(body);
                    }
                }
            }
            Stmt::Labeled { label, body, .. } => {
                if self.labels.iter().any(|(name, _)| *name == label.name) {
                    self.errors.push(Error::DuplicateLabel {
                        name: label.name.clone(),
                        span: label.span,
                    });
                }
                self.labels.push((label.name.clone(), body.is_loop()));
                self.visit_stmt(body);
                self.labels.pop();
            }
            Stmt::Return { value, span } => {
                if self.function_depth == 0 {
                    self.errors.push(Error::IllegalStatement {
                        keyword: "return",
                        reason: "not inside a function",
                        span: *span,
                    });
                }
                if let Some(value) = value {
                    self.visit_expr(value);
                }
            }
            Stmt::Break { label: Some(label), .. } => {
                self.find_label(label);
            }
            Stmt::Break { label: None, span } => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    self.errors.push(Error::IllegalStatement {
                        keyword: "break",
                        reason: "not inside a loop or switch",
                        span: *span,
                    });
                }
            }
            Stmt::Continue { label: Some(label), span } => {
                if self.find_label(label) == Some(false) {
                    self.errors.push(Error::IllegalStatement {
                        keyword: "continue",
                        reason: "label does not name a loop",
                        span: *span,
                    });
                }
            }
            Stmt::Continue { label: None, span } => {
                if self.loop_depth == 0 {
                    self.errors.push(Error::IllegalStatement {
                        keyword: "continue",
                        reason: "not inside a loop",
                        span: *span,
                    });
                }
            }
            Stmt::Throw { value, .. } => {
                self.visit_expr(value);
            }
            Stmt::Try { block, handler, finalizer, .. } => {
                self.visit_block(block);
                if let Some(handler) = handler {
                    // The parameter shares a scope with the handler body
                    self.symbols.enter_scope(ScopeKind::Catch);
                    self.declare(&handler.param, SymbolKind::CatchParam, 0);
                    self.hoist(&handler.body.stmts, false);
                    self.visit_stmts(&handler.body.stmts);
                    self.exit_scope();
                }
                if let Some(finalizer) = finalizer {
                    self.visit_block(finalizer);
                }
            }
            Stmt::Switch { discriminant, cases, .. } => {
                self.visit_expr(discriminant);
                self.symbols.enter_scope(ScopeKind::Block);
                for case in cases {
                    self.hoist(&case.body, false);
                }
                self.switch_depth += 1;
                for case in cases {
                    if let Some(test) = &case.test {
                        self.visit_expr(test);
                    }
                    self.visit_stmts(&case.body);
                }
                self.switch_depth -= 1;
                self.exit_scope();
            }
            Stmt::Empty { .. } => {}
        }
    }

    fn visit_var_decl(&mut self, decl: &VarDecl) {
        if decl.kind == DeclKind::Var {
            self.strict_finding(Error::DiscouragedVar { span: decl.span });
        }
        for declarator in &decl.declarators {
            let Some(init) = &declarator.init else {
                continue;
            };
            let ty = self.visit_expr(init);
            if decl.kind == DeclKind::Const {
                if let Some(symbol) = self.symbols.lookup_local_mut(&declarator.name.name) {
                    if symbol.span == declarator.name.span {
                        symbol.ty = ty;
                    }
                }
            }
        }
    }

    fn visit_function(&mut self, func: &Function, is_expression: bool) {
        let name_scope = match &func.name {
            Some(name) if is_expression => {
                self.symbols.enter_scope(ScopeKind::FunctionName);
                self.declare(name, SymbolKind::FunctionName, 0);
                true
            }
            _ => false,
        };

        self.in_function(&func.params, |this| {
            this.hoist(&func.body.stmts, true);
            this.visit_stmts(&func.body.stmts);
        });

        if name_scope {
            self.exit_scope();
        }
    }

    fn visit_arrow(&mut self, arrow: &Arrow) {
        self.in_function(&arrow.params, |this| match &arrow.body {
            ArrowBody::Expr(body) => {
                this.visit_expr(body);
            }
            ArrowBody::Block(block) => {
                this.hoist(&block.stmts, true);
                this.visit_stmts(&block.stmts);
            }
        });
    }

    /// Run `f` inside a fresh function scope holding `params`. Loop, switch
    /// and label context does not cross a function boundary.
    fn in_function(&mut self, params: &[Ident], f: impl FnOnce(&mut Self)) {
        self.symbols.enter_scope(ScopeKind::Function);
        for param in params {
            self.declare(param, SymbolKind::Param, 0);
        }

        let saved = (self.loop_depth, self.switch_depth);
        self.loop_depth = 0;
        self.switch_depth = 0;
        let saved_labels = std::mem::take(&mut self.labels);
        self.function_depth += 1;

        f(self);

        self.function_depth -= 1;
        self.labels = saved_labels;
        (self.loop_depth, self.switch_depth) = saved;
        self.exit_scope();
    }

    /// Whether the label names a loop, or `None` after reporting it missing
    fn find_label(&mut self, label: &Ident) -> Option<bool> {
        let found = self
            .labels
            .iter()
            .rev()
            .find(|(name, _)| *name == label.name)
            .map(|(_, is_loop)| *is_loop);
        if found.is_none() {
            self.errors.push(Error::UndefinedLabel {
                name: label.name.clone(),
                span: label.span,
            });
        }
        found
    }

    // ==================== Expressions ====================

    fn resolve(&mut self, ident: &Ident) -> StaticType {
        let owner = self.symbols.function_scope();
        let Some(symbol) = self.symbols.lookup_mut(&ident.name) else {
            self.errors.push(Error::UndefinedVariable {
                name: ident.name.clone(),
                span: ident.span,
            });
            return StaticType::Unknown;
        };

        symbol.used = true;
        let early = symbol.kind.has_declarator()
            && symbol.owner == owner
            && ident.span.start < symbol.ready_at;
        let declaration = (symbol.kind != SymbolKind::Builtin).then_some(symbol.span);
        let ty = symbol.ty;

        self.references.push(Reference {
            span: ident.span,
            declaration,
        });
        if early {
            self.strict_finding(Error::UseBeforeDeclaration {
                name: ident.name.clone(),
                span: ident.span,
            });
        }
        ty
    }

    fn visit_assign_target(&mut self, target: &Expr) -> StaticType {
        let Expr::Ident(ident) = target else {
            return self.visit_expr(target);
        };
        let ty = self.resolve(ident);
        if self
            .symbols
            .lookup(&ident.name)
            .is_some_and(|s| s.kind.is_constant())
        {
            self.strict_finding(Error::AssignToConstant {
                name: ident.name.clone(),
                span: ident.span,
            });
        }
        ty
    }

    fn visit_expr(&mut self, expr: &Expr) -> StaticType {
        match expr {
            Expr::Literal(lit) => match lit {
                Literal::Number(..) => StaticType::Number,
                Literal::String(..) => StaticType::String,
                Literal::Bool(..) => StaticType::Boolean,
                Literal::Null(_) => StaticType::Null,
                Literal::RegExp { .. } => StaticType::Unknown,
            },
            Expr::Ident(ident) => self.resolve(ident),
            Expr::This { .. } => StaticType::Unknown,
            Expr::Array { elements, .. } => {
                for element in elements.iter().flatten() {
                    self.visit_expr(element);
                }
                StaticType::Unknown
            }
            Expr::Object { properties, .. } => {
                for property in properties {
                    self.visit_expr(&property.value);
                }
                StaticType::Unknown
            }
            Expr::Function(func) => {
                self.visit_function(func, true);
                StaticType::Unknown
            }
            Expr::Arrow(arrow) => {
                self.visit_arrow(arrow);
                StaticType::Unknown
            }
            Expr::Sequence { exprs, .. } => {
                let mut ty = StaticType::Unknown;
                for expr in exprs {
                    ty = self.visit_expr(expr);
                }
                ty
            }
            Expr::Unary { op, operand, span } => {
                let ty = self.visit_expr(operand);
                match op {
                    UnaryOp::Neg | UnaryOp::Plus | UnaryOp::BitNot => {
                        if ty.is_known() && ty != StaticType::Number {
                            self.strict_finding(Error::ImplicitCoercion {
                                op: op.as_str(),
                                left: ty.name().to_string(),
                                right: StaticType::Number.name().to_string(),
                                span: *span,
                            });
                        }
                        StaticType::Number
                    }
                    UnaryOp::Not | UnaryOp::Delete => StaticType::Boolean,
                    UnaryOp::Typeof => StaticType::String,
                    UnaryOp::Void => StaticType::Unknown,
                }
            }
            Expr::Update { target, .. } => {
                self.visit_assign_target(target);
                StaticType::Number
            }
            Expr::Binary { left, op, right, span } => {
                let left = self.visit_expr(left);
                let right = self.visit_expr(right);
                self.binary_type(*op, left, right, *span)
            }
            Expr::Assign { target, op, value, span } => {
                let target = self.visit_assign_target(target);
                let value = self.visit_expr(value);
                match op.binary_op() {
                    Some(binary) => self.binary_type(binary, target, value, *span),
                    None => value,
                }
            }
            Expr::Conditional { test, consequent, alternate, .. } => {
                self.visit_expr(test);
                let consequent = self.visit_expr(consequent);
                let alternate = self.visit_expr(alternate);
                consequent.join(alternate)
            }
            Expr::Member { object, .. } => {
                self.visit_expr(object);
                StaticType::Unknown
            }
            Expr::Index { object, index, .. } => {
                self.visit_expr(object);
                self.visit_expr(index);
                StaticType::Unknown
            }
            Expr::Call { callee, args, .. } | Expr::New { callee, args, .. } => {
                self.visit_expr(callee);
                for arg in args {
                    self.visit_expr(arg);
                }
                StaticType::Unknown
            }
        }
    }

    /// Result kind of a binary operation, reporting implicit coercions
    /// between known kinds
    fn binary_type(&mut self, op: BinaryOp, left: StaticType, right: StaticType, span: Span) -> StaticType {
        use BinaryOp::*;
        use StaticType::{Boolean, Number, String as Str, Unknown};

        let (compatible, result) = match op {
            Sub | Mul | Div | Mod | BitAnd | BitOr | BitXor | Shl | Shr | UShr => {
                (left == Number && right == Number, Number)
            }
            Add => {
                let result = if left == Str || right == Str {
                    Str
                } else if left == Number && right == Number {
                    Number
                } else {
                    Unknown
                };
                (left == right && matches!(left, Number | Str), result)
            }
            Lt | Le | Gt | Ge => (left == right && matches!(left, Number | Str), Boolean),
            Eq | Ne => (left == right, Boolean),
            StrictEq | StrictNe | Instanceof | In => (true, Boolean),
            And | Or => (true, left.join(right)),
        };

        if !compatible && left.is_known() && right.is_known() {
            self.strict_finding(Error::ImplicitCoercion {
                op: op.as_str(),
                left: left.name().to_string(),
                right: right.name().to_string(),
                span,
            });
        }
        result
    }
}

/// Collect `var` declarations of a function body without entering nested
/// functions
fn collect_vars<'a>(stmt: &'a Stmt, out: &mut Vec<(&'a Ident, usize)>) {
    match stmt {
        Stmt::Var(decl) => {
            if decl.kind == DeclKind::Var {
                out.extend(decl.declarators.iter().map(|d| (&d.name, d.span.end)));
            }
        }
        Stmt::Block(block) => block.stmts.iter().for_each(|s| collect_vars(s, out)),
        Stmt::If { then_branch, else_branch, .. } => {
            collect_vars(then_branch, out);
            if let Some(else_branch) = else_branch {
                collect_vars(else_branch, out);
            }
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => collect_vars(body, out),
        Stmt::For { init, body, .. } => {
            if let Some(ForInit::Decl(decl)) = init {
                if decl.kind == DeclKind::Var {
                    out.extend(decl.declarators.iter().map(|d| (&d.name, d.span.end)));
                }
            }
            collect_vars(body, out);
        }
        Stmt::ForEach { target, body, .. } => {
            if let ForTarget::Decl { kind: DeclKind::Var, name, span } = target {
                out.push((name, span.end));
            }
            collect_vars(body, out);
        }
        Stmt::Labeled { body, .. } => collect_vars(body, out),
        Stmt::Try { block, handler, finalizer, .. } => {
            block.stmts.iter().for_each(|s| collect_vars(s, out));
            if let Some(handler) = handler {
                handler.body.stmts.iter().for_each(|s| collect_vars(s, out));
            }
            if let Some(finalizer) = finalizer {
                finalizer.stmts.iter().for_each(|s| collect_vars(s, out));
            }
        }
        Stmt::Switch { cases, .. } => cases
            .iter()
            .flat_map(|case| case.body.iter())
            .for_each(|s| collect_vars(s, out)),
        Stmt::Function(_)
        | Stmt::Expr { .. }
        | Stmt::Return { .. }
        | Stmt::Break { .. }
        | Stmt::Continue { .. }
        | Stmt::Throw { .. }
        | Stmt::Empty { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use crate::utils::ErrorKind;

    fn analyze_with(source: &str, validation: Validation) -> Result<Analysis> {
        let mut parser = Parser::new(Lexer::new(source))?;
        let program = parser.parse_program()?;
        SemanticAnalyzer::new(validation).analyze(&program)
    }

    fn analyze(source: &str) -> Result<Analysis> {
        analyze_with(source, Validation::Standard)
    }

    fn analyze_strict(source: &str) -> Result<Analysis> {
        analyze_with(source, Validation::Strict)
    }

    #[test]
    fn test_clean_program() {
        let analysis = analyze_strict("let x = 1;\nconsole.log(x + 2);").unwrap();
        assert!(analysis.warnings.is_empty());
    }

    #[test]
    fn test_undefined_variable() {
        let err = analyze("let x = y;").unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable { ref name, .. } if name == "y"));
        assert_eq!(err.kind(), ErrorKind::NameResolutionError);
    }

    #[test]
    fn test_duplicate_declaration_in_both_modes() {
        for result in [analyze("let x = 1; let x = 2;"), analyze_strict("let x = 1; let x = 2;")] {
            let err = result.unwrap_err();
            assert!(matches!(err, Error::DuplicateDefinition { .. }));
            assert_eq!(err.span().unwrap().start, 15);
        }
    }

    #[test]
    fn test_shadowing_and_var_redeclaration() {
        assert!(analyze("let x = 1; { let x = 2; x; } x;").is_ok());
        assert!(analyze("var i = 0; var i = 1; i;").is_ok());
        assert!(analyze("function f(a) { var a; return a; } f(1);").is_ok());
        assert!(analyze("function f(a) { let a = 1; return a; }").is_err());
    }

    #[test]
    fn test_use_before_declaration() {
        let analysis = analyze("x + 1; let x = 2;").unwrap();
        assert_eq!(analysis.warnings.len(), 1);
        assert!(matches!(analysis.warnings[0], Error::UseBeforeDeclaration { .. }));

        let err = analyze_strict("x + 1; let x = 2;").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StrictModeViolation);
        assert_eq!(err.span().unwrap().start, 0);
    }

    #[test]
    fn test_self_reference_in_initializer() {
        let err = analyze_strict("let x = x;").unwrap_err();
        assert!(matches!(err, Error::UseBeforeDeclaration { .. }));
    }

    #[test]
    fn test_later_binding_from_nested_function() {
        let analysis = analyze_strict("function f() { return y; }\nlet y = f;").unwrap();
        assert!(analysis.warnings.is_empty());
    }

    #[test]
    fn test_function_declarations_hoisted() {
        assert!(analyze_strict("f(); function f() {}").is_ok());
    }

    #[test]
    fn test_assign_to_constant() {
        let analysis = analyze("const c = 1; c = 2;").unwrap();
        assert_eq!(analysis.warnings.len(), 1);
        assert!(matches!(analysis.warnings[0], Error::AssignToConstant { .. }));
        assert_eq!(analysis.warnings[0].kind(), ErrorKind::TypeError);

        let err = analyze_strict("const c = 1; c = 2;").unwrap_err();
        assert!(matches!(err, Error::AssignToConstant { ref name, .. } if name == "c"));
        assert_eq!(err.kind(), ErrorKind::TypeError);

        let err = analyze_strict("undefined++;").unwrap_err();
        assert!(matches!(err, Error::AssignToConstant { .. }));
        assert!(analyze("undefined++;").is_ok());
    }

    #[test]
    fn test_statement_placement() {
        let err = analyze("break;").unwrap_err();
        assert!(matches!(err, Error::IllegalStatement { keyword: "break", .. }));

        let err = analyze("return 1;").unwrap_err();
        assert!(matches!(err, Error::IllegalStatement { keyword: "return", .. }));

        let err = analyze("switch (1) { case 1: continue; }").unwrap_err();
        assert!(matches!(err, Error::IllegalStatement { keyword: "continue", .. }));

        let err = analyze("while (true) { (function () { break; }); }").unwrap_err();
        assert!(matches!(err, Error::IllegalStatement { keyword: "break", .. }));

        assert!(analyze("for (;;) { if (true) break; else continue; }").is_ok());
    }

    #[test]
    fn test_implicit_coercion() {
        let analysis = analyze("1 + \"a\";").unwrap();
        assert!(matches!(
            analysis.warnings[0],
            Error::ImplicitCoercion { op: "+", .. }
        ));

        let err = analyze_strict("const a = 1; const b = \"s\"; a - b;").unwrap_err();
        assert!(matches!(err, Error::ImplicitCoercion { op: "-", .. }));
        assert_eq!(
            err.to_string(),
            "Implicit coercion between number and string in `-`"
        );

        assert!(analyze_strict("let a = 1; let b = a + \"s\"; b;").is_ok());
        assert!(analyze_strict("\"a\" + \"b\"; 1 < 2; -\"3\" === 1;").is_err());
    }

    #[test]
    fn test_unused_bindings() {
        let analysis = analyze("function f(p) { let y = 1; let _z = 2; }").unwrap();
        assert_eq!(analysis.warnings.len(), 1);
        assert!(matches!(analysis.warnings[0], Error::UnusedBinding { ref name, .. } if name == "y"));

        // Program-level bindings are never reported
        assert!(analyze_strict("let top = 1;").is_ok());
    }

    #[test]
    fn test_discouraged_constructs() {
        let analysis = analyze("var v = 1\nv;").unwrap();
        assert_eq!(analysis.warnings.len(), 2);
        assert!(matches!(analysis.warnings[0], Error::DiscouragedVar { .. }));
        assert!(matches!(analysis.warnings[1], Error::MissingSemicolon { .. }));

        let err = analyze_strict("let a = 1\na;").unwrap_err();
        assert!(matches!(err, Error::MissingSemicolon { .. }));
    }

    #[test]
    fn test_earliest_error_wins() {
        let err = analyze("let a = b; let a = 1;").unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable { .. }));

        let err = analyze_strict("q; let x = x;").unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable { .. }));
    }

    #[test]
    fn test_named_function_expression_and_catch() {
        let source = "let g = function h(n) { return h(n); };\ng(1);\ntry { g(2); } catch (e) { console.log(e); }";
        let analysis = analyze_strict(source).unwrap();
        assert!(analysis.warnings.is_empty());

        let err = analyze_strict("let g = function h() { h = 1; }; g();").unwrap_err();
        assert!(matches!(err, Error::AssignToConstant { .. }));
    }

    #[test]
    fn test_catch_parameter_shares_handler_scope() {
        let err = analyze("try {} catch (e) { let e = 1; }").unwrap_err();
        assert!(matches!(err, Error::DuplicateDefinition { ref name, .. } if name == "e"));

        assert!(analyze_strict("try {} catch (e) { { let e = 1; console.log(e); } }").is_ok());
        assert!(analyze("try {} catch (e) { var e; }").is_ok());
    }

    #[test]
    fn test_loop_scopes() {
        assert!(analyze_strict("for (let i = 0; i < 3; i++) { console.log(i); }").is_ok());
        assert!(analyze_strict("const o = {}; for (const k in o) { console.log(k); }").is_ok());
        assert!(analyze("for (let i = 0; i < 3; i++) {} i;").is_err());
        assert!(analyze_strict("const xs = [1]; for (const x of xs) { console.log(x); }").is_ok());
    }

    #[test]
    fn test_for_head_binding_covers_object() {
        // `k` in the object position is the head binding, not the outer one
        let analysis = analyze("let k = {}; for (let k in k) { console.log(k); }").unwrap();
        assert_eq!(analysis.warnings.len(), 1);
        assert!(matches!(analysis.warnings[0], Error::UseBeforeDeclaration { ref name, .. } if name == "k"));
        assert_eq!(analysis.references[0].declaration.map(|s| s.start), Some(21));

        let err = analyze_strict("for (const v of v) {}").unwrap_err();
        assert!(matches!(err, Error::UseBeforeDeclaration { .. }));

        let err = analyze("for (let q of [1]) {} q;").unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable { ref name, .. } if name == "q"));
    }

    #[test]
    fn test_labels() {
        assert!(analyze_strict("outer: for (;;) { for (;;) { continue outer; } }").is_ok());
        assert!(analyze_strict("block: { break block; }").is_ok());
        assert!(analyze_strict("a: b: while (true) { continue a; }").is_ok());

        let err = analyze("for (;;) { break nowhere; }").unwrap_err();
        assert!(matches!(err, Error::UndefinedLabel { ref name, .. } if name == "nowhere"));
        assert_eq!(err.kind(), ErrorKind::SyntaxError);

        let err = analyze("block: { for (;;) { continue block; } }").unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalStatement { keyword: "continue", reason: "label does not name a loop", .. }
        ));

        let err = analyze("l: { l: ; }").unwrap_err();
        assert!(matches!(err, Error::DuplicateLabel { .. }));

        // Labels do not reach into nested functions
        let err = analyze("l: while (true) { (function () { break l; }); }").unwrap_err();
        assert!(matches!(err, Error::UndefinedLabel { .. }));
        assert!(analyze("l: ; l: ;").is_ok());
    }

    #[test]
    fn test_arrow_functions() {
        let analysis = analyze_strict("const add = (a, b) => a + b; add(1, 2);").unwrap();
        assert!(analysis.warnings.is_empty());

        let err = analyze("const f = x => y;").unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable { ref name, .. } if name == "y"));

        let err = analyze("while (true) { const f = () => { break; }; f(); }").unwrap_err();
        assert!(matches!(err, Error::IllegalStatement { keyword: "break", .. }));

        assert!(analyze("const g = () => { return 1; }; g();").is_ok());
        assert!(analyze("(a, a) => a;").is_err());

        let analysis = analyze("const h = () => { let unused = 1; }; h();").unwrap();
        assert!(matches!(analysis.warnings[0], Error::UnusedBinding { ref name, .. } if name == "unused"));
    }

    #[test]
    fn test_sequence_and_regex_values() {
        let analysis = analyze("let a = 1; let b = (a, \"s\") - 1; b;").unwrap();
        assert!(matches!(analysis.warnings[0], Error::ImplicitCoercion { op: "-", .. }));

        assert!(analyze_strict("let r = /a+/g; let holes = [, r, ,]; holes;").is_ok());
    }

    #[test]
    fn test_references() {
        let analysis = analyze("let x = 1; x; console;").unwrap();
        assert_eq!(analysis.references.len(), 2);
        assert_eq!(analysis.references[0].declaration.map(|s| s.start), Some(4));
        assert_eq!(analysis.references[1].declaration, None);
    }
}
