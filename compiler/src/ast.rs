// AST node types for JAM source files.
//
// One closed set of variants covers both tiers: the embedded-tier grammar
// produces activities, prototypes and C function definitions; the
// managed-tier grammar produces jcond/jdata blocks, activities and JS
// functions. Statements and expressions are shared.
//
// Every node carries a `SimpleSpan` for error reporting in downstream phases.

use chumsky::span::SimpleSpan;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Tier ──

/// The two execution tiers a JAM program is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    /// Statically-typed device tier (C).
    Embedded,
    /// Dynamically-typed managed tier (JavaScript).
    Managed,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Embedded => "embedded",
            Tier::Managed => "managed",
        }
    }
}

// ── Root ──

/// A parsed JAM translation unit for one tier.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
    pub span: Span,
}

/// A top-level declaration with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub kind: ItemKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    /// `#include ...` and friends, carried through verbatim.
    Directive(String),
    /// `jsync` / `jasync` activity (either tier).
    Activity(ActivityDecl),
    /// Embedded-tier function prototype: `int f(int, char*);`
    Prototype(Prototype),
    /// Function definition (C or JS).
    Function(FunctionDef),
    /// Managed-tier `jcond [ns] { ... }` block.
    Jcond(JcondBlock),
    /// Managed-tier `jdata [ns] { ... }` block.
    Jdata(JdataBlock),
    /// Any other top-level statement (globals, JS top-level code).
    Stmt(Stmt),
}

// ── Types ──

/// A host type spelling: base name plus pointer depth (`char*` = `char`, 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    pub base: String,
    pub pointer: usize,
    pub span: Span,
}

impl TypeName {
    /// Canonical spelling used by the type table (`char*`, `int`).
    pub fn spelling(&self) -> String {
        format!("{}{}", self.base, "*".repeat(self.pointer))
    }

    pub fn is_void(&self) -> bool {
        self.base == "void" && self.pointer == 0
    }
}

/// A typed parameter. Managed-tier parameters have no type.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: Option<TypeName>,
    pub name: Ident,
}

// ── Activities ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Sync,
    Async,
}

/// `jsync int {cond} f(int a) { ... }` (embedded) or
/// `jsync {cond} function f(a) { ... }` (managed).
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDecl {
    pub kind: ActivityKind,
    /// Declared return type (embedded sync activities only).
    pub ret: Option<TypeName>,
    pub jcond: Option<JcondExpr>,
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Block,
}

/// `int f(int, char* name);` Parameter names are optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub ret: TypeName,
    pub name: Ident,
    pub params: Vec<TypeName>,
    /// Parameter list spelled `(void)`. `params` is empty in that case.
    pub explicit_void: bool,
}

/// Function definition. `ret` is `None` for managed-tier functions.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub ret: Option<TypeName>,
    pub name: Option<Ident>,
    pub params: Vec<Param>,
    pub body: Block,
}

// ── jcond ──

/// `jcond [ns] { name: expr; ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct JcondBlock {
    pub namespace: Option<Ident>,
    pub entries: Vec<JcondEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JcondEntry {
    pub name: Ident,
    pub expr: JcondExpr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JcondOp {
    And,
    Or,
}

impl JcondOp {
    pub fn as_str(self) -> &'static str {
        match self {
            JcondOp::And => "&&",
            JcondOp::Or => "||",
        }
    }
}

/// Placement predicate expression.
#[derive(Debug, Clone, PartialEq)]
pub enum JcondExpr {
    /// `ns.name` or `name`: a reference to a registered condition.
    Ref {
        namespace: Option<Ident>,
        name: Ident,
    },
    /// `lhs op rhs`
    Compare {
        lhs: JcondOperand,
        op: String,
        rhs: JcondOperand,
        span: Span,
    },
    Not(Box<JcondExpr>),
    Paren(Box<JcondExpr>),
    Binary {
        lhs: Box<JcondExpr>,
        op: JcondOp,
        rhs: Box<JcondExpr>,
    },
}

/// One side of a jcond comparison, kept as source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JcondOperand {
    pub text: String,
    pub is_literal: bool,
    pub span: Span,
}

// ── jdata ──

/// `jdata [ns] { int x as logger; ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct JdataBlock {
    pub namespace: Option<Ident>,
    pub specs: Vec<JdataSpec>,
}

/// `type name as kind;`
#[derive(Debug, Clone, PartialEq)]
pub struct JdataSpec {
    pub ty: TypeName,
    pub name: Ident,
    pub kind: Ident,
    pub span: Span,
}

// ── Statements ──

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// Variable declaration head: a C type or a JS `var`/`let` keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclHead {
    Typed(TypeName),
    Keyword(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Block),
    VarDecl {
        head: DeclHead,
        name: Ident,
        init: Option<Expr>,
    },
    Assign {
        target: Expr,
        op: &'static str,
        value: Expr,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Function(FunctionDef),
    Empty,
}

// ── Expressions ──

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(String),
    /// String literal including its quotes.
    Str(String),
    Ident(String),
    Member {
        object: Box<Expr>,
        field: Ident,
        arrow: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: &'static str,
        operand: Box<Expr>,
    },
    Postfix {
        op: &'static str,
        operand: Box<Expr>,
    },
    Binary {
        op: &'static str,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Paren(Box<Expr>),
    Array(Vec<Expr>),
    Function(Box<FunctionDef>),
}

impl Expr {
    /// The identifier this expression names, if it is a bare identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// `(namespace, field)` for a `ns.field` member access on a bare name.
    pub fn as_qualified(&self) -> Option<(&str, &Ident)> {
        match &self.kind {
            ExprKind::Member {
                object,
                field,
                arrow: false,
            } => object.as_ident().map(|ns| (ns, field)),
            _ => None,
        }
    }
}

// ── Identifier ──

/// An identifier with its source text and span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}
