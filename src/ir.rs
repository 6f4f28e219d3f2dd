//! Intermediate representation — the typed tree produced by C4 (`lower`),
//! consumed by C5 (`resolver`) and C6 (`codegen`). Unlike the source AST
//! (`ast::Expr`), this is a semantic tree: one node kind per meaning, not per
//! surface spelling, per spec.md §3's IR data model.

use crate::ast::Span;

/// A compiled module: an ordered sequence of top-level declarations plus the
/// import/export tables the linker (C7) reads and rewrites.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub declarations: Vec<Declaration>,
    pub imports: Vec<ImportBinding>,
    pub exports: Vec<ExportBinding>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportBinding {
    pub local_name: String,
    pub imported_name: String,
    /// A peer source module (transpiled side-by-side) or an opaque external
    /// specifier, passed through to codegen verbatim either way.
    pub specifier: ImportSpecifier,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportSpecifier {
    Module(String),
    External(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportBinding {
    pub local_name: String,
    pub exported_name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Function(FunctionDeclaration),
    Variable(VariableDeclaration),
}

/// One parameter of a `FunctionDeclaration`, carrying the metadata C3
/// computed (type tag, default expression, declaration order) so C5/C6 never
/// need to re-derive it from the surface form.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_tag: Option<String>,
    pub default: Option<Expr>,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Block,
    /// Whether this function was declared with any `name:` parameter —
    /// i.e. is a keyed callee per spec.md §4.5 — vs. a positional one.
    pub is_named: bool,
    pub has_explicit_return: bool,
    pub is_anonymous: bool,
    /// `params.iter().map(|p| p.name.clone())`, kept as its own field
    /// because spec.md §3 invariant 1 requires it non-empty exactly when
    /// `is_named` is true, independent of how `params` evolves.
    pub named_param_ids: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub name: String,
    pub init: Expr,
    pub mutable: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Function(FunctionDeclaration),
    Variable(VariableDeclaration),
    If(IfStatement),
    Return(ReturnStatement),
    Expression(ExpressionStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub test: Expr,
    pub consequent: Box<Block>,
    pub alternate: Option<Box<Block>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatement {
    pub argument: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    pub expression: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Identifier(Identifier),
    ArrayLiteral(Vec<Expr>, Span),
    /// `hash-map` literal data. Property names are user data and are never
    /// subject to C3's hyphen rename.
    ObjectLiteral(Vec<(String, Expr)>, Span),
    /// The single-record argument C5 builds for a keyed call. Property
    /// names here are parameter source names and DO go through the rename
    /// table at generation time, the same as the callee's destructured
    /// parameter names — see `codegen::emit_object_literal`.
    CallRecord(Vec<(String, Expr)>, Span),
    MemberExpression(MemberExpression),
    BinaryExpression(BinaryExpression),
    CallExpression(CallExpression),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(l) => l.span,
            Expr::Identifier(i) => i.span,
            Expr::ArrayLiteral(_, span) => *span,
            Expr::ObjectLiteral(_, span) => *span,
            Expr::CallRecord(_, span) => *span,
            Expr::MemberExpression(m) => m.span,
            Expr::BinaryExpression(b) => b.span,
            Expr::CallExpression(c) => c.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpression {
    pub object: Box<Expr>,
    pub property: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub operator: String,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub callee: Box<Expr>,
    pub arguments: Vec<Expr>,
    /// When true, `arguments` and `argument_names` are parallel arrays — the
    /// keyed calling convention's call-site shape before C5 resolves it into
    /// a single `ObjectLiteral` argument.
    pub is_named_args: bool,
    pub argument_names: Vec<Option<String>>,
    pub span: Span,
}
