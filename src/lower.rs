//! C4: IR Lowering — walks the canonical kernel AST `desugar` produced and
//! builds the typed `ir` tree, resolving operator applications and
//! identifier scope along the way.
//!
//! Grounded on this crate's own `desugar`/`macros` recursive-descent style;
//! no teacher module performs this step (the teacher interprets its kernel
//! AST directly rather than lowering it), so the scope-tracking walk below
//! follows the same `Result`-threaded, span-carrying discipline as the rest
//! of the pipeline.

use std::collections::{HashMap, HashSet};

use crate::ast::{AstNode, Expr, Span};
use crate::desugar::{DesugaredModule, FunctionMeta};
use crate::error::{CompileError, ErrorKind, SourceText};
use crate::ir;

/// Symbols recognized as native binary operators by C4, per SPEC_FULL.md §2.
/// `+ - * /` fold left-associatively over more than two operands; the
/// comparison operators are strictly binary.
const BINARY_OPERATORS: &[&str] = &["+", "-", "*", "/", "=", "<", ">", "<=", ">="];

struct Scope<'a> {
    source: &'a SourceText,
    functions: &'a HashMap<String, FunctionMeta>,
    imported: HashSet<String>,
    /// Lexical bindings in scope: function parameters and `let` bindings.
    bound: Vec<HashSet<String>>,
}

impl<'a> Scope<'a> {
    fn is_bound(&self, name: &str) -> bool {
        self.bound.iter().any(|frame| frame.contains(name))
            || self.functions.contains_key(name)
            || self.imported.contains(name)
    }

    fn push(&mut self, names: impl IntoIterator<Item = String>) {
        self.bound.push(names.into_iter().collect());
    }

    fn pop(&mut self) {
        self.bound.pop();
    }
}

pub fn lower_module(desugared: DesugaredModule, source: &SourceText) -> Result<ir::Module, CompileError> {
    let imported = prescan_imported_names(&desugared.forms);
    let mut scope = Scope {
        source,
        functions: &desugared.functions,
        imported,
        bound: Vec::new(),
    };

    let mut declarations = Vec::with_capacity(desugared.forms.len());
    let mut imports = Vec::new();
    let mut exports = Vec::new();
    for form in &desugared.forms {
        lower_top_level(form, &mut scope, &mut declarations, &mut imports, &mut exports)?;
    }

    Ok(ir::Module { declarations, imports, exports })
}

/// Collects every name bound by a top-level `(import (name...) specifier)`
/// form before the main lowering walk begins, so a function body may
/// reference an imported name regardless of whether the `import` form
/// textually precedes it (source order otherwise governs evaluation, per
/// DESIGN.md's resolution of spec.md §9's third Open Question, but import
/// bindings are hoisted the way ES module imports are).
fn prescan_imported_names(forms: &[AstNode]) -> HashSet<String> {
    let mut names = HashSet::new();
    for form in forms {
        let Some(items) = form.value.as_list() else { continue };
        if items.first().and_then(|i| i.value.as_symbol()) != Some("import") {
            continue;
        }
        if let Some(list) = items.get(1).and_then(|n| n.value.as_list()) {
            for n in list {
                if let Some(s) = n.value.as_symbol() {
                    names.insert(s.to_string());
                }
            }
        }
    }
    names
}

fn lower_top_level(
    node: &AstNode,
    scope: &mut Scope,
    declarations: &mut Vec<ir::Declaration>,
    imports: &mut Vec<ir::ImportBinding>,
    exports: &mut Vec<ir::ExportBinding>,
) -> Result<(), CompileError> {
    let Some(items) = node.value.as_list() else {
        return Ok(());
    };
    match items.first().and_then(|i| i.value.as_symbol()) {
        Some("defn") => declarations.push(ir::Declaration::Function(lower_function(items, node.span, scope)?)),
        Some("def") => declarations.push(ir::Declaration::Variable(lower_def(items, node.span, scope)?)),
        Some("import") => imports.extend(lower_import(items, node.span, scope)?),
        Some("export") => exports.extend(lower_export(items, node.span, scope)?),
        _ => {}
    }
    Ok(())
}

/// `(import (name...) "specifier")`. A relative or `.hql`-suffixed
/// specifier names a peer source module transpiled alongside this one;
/// anything else is an opaque external specifier passed through verbatim
/// to the emitted `import` statement, per spec.md §4.7's two import
/// surfaces.
fn lower_import(items: &[AstNode], span: Span, scope: &Scope) -> Result<Vec<ir::ImportBinding>, CompileError> {
    if items.len() != 3 {
        return Err(semantic_error(scope, "`import` requires a name list and a specifier", span));
    }
    let names = items[1]
        .value
        .as_list()
        .ok_or_else(|| semantic_error(scope, "`import` requires a list of bound names", items[1].span))?;
    let specifier_text = match &*items[2].value {
        Expr::StringLit(s) => s.clone(),
        _ => return Err(semantic_error(scope, "`import` specifier must be a string literal", items[2].span)),
    };
    let specifier = if specifier_text.starts_with("./") || specifier_text.starts_with("../") || specifier_text.ends_with(".hql") {
        ir::ImportSpecifier::Module(specifier_text)
    } else {
        ir::ImportSpecifier::External(specifier_text)
    };
    names
        .iter()
        .map(|n| {
            let name = n
                .value
                .as_symbol()
                .ok_or_else(|| semantic_error(scope, "imported name must be a symbol", n.span))?
                .to_string();
            Ok(ir::ImportBinding { local_name: name.clone(), imported_name: name, specifier: specifier.clone(), span: n.span })
        })
        .collect()
}

fn lower_export(items: &[AstNode], _span: Span, scope: &Scope) -> Result<Vec<ir::ExportBinding>, CompileError> {
    items[1..]
        .iter()
        .map(|n| {
            let name = n
                .value
                .as_symbol()
                .ok_or_else(|| semantic_error(scope, "exported name must be a symbol", n.span))?
                .to_string();
            Ok(ir::ExportBinding { local_name: name.clone(), exported_name: name, span: n.span })
        })
        .collect()
}

fn lower_function(items: &[AstNode], span: Span, scope: &mut Scope) -> Result<ir::FunctionDeclaration, CompileError> {
    let name = items[1].value.as_symbol().expect("desugar guarantees a symbol name").to_string();
    let meta = scope.functions.get(&name).cloned().expect("desugar registers every defn's metadata");

    let params = meta
        .params
        .iter()
        .map(|p| lower_param(p, scope))
        .collect::<Result<Vec<_>, _>>()?;

    let param_names: Vec<String> = meta.params.iter().map(|p| p.source_name.clone()).collect();
    scope.push(param_names.clone());
    let body_form = &items[3];
    let body_items = body_form.value.as_list().expect("desugar wraps the body in (do ...)");
    let body = lower_tail_block(&body_items[1..], meta.has_explicit_return, &meta.return_type, scope)?;
    scope.pop();

    Ok(ir::FunctionDeclaration {
        name,
        params,
        return_type: meta.return_type.clone(),
        body,
        is_named: meta.named,
        has_explicit_return: meta.has_explicit_return,
        is_anonymous: false,
        named_param_ids: if meta.named { param_names } else { Vec::new() },
        span,
    })
}

fn lower_param(p: &crate::desugar::ParamRecord, scope: &mut Scope) -> Result<ir::Param, CompileError> {
    let default = p.default.as_ref().map(|d| lower_expr(d, scope)).transpose()?;
    Ok(ir::Param {
        name: p.source_name.clone(),
        type_tag: p.type_tag.clone(),
        default,
        index: p.index,
    })
}

fn lower_def(items: &[AstNode], span: Span, scope: &mut Scope) -> Result<ir::VariableDeclaration, CompileError> {
    if items.len() != 3 {
        return Err(semantic_error(scope, "`def` requires exactly a name and an init expression", span));
    }
    let name = items[1]
        .value
        .as_symbol()
        .ok_or_else(|| semantic_error(scope, "`def` name must be a symbol", items[1].span))?
        .to_string();
    let init = lower_expr(&items[2], scope)?;
    Ok(ir::VariableDeclaration { name, init, mutable: false, span })
}

/// Lowers a function body (the forms inside its `do`) into a `Block`,
/// statementizing every non-tail form and handling the tail form per
/// spec.md §4.3/§4.4: an explicit `return` is always respected; otherwise
/// the last expression becomes an implicit return unless the declared
/// return type is `Void`.
fn lower_tail_block(
    forms: &[AstNode],
    has_explicit_return: bool,
    return_type: &Option<String>,
    scope: &mut Scope,
) -> Result<ir::Block, CompileError> {
    let mut statements = Vec::with_capacity(forms.len());
    if forms.is_empty() {
        return Ok(ir::Block { statements });
    }
    for form in &forms[..forms.len() - 1] {
        statements.extend(lower_statement(form, scope)?);
    }
    statements.extend(lower_tail_form(&forms[forms.len() - 1], has_explicit_return, return_type, scope)?);
    Ok(ir::Block { statements })
}

fn lower_tail_form(
    form: &AstNode,
    has_explicit_return: bool,
    return_type: &Option<String>,
    scope: &mut Scope,
) -> Result<Vec<ir::Stmt>, CompileError> {
    if let Some(items) = form.value.as_list() {
        match items.first().and_then(|i| i.value.as_symbol()) {
            Some("return") => {
                let argument = items.get(1).map(|a| lower_expr(a, scope)).transpose()?;
                return Ok(vec![ir::Stmt::Return(ir::ReturnStatement { argument, span: form.span })]);
            }
            Some("if") if items.len() == 4 => {
                let test = lower_expr(&items[1], scope)?;
                let consequent = lower_tail_block(std::slice::from_ref(&items[2]), has_explicit_return, return_type, scope)?;
                let alternate = lower_tail_block(std::slice::from_ref(&items[3]), has_explicit_return, return_type, scope)?;
                return Ok(vec![ir::Stmt::If(ir::IfStatement {
                    test,
                    consequent: Box::new(consequent),
                    alternate: Some(Box::new(alternate)),
                    span: form.span,
                })]);
            }
            Some("do") => {
                return lower_tail_block(&items[1..], has_explicit_return, return_type, scope).map(|b| b.statements);
            }
            _ => {}
        }
    }

    if has_explicit_return {
        let expr = lower_expr(form, scope)?;
        return Ok(vec![ir::Stmt::Expression(ir::ExpressionStatement { expression: expr, span: form.span })]);
    }
    if matches!(return_type.as_deref(), Some("Void")) {
        let expr = lower_expr(form, scope)?;
        return Ok(vec![ir::Stmt::Expression(ir::ExpressionStatement { expression: expr, span: form.span })]);
    }
    let expr = lower_expr(form, scope)?;
    Ok(vec![ir::Stmt::Return(ir::ReturnStatement { argument: Some(expr), span: form.span })])
}

/// Lowers a non-tail body form into one or more statements.
fn lower_statement(form: &AstNode, scope: &mut Scope) -> Result<Vec<ir::Stmt>, CompileError> {
    if let Some(items) = form.value.as_list() {
        match items.first().and_then(|i| i.value.as_symbol()) {
            Some("let") if items.len() == 3 => {
                let bindings = items[1]
                    .value
                    .as_list()
                    .ok_or_else(|| semantic_error(scope, "`let` requires a binding list", items[1].span))?;
                let mut stmts = Vec::with_capacity(bindings.len() + 1);
                let mut names = Vec::with_capacity(bindings.len());
                for binding in bindings {
                    let pair = binding
                        .value
                        .as_list()
                        .filter(|p| p.len() == 2)
                        .ok_or_else(|| semantic_error(scope, "malformed `let` binding", binding.span))?;
                    let name = pair[0]
                        .value
                        .as_symbol()
                        .ok_or_else(|| semantic_error(scope, "`let` binding name must be a symbol", pair[0].span))?
                        .to_string();
                    let init = lower_expr(&pair[1], scope)?;
                    names.push(name.clone());
                    scope.push(std::iter::once(name.clone()));
                    stmts.push(ir::Stmt::Variable(ir::VariableDeclaration { name, init, mutable: false, span: binding.span }));
                }
                stmts.extend(lower_statement(&items[2], scope)?);
                for _ in &names {
                    scope.pop();
                }
                Ok(stmts)
            }
            Some("do") => {
                let mut stmts = Vec::new();
                for item in &items[1..] {
                    stmts.extend(lower_statement(item, scope)?);
                }
                Ok(stmts)
            }
            Some("if") if items.len() == 4 => {
                let test = lower_expr(&items[1], scope)?;
                let consequent = ir::Block { statements: lower_statement(&items[2], scope)? };
                let alternate = ir::Block { statements: lower_statement(&items[3], scope)? };
                Ok(vec![ir::Stmt::If(ir::IfStatement {
                    test,
                    consequent: Box::new(consequent),
                    alternate: Some(Box::new(alternate)),
                    span: form.span,
                })])
            }
            Some("return") => {
                let argument = items.get(1).map(|a| lower_expr(a, scope)).transpose()?;
                Ok(vec![ir::Stmt::Return(ir::ReturnStatement { argument, span: form.span })])
            }
            Some("defn") => Ok(vec![ir::Stmt::Function(lower_function(items, form.span, scope)?)]),
            _ => {
                let expr = lower_expr(form, scope)?;
                Ok(vec![ir::Stmt::Expression(ir::ExpressionStatement { expression: expr, span: form.span })])
            }
        }
    } else {
        let expr = lower_expr(form, scope)?;
        Ok(vec![ir::Stmt::Expression(ir::ExpressionStatement { expression: expr, span: form.span })])
    }
}

fn lower_expr(node: &AstNode, scope: &mut Scope) -> Result<ir::Expr, CompileError> {
    match &*node.value {
        Expr::NumberLit(n) => Ok(ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::Number(*n), span: node.span })),
        Expr::StringLit(s) => Ok(ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::String(s.clone()), span: node.span })),
        Expr::BoolLit(b) => Ok(ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::Bool(*b), span: node.span })),
        Expr::NilLit => Ok(ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::Nil, span: node.span })),
        Expr::Symbol(name) => {
            if !scope.is_bound(name) {
                return Err(CompileError::new(
                    ErrorKind::UnboundIdentifier { name: name.clone() },
                    scope.source,
                    node.span,
                ));
            }
            Ok(ir::Expr::Identifier(ir::Identifier { name: name.clone(), span: node.span }))
        }
        Expr::Quote(inner) => lower_quoted(inner, node.span),
        Expr::List(items) => lower_list_expr(items, node.span, scope),
        Expr::Quasiquote(_) | Expr::Unquote(_) | Expr::UnquoteSplicing(_) => Err(semantic_error(
            scope,
            "quasiquote forms must be resolved by the macro expander before lowering",
            node.span,
        )),
    }
}

/// A quoted literal form is data, not code: render it as the equivalent IR
/// literal/array tree rather than evaluating it as an expression.
fn lower_quoted(node: &AstNode, span: Span) -> Result<ir::Expr, CompileError> {
    Ok(match &*node.value {
        Expr::NumberLit(n) => ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::Number(*n), span }),
        Expr::StringLit(s) => ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::String(s.clone()), span }),
        Expr::BoolLit(b) => ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::Bool(*b), span }),
        Expr::NilLit => ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::Nil, span }),
        Expr::Symbol(s) => ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::String(s.clone()), span }),
        Expr::List(items) => {
            let elements = items.iter().map(|i| lower_quoted(i, i.span)).collect::<Result<Vec<_>, _>>()?;
            ir::Expr::ArrayLiteral(elements, span)
        }
        Expr::Quote(inner) => lower_quoted(inner, span)?,
        _ => ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::Nil, span }),
    })
}

fn lower_list_expr(items: &[AstNode], span: Span, scope: &mut Scope) -> Result<ir::Expr, CompileError> {
    if items.is_empty() {
        return Ok(ir::Expr::ArrayLiteral(Vec::new(), span));
    }
    if let Some(head) = items[0].value.as_symbol() {
        match head {
            "vector" => {
                let elements = items[1..].iter().map(|i| lower_expr(i, scope)).collect::<Result<Vec<_>, _>>()?;
                return Ok(ir::Expr::ArrayLiteral(elements, span));
            }
            "hash-map" => {
                if items[1..].len() % 2 != 0 {
                    return Err(arity_error(scope, "hash-map", "an even number of key/value forms", items[1..].len(), span));
                }
                let mut props = Vec::with_capacity(items[1..].len() / 2);
                for pair in items[1..].chunks(2) {
                    let key = match &*pair[0].value {
                        Expr::StringLit(s) => s.clone(),
                        Expr::Symbol(s) => s.clone(),
                        _ => return Err(semantic_error(scope, "hash-map keys must be strings or symbols", pair[0].span)),
                    };
                    props.push((key, lower_expr(&pair[1], scope)?));
                }
                return Ok(ir::Expr::ObjectLiteral(props, span));
            }
            "str" => {
                let operands = items[1..].iter().map(|i| lower_expr(i, scope)).collect::<Result<Vec<_>, _>>()?;
                return Ok(build_str_concat(operands, span));
            }
            "." if items.len() == 3 => {
                let object = lower_expr(&items[1], scope)?;
                let property = items[2]
                    .value
                    .as_symbol()
                    .ok_or_else(|| semantic_error(scope, "member access property must be a symbol", items[2].span))?
                    .to_string();
                return Ok(ir::Expr::MemberExpression(ir::MemberExpression { object: Box::new(object), property, span }));
            }
            op if BINARY_OPERATORS.contains(&op) => {
                return lower_operator(op, &items[1..], span, scope);
            }
            "if" => {
                return Err(semantic_error(scope, "`if` in expression position must be lowered as a statement tail", span));
            }
            _ => {}
        }
    }
    let callee = lower_expr(&items[0], scope)?;
    let (arguments, is_named_args, argument_names) = lower_call_args(&items[1..], scope)?;
    Ok(ir::Expr::CallExpression(ir::CallExpression {
        callee: Box::new(callee),
        arguments,
        is_named_args,
        argument_names,
        span,
    }))
}

fn lower_call_args(
    args: &[AstNode],
    scope: &mut Scope,
) -> Result<(Vec<ir::Expr>, bool, Vec<Option<String>>), CompileError> {
    let is_named_args = args.iter().step_by(2).any(|a| a.value.is_named_param_marker());
    if !is_named_args {
        let values = args.iter().map(|a| lower_expr(a, scope)).collect::<Result<Vec<_>, _>>()?;
        let names = vec![None; values.len()];
        return Ok((values, false, names));
    }
    if args.len() % 2 != 0 {
        return Err(semantic_error(scope, "keyed call site requires `name: value` pairs", args.first().map(|a| a.span).unwrap_or_default()));
    }
    let mut values = Vec::with_capacity(args.len() / 2);
    let mut names = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks(2) {
        let name = pair[0]
            .value
            .as_symbol()
            .filter(|s| s.ends_with(':'))
            .ok_or_else(|| semantic_error(scope, "expected a `name:` marker in a keyed call", pair[0].span))?;
        names.push(Some(name.trim_end_matches(':').to_string()));
        values.push(lower_expr(&pair[1], scope)?);
    }
    Ok((values, true, names))
}

fn lower_operator(op: &str, args: &[AstNode], span: Span, scope: &mut Scope) -> Result<ir::Expr, CompileError> {
    let operands = args.iter().map(|a| lower_expr(a, scope)).collect::<Result<Vec<_>, _>>()?;
    match operands.len() {
        0 | 1 => Err(arity_error(scope, op, "at least 2 argument(s)", operands.len(), span)),
        2 => Ok(binary(op, operands[0].clone(), operands[1].clone(), span)),
        _ if matches!(op, "+" | "-" | "*" | "/") => {
            let mut iter = operands.into_iter();
            let first = iter.next().unwrap();
            Ok(iter.fold(first, |acc, next| binary(op, acc, next, span)))
        }
        n => Err(arity_error(scope, op, "exactly 2 argument(s)", n, span)),
    }
}

fn binary(op: &str, left: ir::Expr, right: ir::Expr, span: Span) -> ir::Expr {
    ir::Expr::BinaryExpression(ir::BinaryExpression {
        operator: op.to_string(),
        left: Box::new(left),
        right: Box::new(right),
        span,
    })
}

/// `str` concatenates by string coercion. Folded as nested binary
/// expressions tagged with the synthetic `str+` operator (distinct from
/// arithmetic `+`) so the generator can tell a string-interpolation chain
/// apart from ordinary addition and choose a template literal when
/// SPEC_FULL.md §2's safety condition holds, falling back to explicit
/// `String(x) + String(y)` chains otherwise.
fn build_str_concat(operands: Vec<ir::Expr>, span: Span) -> ir::Expr {
    let mut iter = operands.into_iter();
    let Some(first) = iter.next() else {
        return ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::String(String::new()), span });
    };
    iter.fold(first, |acc, next| binary("str+", acc, next, span))
}

fn arity_error(scope: &Scope, callee: &str, expected: &str, found: usize, span: Span) -> CompileError {
    CompileError::new(
        ErrorKind::ArityError { callee: callee.to_string(), expected: expected.to_string(), found },
        scope.source,
        span,
    )
}

fn semantic_error(scope: &Scope, detail: &str, span: Span) -> CompileError {
    CompileError::new(ErrorKind::ParseError { detail: detail.to_string() }, scope.source, span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(text: &str) -> ir::Module {
        let source = SourceText::new("t", text);
        let forms = crate::reader::parse(&source, 0).unwrap();
        let mut registry = crate::macros::MacroRegistry::with_builtins();
        let expanded = crate::macros::expand_program(forms, &mut registry, &source, crate::macros::DEFAULT_EXPANSION_BUDGET).unwrap();
        let desugared = crate::desugar::desugar_module(expanded, &source).unwrap();
        lower_module(desugared, &source).unwrap()
    }

    #[test]
    fn positional_add_lowers_to_binary_plus_return() {
        let m = lower("(defn add (x y) (+ x y))");
        let ir::Declaration::Function(f) = &m.declarations[0] else { panic!("expected function") };
        assert!(!f.has_explicit_return);
        assert_eq!(f.body.statements.len(), 1);
        assert!(matches!(f.body.statements[0], ir::Stmt::Return(_)));
    }

    #[test]
    fn explicit_return_is_preserved() {
        let m = lower("(defn g (x y) (return (+ x y)))");
        let ir::Declaration::Function(f) = &m.declarations[0] else { panic!("expected function") };
        assert!(f.has_explicit_return);
    }

    #[test]
    fn unbound_identifier_is_an_error() {
        let source = SourceText::new("t", "(defn f (x) y)");
        let forms = crate::reader::parse(&source, 0).unwrap();
        let mut registry = crate::macros::MacroRegistry::with_builtins();
        let expanded = crate::macros::expand_program(forms, &mut registry, &source, crate::macros::DEFAULT_EXPANSION_BUDGET).unwrap();
        let desugared = crate::desugar::desugar_module(expanded, &source).unwrap();
        let err = lower_module(desugared, &source).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnboundIdentifier { ref name } if name == "y"));
    }

    #[test]
    fn cond_lowers_through_nested_if_into_if_statement_chain() {
        let m = lower("(defn f (x) (cond (= x 1) 10 true 0))");
        let ir::Declaration::Function(f) = &m.declarations[0] else { panic!("expected function") };
        assert!(matches!(f.body.statements[0], ir::Stmt::If(_)));
    }

    #[test]
    fn str_concatenates_as_left_folded_plus() {
        let m = lower("(defn f (x) (str \"a\" x \"b\"))");
        let ir::Declaration::Function(f) = &m.declarations[0] else { panic!("expected function") };
        let ir::Stmt::Return(ir::ReturnStatement { argument: Some(ir::Expr::BinaryExpression(outer)), .. }) = &f.body.statements[0] else {
            panic!("expected a binary-expression return")
        };
        assert_eq!(outer.operator, "str+");
    }

    #[test]
    fn void_return_type_suppresses_implicit_return() {
        let m = lower("(fx f ((x: Int)) (-> Void) (+ x 1))");
        let ir::Declaration::Function(f) = &m.declarations[0] else { panic!("expected function") };
        assert!(matches!(f.body.statements[0], ir::Stmt::Expression(_)));
    }

    #[test]
    fn keyed_call_site_is_recorded_as_named_args() {
        let m = lower("(defn f (x) x) (defn g (y) (f x: y))");
        let ir::Declaration::Function(g) = &m.declarations[1] else { panic!("expected function") };
        let ir::Stmt::Return(ir::ReturnStatement { argument: Some(ir::Expr::CallExpression(call)), .. }) = &g.body.statements[0] else {
            panic!("expected a call-expression return")
        };
        assert!(call.is_named_args);
        assert_eq!(call.argument_names, vec![Some("x".to_string())]);
    }
}
