//! C3: Surface Desugarer — collapses `defn`/`fx` and every combination of
//! typed/named/default parameters into one canonical kernel `defn` shape,
//! per spec.md §4.3 (the largest module in the pipeline by design share).
//!
//! No teacher module performs this rewrite (the teacher is an interpreter,
//! not a compiler), so the walk is grounded on this crate's own `ast`/`macros`
//! conventions: a `Result`-returning recursive descent over `ast::Expr`,
//! same error type, same span discipline.

use std::collections::HashMap;

use crate::ast::{AstNode, Expr, Span};
use crate::error::{CompileError, ErrorKind, SourceText};

/// One parameter of a desugared function, in declaration order.
#[derive(Debug, Clone)]
pub struct ParamRecord {
    pub source_name: String,
    pub type_tag: Option<String>,
    pub default: Option<AstNode>,
    pub index: usize,
    pub named: bool,
}

/// Everything C5/C6 need about a function beyond its rewritten body, keyed
/// by the function's source (pre-rename) name.
#[derive(Debug, Clone)]
pub struct FunctionMeta {
    pub source_name: String,
    pub params: Vec<ParamRecord>,
    pub named: bool,
    pub return_type: Option<String>,
    pub has_explicit_return: bool,
    pub span: Span,
}

/// The result of desugaring one module: the rewritten kernel forms, the
/// per-function metadata table, and the hyphen→camelCase rename table —
/// computed once here and applied later by the generator (spec.md §9:
/// "compute the rename once in C3 ... apply it in C6").
pub struct DesugaredModule {
    pub forms: Vec<AstNode>,
    pub functions: HashMap<String, FunctionMeta>,
    pub renames: HashMap<String, String>,
}

struct Ctx<'a> {
    source: &'a SourceText,
    functions: HashMap<String, FunctionMeta>,
    renames: HashMap<String, String>,
}

pub fn desugar_module(forms: Vec<AstNode>, source: &SourceText) -> Result<DesugaredModule, CompileError> {
    let mut ctx = Ctx {
        source,
        functions: HashMap::new(),
        renames: HashMap::new(),
    };
    let mut out = Vec::with_capacity(forms.len());
    for form in forms {
        check_returns(&form, false, &ctx)?;
        out.push(desugar_node(form, &mut ctx)?);
    }
    check_rename_collisions(&ctx.renames, source)?;

    Ok(DesugaredModule {
        forms: out,
        functions: ctx.functions,
        renames: ctx.renames,
    })
}

/// spec.md §3 invariant 4 / §8 property 5: two distinct source identifiers
/// must never collapse to the same emitted name. Checked globally over the
/// module's rename table rather than per-scope, so a clash is caught even
/// if C6 would never actually have placed both names in the same scope —
/// the stricter, simpler reading of "collisions ... are detected".
fn check_rename_collisions(renames: &HashMap<String, String>, source: &SourceText) -> Result<(), CompileError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (original, renamed) in renames {
        if let Some(other) = seen.insert(renamed.as_str(), original.as_str()) {
            if other != original {
                return Err(malformed(
                    source,
                    &format!("identifiers `{other}` and `{original}` both rename to `{renamed}`"),
                    Span::default(),
                ));
            }
        }
    }
    Ok(())
}

fn desugar_node(node: AstNode, ctx: &mut Ctx) -> Result<AstNode, CompileError> {
    let span = node.span;
    match &*node.value {
        Expr::List(items) if is_function_head(items) => desugar_function(items.clone(), span, ctx),
        Expr::List(items) => {
            let children = items
                .iter()
                .cloned()
                .map(|item| desugar_node(item, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::List(children).into_node(span))
        }
        _ => Ok(node),
    }
}

fn is_function_head(items: &[AstNode]) -> bool {
    matches!(items.first().and_then(|i| i.value.as_symbol()), Some("defn") | Some("fx"))
}

/// Rewrites `(defn name (params...) [return-type] body...)` — or the `fx`
/// spelling, treated identically per spec.md §9's Open Question resolution
/// (recorded in DESIGN.md) — into `(defn camelName (camelParams...) (do body...))`.
fn desugar_function(items: Vec<AstNode>, span: Span, ctx: &mut Ctx) -> Result<AstNode, CompileError> {
    if items.len() < 3 {
        return Err(malformed(ctx.source, "function form requires a name and a parameter list", span));
    }
    let source_name = items[1]
        .value
        .as_symbol()
        .ok_or_else(|| malformed(ctx.source, "function name must be a symbol", items[1].span))?
        .to_string();
    let param_list = items[2]
        .value
        .as_list()
        .ok_or_else(|| malformed(ctx.source, "expected a parameter list", items[2].span))?;
    let params = parse_param_list(param_list, ctx.source)?;
    let named = params.iter().any(|p| p.named);

    let mut rest = &items[3..];
    let (return_type, trimmed) = consume_return_type(rest);
    rest = trimmed;

    for p in &params {
        record_rename(&mut ctx.renames, &p.source_name);
    }
    record_rename(&mut ctx.renames, &source_name);

    let body_forms = rest
        .iter()
        .cloned()
        .map(|f| desugar_node(f, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    let has_explicit_return = body_forms.last().map(tail_has_return).unwrap_or(false);

    ctx.functions.insert(
        source_name.clone(),
        FunctionMeta {
            source_name: source_name.clone(),
            params: params.clone(),
            named,
            return_type,
            has_explicit_return,
            span,
        },
    );

    let do_head = Expr::Symbol("do".to_string()).into_node(span);
    let mut do_items = Vec::with_capacity(body_forms.len() + 1);
    do_items.push(do_head);
    do_items.extend(body_forms);
    let body = Expr::List(do_items).into_node(span);

    let defn_head = Expr::Symbol("defn".to_string()).into_node(span);
    let name_node = Expr::Symbol(source_name).into_node(items[1].span);
    let param_nodes = params
        .iter()
        .map(|p| Expr::Symbol(p.source_name.clone()).into_node(span))
        .collect();
    let param_list_node = Expr::List(param_nodes).into_node(items[2].span);

    Ok(Expr::List(vec![defn_head, name_node, param_list_node, body]).into_node(span))
}

/// Each parameter is either a bare name, a grouped list `(name [type] [=
/// default])`, or — spec.md's own literal syntax — a flat, ungrouped
/// `name:` marker directly followed by an optional type-tag symbol and/or
/// a `= default` pair, e.g. `(x: Int y: Int = 0)`. Only a `name:` marker
/// opens a multi-token entry; a bare name (no trailing `:`) is always a
/// complete single-token parameter, so `(x y)` never misreads `y` as `x`'s
/// type. Grouped sublists remain supported for authors who prefer to
/// parenthesize each entry explicitly.
fn parse_param_list(items: &[AstNode], source: &SourceText) -> Result<Vec<ParamRecord>, CompileError> {
    let mut groups = Vec::with_capacity(items.len());
    let mut indices: HashMap<String, usize> = HashMap::new();

    // Two passes: first resolve every parameter's name and index (so
    // defaults can validate against the *full* declaration, catching
    // forward references regardless of source order), then parse each
    // entry's type/default against that complete map.
    let mut i = 0;
    while i < items.len() {
        let item = &items[i];
        let (name_tok, type_tag, default, advance) = match &*item.value {
            Expr::Symbol(_) => parse_flat_param(items, i, source)?,
            Expr::List(tokens) => {
                let (name_tok, type_tag, default) = parse_param_group(tokens, item.span, source)?;
                (name_tok, type_tag, default, 1)
            }
            _ => return Err(malformed(source, "malformed parameter", item.span)),
        };

        let raw = name_tok
            .value
            .as_symbol()
            .ok_or_else(|| malformed(source, "parameter name must be a symbol", name_tok.span))?;
        let named = raw.ends_with(':') && raw.len() > 1;
        let clean = raw.trim_end_matches(':').to_string();

        if indices.contains_key(&clean) {
            return Err(CompileError::new(
                ErrorKind::DuplicateParam { name: clean },
                source,
                item.span,
            ));
        }
        let index = groups.len();
        indices.insert(clean.clone(), index);
        groups.push((clean, named, type_tag, default));
        i += advance;
    }

    let mut records = Vec::with_capacity(groups.len());
    for (index, (clean, named, type_tag, default)) in groups.into_iter().enumerate() {
        if let Some(default_expr) = &default {
            check_default_references(default_expr, &clean, index, &indices, source)?;
        }
        records.push(ParamRecord {
            source_name: clean,
            type_tag,
            default,
            index,
            named,
        });
    }
    Ok(records)
}

/// Scans one flat, ungrouped parameter entry starting at `items[start]`.
/// Returns the name token, optional type tag, optional default, and how
/// many items were consumed.
fn parse_flat_param(
    items: &[AstNode],
    start: usize,
    source: &SourceText,
) -> Result<(AstNode, Option<String>, Option<AstNode>, usize), CompileError> {
    let name_tok = items[start].clone();
    let raw = name_tok
        .value
        .as_symbol()
        .ok_or_else(|| malformed(source, "parameter name must be a symbol", name_tok.span))?;
    if !(raw.ends_with(':') && raw.len() > 1) {
        return Ok((name_tok, None, None, 1));
    }

    let mut idx = start + 1;
    let mut type_tag = None;
    if idx < items.len() {
        if let Some(s) = items[idx].value.as_symbol() {
            if s != "=" && !(s.ends_with(':') && s.len() > 1) {
                type_tag = Some(s.to_string());
                idx += 1;
            }
        }
    }
    let mut default = None;
    if idx < items.len() && matches!(items[idx].value.as_symbol(), Some("=")) {
        idx += 1;
        let default_expr = items
            .get(idx)
            .ok_or_else(|| malformed(source, "missing default expression after `=`", name_tok.span))?
            .clone();
        idx += 1;
        default = Some(default_expr);
    }
    Ok((name_tok, type_tag, default, idx - start))
}

fn parse_param_group(
    tokens: &[AstNode],
    span: Span,
    source: &SourceText,
) -> Result<(AstNode, Option<String>, Option<AstNode>), CompileError> {
    if tokens.is_empty() {
        return Err(malformed(source, "empty parameter group", span));
    }
    let name_tok = tokens[0].clone();
    let mut idx = 1;
    let mut type_tag = None;
    if idx < tokens.len() {
        if let Some(s) = tokens[idx].value.as_symbol() {
            if s != "=" {
                type_tag = Some(s.to_string());
                idx += 1;
            }
        }
    }
    let mut default = None;
    if idx < tokens.len() {
        let is_eq = matches!(tokens[idx].value.as_symbol(), Some("="));
        if !is_eq {
            return Err(malformed(source, "expected `=` before a parameter default", tokens[idx].span));
        }
        idx += 1;
        let default_expr = tokens
            .get(idx)
            .ok_or_else(|| malformed(source, "missing default expression after `=`", span))?
            .clone();
        idx += 1;
        default = Some(default_expr);
    }
    if idx != tokens.len() {
        return Err(malformed(source, "unexpected trailing tokens in parameter group", span));
    }
    Ok((name_tok, type_tag, default))
}

/// A default may reference only earlier-declared parameters (spec.md
/// §4.3's tie-break); this walks the default expression's free symbols and
/// rejects any that name a parameter at or after the current index.
fn check_default_references(
    default: &AstNode,
    param_name: &str,
    current_index: usize,
    seen: &HashMap<String, usize>,
    source: &SourceText,
) -> Result<(), CompileError> {
    fn walk(node: &AstNode, param_name: &str, current_index: usize, seen: &HashMap<String, usize>, source: &SourceText) -> Result<(), CompileError> {
        match &*node.value {
            Expr::Symbol(name) => {
                if let Some(&idx) = seen.get(name) {
                    if idx >= current_index {
                        return Err(CompileError::new(
                            ErrorKind::InvalidDefault {
                                name: param_name.to_string(),
                                referenced: name.clone(),
                            },
                            source,
                            node.span,
                        ));
                    }
                }
                Ok(())
            }
            Expr::List(items) => {
                for item in items {
                    walk(item, param_name, current_index, seen, source)?;
                }
                Ok(())
            }
            Expr::Quote(_) => Ok(()),
            Expr::Quasiquote(inner) | Expr::Unquote(inner) | Expr::UnquoteSplicing(inner) => {
                walk(inner, param_name, current_index, seen, source)
            }
            _ => Ok(()),
        }
    }
    walk(default, param_name, current_index, seen, source)
}

fn consume_return_type(rest: &[AstNode]) -> (Option<String>, &[AstNode]) {
    if rest.is_empty() {
        return (None, rest);
    }
    if let Some(items) = rest[0].value.as_list() {
        if items.len() == 2 && matches!(items[0].value.as_symbol(), Some("->")) {
            if let Some(ty) = items[1].value.as_symbol() {
                return (Some(ty.to_string()), &rest[1..]);
            }
        }
    }
    if matches!(rest[0].value.as_symbol(), Some("->")) && rest.len() >= 2 {
        if let Some(ty) = rest[1].value.as_symbol() {
            return (Some(ty.to_string()), &rest[2..]);
        }
    }
    (None, rest)
}

/// True when the body's tail form is, recursively through `if`/`do`
/// branches, headed by `return`. Both branches of a tail `if` must resolve
/// to an explicit return for the function overall to be treated as
/// explicit-return; see DESIGN.md for this Open Question's resolution.
fn tail_has_return(expr: &AstNode) -> bool {
    match expr.value.as_list() {
        Some(items) if matches!(items.first().and_then(|i| i.value.as_symbol()), Some("return")) => true,
        Some(items) if items.len() == 4 && matches!(items[0].value.as_symbol(), Some("if")) => {
            tail_has_return(&items[2]) && tail_has_return(&items[3])
        }
        Some(items) if items.len() >= 2 && matches!(items[0].value.as_symbol(), Some("do")) => {
            tail_has_return(items.last().unwrap())
        }
        _ => false,
    }
}

fn check_returns(node: &AstNode, in_function: bool, ctx: &Ctx) -> Result<(), CompileError> {
    match &*node.value {
        Expr::List(items) if matches!(items.first().and_then(|i| i.value.as_symbol()), Some("return")) => {
            if !in_function {
                return Err(CompileError::new(ErrorKind::ReturnOutsideFunction, ctx.source, node.span));
            }
            for item in &items[1..] {
                check_returns(item, in_function, ctx)?;
            }
            Ok(())
        }
        Expr::List(items) if is_function_head(items) => {
            for item in items.iter().skip(3) {
                check_returns(item, true, ctx)?;
            }
            Ok(())
        }
        Expr::List(items) => {
            for item in items {
                check_returns(item, in_function, ctx)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Deterministic kebab-case → camelCase transform, shared by every
/// hyphenated identifier the rename table covers.
pub fn kebab_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '-' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn record_rename(renames: &mut HashMap<String, String>, name: &str) {
    if name.contains('-') {
        renames.entry(name.to_string()).or_insert_with(|| kebab_to_camel(name));
    }
}

fn malformed(source: &SourceText, detail: &str, span: Span) -> CompileError {
    CompileError::new(
        ErrorKind::ParseError { detail: detail.to_string() },
        source,
        span,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desugar(text: &str) -> DesugaredModule {
        let source = SourceText::new("t", text);
        let forms = crate::reader::parse(&source, 0).unwrap();
        desugar_module(forms, &source).unwrap()
    }

    #[test]
    fn positional_function_collapses_to_canonical_defn() {
        let m = desugar("(defn add (x y) (+ x y))");
        assert_eq!(m.forms[0].value.pretty(), "(defn add (x y) (do (+ x y)))");
        let meta = &m.functions["add"];
        assert!(!meta.named);
        assert_eq!(meta.params.len(), 2);
    }

    #[test]
    fn fx_and_defn_are_the_same_kernel_form() {
        let m = desugar("(fx add (x y) (+ x y))");
        assert_eq!(m.forms[0].value.pretty(), "(defn add (x y) (do (+ x y)))");
    }

    #[test]
    fn named_typed_defaulted_params_parse() {
        let m = desugar("(fx addN ((x: Int) (y: Int = 0)) (-> Int) (+ x y))");
        let meta = &m.functions["addN"];
        assert!(meta.named);
        assert_eq!(meta.return_type.as_deref(), Some("Int"));
        assert_eq!(meta.params[1].source_name, "y");
        assert!(meta.params[1].default.is_some());
    }

    #[test]
    fn flat_ungrouped_named_typed_defaulted_params_parse() {
        // spec.md's own literal S2 syntax: no per-parameter grouping.
        let m = desugar("(fx addN (x: Int y: Int = 0) (-> Int) (+ x y))");
        let meta = &m.functions["addN"];
        assert!(meta.named);
        assert_eq!(meta.params[0].source_name, "x");
        assert_eq!(meta.params[0].type_tag.as_deref(), Some("Int"));
        assert!(meta.params[0].default.is_none());
        assert_eq!(meta.params[1].source_name, "y");
        assert_eq!(meta.params[1].type_tag.as_deref(), Some("Int"));
        assert!(meta.params[1].default.is_some());
    }

    #[test]
    fn flat_bare_params_are_not_misread_as_typed_by_their_neighbor() {
        // `(x y)` must stay two untyped positional params, not `x` typed by `y`.
        let m = desugar("(defn add (x y) (+ x y))");
        let meta = &m.functions["add"];
        assert!(!meta.named);
        assert_eq!(meta.params.len(), 2);
        assert!(meta.params.iter().all(|p| p.type_tag.is_none()));
    }

    #[test]
    fn duplicate_parameter_is_an_error() {
        let source = SourceText::new("t", "(defn f (x x) x)");
        let forms = crate::reader::parse(&source, 0).unwrap();
        let err = desugar_module(forms, &source).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DuplicateParam { ref name } if name == "x"));
    }

    #[test]
    fn forward_referencing_default_is_an_error() {
        let source = SourceText::new("t", "(defn f ((x = y) y) x)");
        let forms = crate::reader::parse(&source, 0).unwrap();
        let err = desugar_module(forms, &source).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidDefault { .. }));
    }

    #[test]
    fn return_outside_function_is_an_error() {
        let source = SourceText::new("t", "(return 1)");
        let forms = crate::reader::parse(&source, 0).unwrap();
        let err = desugar_module(forms, &source).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ReturnOutsideFunction));
    }

    #[test]
    fn explicit_tail_return_is_detected() {
        let m = desugar("(defn g (x y) (return (+ x y)))");
        assert!(m.functions["g"].has_explicit_return);
        let m2 = desugar("(defn g2 (x y) (+ x y))");
        assert!(!m2.functions["g2"].has_explicit_return);
    }

    #[test]
    fn hyphenated_identifiers_are_recorded_in_the_rename_table() {
        let m = desugar("(defn my-fn (first-arg) first-arg)");
        assert_eq!(m.renames.get("my-fn").map(String::as_str), Some("myFn"));
        assert_eq!(m.renames.get("first-arg").map(String::as_str), Some("firstArg"));
    }

    #[test]
    fn kebab_to_camel_examples() {
        assert_eq!(kebab_to_camel("calculate-area"), "calculateArea");
        assert_eq!(kebab_to_camel("x"), "x");
        assert_eq!(kebab_to_camel("a-b-c"), "aBC");
    }
}
