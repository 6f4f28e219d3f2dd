//! C6: Code Generator — IR to ECMAScript module text, per spec.md §4.6.
//!
//! No teacher module emits target-language text (the teacher interprets
//! its AST directly), so this walk follows the same discipline as the rest
//! of the pipeline: a plain recursive descent over `ir`, threading an
//! indentation level instead of a `Result` (codegen cannot fail — every
//! invariant it depends on was already enforced by C4/C5).
//!
//! Determinism (spec.md §4.6): every collection `ir` hands this module is
//! already an ordered `Vec`, and the rename table is consulted by key, so
//! two runs over the same IR always produce the same text.

use std::collections::HashMap;

use crate::desugar::kebab_to_camel;
use crate::ir;

/// Renders a complete module to ECMAScript text. `renames` is the hyphen
/// rename table C3 computed; it is applied once, here, to every emitted
/// identifier (function/parameter/variable names and their references) —
/// spec.md §9: "compute the rename once in C3 ... apply it in C6".
pub fn generate_module(module: &ir::Module, renames: &HashMap<String, String>) -> String {
    let mut out = String::new();

    for import in &module.imports {
        out.push_str(&emit_import(import, renames));
        out.push('\n');
    }
    if !module.imports.is_empty() {
        out.push('\n');
    }

    for (i, decl) in module.declarations.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match decl {
            ir::Declaration::Function(f) => out.push_str(&emit_function(f, renames, 0)),
            ir::Declaration::Variable(v) => out.push_str(&emit_variable(v, renames, 0)),
        }
        out.push('\n');
    }

    if !module.exports.is_empty() {
        out.push('\n');
        out.push_str(&emit_exports(&module.exports, renames));
        out.push('\n');
    }

    out
}

fn emit_import(import: &ir::ImportBinding, renames: &HashMap<String, String>) -> String {
    let local = ident(&import.local_name, renames);
    let imported = ident(&import.imported_name, renames);
    let binding = if local == imported {
        local
    } else {
        format!("{imported} as {local}")
    };
    let specifier = match &import.specifier {
        ir::ImportSpecifier::Module(path) => js_module_specifier(path),
        ir::ImportSpecifier::External(spec) => spec.clone(),
    };
    format!("import {{ {binding} }} from {};", js_string(&specifier))
}

/// A peer source module is transpiled alongside this one: its `.hql`
/// extension becomes `.js` in the emitted import. An external specifier
/// never reaches this function (see `ir::ImportSpecifier::External`).
fn js_module_specifier(path: &str) -> String {
    let swapped = if let Some(stem) = path.strip_suffix(".hql") {
        format!("{stem}.js")
    } else {
        path.to_string()
    };
    js_string(&swapped)
}

fn emit_exports(exports: &[ir::ExportBinding], renames: &HashMap<String, String>) -> String {
    let bindings = exports
        .iter()
        .map(|e| {
            let local = ident(&e.local_name, renames);
            let exported = ident(&e.exported_name, renames);
            if local == exported {
                local
            } else {
                format!("{local} as {exported}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("export {{ {bindings} }};")
}

fn emit_function(f: &ir::FunctionDeclaration, renames: &HashMap<String, String>, level: usize) -> String {
    let name = ident(&f.name, renames);
    let params = if f.is_named {
        emit_keyed_params(&f.params, renames)
    } else {
        emit_positional_params(&f.params, renames)
    };
    let body = emit_block(&f.body, renames, level + 1);
    format!(
        "{pad}function {name}({params}) {{\n{body}{pad}}}\n",
        pad = indent(level)
    )
}

fn emit_positional_params(params: &[ir::Param], renames: &HashMap<String, String>) -> String {
    params
        .iter()
        .map(|p| match &p.default {
            Some(d) => format!("{} = {}", ident(&p.name, renames), emit_expr(d, renames)),
            None => ident(&p.name, renames),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// A keyed callee destructures its single record argument into its
/// declared names, in order, with defaults inline in the destructuring
/// pattern — the target-language default-parameter syntax spec.md §4.6 and
/// §9 prefer. A JS destructuring default fires only when the property is
/// `undefined`, which is exactly the "absent" test spec.md §4.5 requires:
/// an omitted property reads as `undefined` when destructured, while an
/// explicitly passed `null` or `0` does not trigger the default. Because
/// defaults may reference earlier parameters (spec.md §4.3), and JS
/// resolves each destructured binding before the next default expression
/// is evaluated, a single destructuring pattern is sufficient — no
/// fallback conditional-assignment prologue is needed.
fn emit_keyed_params(params: &[ir::Param], renames: &HashMap<String, String>) -> String {
    let fields = params
        .iter()
        .map(|p| match &p.default {
            Some(d) => format!("{} = {}", ident(&p.name, renames), emit_expr(d, renames)),
            None => ident(&p.name, renames),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{ {fields} }}")
}

fn emit_variable(v: &ir::VariableDeclaration, renames: &HashMap<String, String>, level: usize) -> String {
    let keyword = if v.mutable { "let" } else { "const" };
    format!(
        "{pad}{keyword} {name} = {init};\n",
        pad = indent(level),
        name = ident(&v.name, renames),
        init = emit_expr(&v.init, renames)
    )
}

fn emit_block(block: &ir::Block, renames: &HashMap<String, String>, level: usize) -> String {
    let mut out = String::new();
    for stmt in &block.statements {
        out.push_str(&emit_stmt(stmt, renames, level));
    }
    out
}

fn emit_stmt(stmt: &ir::Stmt, renames: &HashMap<String, String>, level: usize) -> String {
    let pad = indent(level);
    match stmt {
        ir::Stmt::Function(f) => emit_function(f, renames, level),
        ir::Stmt::Variable(v) => emit_variable(v, renames, level),
        ir::Stmt::If(i) => emit_if(i, renames, level),
        ir::Stmt::Return(r) => match &r.argument {
            Some(arg) => format!("{pad}return {};\n", emit_expr(arg, renames)),
            None => format!("{pad}return;\n"),
        },
        ir::Stmt::Expression(e) => format!("{pad}{};\n", emit_expr(&e.expression, renames)),
    }
}

fn emit_if(stmt: &ir::IfStatement, renames: &HashMap<String, String>, level: usize) -> String {
    let pad = indent(level);
    let test = emit_expr(&stmt.test, renames);
    let consequent = emit_block(&stmt.consequent, renames, level + 1);
    match &stmt.alternate {
        Some(alt) if !alt.statements.is_empty() => {
            let alternate = emit_block(alt, renames, level + 1);
            format!("{pad}if ({test}) {{\n{consequent}{pad}}} else {{\n{alternate}{pad}}}\n")
        }
        _ => format!("{pad}if ({test}) {{\n{consequent}{pad}}}\n"),
    }
}

fn emit_expr(expr: &ir::Expr, renames: &HashMap<String, String>) -> String {
    match expr {
        ir::Expr::Literal(l) => emit_literal(l),
        ir::Expr::Identifier(i) => ident(&i.name, renames),
        ir::Expr::ArrayLiteral(items, _) => {
            let inner = items.iter().map(|i| emit_expr(i, renames)).collect::<Vec<_>>().join(", ");
            format!("[{inner}]")
        }
        ir::Expr::ObjectLiteral(props, _) => emit_object(props, renames, false),
        ir::Expr::CallRecord(props, _) => emit_object(props, renames, true),
        ir::Expr::MemberExpression(m) => format!("{}.{}", emit_expr(&m.object, renames), m.property),
        ir::Expr::BinaryExpression(b) if b.operator == "str+" => emit_str_concat(b, renames),
        ir::Expr::BinaryExpression(b) => {
            format!("({} {} {})", emit_expr(&b.left, renames), js_operator(&b.operator), emit_expr(&b.right, renames))
        }
        ir::Expr::CallExpression(c) => {
            let callee = emit_expr(&c.callee, renames);
            let args = c.arguments.iter().map(|a| emit_expr(a, renames)).collect::<Vec<_>>().join(", ");
            format!("{callee}({args})")
        }
    }
}

/// `rename_keys` is true for a `CallRecord` — a keyed call's single
/// argument, whose property names are parameter source names and must be
/// renamed identically to the callee's destructured parameter names.
/// `ObjectLiteral` (from a `hash-map` form) is user data; its keys are
/// never renamed.
fn emit_object(props: &[(String, ir::Expr)], renames: &HashMap<String, String>, rename_keys: bool) -> String {
    if props.is_empty() {
        return "{}".to_string();
    }
    let inner = props
        .iter()
        .map(|(k, v)| {
            let key = if rename_keys { ident(k, renames) } else { emit_object_key(k) };
            format!("{key}: {}", emit_expr(v, renames))
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{ {inner} }}")
}

fn emit_object_key(key: &str) -> String {
    if is_js_identifier(key) {
        key.to_string()
    } else {
        js_string(key)
    }
}

fn emit_literal(l: &ir::Literal) -> String {
    match &l.value {
        ir::LiteralValue::Number(n) => js_number(*n),
        ir::LiteralValue::String(s) => js_string(s),
        ir::LiteralValue::Bool(b) => b.to_string(),
        ir::LiteralValue::Nil => "null".to_string(),
    }
}

fn js_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn js_operator(op: &str) -> &str {
    match op {
        "=" => "===",
        other => other,
    }
}

/// `str` concatenation (spec.md §4.6): a template literal when every
/// operand is "safe" per SPEC_FULL.md §2 (literal, identifier, or member
/// expression — nothing whose evaluation order a coercion could disturb),
/// otherwise an explicit `String(x) + String(y)` chain. The `str+`
/// operator only ever appears as a left-leaning chain built by
/// `lower::build_str_concat`, so this first flattens it back into its
/// original operand sequence.
fn emit_str_concat(root: &ir::BinaryExpression, renames: &HashMap<String, String>) -> String {
    let operands = flatten_str_chain(root);
    if operands.iter().all(|e| is_template_safe(e)) {
        let mut out = String::from("`");
        for operand in &operands {
            out.push_str(&template_part(operand, renames));
        }
        out.push('`');
        out
    } else {
        operands
            .iter()
            .map(|e| format!("String({})", emit_expr(e, renames)))
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

fn flatten_str_chain(expr: &ir::BinaryExpression) -> Vec<&ir::Expr> {
    fn walk<'a>(e: &'a ir::Expr, out: &mut Vec<&'a ir::Expr>) {
        match e {
            ir::Expr::BinaryExpression(b) if b.operator == "str+" => {
                walk(&b.left, out);
                walk(&b.right, out);
            }
            other => out.push(other),
        }
    }
    let mut out = Vec::new();
    walk(&expr.left, &mut out);
    walk(&expr.right, &mut out);
    out
}

fn is_template_safe(expr: &ir::Expr) -> bool {
    matches!(expr, ir::Expr::Literal(_) | ir::Expr::Identifier(_) | ir::Expr::MemberExpression(_))
}

fn template_part(expr: &ir::Expr, renames: &HashMap<String, String>) -> String {
    match expr {
        ir::Expr::Literal(ir::Literal { value: ir::LiteralValue::String(s), .. }) => escape_template_text(s),
        ir::Expr::Literal(l) => format!("${{{}}}", emit_literal(l)),
        other => format!("${{{}}}", emit_expr(other, renames)),
    }
}

fn escape_template_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '`' => out.push_str("\\`"),
            '$' => out.push_str("\\$"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}

fn is_js_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Looks an identifier up in the hyphen rename table, falling back to a
/// character-level sanitizer for names the table never covers — e.g. a
/// macro-hygiene gensym like `tmp%3`, whose `%` is not ECMAScript-legal
/// (spec.md §3 invariant 4).
fn ident(name: &str, renames: &HashMap<String, String>) -> String {
    if let Some(renamed) = renames.get(name) {
        return renamed.clone();
    }
    if is_js_identifier(name) {
        return name.to_string();
    }
    sanitize_identifier(name)
}

fn sanitize_identifier(name: &str) -> String {
    let camel = if name.contains('-') { kebab_to_camel(name) } else { name.to_string() };
    let mut out = String::with_capacity(camel.len());
    for (i, ch) in camel.chars().enumerate() {
        let ok = if i == 0 {
            ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
        } else {
            ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
        };
        out.push(if ok { ch } else { '_' });
    }
    if out.is_empty() || out.chars().next().unwrap().is_ascii_digit() {
        out.insert(0, '_');
    }
    out
}

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn generate(text: &str) -> String {
        let source = crate::error::SourceText::new("t", text);
        let forms = crate::reader::parse(&source, 0).unwrap();
        let mut registry = crate::macros::MacroRegistry::with_builtins();
        let expanded = crate::macros::expand_program(forms, &mut registry, &source, crate::macros::DEFAULT_EXPANSION_BUDGET).unwrap();
        let desugared = crate::desugar::desugar_module(expanded, &source).unwrap();
        let renames = desugared.renames.clone();
        let lowered = crate::lower::lower_module(desugared, &source).unwrap();
        let resolved = crate::resolver::resolve_module(lowered, &source).unwrap();
        generate_module(&resolved, &renames)
    }

    #[test]
    fn positional_function_emits_plain_js_function() {
        let js = generate("(defn add (x y) (+ x y))");
        assert!(js.contains("function add(x, y) {"));
        assert!(js.contains("return (x + y);"));
    }

    #[test]
    fn explicit_return_is_emitted_verbatim() {
        let js = generate("(defn g (x y) (return (+ x y)))");
        assert_eq!(js.matches("return").count(), 1);
    }

    #[test]
    fn keyed_function_destructures_with_inline_defaults() {
        let js = generate("(fx addn ((x: Int) (y: Int = 0)) (-> Int) (+ x y))");
        assert!(js.contains("function addn({ x, y = 0 }) {"));
    }

    #[test]
    fn void_return_type_suppresses_implicit_return() {
        let js = generate("(fx f ((x: Int)) (-> Void) (+ x 1))");
        assert!(!js.contains("return"));
    }

    #[test]
    fn positional_call_to_keyed_callee_passes_an_object_literal() {
        let js = generate("(fx addn ((x: Int) (y: Int = 0)) (-> Int) (+ x y)) (defn main () (addn 5 7))");
        assert!(js.contains("addn({ x: 5, y: 7 })"));
    }

    #[test]
    fn hyphenated_identifiers_are_renamed_consistently() {
        let js = generate("(defn calculate-area (my-width my-height) (* my-width my-height))");
        assert!(js.contains("function calculateArea(myWidth, myHeight)"));
        assert!(js.contains("return (myWidth * myHeight);"));
    }

    #[test]
    fn equality_operator_maps_to_strict_equality() {
        let js = generate("(defn f (x) (= x 1))");
        assert!(js.contains("(x === 1)"));
    }

    #[test]
    fn safe_str_concat_uses_a_template_literal() {
        let js = generate("(defn f (x) (str \"a\" x \"b\"))");
        assert!(js.contains("`a${x}b`"));
    }

    #[test]
    fn unsafe_str_concat_falls_back_to_string_coercion() {
        let js = generate("(defn f (x) (str (+ x 1) \"!\"))");
        assert!(js.contains("String((x + 1)) + String(\"!\")"));
    }

    #[test]
    fn determinism_identical_ir_emits_byte_identical_text() {
        let a = generate("(defn add (x y) (+ x y))");
        let b = generate("(defn add (x y) (+ x y))");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_map_literal_keys_are_not_renamed() {
        let js = generate("(defn f () (hash-map \"my-key\" 1))");
        assert!(js.contains("\"my-key\": 1"));
    }

    #[test]
    fn export_form_emits_an_export_block() {
        let source = crate::error::SourceText::new("t", "(defn add (x y) (+ x y)) (export add)");
        let forms = crate::reader::parse(&source, 0).unwrap();
        let mut registry = crate::macros::MacroRegistry::with_builtins();
        let expanded = crate::macros::expand_program(forms, &mut registry, &source, crate::macros::DEFAULT_EXPANSION_BUDGET).unwrap();
        let desugared = crate::desugar::desugar_module(expanded, &source).unwrap();
        let renames: HashMap<String, String> = desugared.renames.clone();
        let lowered = crate::lower::lower_module(desugared, &source).unwrap();
        let resolved = crate::resolver::resolve_module(lowered, &source).unwrap();
        let js = generate_module(&resolved, &renames);
        assert!(js.contains("export { add };"));
    }
}
