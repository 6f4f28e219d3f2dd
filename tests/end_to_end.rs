//! End-to-end scenarios run the whole C1-C6 pipeline over source text and
//! check the emitted ECMAScript, the way `codegen`'s own `generate` test
//! helper does internally — these exercise the same pipeline through the
//! crate's public API instead.

use glyph::error::SourceText;
use glyph::macros::{expand_program, MacroRegistry, DEFAULT_EXPANSION_BUDGET};

fn compile(text: &str) -> String {
    let source = SourceText::new("t.hql", text);
    let forms = glyph::reader::parse(&source, 0).unwrap();
    let mut registry = MacroRegistry::with_builtins();
    let expanded = expand_program(forms, &mut registry, &source, DEFAULT_EXPANSION_BUDGET).unwrap();
    let desugared = glyph::desugar::desugar_module(expanded, &source).unwrap();
    let renames = desugared.renames.clone();
    let lowered = glyph::lower::lower_module(desugared, &source).unwrap();
    let resolved = glyph::resolver::resolve_module(lowered, &source).unwrap();
    glyph::codegen::generate_module(&resolved, &renames)
}

#[test]
fn s1_positional_add() {
    let js = compile("(defn add (x y) (+ x y))");
    assert!(js.contains("function add(x, y) {"));
    assert!(js.contains("return (x + y);"));
}

#[test]
fn s2_keyed_addn_default_and_positional_call_symmetry() {
    let js = compile("(fx addN (x: Int y: Int = 0) (-> Int) (+ x y))");
    assert!(js.contains("function addN({ x, y = 0 }) {"));

    let via_positional_call = compile(
        "(fx addN (x: Int y: Int = 0) (-> Int) (+ x y)) (defn main () (addN 5 7))",
    );
    assert!(via_positional_call.contains("addN({ x: 5, y: 7 })"));

    let via_keyed_default = compile(
        "(fx addN (x: Int y: Int = 0) (-> Int) (+ x y)) (defn main () (addN x: 5))",
    );
    assert!(via_keyed_default.contains("addN({ x: 5 })"));
}

#[test]
fn s3_explicit_vs_implicit_return() {
    let explicit = compile("(defn g (x y) (return (+ x y)))");
    assert_eq!(explicit.matches("return").count(), 1);

    let implicit = compile("(defn g2 (x y) (+ x y))");
    assert!(!implicit.contains("return;"));
    assert!(implicit.contains("return (x + y);"));
}

#[test]
fn s4_calculate_area_keyed_call_preserves_declared_property_order() {
    let js = compile(
        "(fx area (width: Int height: Int) (* width height)) (defn main () (area width: 5 height: 10))",
    );
    assert!(js.contains("function area({ width, height }) {"));
    assert!(js.contains("area({ width: 5, height: 10 })"));
}

#[test]
fn s5_cond_multi_branch_with_default_param() {
    let source = r#"
        (fx calc (a: Number b: Number op: String = "add")
          (cond (= op "add") (+ a b)
                (= op "mul") (* a b)
                true 0))
    "#;
    let js = compile(source);
    assert!(js.contains("function calc({ a, b, op = \"add\" }) {"));
    assert!(js.contains("if ((op === \"add\")) {"));
    assert!(js.contains("if ((op === \"mul\")) {"));
    assert!(js.contains("return 0;"));
}

#[test]
fn s6_cyclic_import_is_rejected_by_the_linker() {
    use glyph::config::CompileOptions;
    use glyph::linker::{compile_graph, MapModuleSource};
    use std::collections::HashMap;

    let mut files = HashMap::new();
    files.insert("a.hql".to_string(), "(import (b) \"./b.hql\") (defn a () 1) (export a)".to_string());
    files.insert("b.hql".to_string(), "(import (a) \"./a.hql\") (defn b () 1) (export b)".to_string());
    let src = MapModuleSource(files);

    let errors = compile_graph("a.hql", &src, &CompileOptions::default()).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e.kind, glyph::error::ErrorKind::CyclicImport { .. })));
}
