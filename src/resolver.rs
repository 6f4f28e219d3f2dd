//! C5: Calling-Convention Resolver — enforces that every call site matches
//! its target's declared convention (positional vs. keyed, spec.md §4.5)
//! and rewrites keyed/positional-to-keyed call sites into their canonical
//! single-object-argument shape.
//!
//! Resolution here is module-local: a callee is only checked against its
//! declared convention when it is declared by name in the *same* module.
//! Calls to an imported or otherwise unresolved identifier are left
//! untouched by `resolve_module` — the module linker (`linker`) is the
//! stage with visibility into other modules' export tables, and revisits
//! exactly those calls via `resolve_imported_calls` once it has them. This
//! split is recorded in DESIGN.md.

use std::collections::HashMap;

use crate::error::{CompileError, ErrorKind, SourceText};
use crate::ir;

/// A callable's calling-convention shape — everything C5 needs about a
/// target to check and rewrite a call site against it. Exposed at
/// `pub(crate)` so `linker` can build the same shape for an imported
/// function's signature once it knows the exporting module's IR.
#[derive(Clone)]
pub(crate) struct Signature {
    pub is_named: bool,
    pub named_param_ids: Vec<String>,
    pub params: Vec<ir::Param>,
}

impl Signature {
    pub(crate) fn of(f: &ir::FunctionDeclaration) -> Self {
        Self { is_named: f.is_named, named_param_ids: f.named_param_ids.clone(), params: f.params.clone() }
    }
}

pub fn resolve_module(mut module: ir::Module, source: &SourceText) -> Result<ir::Module, CompileError> {
    let signatures = collect_signatures(&module);
    walk_module(&mut module, &signatures, source)?;
    Ok(module)
}

/// Revisits a module's call sites against a set of *imported* signatures,
/// once the linker knows them. Calls targeting a locally declared function
/// were already fully resolved by `resolve_module` and are untouched here:
/// `imported` never contains a locally declared name, so `walk_module`
/// simply has nothing to match them against.
pub(crate) fn resolve_imported_calls(
    mut module: ir::Module,
    imported: &HashMap<String, Signature>,
    source: &SourceText,
) -> Result<ir::Module, CompileError> {
    walk_module(&mut module, imported, source)?;
    Ok(module)
}

fn walk_module(module: &mut ir::Module, sigs: &HashMap<String, Signature>, source: &SourceText) -> Result<(), CompileError> {
    for decl in &mut module.declarations {
        match decl {
            ir::Declaration::Function(f) => resolve_block(&mut f.body, sigs, source)?,
            ir::Declaration::Variable(v) => resolve_expr(&mut v.init, sigs, source)?,
        }
    }
    Ok(())
}

fn collect_signatures(module: &ir::Module) -> HashMap<String, Signature> {
    module
        .declarations
        .iter()
        .filter_map(|d| match d {
            ir::Declaration::Function(f) => Some((f.name.clone(), Signature::of(f))),
            _ => None,
        })
        .collect()
}

fn resolve_block(block: &mut ir::Block, sigs: &HashMap<String, Signature>, source: &SourceText) -> Result<(), CompileError> {
    for stmt in &mut block.statements {
        resolve_stmt(stmt, sigs, source)?;
    }
    Ok(())
}

fn resolve_stmt(stmt: &mut ir::Stmt, sigs: &HashMap<String, Signature>, source: &SourceText) -> Result<(), CompileError> {
    match stmt {
        ir::Stmt::Function(f) => {
            let mut nested = sigs.clone();
            nested.insert(
                f.name.clone(),
                Signature { is_named: f.is_named, named_param_ids: f.named_param_ids.clone(), params: f.params.clone() },
            );
            resolve_block(&mut f.body, &nested, source)
        }
        ir::Stmt::Variable(v) => resolve_expr(&mut v.init, sigs, source),
        ir::Stmt::If(i) => {
            resolve_expr(&mut i.test, sigs, source)?;
            resolve_block(&mut i.consequent, sigs, source)?;
            if let Some(alt) = &mut i.alternate {
                resolve_block(alt, sigs, source)?;
            }
            Ok(())
        }
        ir::Stmt::Return(r) => {
            if let Some(e) = &mut r.argument {
                resolve_expr(e, sigs, source)?;
            }
            Ok(())
        }
        ir::Stmt::Expression(e) => resolve_expr(&mut e.expression, sigs, source),
    }
}

fn resolve_expr(expr: &mut ir::Expr, sigs: &HashMap<String, Signature>, source: &SourceText) -> Result<(), CompileError> {
    match expr {
        ir::Expr::Literal(_) | ir::Expr::Identifier(_) => Ok(()),
        ir::Expr::ArrayLiteral(items, _) => {
            for item in items {
                resolve_expr(item, sigs, source)?;
            }
            Ok(())
        }
        ir::Expr::ObjectLiteral(props, _) | ir::Expr::CallRecord(props, _) => {
            for (_, v) in props {
                resolve_expr(v, sigs, source)?;
            }
            Ok(())
        }
        ir::Expr::MemberExpression(m) => resolve_expr(&mut m.object, sigs, source),
        ir::Expr::BinaryExpression(b) => {
            resolve_expr(&mut b.left, sigs, source)?;
            resolve_expr(&mut b.right, sigs, source)
        }
        ir::Expr::CallExpression(call) => {
            resolve_expr(&mut call.callee, sigs, source)?;
            for arg in &mut call.arguments {
                resolve_expr(arg, sigs, source)?;
            }
            let ir::Expr::Identifier(callee_id) = &*call.callee else {
                return Ok(());
            };
            let Some(sig) = sigs.get(&callee_id.name) else {
                return Ok(());
            };
            if sig.is_named {
                resolve_keyed_call(call, sig, source)
            } else {
                resolve_positional_call(call, sig, source)
            }
        }
    }
}

fn resolve_positional_call(call: &mut ir::CallExpression, sig: &Signature, source: &SourceText) -> Result<(), CompileError> {
    let ir::Expr::Identifier(callee_id) = &*call.callee else { unreachable!() };
    if call.is_named_args {
        return Err(CompileError::new(
            ErrorKind::ConventionMismatch { callee: callee_id.name.clone() },
            source,
            call.span,
        ));
    }
    let required = sig.params.iter().filter(|p| p.default.is_none()).count();
    if call.arguments.len() < required || call.arguments.len() > sig.params.len() {
        return Err(CompileError::new(
            ErrorKind::ArityError {
                callee: callee_id.name.clone(),
                expected: format!("{} to {}", required, sig.params.len()),
                found: call.arguments.len(),
            },
            source,
            call.span,
        ));
    }
    Ok(())
}

/// Rewrites a keyed call — whether originally spelled positionally or with
/// `name:` markers — into a `CallExpression` whose sole argument is an
/// `ObjectLiteral` holding exactly the supplied properties, in declared
/// order, leaving unsupplied-but-defaulted parameters absent so the
/// generator's destructuring prologue can detect them by property
/// presence (spec.md §4.5).
fn resolve_keyed_call(call: &mut ir::CallExpression, sig: &Signature, source: &SourceText) -> Result<(), CompileError> {
    let ir::Expr::Identifier(callee_id) = &*call.callee else { unreachable!() };

    let supplied: Vec<(String, ir::Expr)> = if call.is_named_args {
        for name in call.argument_names.iter().flatten() {
            if !sig.named_param_ids.iter().any(|p| p == name) {
                return Err(CompileError::new(
                    ErrorKind::ConventionMismatch { callee: callee_id.name.clone() },
                    source,
                    call.span,
                ));
            }
        }
        let required_missing = sig.params.iter().any(|p| {
            p.default.is_none()
                && !call
                    .argument_names
                    .iter()
                    .flatten()
                    .any(|supplied_name| supplied_name == &p.name)
        });
        if required_missing {
            return Err(CompileError::new(
                ErrorKind::ArityError {
                    callee: callee_id.name.clone(),
                    expected: "every parameter without a default".into(),
                    found: call.arguments.len(),
                },
                source,
                call.span,
            ));
        }
        call.argument_names
            .iter()
            .cloned()
            .zip(call.arguments.iter().cloned())
            .filter_map(|(n, v)| n.map(|n| (n, v)))
            .collect()
    } else {
        if call.arguments.len() > sig.named_param_ids.len() {
            return Err(CompileError::new(
                ErrorKind::ArityError {
                    callee: callee_id.name.clone(),
                    expected: format!("at most {}", sig.named_param_ids.len()),
                    found: call.arguments.len(),
                },
                source,
                call.span,
            ));
        }
        sig.named_param_ids
            .iter()
            .cloned()
            .zip(call.arguments.iter().cloned())
            .collect()
    };

    let ordered = sig
        .named_param_ids
        .iter()
        .filter_map(|name| supplied.iter().find(|(n, _)| n == name).cloned())
        .collect::<Vec<_>>();

    call.callee = Box::new(ir::Expr::Identifier(callee_id.clone()));
    call.arguments = vec![ir::Expr::CallRecord(ordered, call.span)];
    call.is_named_args = false;
    call.argument_names = vec![None];
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(text: &str) -> ir::Module {
        let source = SourceText::new("t", text);
        let forms = crate::reader::parse(&source, 0).unwrap();
        let mut registry = crate::macros::MacroRegistry::with_builtins();
        let expanded =
            crate::macros::expand_program(forms, &mut registry, &source, crate::macros::DEFAULT_EXPANSION_BUDGET).unwrap();
        let desugared = crate::desugar::desugar_module(expanded, &source).unwrap();
        let lowered = crate::lower::lower_module(desugared, &source).unwrap();
        resolve_module(lowered, &source).unwrap()
    }

    fn find_fn<'a>(m: &'a ir::Module, name: &str) -> &'a ir::FunctionDeclaration {
        m.declarations
            .iter()
            .find_map(|d| match d {
                ir::Declaration::Function(f) if f.name == name => Some(f),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn positional_call_to_positional_callee_is_untouched() {
        let m = resolve("(defn add (x y) (+ x y)) (defn main () (add 1 2))");
        let main = find_fn(&m, "main");
        let ir::Stmt::Return(ir::ReturnStatement { argument: Some(ir::Expr::CallExpression(call)), .. }) = &main.body.statements[0] else {
            panic!("expected call")
        };
        assert_eq!(call.arguments.len(), 2);
        assert!(!call.is_named_args);
    }

    #[test]
    fn named_call_to_positional_callee_is_convention_mismatch() {
        let source = SourceText::new("t", "(defn add (x y) (+ x y)) (defn main () (add x: 1 y: 2))");
        let forms = crate::reader::parse(&source, 0).unwrap();
        let mut registry = crate::macros::MacroRegistry::with_builtins();
        let expanded =
            crate::macros::expand_program(forms, &mut registry, &source, crate::macros::DEFAULT_EXPANSION_BUDGET).unwrap();
        let desugared = crate::desugar::desugar_module(expanded, &source).unwrap();
        let lowered = crate::lower::lower_module(desugared, &source).unwrap();
        let err = resolve_module(lowered, &source).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ConventionMismatch { .. }));
    }

    #[test]
    fn positional_call_to_keyed_callee_is_zipped_into_an_object() {
        let m = resolve("(fx addn ((x: Int) (y: Int = 0)) (-> Int) (+ x y)) (defn main () (addn 5 7))");
        let main = find_fn(&m, "main");
        let ir::Stmt::Return(ir::ReturnStatement { argument: Some(ir::Expr::CallExpression(call)), .. }) = &main.body.statements[0] else {
            panic!("expected call")
        };
        let ir::Expr::CallRecord(props, _) = &call.arguments[0] else { panic!("expected call record") };
        assert_eq!(props.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn keyed_call_omits_defaulted_parameters_left_absent() {
        let m = resolve("(fx addn ((x: Int) (y: Int = 0)) (-> Int) (+ x y)) (defn main () (addn x: 5))");
        let main = find_fn(&m, "main");
        let ir::Stmt::Return(ir::ReturnStatement { argument: Some(ir::Expr::CallExpression(call)), .. }) = &main.body.statements[0] else {
            panic!("expected call")
        };
        let ir::Expr::CallRecord(props, _) = &call.arguments[0] else { panic!("expected call record") };
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].0, "x");
    }

    #[test]
    fn convention_symmetry_positional_and_keyed_calls_match() {
        let positional = resolve("(fx addn ((x: Int) (y: Int)) (-> Int) (+ x y)) (defn main () (addn 5 7))");
        let keyed = resolve("(fx addn ((x: Int) (y: Int)) (-> Int) (+ x y)) (defn main () (addn x: 5 y: 7))");
        let p_call = &find_fn(&positional, "main").body.statements[0];
        let k_call = &find_fn(&keyed, "main").body.statements[0];
        let ir::Stmt::Return(ir::ReturnStatement { argument: Some(p_expr), .. }) = p_call else { panic!() };
        let ir::Stmt::Return(ir::ReturnStatement { argument: Some(k_expr), .. }) = k_call else { panic!() };
        let ir::Expr::CallExpression(p) = p_expr else { panic!() };
        let ir::Expr::CallExpression(k) = k_expr else { panic!() };
        assert_eq!(p.arguments, k.arguments);
    }
}
