//! Built-in macros installed in the process-wide scope, plus the
//! `defmacro` recognizer used by the expansion driver in `super::mod`.

use crate::ast::{AstNode, Expr, Span};
use crate::error::{CompileError, ErrorKind};

use super::registry::MacroHandler;
use super::ExpansionContext;

/// `cond` is a built-in macro (not a C4 lowering concern) so that the
/// kernel-closure property (spec.md §8.3) holds right after C3: by the
/// time C4 walks the tree, only plain `if` remains. See SPEC_FULL.md §2.
pub struct CondMacro;

impl MacroHandler for CondMacro {
    fn expand(&self, args: &[AstNode], span: &Span, ctx: &mut ExpansionContext) -> Result<AstNode, CompileError> {
        if args.len() % 2 != 0 {
            return Err(CompileError::new(
                ErrorKind::MacroRuntimeError {
                    name: "cond".into(),
                    detail: "expected an even number of test/consequent forms".into(),
                },
                ctx.source,
                *span,
            ));
        }
        Ok(build_nested_if(args, *span))
    }
}

fn build_nested_if(pairs: &[AstNode], span: Span) -> AstNode {
    let Some((test, rest)) = pairs.split_first() else {
        return Expr::NilLit.into_node(span);
    };
    let Some((consequent, rest)) = rest.split_first() else {
        return Expr::NilLit.into_node(span);
    };

    if matches!(test.value.as_symbol(), Some("true")) {
        return consequent.clone();
    }

    let else_branch = build_nested_if(rest, span);
    let if_symbol = Expr::Symbol("if".to_string()).into_node(span);
    Expr::List(vec![if_symbol, test.clone(), consequent.clone(), else_branch]).into_node(span)
}

/// Recognizes a top-level `(defmacro name (params...) body)` form without
/// expanding it. Returns `None` for anything else so the caller can treat
/// it as ordinary code.
pub fn parse_defmacro(form: &AstNode) -> Option<(String, Vec<String>, AstNode)> {
    let items = form.value.as_list()?;
    if items.len() != 4 {
        return None;
    }
    if items[0].value.as_symbol() != Some("defmacro") {
        return None;
    }
    let name = items[1].value.as_symbol()?.to_string();
    let param_items = items[2].value.as_list()?;
    let mut params = Vec::with_capacity(param_items.len());
    for p in param_items {
        params.push(p.value.as_symbol()?.to_string());
    }
    Some((name, params, items[3].clone()))
}
