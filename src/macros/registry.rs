//! Macro environment: a process-wide built-in scope plus a per-compilation
//! scope seeded by `defmacro` — the two disjoint scopes spec.md §3
//! describes. Grounded on the teacher's `MacroRegistry`/`MacroHandler`
//! split in `macroexpander.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{AstNode, Expr, Span};
use crate::error::CompileError;

use super::{builtins, ExpansionContext, Hygiene};

/// A macro transformer: takes unevaluated argument ASTs and the call span,
/// returns the rewritten AST. Represented as an interface object — the
/// compiler never relies on reflection to dispatch to user vs. built-in
/// macros.
pub trait MacroHandler: Send + Sync {
    fn expand(&self, args: &[AstNode], span: &Span, ctx: &mut ExpansionContext) -> Result<AstNode, CompileError>;
}

#[derive(Default)]
pub struct MacroRegistry {
    builtin: HashMap<String, Arc<dyn MacroHandler>>,
    user: HashMap<String, Arc<dyn MacroHandler>>,
}

impl MacroRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.install_builtins();
        registry
    }

    fn install_builtins(&mut self) {
        self.builtin.insert("cond".to_string(), Arc::new(builtins::CondMacro));
    }

    pub fn register_user(&mut self, name: String, handler: Arc<dyn MacroHandler>) {
        self.user.insert(name, handler);
    }

    /// User macros shadow built-ins of the same name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn MacroHandler>> {
        self.user.get(name).or_else(|| self.builtin.get(name))
    }

    pub fn is_known_macro_name(&self, name: &str) -> bool {
        self.user.contains_key(name) || self.builtin.contains_key(name)
    }
}

/// A `defmacro`-declared macro: a template body with formal parameters,
/// expanded by plain positional substitution. A template's own `quote` is
/// consumed by substitution (see `substitute` below); `quasiquote` is left
/// for the ordinary quasiquote-expansion pass that follows, since building
/// code with backtick/unquote is a distinct, later step from this one.
pub struct UserTemplateMacro {
    pub params: Vec<String>,
    pub body: AstNode,
}

impl MacroHandler for UserTemplateMacro {
    fn expand(&self, args: &[AstNode], span: &Span, ctx: &mut ExpansionContext) -> Result<AstNode, CompileError> {
        if args.len() != self.params.len() {
            return Err(CompileError::new(
                crate::error::ErrorKind::MacroRuntimeError {
                    name: "defmacro".into(),
                    detail: format!(
                        "expected {} argument(s), got {}",
                        self.params.len(),
                        args.len()
                    ),
                },
                ctx.source,
                *span,
            ));
        }
        let mut env = HashMap::with_capacity(self.params.len());
        for (param, arg) in self.params.iter().zip(args.iter()) {
            env.insert(param.clone(), arg.clone());
        }
        Ok(substitute(&self.body, &env, &mut ctx.hygiene))
    }
}

/// A template's own `quote` — either the reader-sugar `'x` spelling or the
/// literal `(quote x)` list spelling — is consumed by substitution rather
/// than rewrapped: it marks "this is the code to emit", the standard
/// build-code-with-quote idiom, not a request for a persistently-quoted
/// value in the expansion (spec.md §4.2's macro semantics).
///
/// A `let` the template introduces is renamed through `hygiene.gensym` so
/// the binding can never capture, or be captured by, a call-site argument
/// of the same name; everything else is plain positional substitution.
fn substitute(node: &AstNode, env: &HashMap<String, AstNode>, hygiene: &mut Hygiene) -> AstNode {
    match &*node.value {
        Expr::Symbol(name) => env.get(name).cloned().unwrap_or_else(|| node.clone()),
        Expr::Quote(inner) => substitute(inner, env, hygiene),
        Expr::List(items) if is_quote_form(items) => substitute(&items[1], env, hygiene),
        Expr::List(items) if is_let_form(items) => substitute_let(items, node.span, env, hygiene),
        Expr::List(items) => {
            Expr::List(items.iter().map(|item| substitute(item, env, hygiene)).collect()).into_node(node.span)
        }
        Expr::Quasiquote(inner) => Expr::Quasiquote(Box::new(substitute(inner, env, hygiene))).into_node(node.span),
        Expr::Unquote(inner) => Expr::Unquote(Box::new(substitute(inner, env, hygiene))).into_node(node.span),
        Expr::UnquoteSplicing(inner) => {
            Expr::UnquoteSplicing(Box::new(substitute(inner, env, hygiene))).into_node(node.span)
        }
        _ => node.clone(),
    }
}

fn is_quote_form(items: &[AstNode]) -> bool {
    items.len() == 2 && matches!(items[0].value.as_symbol(), Some("quote"))
}

fn is_let_form(items: &[AstNode]) -> bool {
    items.len() == 3
        && matches!(items[0].value.as_symbol(), Some("let"))
        && items[1].value.as_list().is_some()
}

/// Substitutes through a template-introduced `(let ((name init)...) body)`,
/// gensym-renaming each bound name in the bindings and body so it can't
/// collide with a call-site argument substituted into the same template.
/// Bindings are sequential (each one's init sees the prior ones' renames),
/// matching the kernel `let` lowering this expands into.
fn substitute_let(items: &[AstNode], span: Span, env: &HashMap<String, AstNode>, hygiene: &mut Hygiene) -> AstNode {
    let bindings = items[1].value.as_list().expect("is_let_form checked this");
    let mut scoped_env = env.clone();
    let mut fresh_bindings = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let Some(pair) = binding.value.as_list().filter(|p| p.len() == 2) else {
            fresh_bindings.push(substitute(binding, &scoped_env, hygiene));
            continue;
        };
        let Some(name) = pair[0].value.as_symbol() else {
            fresh_bindings.push(substitute(binding, &scoped_env, hygiene));
            continue;
        };
        let init = substitute(&pair[1], &scoped_env, hygiene);
        let fresh_name = hygiene.gensym(name);
        let fresh_symbol = Expr::Symbol(fresh_name).into_node(pair[0].span);
        scoped_env.insert(name.to_string(), fresh_symbol.clone());
        fresh_bindings.push(Expr::List(vec![fresh_symbol, init]).into_node(binding.span));
    }
    let bindings_node = Expr::List(fresh_bindings).into_node(items[1].span);
    let body = substitute(&items[2], &scoped_env, hygiene);
    Expr::List(vec![items[0].clone(), bindings_node, body]).into_node(span)
}
