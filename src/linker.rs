//! C7: Module Linker — discovers the module graph reachable from an entry
//! module, orders it topologically, publishes export tables, and wires
//! each `import` form to its exporter, per spec.md §4.7.
//!
//! No teacher module does cross-file linking (the teacher evaluates a
//! single script), so the graph/ordering logic below is grounded on this
//! crate's own `compiler` orchestration conventions; the parallel-across-
//! modules execution strategy follows SPEC_FULL.md §3's resolution of
//! spec.md §5's concurrency model: `std::thread::scope` over topologically
//! independent layers, no async runtime.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::config::CompileOptions;
use crate::error::{CompileError, ErrorKind, SourceText};
use crate::ir;

/// Abstracts where module source text comes from, so the graph-discovery
/// and ordering logic can be exercised in tests without touching the
/// filesystem.
pub trait ModuleSource: Sync {
    fn load(&self, specifier: &str) -> Result<SourceText, CompileError>;
}

/// Resolves peer-module specifiers against a root directory and reads them
/// from disk — the production `ModuleSource` the `glyphc` binary uses.
pub struct FsModuleSource {
    pub root: PathBuf,
}

impl ModuleSource for FsModuleSource {
    fn load(&self, specifier: &str) -> Result<SourceText, CompileError> {
        let path = self.root.join(specifier);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CompileError::new(
                ErrorKind::IOError { detail: format!("reading `{}`: {e}", path.display()) },
                &SourceText::new(specifier, ""),
                crate::ast::Span::default(),
            )
        })?;
        Ok(SourceText::new(specifier.to_string(), content))
    }
}

/// An in-memory `ModuleSource` for tests and for a single-shot in-process
/// compile where every module's text is already in hand.
pub struct MapModuleSource(pub HashMap<String, String>);

impl ModuleSource for MapModuleSource {
    fn load(&self, specifier: &str) -> Result<SourceText, CompileError> {
        self.0
            .get(specifier)
            .map(|content| SourceText::new(specifier.to_string(), content.clone()))
            .ok_or_else(|| {
                CompileError::new(
                    ErrorKind::MissingModule { specifier: specifier.to_string() },
                    &SourceText::new(specifier, ""),
                    crate::ast::Span::default(),
                )
            })
    }
}

/// One fully compiled module, ready for final text emission.
struct LinkedModule {
    specifier: String,
    ir: ir::Module,
    renames: HashMap<String, String>,
}

/// Compiles every module reachable from `entry_specifier`, in topological
/// order, returning each module's emitted text keyed by specifier.
/// Aggregates per-module failures (spec.md §7's linker propagation policy)
/// rather than stopping at the first one, since a cyclic-import or
/// missing-export failure is only knowable once the whole graph is known.
pub fn compile_graph(
    entry_specifier: &str,
    source_loader: &dyn ModuleSource,
    options: &CompileOptions,
) -> Result<Vec<(String, String)>, Vec<CompileError>> {
    let mut discovered: HashMap<String, ir::Module> = HashMap::new();
    let mut renames: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut errors = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(entry_specifier.to_string());
    let mut seen = HashSet::new();
    seen.insert(entry_specifier.to_string());

    while let Some(specifier) = queue.pop_front() {
        match load_and_compile_local(&specifier, source_loader, options) {
            Ok((module, module_renames)) => {
                for import in &module.imports {
                    if let ir::ImportSpecifier::Module(peer) = &import.specifier {
                        if seen.insert(peer.clone()) {
                            queue.push_back(peer.clone());
                        }
                    }
                }
                renames.insert(specifier.clone(), module_renames);
                discovered.insert(specifier, module);
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let layers = match topological_layers(&discovered) {
        Ok(layers) => layers,
        Err(e) => return Err(vec![e]),
    };

    let mut export_tables: HashMap<String, HashSet<String>> = HashMap::new();
    for (specifier, module) in &discovered {
        export_tables.insert(
            specifier.clone(),
            module.exports.iter().map(|e| e.exported_name.clone()).collect(),
        );
    }

    let export_signatures = collect_export_signatures(&discovered);

    for import_errs in discovered.iter().filter_map(|(specifier, module)| {
        validate_imports(specifier, module, &export_tables).err()
    }) {
        errors.push(import_errs);
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut linked: HashMap<String, LinkedModule> = HashMap::new();
    for layer in &layers {
        let results: Vec<Result<LinkedModule, CompileError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = layer
                .iter()
                .map(|specifier| {
                    let module = discovered[specifier].clone();
                    let module_renames = renames[specifier].clone();
                    let imported_sigs = collect_imported_signatures(&module, &export_signatures);
                    let specifier = specifier.clone();
                    scope.spawn(move || finish_module(specifier, module, module_renames, imported_sigs))
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("codegen does not panic")).collect()
        });
        for result in results {
            match result {
                Ok(module) => {
                    linked.insert(module.specifier.clone(), module);
                }
                Err(e) => errors.push(e),
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut out = Vec::with_capacity(linked.len());
    for layer in &layers {
        for specifier in layer {
            let module = linked.remove(specifier).expect("every discovered module was linked");
            let text = crate::codegen::generate_module(&module.ir, &module.renames);
            out.push((module.specifier, text));
        }
    }
    Ok(out)
}

/// Runs C1–C5 for one module's own source text — everything that does not
/// require visibility into *other* modules.
fn load_and_compile_local(
    specifier: &str,
    source_loader: &dyn ModuleSource,
    options: &CompileOptions,
) -> Result<(ir::Module, HashMap<String, String>), CompileError> {
    let source = source_loader.load(specifier)?;
    let forms = crate::reader::parse(&source, 0)?;
    let mut registry = crate::macros::MacroRegistry::with_builtins();
    let expanded = crate::macros::expand_program(forms, &mut registry, &source, options.macro_expansion_budget)?;
    let desugared = crate::desugar::desugar_module(expanded, &source)?;
    let renames = desugared.renames.clone();
    let lowered = crate::lower::lower_module(desugared, &source)?;
    let resolved = crate::resolver::resolve_module(lowered, &source)?;
    Ok((resolved, renames))
}

/// Builds the calling-convention signature of every function this module
/// imports, keyed by the *local* name the module calls it under, by reading
/// the exporting module's own declaration. Only imports whose target
/// actually resolves to a function contribute an entry; `validate_imports`
/// is what rejects a dangling or non-existent one.
fn collect_imported_signatures(
    module: &ir::Module,
    export_signatures: &HashMap<String, HashMap<String, crate::resolver::Signature>>,
) -> HashMap<String, crate::resolver::Signature> {
    let mut imported = HashMap::new();
    for import in &module.imports {
        let ir::ImportSpecifier::Module(peer) = &import.specifier else { continue };
        if let Some(sig) = export_signatures.get(peer).and_then(|table| table.get(&import.imported_name)) {
            imported.insert(import.local_name.clone(), sig.clone());
        }
    }
    imported
}

/// The calling-convention signature of every function each module exports,
/// keyed by specifier then by the name it is exported under (not its local
/// name) — the shape a peer module's `import` form resolves against.
fn collect_export_signatures(
    discovered: &HashMap<String, ir::Module>,
) -> HashMap<String, HashMap<String, crate::resolver::Signature>> {
    let mut export_signatures = HashMap::new();
    for (specifier, module) in discovered {
        let mut table = HashMap::new();
        for export in &module.exports {
            let func = module.declarations.iter().find_map(|d| match d {
                ir::Declaration::Function(f) if f.name == export.local_name => Some(f),
                _ => None,
            });
            if let Some(f) = func {
                table.insert(export.exported_name.clone(), crate::resolver::Signature::of(f));
            }
        }
        export_signatures.insert(specifier.clone(), table);
    }
    export_signatures
}

/// Re-resolves this module's cross-module calls now that every module's
/// export table is known, then hands the fully resolved IR onward.
/// Module-local calls were already resolved by C5; only calls whose callee
/// is an imported name are revisited here, against `imported_sigs`.
fn finish_module(
    specifier: String,
    module: ir::Module,
    renames: HashMap<String, String>,
    imported_sigs: HashMap<String, crate::resolver::Signature>,
) -> Result<LinkedModule, CompileError> {
    let source = SourceText::new(specifier.clone(), "");
    let module = crate::resolver::resolve_imported_calls(module, &imported_sigs, &source)?;
    Ok(LinkedModule { specifier, ir: module, renames })
}

/// Every `import` form must name an export the target module actually
/// publishes (spec.md §4.7's missing-export policy); the target module
/// itself is already known to exist because it was reachable during graph
/// discovery.
fn validate_imports(
    specifier: &str,
    module: &ir::Module,
    export_tables: &HashMap<String, HashSet<String>>,
) -> Result<(), CompileError> {
    for import in &module.imports {
        let ir::ImportSpecifier::Module(peer) = &import.specifier else { continue };
        let Some(exports) = export_tables.get(peer) else {
            return Err(CompileError::new(
                ErrorKind::MissingModule { specifier: peer.clone() },
                &SourceText::new(specifier, ""),
                import.span,
            ));
        };
        if !exports.contains(&import.imported_name) {
            return Err(CompileError::new(
                ErrorKind::MissingExport { module: peer.clone(), name: import.imported_name.clone() },
                &SourceText::new(specifier, ""),
                import.span,
            ));
        }
    }
    Ok(())
}

/// Kahn's algorithm, grouped into layers: each layer holds every module
/// whose dependencies are already satisfied by prior layers, so layers
/// within the returned `Vec` are mutually independent and may be compiled
/// concurrently (spec.md §5). A non-empty remainder after the algorithm
/// terminates means a cycle; the module names with unresolved in-degree
/// are reported as `CyclicImport`'s entry edges.
fn topological_layers(modules: &HashMap<String, ir::Module>) -> Result<Vec<Vec<String>>, CompileError> {
    let mut in_degree: HashMap<&str, usize> = modules.keys().map(|k| (k.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for (specifier, module) in modules {
        for import in &module.imports {
            if let ir::ImportSpecifier::Module(peer) = &import.specifier {
                if let Some(peer_key) = modules.get_key_value(peer).map(|(k, _)| k.as_str()) {
                    *in_degree.get_mut(specifier.as_str()).unwrap() += 1;
                    dependents.entry(peer_key).or_default().push(specifier.as_str());
                }
            }
        }
    }

    let mut layers = Vec::new();
    let mut remaining: HashSet<&str> = in_degree.keys().copied().collect();
    loop {
        let mut ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|m| in_degree[m] == 0)
            .collect();
        if ready.is_empty() {
            break;
        }
        ready.sort_unstable();
        for m in &ready {
            remaining.remove(m);
        }
        let mut next_in_degree = in_degree.clone();
        for m in &ready {
            if let Some(deps) = dependents.get(m) {
                for d in deps {
                    if remaining.contains(d) {
                        *next_in_degree.get_mut(d).unwrap() -= 1;
                    }
                }
            }
        }
        in_degree = next_in_degree;
        layers.push(ready.into_iter().map(String::from).collect());
    }

    if !remaining.is_empty() {
        let mut cycle: Vec<String> = remaining.into_iter().map(String::from).collect();
        cycle.sort();
        return Err(CompileError::new(
            ErrorKind::CyclicImport { modules: cycle },
            &SourceText::new("<graph>", ""),
            crate::ast::Span::default(),
        ));
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(pairs: &[(&str, &str)]) -> MapModuleSource {
        MapModuleSource(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn single_module_compiles_with_no_imports() {
        let src = sources(&[("main.hql", "(defn add (x y) (+ x y))")]);
        let out = compile_graph("main.hql", &src, &CompileOptions::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].1.contains("function add"));
    }

    #[test]
    fn two_module_graph_orders_dependency_first() {
        let src = sources(&[
            ("main.hql", "(import (helper) \"./util.hql\") (defn main () (helper 1))"),
            ("util.hql", "(defn helper (x) x) (export helper)"),
        ]);
        let out = compile_graph("main.hql", &src, &CompileOptions::default()).unwrap();
        let specifiers: Vec<_> = out.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(specifiers, vec!["util.hql", "main.hql"]);
    }

    #[test]
    fn cyclic_import_is_rejected() {
        let src = sources(&[
            ("a.hql", "(import (b) \"./b.hql\") (defn a () 1) (export a)"),
            ("b.hql", "(import (a) \"./a.hql\") (defn b () 1) (export b)"),
        ]);
        let errs = compile_graph("a.hql", &src, &CompileOptions::default()).unwrap_err();
        assert!(errs.iter().any(|e| matches!(e.kind, ErrorKind::CyclicImport { .. })));
    }

    #[test]
    fn missing_export_is_reported() {
        let src = sources(&[
            ("main.hql", "(import (nope) \"./util.hql\") (defn main () (nope))"),
            ("util.hql", "(defn helper (x) x) (export helper)"),
        ]);
        let errs = compile_graph("main.hql", &src, &CompileOptions::default()).unwrap_err();
        assert!(errs.iter().any(|e| matches!(e.kind, ErrorKind::MissingExport { .. })));
    }

    #[test]
    fn missing_module_is_reported() {
        let src = sources(&[("main.hql", "(import (helper) \"./ghost.hql\") (defn main () (helper 1))")]);
        let errs = compile_graph("main.hql", &src, &CompileOptions::default()).unwrap_err();
        assert!(errs.iter().any(|e| matches!(e.kind, ErrorKind::MissingModule { .. })));
    }

    #[test]
    fn positional_call_to_an_imported_keyed_function_is_zipped_into_an_object() {
        let src = sources(&[
            ("main.hql", "(import (addn) \"./util.hql\") (defn main () (addn 5 7))"),
            ("util.hql", "(fx addn ((x: Int) (y: Int = 0)) (-> Int) (+ x y)) (export addn)"),
        ]);
        let out = compile_graph("main.hql", &src, &CompileOptions::default()).unwrap();
        let (_, main_text) = out.iter().find(|(s, _)| s == "main.hql").unwrap();
        assert!(main_text.contains("addn({ x: 5, y: 7 })"), "got: {main_text}");
    }

    #[test]
    fn external_specifier_is_passed_through_unchanged() {
        let src = sources(&[("main.hql", "(import (fmt) \"left-pad\") (defn main () (fmt 1))")]);
        let out = compile_graph("main.hql", &src, &CompileOptions::default()).unwrap();
        assert!(out[0].1.contains("from \"left-pad\";"));
    }
}
