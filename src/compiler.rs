//! Orchestration layer — wires C1 through C7 into the handful of entry
//! points `glyphc` (and any embedder) actually calls. Grounded on the
//! teacher's `engine.rs`, whose `run_sutra_source_with_output` is the same
//! shape: read source, run every stage in order, hand back a result without
//! printing anything itself. Unlike the teacher's single-script engine,
//! compilation here always goes through the module linker (C7), even for an
//! entry file with no imports — a zero-import graph is just a graph with one
//! module.

use std::path::{Path, PathBuf};

use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::linker::{self, FsModuleSource};

/// One compiled module's output: where it should be written and the
/// generated ECMAScript text.
pub struct CompiledModule {
    pub path: PathBuf,
    pub text: String,
}

/// Compiles the module graph reachable from `entry`, returning one
/// `CompiledModule` per discovered source file. The entry file is always
/// `outputs[0]`. Peer modules are emitted alongside their `.hql` source
/// with a swapped `.js` extension; the caller may relocate the entry's
/// output with `with_entry_output`.
pub fn compile_file(entry: &Path, options: &CompileOptions) -> Result<Vec<CompiledModule>, Vec<CompileError>> {
    let root = options
        .module_root
        .clone()
        .or_else(|| entry.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let entry_specifier = entry
        .strip_prefix(&root)
        .unwrap_or(entry)
        .to_string_lossy()
        .into_owned();

    let source_loader = FsModuleSource { root: root.clone() };
    let compiled = linker::compile_graph(&entry_specifier, &source_loader, options)?;

    Ok(compiled
        .into_iter()
        .map(|(specifier, text)| CompiledModule { path: js_output_path(&root, &specifier), text })
        .collect())
}

/// Swaps a peer module's source extension for `.js` and resolves it against
/// the module root, mirroring `codegen::js_module_specifier`'s source-side
/// rule for the same rename.
fn js_output_path(root: &Path, specifier: &str) -> PathBuf {
    let mut path = root.join(specifier);
    path.set_extension("js");
    path
}

/// Writes every compiled module to disk, creating parent directories as
/// needed. Used by the `glyphc` binary; library consumers that only want
/// the generated text can use `compile_file` directly.
pub fn write_outputs(outputs: &[CompiledModule]) -> std::io::Result<()> {
    for module in outputs {
        if let Some(parent) = module.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&module.path, &module.text)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_output_path_swaps_extension() {
        let root = PathBuf::from("/proj");
        assert_eq!(js_output_path(&root, "main.hql"), PathBuf::from("/proj/main.js"));
    }
}
