//! Compiler configuration. Holds the knobs spec.md calls out as
//! configurable (the macro expansion budget, §4.2) plus the module-root
//! resolution setting the linker (C7) uses to turn an `import` specifier
//! into a file to load. No file-based config format is introduced —
//! options are always constructed programmatically or from CLI flags, per
//! SPEC_FULL.md §1.

use std::path::PathBuf;

/// Per-compilation options threaded through the orchestration layer.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Per-form macro expansion budget (spec.md §4.2). Default 64.
    pub macro_expansion_budget: usize,
    /// Root directory peer-module specifiers are resolved against. Defaults
    /// to the entry module's parent directory.
    pub module_root: Option<PathBuf>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            macro_expansion_budget: crate::macros::DEFAULT_EXPANSION_BUDGET,
            module_root: None,
        }
    }
}

impl CompileOptions {
    pub fn with_macro_expansion_budget(mut self, budget: usize) -> Self {
        self.macro_expansion_budget = budget;
        self
    }

    pub fn with_module_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.module_root = Some(root.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_matches_spec() {
        assert_eq!(CompileOptions::default().macro_expansion_budget, 64);
    }
}
