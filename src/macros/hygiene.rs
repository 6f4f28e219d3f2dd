//! Gensym-based hygiene: fresh identifiers for macro-introduced bindings,
//! one counter per module compilation (spec.md §5) so output stays
//! deterministic across repeated compiles of the same source.

/// Produces collision-free identifiers by tagging a stable prefix with a
/// monotonically increasing integer, as spec.md §4.2 requires.
pub struct Hygiene {
    counter: u32,
}

impl Hygiene {
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    pub fn gensym(&mut self, base: &str) -> String {
        let id = self.counter;
        self.counter += 1;
        format!("{base}_gensym_{id}")
    }
}

impl Default for Hygiene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gensym_is_unique_and_deterministic_per_counter_state() {
        let mut h = Hygiene::new();
        assert_eq!(h.gensym("tmp"), "tmp_gensym_0");
        assert_eq!(h.gensym("tmp"), "tmp_gensym_1");
    }
}
