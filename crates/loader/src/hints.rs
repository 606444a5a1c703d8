//! Applying a [`MemoryProfile`] to the process before construction.

use deepresearch_core::MemoryProfile;
use tracing::debug;

/// Applies memory-constraint hints ahead of capability construction.
///
/// The loader calls `apply` at most once per process.
pub trait HintApplier: Send + Sync {
    fn apply(&self, profile: &MemoryProfile);
}

/// Writes the profile into the process environment, where tokenizer and
/// BLAS/OpenMP/rayon runtimes read it on first initialisation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl HintApplier for ProcessEnv {
    fn apply(&self, profile: &MemoryProfile) {
        for (key, value) in profile.env_hints() {
            debug!(key, value = %value, "Applying memory hint");
            // SAFETY: called once, from the loader's single construction path,
            // before any model library has been initialised. No other code in
            // this workspace reads these variables concurrently.
            unsafe { std::env::set_var(key, &value) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_env_sets_thread_hints() {
        ProcessEnv.apply(&MemoryProfile::constrained());
        assert_eq!(std::env::var("TOKENIZERS_PARALLELISM").unwrap(), "false");
        assert_eq!(std::env::var("OMP_NUM_THREADS").unwrap(), "1");
        assert_eq!(std::env::var("MKL_NUM_THREADS").unwrap(), "1");
    }
}
