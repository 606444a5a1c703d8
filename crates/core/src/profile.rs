//! Memory-constraint profile applied before the capability is constructed.
//!
//! ML runtimes read thread-pool and parallelism hints only once, when they
//! first initialise. The profile is therefore an explicit value handed to the
//! construction step instead of environment state set at import time.

use serde::{Deserialize, Serialize};

/// Where embedding computation runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeDevice {
    #[default]
    Cpu,
}

impl std::fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeDevice::Cpu => write!(f, "cpu"),
        }
    }
}

/// Resource hints for constructing the research capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryProfile {
    /// Whether the tokenizer may spawn its own worker threads
    pub tokenizer_parallelism: bool,

    /// Thread count for numeric libraries (BLAS, OpenMP, rayon)
    pub numeric_threads: usize,

    /// Device the embedding model runs on
    pub device: ComputeDevice,
}

impl MemoryProfile {
    /// The profile used on small hosts: no tokenizer threads, one numeric
    /// thread, CPU only.
    pub fn constrained() -> Self {
        Self {
            tokenizer_parallelism: false,
            numeric_threads: 1,
            device: ComputeDevice::Cpu,
        }
    }

    /// Process-wide environment variables that express this profile.
    pub fn env_hints(&self) -> Vec<(&'static str, String)> {
        let threads = self.numeric_threads.max(1).to_string();
        vec![
            ("TOKENIZERS_PARALLELISM", self.tokenizer_parallelism.to_string()),
            ("OMP_NUM_THREADS", threads.clone()),
            ("MKL_NUM_THREADS", threads.clone()),
            ("RAYON_NUM_THREADS", threads),
        ]
    }
}

impl Default for MemoryProfile {
    fn default() -> Self {
        Self::constrained()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constrained_profile_pins_everything() {
        let profile = MemoryProfile::constrained();
        assert!(!profile.tokenizer_parallelism);
        assert_eq!(profile.numeric_threads, 1);
        assert_eq!(profile.device, ComputeDevice::Cpu);
    }

    #[test]
    fn env_hints_cover_all_thread_pools() {
        let hints = MemoryProfile::default().env_hints();
        let get = |key: &str| {
            hints
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("TOKENIZERS_PARALLELISM"), Some("false"));
        assert_eq!(get("OMP_NUM_THREADS"), Some("1"));
        assert_eq!(get("MKL_NUM_THREADS"), Some("1"));
        assert_eq!(get("RAYON_NUM_THREADS"), Some("1"));
    }

    #[test]
    fn zero_threads_is_clamped_to_one() {
        let profile = MemoryProfile {
            numeric_threads: 0,
            ..MemoryProfile::default()
        };
        assert!(
            profile
                .env_hints()
                .iter()
                .all(|(k, v)| *k == "TOKENIZERS_PARALLELISM" || v == "1")
        );
    }
}
