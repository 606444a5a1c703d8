//! `deepresearch prepare-model`: Fill the model cache before first load.

use deepresearch_config::AppConfig;
use deepresearch_providers::ModelCache;

#[cfg(feature = "local")]
pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    use deepresearch_providers::cache::{Prepared, prepare_model};

    let cache = ModelCache::from_config(&config.model);
    println!("📦 Preparing {}", cache.repo_id);

    // hf-hub's sync API blocks on network I/O.
    let prepared = tokio::task::spawn_blocking(move || prepare_model(&cache)).await??;

    match prepared {
        Prepared::AlreadyCached(dir) => println!("   ✅ Already cached at {}", dir.display()),
        Prepared::Downloaded(dir) => println!("   ✅ Downloaded to {}", dir.display()),
    }
    Ok(())
}

#[cfg(not(feature = "local"))]
pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let cache = ModelCache::from_config(&config.model);
    Err(format!(
        "prepare-model needs a build with `--features local` (model {} would go to {})",
        cache.repo_id,
        cache.model_dir().display()
    )
    .into())
}
