//! `deepresearch status`: Show configuration and model cache state.

use deepresearch_config::{AppConfig, ResearchMode};
use deepresearch_providers::ModelCache;
use deepresearch_providers::corpus::document_paths;

pub fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let cache = ModelCache::from_config(&config.model);

    println!("🔎 Deep Researcher Status");
    println!("========================");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Listen:        {}", config.listen_addr());
    println!("  Mode:          {}", config.research.mode);
    println!("  Init timeout:  {}s", config.research.init_timeout_secs);
    println!("  Body limit:    {} bytes", config.server.body_limit_bytes);
    println!("  Model:         {}", config.model.repo_id);
    println!("  Model cache:   {}", cache.model_dir().display());
    println!("  Corpus:        {}", config.model.corpus_dir.display());
    println!(
        "  Local build:   {}",
        if cfg!(feature = "local") { "yes" } else { "no" }
    );

    if cache.is_cached() {
        println!("\n  ✅ Model files cached");
    } else {
        println!(
            "\n  ⚠️  Missing model files: {} (run `deepresearch prepare-model`)",
            cache.missing_files().join(", ")
        );
    }

    match document_paths(&config.model.corpus_dir) {
        Ok(docs) => println!("  📄 Corpus documents: {}", docs.len()),
        Err(e) => println!("  ⚠️  Corpus unreadable: {e}"),
    }

    if config.research.mode == ResearchMode::Embedding && !cfg!(feature = "local") {
        println!("\n  ⚠️  Embedding mode needs a build with `--features local`; /research will fail");
    }

    Ok(())
}
