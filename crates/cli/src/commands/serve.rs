//! `deepresearch serve`: Start the HTTP API server.

use deepresearch_config::AppConfig;

pub async fn run(
    mut config: AppConfig,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.server.port = port;
    }

    println!("🔎 Deep Researcher API");
    println!("   Listening: {}", config.listen_addr());
    println!("   Mode:      {}", config.research.mode);

    deepresearch_gateway::start(config).await?;

    Ok(())
}
