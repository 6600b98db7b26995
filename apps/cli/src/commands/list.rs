//! List command implementation.

use colored::Colorize;
use modelgate_core::PipelineConfig;
use modelgate_training::{StoreLayout, discover_published_models};

pub fn execute(config: &PipelineConfig, json_output: bool) -> anyhow::Result<i32> {
    let layout = StoreLayout::new(config.store_root(), &config.namespace())?;
    let entries = discover_published_models(&layout)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(0);
    }

    println!("{}", format!("Published models in {}", layout.namespace_dir().display()).bold().cyan());
    if entries.is_empty() {
        println!("  {}", "none".yellow());
        return Ok(0);
    }
    for entry in &entries {
        let sha = entry.metadata.sha256.get(..12).unwrap_or(&entry.metadata.sha256);
        println!(
            "  {}  {}  {} bytes  {}",
            entry.identity.to_string().green(),
            entry.metadata.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.metadata.size_bytes,
            sha.dimmed()
        );
    }
    Ok(0)
}
