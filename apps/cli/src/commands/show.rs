//! Show command implementation.

use super::render;
use colored::Colorize;
use modelgate_core::PipelineConfig;
use modelgate_core::pipeline::EXIT_DATA;
use modelgate_training::{ArtifactIdentity, StoreLayout, resolve_published_model};

pub fn execute(config: &PipelineConfig, identity: &str, json_output: bool) -> anyhow::Result<i32> {
    let layout = StoreLayout::new(config.store_root(), &config.namespace())?;
    let identity = ArtifactIdentity::parse(identity)?;

    let Some(entry) = resolve_published_model(&layout, &identity)? else {
        render::error(&format!("nothing published under {identity} in {}", layout.namespace_dir().display()));
        return Ok(EXIT_DATA);
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(0);
    }

    let md = &entry.metadata;
    println!("{}", format!("Model {}", entry.identity).bold().cyan());
    println!("  Location:    {}", entry.model_path.display().to_string().green());
    println!("  Run:         {}", md.run_id);
    println!("  Commit:      {}", md.source_commit);
    println!("  Created:     {}", md.created_at.to_rfc3339());
    println!("  Size:        {} bytes", md.size_bytes);
    println!("  SHA-256:     {}", md.sha256);
    if let Some(fp) = &md.dataset_fingerprint {
        println!("  Dataset:     {}", fp.to_string().dimmed());
    }
    Ok(0)
}
