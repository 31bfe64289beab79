use anyhow::{Context, Result};
use std::path::PathBuf;
use vite_ssg_core::{RunRequest, SsgRequest};
use vite_ssg_pipeline::Pipeline;

/// Generate one bundle from the command line and print where it landed.
pub async fn run(repo_url: String, routes: Vec<String>, config: Option<PathBuf>) -> Result<()> {
    let config = super::load(config)?;

    let request = RunRequest::try_from(SsgRequest {
        repo_url: Some(repo_url),
        routes: Some(routes),
    })?;

    println!("⚡ Generating static bundle...");
    println!("   Repository: {}", request.repo_url);
    println!(
        "   Routes: {}",
        request
            .routes
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let pipeline = Pipeline::from_config(&config);
    // the preview server runs in its own process group and never sees the
    // terminal's SIGINT, so stop it from here
    let outcome = pipeline
        .run_until(request, super::ctrl_c())
        .await
        .context("Static generation failed")?;

    println!("\n✅ Bundle ready");
    for document in &outcome.documents {
        println!("   📄 {}", document.display());
    }
    println!(
        "   📦 {} assets ({} skipped)",
        outcome.assets.copied.len(),
        outcome.assets.skipped
    );
    if !outcome.assets.collisions.is_empty() {
        println!(
            "   ⚠ {} asset name collisions, last copy kept",
            outcome.assets.collisions.len()
        );
    }
    println!("{}", outcome.out_dir.display());

    Ok(())
}
