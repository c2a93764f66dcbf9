use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::database::SharedVectorStore;
use crate::embeddings::OllamaClient;
use crate::service::RagService;

/// Ingest a lecture file or a directory of lecture files into the index
#[inline]
pub async fn ingest(base_dir: &Path, path: &Path) -> Result<()> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;
    let service = RagService::connect(config)
        .await
        .context("Failed to start the lecture assistant")?;

    info!("Ingesting {}", path.display());
    let stats = service
        .indexer()
        .ingest_path(path)
        .await
        .with_context(|| format!("Failed to ingest {}", path.display()))?;

    println!("{}", style("✓ Ingestion complete").green());
    println!("  Documents indexed: {}", stats.documents_processed);
    println!("  Chunks created: {}", stats.chunks_created);
    println!("  Embeddings generated: {}", stats.embeddings_generated);
    if stats.documents_failed > 0 {
        println!(
            "  {}",
            style(format!("Skipped {} files:", stats.documents_failed)).yellow()
        );
        for (file, reason) in &stats.failed_sources {
            println!("    {} ({})", file.display(), style(reason).dim());
        }
    }

    service.shutdown().await.context("Failed to save the index")?;
    Ok(())
}

/// Answer a question from the indexed lectures and, unless disabled, the web
#[inline]
pub async fn ask(base_dir: &Path, question: &str, k: Option<usize>, no_web: bool) -> Result<()> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;
    let k = k.unwrap_or(config.retrieval.default_k);
    let use_web = config.web.enabled && !no_web;

    let service = RagService::connect(config)
        .await
        .context("Failed to start the lecture assistant")?;

    let report = service
        .answer_with_report(question, use_web, k)
        .await
        .context("Failed to answer the question")?;

    println!("{}", report.answer);
    println!();

    if !report.lecture_sources.is_empty() || !report.web_sources.is_empty() {
        println!("{}", style("Sources:").bold());
        for (i, source) in report.lecture_sources.iter().enumerate() {
            println!("  [L{}] {}", i + 1, source);
        }
        for (i, url) in report.web_sources.iter().enumerate() {
            println!("  [W{}] {}", i + 1, url);
        }
    }

    if report.dropped_lecture + report.dropped_web > 0 {
        eprintln!(
            "{}",
            style(format!(
                "Note: {} lecture and {} web excerpts were left out to fit the model's input budget",
                report.dropped_lecture, report.dropped_web
            ))
            .dim()
        );
    }
    for failure in &report.web_failures {
        eprintln!(
            "{}",
            style(format!("Web source skipped: {} ({})", failure.source, failure.reason)).dim()
        );
    }

    Ok(())
}

/// Show the index contents and model connectivity
#[inline]
pub async fn show_status(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir).unwrap_or_else(|_| Config::with_base_dir(base_dir));

    println!("📊 Lecture RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗂️  Index Status:");
    match SharedVectorStore::open(config.index_path()).await {
        Ok(store) => {
            let stats = store.stats().await;
            println!("   ✅ Index: {}", store.location().display());
            println!("   📄 Documents: {}", stats.sources);
            println!("   🧩 Chunks: {}", stats.entries);
            match stats.dimension {
                Some(dimension) => println!("   🔢 Dimension: {}", dimension),
                None => println!("   🔢 Dimension: (empty index)"),
            }
        }
        Err(e) => {
            println!("   ❌ Index: {}", e);
        }
    }

    println!();
    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match tokio::task::spawn_blocking(move || client.health_check()).await? {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Embedding model: {}", config.ollama.embedding_model);
                println!("   📋 Generation model: {}", config.ollama.generation_model);
            }
            Err(e) => {
                println!("   ⚠️  Ollama: Unavailable - {:#}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Invalid configuration - {}", e);
        }
    }

    println!();
    println!(
        "🌐 Web search: {}",
        if config.web.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    Ok(())
}
