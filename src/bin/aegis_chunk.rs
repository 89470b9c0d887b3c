//! Aegis Chunk CLI
//!
//! Reads an OCR layout result (JSON), maps it into a geometric manifest,
//! optionally unions grid-detected tables, and writes one JSON chunk per
//! line to stdout. Logs go to stderr.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `AEGIS_TARGET_TOKENS`: target tokens per chunk (default: 512)
//! - `AEGIS_HARD_MAX_TOKENS`: hard cap on preserved structures (default: target * 1.2)
//! - `AEGIS_OVERLAP_TOKENS`: overlap between chunks (default: 0)
//! - `AEGIS_GRID_LAW`: "0" disables geometric table detection (default: enabled)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! AEGIS_TARGET_TOKENS=256 cargo run --bin aegis_chunk -- layout.json > chunks.jsonl
//! ```

use std::io::{self, BufWriter, Read, Write};
use std::time::Instant;

use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aegis_integrity::{
    ChunkingPolicy, GridLawDetector, IntegrityPipe, LayoutAdapter, LayoutDocument,
    MANIFEST_SCHEMA_VERSION,
};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "aegis_chunk=info,aegis_integrity=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .flatten_event(true),
            )
            .init();
    }
}

fn env_usize(name: &str) -> Option<usize> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(variable = name, value = %raw, "ignoring unparsable value");
                None
            }
        },
        Err(_) => None,
    }
}

/// Build the chunking policy from the environment
fn policy_from_env() -> ChunkingPolicy {
    let mut policy = ChunkingPolicy::new(env_usize("AEGIS_TARGET_TOKENS").unwrap_or(512));
    if let Some(hard_max) = env_usize("AEGIS_HARD_MAX_TOKENS") {
        policy = policy.with_hard_max(hard_max);
    }
    if let Some(overlap) = env_usize("AEGIS_OVERLAP_TOKENS") {
        policy = policy.with_overlap(overlap);
    }
    policy
}

fn read_input(path: Option<&str>) -> io::Result<String> {
    match path {
        Some(path) if path != "-" => std::fs::read_to_string(path),
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let started = Instant::now();
    let policy = policy_from_env();
    policy.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        schema = MANIFEST_SCHEMA_VERSION,
        target_tokens = policy.target_tokens,
        hard_max_tokens = policy.effective_hard_max(),
        overlap_tokens = policy.overlap_tokens,
        params_hash = %policy.params_hash(),
        "Starting Aegis chunker"
    );

    let input_path = std::env::args().nth(1);
    let raw = read_input(input_path.as_deref())?;
    let document = LayoutDocument::from_json(&raw)?;

    let mut manifest = LayoutAdapter::new().to_manifest(&document);
    if std::env::var("AEGIS_GRID_LAW").map(|v| v != "0").unwrap_or(true) {
        // Adapter ordinals equal manifest positions, so detected ranges apply directly
        let detected = GridLawDetector::default().detect_pages(manifest.atoms());
        info!(detected = detected.len(), "grid law detection complete");
        manifest.extend_structures(detected);
    }

    info!(
        atoms = manifest.len(),
        structures = manifest.structures().len(),
        fingerprint = %manifest.fingerprint(),
        "manifest ready"
    );

    let pipe = IntegrityPipe::new(manifest);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut emitted = 0usize;

    for chunk in pipe.generate(&policy)? {
        serde_json::to_writer(&mut out, &chunk)?;
        out.write_all(b"\n")?;
        emitted += 1;
    }
    out.flush()?;

    info!(
        chunks = emitted,
        latency_ms = started.elapsed().as_millis() as u64,
        "Aegis chunker complete"
    );

    Ok(())
}
