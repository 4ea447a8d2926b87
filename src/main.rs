// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::fs;
use std::io::{self, Write};
use std::time::Instant;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;
use wiretree::config::{load_and_validate_config, RuntimeBuilder};
use wiretree::element::Element;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the rewritten message.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <config.yaml> <message-file>", args[0]);
        eprintln!("Example: {} wiretree.yaml captured-request.bin > rewritten.bin", args[0]);
        bail!("expected a configuration file and a message file");
    }
    let (config_path, message_path) = (&args[1], &args[2]);

    let config = load_and_validate_config(config_path)
        .with_context(|| format!("loading {}", config_path))?;
    let runtime = RuntimeBuilder::from_config(&config)?;

    let message =
        fs::read(message_path).with_context(|| format!("reading {}", message_path))?;

    let started = Instant::now();
    let root = runtime
        .converter
        .convert(message, None)
        .with_context(|| format!("converting {}", message_path))?;
    tracing::info!(
        elements = root.children().len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Parse tree:\n{}",
        Element::render_tree(&root)
    );

    let report = runtime
        .modifier
        .apply_modifications(&root, &runtime.registry);
    for (name, error) in &report.failures {
        tracing::warn!(modification = name.as_str(), "{}", error);
    }
    if report.changed() {
        tracing::info!(
            applied = report.applied.join(", "),
            "Rewritten tree:\n{}",
            Element::render_tree(&report.root)
        );
    }

    let mut stdout = io::stdout().lock();
    stdout.write_all(report.bytes())?;
    stdout.flush()?;
    Ok(())
}
