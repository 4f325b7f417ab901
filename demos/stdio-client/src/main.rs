//! Stdio MCP Client Demo
//!
//! Launches an MCP server as a child process, lists its prompts, resources
//! and tools, calls one tool, and prints the results.
//!
//! ```text
//! stdio-client [--config client.json] <command> [args...]
//! ```
//!
//! The tool is chosen with `MCPIPE_TOOL` (default `read_file`) and receives
//! `{"path": MCPIPE_PATH}` (default `test.md`). Logs go to stderr and are
//! filtered with `RUST_LOG`.

use anyhow::{Context, bail};
use mcpipe_client::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config = if args.first().map(String::as_str) == Some("--config") {
        if args.len() < 2 {
            bail!("--config needs a file");
        }
        let path = args.remove(1);
        args.remove(0);
        ClientConfig::from_file(&path).with_context(|| format!("loading {path}"))?
    } else {
        ClientConfig::default()
    };

    let server = match args.split_first() {
        Some((command, rest)) => ServerParameters::new(command.as_str()).with_args(rest.iter().cloned()),
        None => match config.server.clone() {
            Some(server) => server,
            None => bail!("usage: stdio-client [--config client.json] <command> [args...]"),
        },
    };

    let tool = std::env::var("MCPIPE_TOOL").unwrap_or_else(|_| "read_file".to_string());
    let path = std::env::var("MCPIPE_PATH").unwrap_or_else(|_| "test.md".to_string());

    let client = McpClientBuilder::from_config(config).build()?;
    client
        .connect(server.clone())
        .await
        .with_context(|| format!("connecting to {}", server.command))?;

    let outcome = run(&client, &tool, &path).await;
    client.close().await?;
    outcome
}

async fn run(client: &McpClient, tool: &str, path: &str) -> anyhow::Result<()> {
    if let Some(server) = client.server_info().await {
        println!("Connected to {} {}", server.name, server.version);
    }

    for kind in CapabilityKind::ALL {
        let descriptors = match client.list_capabilities(kind).await {
            Ok(descriptors) => descriptors,
            Err(Error::Remote(e)) => {
                println!("{kind}: not available ({e})");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        println!("{kind}:");
        for descriptor in &descriptors {
            match &descriptor.description {
                Some(description) => println!("  - {}: {}", descriptor.target(), description),
                None => println!("  - {}", descriptor.target()),
            }
        }
    }

    let arguments = json!({ "path": path })
        .as_object()
        .cloned()
        .unwrap_or_default();
    match client.invoke(CapabilityKind::Tools, tool, arguments).await {
        Ok(result) => println!("{tool} returned:\n{}", result.text()),
        Err(Error::Remote(e)) => println!("{tool} failed: {e}"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
