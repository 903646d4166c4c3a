//! Esprof CLI

use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use esprof::config::Config;
use esprof::network::{EsRequest, ProfiledClient};
use esprof::SessionManager;

const USAGE: &str = "\
Usage: esprof [--config <path>] <command> [options]

Commands:
  request <METHOD> <PATH> [BODY]   Send one request and print its profile
  check-config                     Validate and print the configuration";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(std::env::args().skip(1).collect()).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(mut args: Vec<String>) -> anyhow::Result<()> {
    let config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            if i + 1 >= args.len() {
                bail!("--config requires a path\n\n{USAGE}");
            }
            let path = PathBuf::from(args.remove(i + 1));
            args.remove(i);
            Config::from_file(&path)
                .with_context(|| format!("loading config from {}", path.display()))?
        }
        None => Config::default(),
    };

    let Some(command) = args.first() else {
        eprintln!("Esprof v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("{USAGE}");
        process::exit(1);
    };

    match command.as_str() {
        "request" => {
            let (Some(method), Some(path)) = (args.get(1), args.get(2)) else {
                bail!("request needs <METHOD> and <PATH>\n\n{USAGE}");
            };
            let mut request = EsRequest::new(method.to_uppercase(), path.clone());
            if let Some(body) = args.get(3) {
                request = request.with_body(body.clone().into_bytes());
            }
            send_profiled(&config, &request).await
        }
        "check-config" => {
            config.validate()?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        _ => bail!("Unknown command: {command}\n\n{USAGE}"),
    }
}

async fn send_profiled(config: &Config, request: &EsRequest) -> anyhow::Result<()> {
    let manager = SessionManager::new(config.limits.clone());
    let client = ProfiledClient::from_config(config);

    let name = format!("{} {}", request.method, request.path);
    let session = manager.start(&name)?;
    let exchange = {
        let _step = session.step("elasticsearch request");
        client.send(request, Some(&*session)).await?
    };
    let session = manager.finish(&name).unwrap_or(session);

    print!("{}", session.render_plain_text());
    for timing in session.snapshot().root.all_custom_timings() {
        println!();
        println!("{}", timing.command_string);
    }

    if !exchange.success {
        bail!(
            "request failed with status {}",
            exchange.status_code_or_zero()
        );
    }
    Ok(())
}
