use std::{env, io::ErrorKind, process::ExitCode};

use anyhow::Context;
use bloodwork_server::config::loader::{DEFAULT_CONFIG_FILE, load_config};
use bloodwork_server::{AppConfig, ServerBuilder, observability};

const CONFIG_ENV: &str = "BLOODWORK_CONFIG";

/// Config file location: `--config <path>`, then `$BLOODWORK_CONFIG`, then
/// `bloodwork.toml` in the working directory.
fn config_location() -> (String, &'static str) {
    let args: Vec<String> = env::args().skip(1).collect();
    if let Some(path) = args
        .windows(2)
        .find(|pair| pair[0] == "--config")
        .map(|pair| pair[1].clone())
    {
        return (path, "--config");
    }
    match env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => (path, CONFIG_ENV),
        _ => (DEFAULT_CONFIG_FILE.to_owned(), "default"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match dotenvy::dotenv() {
        Err(dotenvy::Error::Io(e)) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => eprintln!("ignoring unreadable .env: {e}"),
        Ok(_) => {}
    }

    observability::init_tracing();

    let (path, origin) = config_location();
    let cfg = match load_config(Some(&path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("invalid configuration ({path}): {e}");
            return ExitCode::from(2);
        }
    };

    if env::args().any(|a| a == "--print-config") {
        return match toml::to_string_pretty(&cfg) {
            Ok(rendered) => {
                println!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("cannot render configuration: {e}");
                ExitCode::from(2)
            }
        };
    }

    observability::apply_logging_level(&cfg.logging.level);
    tracing::info!(%path, origin, "configuration loaded");

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    ServerBuilder::new()
        .with_config(cfg)
        .build()
        .context("building server")?
        .run()
        .await
}
