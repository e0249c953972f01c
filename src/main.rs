use std::env;
use std::process::ExitCode;

use cart_calc::csv::{read_catalog, read_events, read_rules, write_results};
use cart_calc::{Catalog, Config, PricingEngine, RuleSet, Session};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: cart-calc <events.csv>");
        return ExitCode::FAILURE;
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let engine = match load_engine() {
        Ok(engine) => engine,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let events = match read_events(path) {
        Ok(events) => events,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut session = Session::new(engine);
    let (event_sender, event_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in events {
            match result {
                Ok(event) => {
                    if event_sender.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    let results = session.run(ReceiverStream::new(event_receiver)).await;

    if let Err(e) = write_results(std::io::stdout().lock(), &results) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Build the engine from environment configuration and optional catalog and rule files.
fn load_engine() -> Result<PricingEngine, Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let catalog = match &config.catalog_path {
        Some(path) => read_catalog(path)?,
        None => Catalog::default(),
    };
    let rules = match &config.rules_path {
        Some(path) => read_rules(path)?,
        None => RuleSet::default(),
    };

    Ok(PricingEngine::new(catalog, rules, config.pricing))
}
