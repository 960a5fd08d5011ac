use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::path::PathBuf;

use pow_ledger::api::{self, ApiDoc};
use pow_ledger::blockchain::{Blockchain, Wallet};
use pow_ledger::config::NodeConfig;

/// Single-node proof-of-work ledger
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// TCP port number for the node
    #[arg(short, long)]
    port: Option<u16>,

    /// Leading hex zeros required of a proof
    #[arg(long)]
    difficulty: Option<usize>,

    /// Threads used for the nonce search
    #[arg(long)]
    workers: Option<usize>,
}

fn load_config(args: &Args) -> anyhow::Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NodeConfig::default(),
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(difficulty) = args.difficulty {
        config.ledger.difficulty = difficulty;
    }
    if let Some(workers) = args.workers {
        config.ledger.workers = workers;
    }

    config.ledger.validate()?;
    Ok(config)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();
    let config = load_config(&args)?;

    // The node's own wallet receives the mining rewards
    let miner_wallet = Wallet::new();
    info!("Node reward address: {}", miner_wallet.address());

    let blockchain = web::Data::new(Blockchain::new(
        miner_wallet.address().clone(),
        config.ledger.clone(),
    )?);

    info!(
        "Starting node at http://{}:{} (difficulty {})",
        config.host, config.port, config.ledger.difficulty
    );

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(blockchain.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
