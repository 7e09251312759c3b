//! Skillswap matching node CLI
//!
//! Command-line interface for running the skill matching service.

use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use skillswap_match::api::{HealthResponse, MatchedUser};
use skillswap_match::{
    ApiConfig, ApiServer, AppState, DirectoryProvider, EmbeddingService, EmbeddingServiceConfig,
    Error, InMemoryDirectory, MatchOrchestrator, Result, ServiceConfig, SkillEncoder, SkillList,
};

#[derive(Parser)]
#[command(name = "skillswap")]
#[command(author, version, about = "Skill-swap semantic matching service", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.toml")]
        output: String,
    },

    /// Start the matching API
    Start {
        /// HTTP API listen address (overrides the config file)
        #[arg(long)]
        api_addr: Option<String>,

        /// Load the embedding model before accepting requests (downloads ~90MB on first use)
        #[arg(long, default_value = "false")]
        eager_model: bool,
    },

    /// Construct the default embedding model and persist its artifact
    PrepareModel,

    /// Rank the directory's users against a comma-separated skill list
    Match {
        /// Wanted skills, e.g. "cooking, guitar"
        #[arg(long)]
        skills: String,

        /// Minimum score (overrides the config file)
        #[arg(long)]
        threshold: Option<f32>,

        /// Maximum number of results (overrides the config file)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Check node health
    Health {
        /// API endpoint to check
        #[arg(long, default_value = "http://localhost:8080")]
        endpoint: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: &str) -> Result<ServiceConfig> {
    if Path::new(path).exists() {
        info!("Loading configuration from: {}", path);
        ServiceConfig::load(path)
    } else {
        info!("Using default configuration");
        Ok(ServiceConfig::default())
    }
}

fn load_directory(config: &ServiceConfig) -> Result<InMemoryDirectory> {
    let path = &config.directory.path;
    if path.exists() {
        InMemoryDirectory::load(path)
    } else {
        warn!(
            path = %path.display(),
            "User directory file not found; starting with an empty directory"
        );
        Ok(InMemoryDirectory::new())
    }
}

async fn warm_up(embedding: Arc<EmbeddingService>) -> Result<()> {
    tokio::task::spawn_blocking(move || embedding.warm_up())
        .await
        .map_err(|e| Error::ModelUnavailable(format!("model initialization task failed: {}", e)))?
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Init { output } => {
            info!("Initializing new configuration at: {}", output);
            let config = ServiceConfig::default();
            config.save(&output)?;
            info!("Configuration saved successfully");
        }

        Commands::Start {
            api_addr,
            eager_model,
        } => {
            info!("Starting skillswap matching node...");

            // 1. Load configuration (or use defaults with CLI overrides)
            let mut config = load_config(&cli.config)?;
            if let Some(addr) = api_addr {
                config.api.listen_address = addr;
                config.validate()?;
            }
            info!("API address: {}", config.api.listen_address);

            // 2. Load the user directory
            let directory: Arc<dyn DirectoryProvider> = Arc::new(load_directory(&config)?);

            // 3. Embedding service; loaded lazily unless asked otherwise
            let embedding = Arc::new(EmbeddingService::new(EmbeddingServiceConfig::from(
                &config.model,
            )));
            if eager_model {
                info!("Loading embedding model (downloading ~90MB if needed)...");
                match warm_up(embedding.clone()).await {
                    Ok(()) => info!("Embedding model ready"),
                    Err(e) => {
                        warn!("Failed to load embedding model: {}", e);
                        warn!("Model loading will be retried on the first match request");
                    }
                }
            }

            // 4. Start HTTP API server in background
            let app_state = AppState::new(&config, embedding, directory);
            let api_server = ApiServer::with_state(ApiConfig::from(&config), app_state);
            let listen_address = config.api.listen_address.clone();

            let server = tokio::spawn(async move {
                if let Err(e) = api_server.run(&listen_address).await {
                    error!("API server error: {}", e);
                }
            });

            info!("Skillswap node started successfully");
            info!("Press Ctrl+C to stop");

            // 5. Wait for shutdown
            tokio::select! {
                _ = server => {
                    warn!("API server exited");
                }
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal");
                }
            }
            info!("Node stopped");
        }

        Commands::PrepareModel => {
            let config = load_config(&cli.config)?;
            let embedding = Arc::new(EmbeddingService::new(EmbeddingServiceConfig::from(
                &config.model,
            )));
            warm_up(embedding.clone()).await?;
            info!(
                model = %embedding.model_name(),
                path = %embedding.config().artifact_path().display(),
                "Model artifact ready"
            );
        }

        Commands::Match {
            skills,
            threshold,
            limit,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(threshold) = threshold {
                config.matching.threshold = threshold;
            }
            if let Some(limit) = limit {
                config.matching.limit = limit;
            }
            config.validate()?;

            let directory = load_directory(&config)?;
            let candidates = directory.public_candidates().await?;
            let embedding = Arc::new(EmbeddingService::new(EmbeddingServiceConfig::from(
                &config.model,
            )));
            let orchestrator = MatchOrchestrator::new(embedding);
            let options = config.matching.options();
            let query = SkillList::from_legacy(&skills);

            let results = tokio::task::spawn_blocking(move || {
                orchestrator.match_candidates(&query, &candidates, &options)
            })
            .await
            .map_err(|e| Error::Api(format!("matching task failed: {}", e)))??;

            let precision = config.matching.score_precision;
            let response: Vec<MatchedUser> = results
                .into_iter()
                .map(|r| MatchedUser::from_result(r, precision))
                .collect();
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Health { endpoint } => {
            info!("Checking node health at: {}", endpoint);

            let health_url = format!("{}/health", endpoint.trim_end_matches('/'));

            match tokio::time::timeout(std::time::Duration::from_secs(5), check_health(&health_url))
                .await
            {
                Ok(Ok(response)) => {
                    info!("Node status: {}", response.status);
                    info!("Version: {}", response.version);
                    info!("Model: {} (loaded: {})", response.model, response.model_loaded);
                    info!("Uptime: {} seconds", response.uptime);
                }
                Ok(Err(e)) => {
                    error!("Health check failed: {}", e);
                    std::process::exit(1);
                }
                Err(_) => {
                    error!("Health check timed out");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Query a running node's `/health` over plain HTTP/1.1.
///
/// Fails unless the node answers `200` with a JSON health payload.
async fn check_health(url: &str) -> Result<HealthResponse> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let target = url.strip_prefix("http://").ok_or_else(|| {
        Error::Api(format!("only http:// endpoints are supported, got {}", url))
    })?;
    let (authority, path) = match target.split_once('/') {
        Some((authority, path)) => (authority, format!("/{}", path)),
        None => (target, "/health".to_string()),
    };

    let mut stream = TcpStream::connect(authority)
        .await
        .map_err(|e| Error::Api(format!("cannot reach {}: {}", authority, e)))?;

    let request = format!(
        "GET {path} HTTP/1.1\r\nHost: {authority}\r\nAccept: application/json\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;
    let raw = String::from_utf8_lossy(&raw);

    let (head, body) = raw
        .split_once("\r\n\r\n")
        .ok_or_else(|| Error::Api("truncated HTTP response".to_string()))?;
    let status_line = head.lines().next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| Error::Api(format!("malformed status line: {:?}", status_line)))?;

    if status != 200 {
        return Err(Error::Api(format!("{} answered {}", path, status_line)));
    }

    Ok(serde_json::from_str(body.trim())?)
}
