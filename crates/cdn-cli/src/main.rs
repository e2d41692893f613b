//! CDN Gateway - files in S3, served through CloudFront

use cdn_cli::{run_server_with_shutdown, GatewayConfig};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cdn-gateway")]
#[command(about = "HTTP gateway for files stored in S3 and served through CloudFront")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "CDN_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "PORT")]
    port: u16,

    /// S3 bucket holding the files
    #[arg(long, env = "BUCKET")]
    bucket: Option<String>,

    /// CloudFront distribution ID used for invalidations
    #[arg(long, env = "DISTRIBUTION_ID")]
    distribution_id: Option<String>,

    /// Public URL of the CloudFront distribution
    #[arg(long, env = "DISTRIBUTION_URL")]
    distribution_url: Option<String>,

    /// AWS region (defaults to the SDK provider chain)
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Use in-memory backends (for testing, data will not persist)
    #[arg(long, env = "CDN_MEMORY_STORE")]
    memory_store: bool,

    /// Enable debug logging
    #[arg(short, long, env = "CDN_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse arguments
    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "cdn_cli={level},cdn_core={level},cdn_store={level},tower_http=debug",
                    level = log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CDN Gateway on {}:{}", args.host, args.port);

    if args.memory_store {
        tracing::warn!("Using in-memory backends - data will NOT persist!");
    } else {
        tracing::info!(
            bucket = args.bucket.as_deref().unwrap_or_default(),
            distribution_url = args.distribution_url.as_deref().unwrap_or_default(),
            "Using AWS backends"
        );
    }

    // Build configuration
    let config = GatewayConfig {
        host: args.host,
        port: args.port,
        bucket: args.bucket,
        distribution_id: args.distribution_id,
        distribution_url: args.distribution_url,
        region: args.region,
        use_memory_store: args.memory_store,
        ..Default::default()
    };

    // Run the server until Ctrl-C
    run_server_with_shutdown(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await
}
