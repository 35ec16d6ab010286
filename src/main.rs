use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use reqwest::Client;
use tracing::{debug, info};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tweet_downloader::config::DEFAULT_API_BASE;
use tweet_downloader::{source, ApiVersion, Config, CredentialStore, Credentials};

#[derive(Parser, Debug)]
#[clap(version, about = "Download the photos, videos and GIFs attached to tweets")]
struct Args {
    /// Tweet IDs or tweet URLs
    #[clap(required = true)]
    tweets: Vec<String>,

    /// Directory to save media into
    #[clap(short, long, default_value = ".")]
    dir: PathBuf,

    /// API flavour used to look up tweets (v1 or v2)
    #[clap(long, default_value = "v2")]
    api: ApiVersion,

    /// Credentials file [default: ~/.twittaconfig]
    #[clap(long)]
    config: Option<PathBuf>,

    /// Bearer token, bypasses the credentials file
    #[clap(long, env = "TWITTER_BEARER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[clap(long, hide = true, default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Replace files that already exist
    #[clap(short, long)]
    overwrite: bool,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(indicatif_layer.get_stderr_writer()),
        )
        .with(indicatif_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let credentials = match args.token {
        Some(token) => Credentials::new(token),
        None => {
            let store = match args.config {
                Some(path) => CredentialStore::new(path),
                None => CredentialStore::at_default_location()?,
            };
            debug!("Using credentials file {}", store.path().display());
            store.ensure_credentials()?
        }
    };

    let config = Config {
        api_version: args.api,
        api_base: args.api_base,
        output_dir: args.dir,
        overwrite: args.overwrite,
    };

    let client = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let source = source::for_version(
        config.api_version,
        client.clone(),
        &config.api_base,
        credentials,
    );

    info!("Looking up {} tweet(s) via API {}", args.tweets.len(), config.api_version);
    tweet_downloader::run(&config, source.as_ref(), &client, &args.tweets).await?;

    Ok(())
}
