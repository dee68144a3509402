//! cascette-extract binary entry point.
//!
//! Thin wrapper around the cascette-datasource library: parses arguments,
//! initializes logging, resolves the encoding key and extracts it.

use anyhow::{Context, Result, bail};
use cascette_datasource::cli::ExtractArgs;
use cascette_datasource::{DataSource, TactDataSource};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = ExtractArgs::from_args();
    let config = args.to_config()?;
    let key = args.key()?;
    let expected = args.expected_hash()?;

    tracing::info!(
        "Hosts {:?}, cdn path {}, {} indexes",
        config.hosts,
        config.cdn_path,
        config.index_hashes.len()
    );

    let source = TactDataSource::from_config(&config)
        .await
        .context("could not set up data source")?;

    let Some(location) = source.find_location(&key).await? else {
        bail!("{} not found in any index or on any host", args.encoding_key);
    };
    println!("{location}");

    let bytes = source
        .extract_file(&location, &args.output, expected.as_ref(), &args.options())
        .await
        .with_context(|| format!("could not extract {}", args.encoding_key))?;
    println!("{} bytes written to {}", bytes, args.output.display());

    Ok(())
}
