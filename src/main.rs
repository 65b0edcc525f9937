//! `StreamScout` CLI - Detect streaming manifests in web pages

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use streamscout::classify::is_socket_url;
use streamscout::record::now_millis;
use streamscout::{
    is_stream_url, load_config, should_detect, type_from_url, Aggregator, ChannelSink, CompanionClient,
    DeliveryPayload, PageScanner, PageSnapshot, ScoutConfig, StreamType,
};

#[derive(Parser)]
#[command(name = "streamscout")]
#[command(about = "Detect HLS, DASH, M3U and YouTube streams in web pages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a page (URL or local HTML file) for streams
    Scan {
        /// URL to fetch, or path to an HTML file
        target: String,

        /// Page URL used to resolve relative links (defaults to the target)
        #[arg(long)]
        page_url: Option<String>,

        /// Output detected streams as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify URLs with the stream rules
    Classify {
        /// URLs to classify
        #[arg(required = true)]
        urls: Vec<String>,

        /// Host of the page the URLs were seen on (applies YouTube suppression)
        #[arg(long)]
        page_host: Option<String>,
    },

    /// Send a URL to the companion app
    Deliver {
        /// Stream URL
        url: String,

        /// Title shown in the companion app
        #[arg(short, long, default_value = "")]
        title: String,

        /// Companion app address (host:port)
        #[arg(long)]
        app: Option<String>,
    },

    /// Check whether the companion app is reachable
    Health {
        /// Companion app address (host:port)
        #[arg(long)]
        app: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = load_config()?;

    match cli.command {
        Commands::Scan { target, page_url, json } => {
            cmd_scan(&config, &target, page_url, json).await?;
        }
        Commands::Classify { urls, page_host } => {
            cmd_classify(&urls, page_host.as_deref());
        }
        Commands::Deliver { url, title, app } => {
            cmd_deliver(&config, &url, &title, app).await?;
        }
        Commands::Health { app } => {
            cmd_health(&config, app).await?;
        }
    }

    Ok(())
}

async fn cmd_scan(config: &ScoutConfig, target: &str, page_url: Option<String>, json: bool) -> Result<()> {
    let (html, target_url) = if target.starts_with("http://") || target.starts_with("https://") {
        (fetch_page(target).await?, target.to_string())
    } else {
        read_page(Path::new(target))?
    };
    let page = PageSnapshot::new(page_url.unwrap_or(target_url), html);

    let aggregator = Aggregator::new(config);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let server = tokio::spawn({
        let aggregator = aggregator.clone();
        async move { aggregator.serve(rx).await }
    });

    let mut scanner = PageScanner::new(page.url.clone(), Arc::new(ChannelSink::new(tx, None)), config);
    scanner.scan(&page);
    drop(scanner);
    server.await.context("aggregator task failed")?;

    let mut streams = aggregator.streams().await;
    streams.reverse(); // document order

    if json {
        println!("{}", serde_json::to_string_pretty(&streams)?);
        return Ok(());
    }

    if streams.is_empty() {
        println!("No streams found");
        return Ok(());
    }

    println!("Found {} stream(s) on {}", streams.len(), page.url);
    for stored in &streams {
        println!(
            "  {:<9} {:<26} {}",
            stored.stream.stream_type, stored.stream.source, stored.stream.url
        );
    }

    Ok(())
}

async fn fetch_page(url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("streamscout/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()?;
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to fetch {url}"))?;
    if !resp.status().is_success() {
        return Err(anyhow!("{url} returned {}", resp.status()));
    }
    Ok(resp.text().await?)
}

fn read_page(path: &Path) -> Result<(String, String)> {
    let html = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let absolute = path
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    let url = url::Url::from_file_path(&absolute)
        .map_err(|()| anyhow!("cannot express {} as a URL", absolute.display()))?;
    Ok((html, url.to_string()))
}

fn classify_one(url: &str, page_host: Option<&str>) -> Option<StreamType> {
    let stream_type = if is_socket_url(url) {
        StreamType::Websocket
    } else if is_stream_url(url) {
        type_from_url(url)
    } else {
        return None;
    };
    page_host
        .is_none_or(|host| should_detect(host, stream_type))
        .then_some(stream_type)
}

fn cmd_classify(urls: &[String], page_host: Option<&str>) {
    for url in urls {
        match classify_one(url, page_host) {
            Some(stream_type) => println!("{stream_type:<9} {url}"),
            None => println!("{:<9} {url}", "-"),
        }
    }
}

async fn cmd_deliver(config: &ScoutConfig, url: &str, title: &str, app: Option<String>) -> Result<()> {
    let stream_type = classify_one(url, None).unwrap_or(StreamType::Unknown);
    let client = CompanionClient::new(
        app.unwrap_or_else(|| config.app_address.clone()),
        config.delivery_timeout(),
    )?;

    let payload = DeliveryPayload {
        url: url.to_string(),
        stream_type,
        title: title.to_string(),
        source: "cli".to_string(),
        timestamp: now_millis(),
    };

    client
        .send_stream(&payload)
        .await
        .with_context(|| format!("could not deliver to companion app at {}", client.address()))?;

    println!("Sent {stream_type} stream to {}", client.address());
    Ok(())
}

async fn cmd_health(config: &ScoutConfig, app: Option<String>) -> Result<()> {
    let client = CompanionClient::new(
        app.unwrap_or_else(|| config.app_address.clone()),
        config.delivery_timeout(),
    )?;

    if client.check_health().await {
        println!("Companion app at {}: connected", client.address());
    } else {
        println!("Companion app at {}: disconnected", client.address());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_one_rules() {
        assert_eq!(classify_one("https://a/x.m3u8", None), Some(StreamType::Hls));
        assert_eq!(classify_one("wss://edge.example.com/socket", None), Some(StreamType::Websocket));
        assert_eq!(classify_one("https://example.com/", None), None);
        assert_eq!(classify_one("https://a/x.m3u8", Some("www.youtube.com")), None);
    }

    #[test]
    fn cli_parses_scan_flags() {
        let cli = Cli::try_parse_from(["streamscout", "scan", "page.html", "--page-url", "https://e.com/", "--json"])
            .unwrap();
        match cli.command {
            Commands::Scan { target, page_url, json } => {
                assert_eq!(target, "page.html");
                assert_eq!(page_url.as_deref(), Some("https://e.com/"));
                assert!(json);
            }
            _ => panic!("expected scan"),
        }
    }
}
