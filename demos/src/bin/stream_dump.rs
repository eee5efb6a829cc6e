//! Stream dump: print every decoded line or chunk of a signed stream
//!
//! Credentials come from TWSTREAM_TOKEN, TWSTREAM_TOKEN_SECRET,
//! TWSTREAM_CONSUMER_KEY and TWSTREAM_CONSUMER_SECRET.
//!
//! Run: cargo run --bin stream_dump -- --url https://stream.twitter.com/1/statuses/sample.json --ttl 30

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::io::Write;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use twstream_auth::Credentials;
use twstream_client::{Configuration, Connection, Termination};

/// Print every decoded line or chunk of a signed stream
#[derive(Parser)]
#[command(name = "stream_dump")]
struct Args {
    /// Stream URL
    #[arg(long)]
    url: String,

    /// HTTP method
    #[arg(long, default_value = "GET")]
    method: String,

    /// Decode the body as chunked transfer-encoding
    #[arg(long)]
    chunked: bool,

    /// Ask for a gzip-encoded body
    #[arg(long)]
    gzip: bool,

    /// Plain HTTP proxy as HOST:PORT
    #[arg(long)]
    proxy: Option<String>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    ttl: Option<u64>,

    /// Form parameter, repeatable
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Echo raw wire bytes to stderr
    #[arg(long)]
    wire: bool,
}

fn parse_param(pair: &str) -> Result<(String, String), String> {
    pair.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got {:?}", pair))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let credentials = Credentials::from_env().context("reading credentials")?;

    let mut config = Configuration::parse(&args.method, &args.url)?
        .with_chunked(args.chunked)
        .with_gzip(args.gzip);
    if let Some(proxy) = args.proxy {
        config = config.with_proxy(proxy);
    }
    if let Some(secs) = args.ttl {
        config = config.with_ttl(Duration::from_secs(secs));
    }
    for (name, value) in args.params {
        config = config.with_form_param(name, value);
    }
    if args.wire {
        config = config
            .on_bytes_out(|bytes| eprint!("{}", String::from_utf8_lossy(bytes).yellow()))
            .on_bytes_in(|bytes| eprint!("{}", String::from_utf8_lossy(bytes).dimmed()));
    }

    eprintln!("{} {} {}", "→".cyan(), args.method.bold(), args.url);

    let mut connection = Connection::new(config, credentials);
    let stdout = std::io::stdout();
    let summary = connection
        .read(|segment| {
            let mut out = stdout.lock();
            let _ = out.write_all(&segment.bytes);
            let _ = out.write_all(b"\n");
        })
        .await?;

    let reason = match summary.termination {
        Termination::Eof => "server closed the stream".green(),
        Termination::TtlExpired => "TTL expired".yellow(),
    };
    eprintln!(
        "{} {} ({} units, {} bytes, gzip: {})",
        "■".cyan(),
        reason,
        summary.units,
        summary.bytes,
        summary.gzip
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "stream_dump",
            "--url",
            "https://stream.twitter.com/1/statuses/filter.json",
            "--method",
            "POST",
            "--chunked",
            "--ttl",
            "30",
            "--param",
            "track=rust",
            "--param",
            "follow=12,34",
        ])
        .unwrap();

        assert_eq!(args.method, "POST");
        assert!(args.chunked);
        assert!(!args.gzip);
        assert_eq!(args.ttl, Some(30));
        assert_eq!(
            args.params,
            vec![
                ("track".to_string(), "rust".to_string()),
                ("follow".to_string(), "12,34".to_string()),
            ]
        );
    }

    #[test]
    fn test_args_reject_bad_param_and_missing_url() {
        assert!(Args::try_parse_from(["stream_dump"]).is_err());
        assert!(Args::try_parse_from(["stream_dump", "--url", "x", "--param", "novalue"]).is_err());
    }
}
