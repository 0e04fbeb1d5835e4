//! DiTing command-line uploader entry point.
//!
//! Usage: `diting-upload <FILE> [--fresh]`

mod app;
mod bridge;
mod config;
mod resume;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: diting-upload <FILE> [--fresh]";

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let config = config::Config::load()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        server = %config.server_url,
        "starting DiTing uploader"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, args))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<app::Args> {
    let mut file = None;
    let mut fresh = false;
    for arg in args {
        match arg.as_str() {
            "--fresh" => fresh = true,
            "-h" | "--help" => anyhow::bail!(USAGE),
            flag if flag.starts_with("--") => anyhow::bail!("unknown option {flag}\n{USAGE}"),
            _ if file.is_some() => anyhow::bail!("only one file may be uploaded\n{USAGE}"),
            path => file = Some(PathBuf::from(path)),
        }
    }
    let file = file.ok_or_else(|| anyhow::anyhow!(USAGE))?;
    Ok(app::Args { file, fresh })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> anyhow::Result<app::Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_file_and_flag() {
        let parsed = args(&["--fresh", "talk.mp4"]).unwrap();
        assert_eq!(parsed.file, PathBuf::from("talk.mp4"));
        assert!(parsed.fresh);
        assert!(!args(&["talk.mp4"]).unwrap().fresh);
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(args(&[]).is_err());
        assert!(args(&["a.mp4", "b.mp4"]).is_err());
        assert!(args(&["--verbose", "a.mp4"]).is_err());
    }
}
