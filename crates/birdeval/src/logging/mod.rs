// Logging for the CLI, powered by tracing-subscriber.
//
// Diagnostics go to stderr so stdout carries only the command envelope.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

const NOISY_TARGETS: &[(&str, &str)] = &[
    ("hyper", "warn"),
    ("hyper_util", "warn"),
    ("reqwest", "warn"),
    ("rustls", "warn"),
    ("h2", "warn"),
];

pub fn build_env_filter(level: &str, rust_log: Option<&str>) -> anyhow::Result<EnvFilter> {
    if let Some(directives) = rust_log.map(str::trim).filter(|value| !value.is_empty()) {
        return EnvFilter::try_new(directives)
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG filter '{directives}': {e}"));
    }

    let mut directives = vec![level.to_string()];
    for (target, lvl) in NOISY_TARGETS {
        directives.push(format!("{target}={lvl}"));
    }

    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{filter_str}': {e}"))
}

pub fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_env_filter(level, rust_log.as_deref())?;

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(true)
            .with_thread_names(true)
            .try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::trace!(level, ?format, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::build_env_filter;

    #[test]
    fn level_filter_quiets_http_stack() {
        let filter = build_env_filter("debug", None).expect("filter should build");
        let rendered = filter.to_string();
        assert!(rendered.contains("debug"));
        assert!(rendered.contains("reqwest=warn"));
    }

    #[test]
    fn rust_log_overrides_level() {
        let filter =
            build_env_filter("info", Some("birdeval=trace")).expect("filter should build");
        let rendered = filter.to_string();
        assert!(rendered.contains("birdeval=trace"));
        assert!(!rendered.contains("reqwest"));
    }

    #[test]
    fn blank_rust_log_is_ignored() {
        let filter = build_env_filter("warn", Some("  ")).expect("filter should build");
        assert!(filter.to_string().contains("warn"));
    }

    #[test]
    fn invalid_level_is_rejected() {
        assert!(build_env_filter("birdeval=loud", None).is_err());
    }
}
