//! # Node Logging
//!
//! One global `tracing` subscriber per process: an [`EnvFilter`] in front
//! of a single `fmt` output layer. The node writes its event stream to
//! stderr because the `criteria` and `version` subcommands print their
//! tables on stdout.
//!
//! Filtering comes from `RUST_LOG` when it is set and parses, otherwise
//! from [`DEFAULT_DIRECTIVE`]. Proof generation and bureau calls log under
//! the `zkgrade_protocol` target, request spans under `tower_http`.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Directive used when `RUST_LOG` is absent.
pub const DEFAULT_DIRECTIVE: &str = "zkgrade_node=info,zkgrade_protocol=info,tower_http=info";

/// Shape of each emitted log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-field text with source locations, for a terminal.
    Pretty,
    /// One JSON object per event, for collectors.
    Json,
}

impl LogFormat {
    /// `--log-format` value. Only `json` selects JSON; anything else, an
    /// operator typo included, falls back to text.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }

    fn output_layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer().with_writer(std::io::stderr).with_target(true);
        match self {
            Self::Pretty => base.with_file(true).with_line_number(true).boxed(),
            Self::Json => base.json().with_current_span(true).boxed(),
        }
    }
}

fn node_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the subscriber. Panics if one is already installed, so the node
/// calls this once at the top of `run`.
pub fn init_logging(fallback_directive: &str, format: LogFormat) {
    tracing_subscriber::registry()
        .with(format.output_layer())
        .with(node_filter(fallback_directive))
        .init();

    tracing::debug!(?format, "log subscriber installed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_json_selects_json() {
        assert_eq!(LogFormat::from_str_lossy("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy(" Json "), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str_lossy("jsonl"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str_lossy(""), LogFormat::Pretty);
    }

    #[test]
    fn default_directive_parses() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVE).is_ok());
    }
}
