//! # CLI Interface
//!
//! Defines the command-line argument structure for `zkgrade-node` using
//! `clap` derive. Three subcommands: `run`, `criteria` and `version`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use zkgrade_protocol::config::{
    DEFAULT_API_PORT, DEFAULT_BUREAU_TIMEOUT, DEFAULT_ISSUER_ID, DEFAULT_METRICS_PORT,
    DEFAULT_PROVER_TIMEOUT, TOKEN_VALIDITY_DAYS,
};
use zkgrade_protocol::IssuanceConfig;

use crate::logging::LogFormat;

/// zkgrade credit-grade token issuance node.
///
/// Grades customers through the credit bureau, commits to the grade with a
/// zero-knowledge proof, issues a time-limited token and decides loan
/// requests against it.
#[derive(Parser, Debug)]
#[command(
    name = "zkgrade-node",
    about = "zkgrade credit-grade token issuance node",
    version,
    propagate_version = true
)]
pub struct ZkgradeNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the zkgrade node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the issuance node.
    Run(RunArgs),
    /// Print the grade criteria table and exit.
    Criteria,
    /// Print version information and exit.
    Version,
}

/// Which proof system backs the commitments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProofBackendKind {
    /// Deterministic artifact of the right arity, structure-checked only.
    Structural,
    /// Groth16 over BN254 with a per-process trusted setup.
    Groth16,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the REST API.
    #[arg(long, env = "ZKGRADE_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "ZKGRADE_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// How long an issued token stays valid, in days.
    #[arg(long, env = "ZKGRADE_VALIDITY_DAYS", default_value_t = TOKEN_VALIDITY_DAYS)]
    pub validity_days: i64,

    /// Upper bound on a single credit bureau lookup, in seconds.
    #[arg(long, env = "ZKGRADE_BUREAU_TIMEOUT_SECS", default_value_t = DEFAULT_BUREAU_TIMEOUT.as_secs())]
    pub bureau_timeout_secs: u64,

    /// Upper bound on a single proof generation, in seconds.
    #[arg(long, env = "ZKGRADE_PROVER_TIMEOUT_SECS", default_value_t = DEFAULT_PROVER_TIMEOUT.as_secs())]
    pub prover_timeout_secs: u64,

    /// Issuer identifier written into every token.
    #[arg(long, env = "ZKGRADE_ISSUER_ID", default_value = DEFAULT_ISSUER_ID)]
    pub issuer_id: String,

    /// Proof system used for commitments.
    #[arg(long, env = "ZKGRADE_PROOF_BACKEND", value_enum, default_value_t = ProofBackendKind::Structural)]
    pub proof_backend: ProofBackendKind,

    /// JSON file with the bureau's score table
    /// (`{"customers": {"<id>": {"credit_score": N}}}`).
    ///
    /// When omitted, the node serves the built-in demo customers.
    #[arg(long, env = "ZKGRADE_CREDIT_DATA")]
    pub credit_data: Option<PathBuf>,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "ZKGRADE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl RunArgs {
    /// Build the issuance configuration from the parsed arguments.
    pub fn issuance_config(&self) -> anyhow::Result<IssuanceConfig> {
        if self.validity_days <= 0 {
            anyhow::bail!("--validity-days must be positive, got {}", self.validity_days);
        }
        if self.bureau_timeout_secs == 0 || self.prover_timeout_secs == 0 {
            anyhow::bail!("timeouts must be at least one second");
        }
        Ok(IssuanceConfig {
            validity_window: chrono::Duration::days(self.validity_days),
            bureau_timeout: Duration::from_secs(self.bureau_timeout_secs),
            prover_timeout: Duration::from_secs(self.prover_timeout_secs),
            issuer_id: self.issuer_id.clone(),
        })
    }

    pub fn log_format(&self) -> LogFormat {
        LogFormat::from_str_lossy(&self.log_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        ZkgradeNodeCli::command().debug_assert();
    }

    #[test]
    fn run_defaults_match_protocol_constants() {
        let cli = ZkgradeNodeCli::try_parse_from(["zkgrade-node", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.api_port, DEFAULT_API_PORT);
        assert_eq!(args.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(args.proof_backend, ProofBackendKind::Structural);
        assert!(args.credit_data.is_none());

        let config = args.issuance_config().unwrap();
        let defaults = IssuanceConfig::default();
        assert_eq!(config.validity_window, defaults.validity_window);
        assert_eq!(config.bureau_timeout, defaults.bureau_timeout);
        assert_eq!(config.prover_timeout, defaults.prover_timeout);
        assert_eq!(config.issuer_id, defaults.issuer_id);
    }

    #[test]
    fn run_accepts_groth16_backend() {
        let cli = ZkgradeNodeCli::try_parse_from([
            "zkgrade-node",
            "run",
            "--proof-backend",
            "groth16",
            "--validity-days",
            "7",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.proof_backend, ProofBackendKind::Groth16);
        assert_eq!(
            args.issuance_config().unwrap().validity_window,
            chrono::Duration::days(7)
        );
    }

    #[test]
    fn non_positive_validity_is_rejected() {
        let cli = ZkgradeNodeCli::try_parse_from(["zkgrade-node", "run", "--validity-days", "0"])
            .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert!(args.issuance_config().is_err());
    }
}
