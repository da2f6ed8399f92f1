//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

use legisfetch_core::DEFAULT_CONCURRENCY;

/// Default site base URL for absolutizing PDF affordance targets.
pub const DEFAULT_BASE_URL: &str = "https://www.assemblee-nationale.fr";

/// Incremental harvester for Assemblée nationale legislative documents.
///
/// Legisfetch downloads the PDF artifacts behind discovered landing
/// pages into a durable store and keeps a per-URL ledger so repeated
/// runs are incremental and self-healing.
#[derive(Parser, Debug)]
#[command(name = "legisfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one fetch pipeline pass: discover, plan, fetch, merge, publish
    Run(RunArgs),
    /// Re-validate stored artifacts and flag corrupted ones in the ledger
    Verify(VerifyArgs),
    /// Print ledger counts without mutating anything
    Status(StoreArgs),
}

/// Blob-store location flags shared by every subcommand.
#[derive(clap::Args, Debug)]
pub struct StoreArgs {
    /// Root directory of the blob store
    #[arg(long, env = "LEGISFETCH_STORE_ROOT", default_value = "store")]
    pub store_root: PathBuf,

    /// Blob key of the ledger snapshot
    #[arg(long, env = "LEGISFETCH_LEDGER_KEY", default_value = "ledger.csv")]
    pub ledger_key: String,

    /// Blob-store prefix for stored artifacts
    #[arg(long, env = "LEGISFETCH_ARTIFACT_PREFIX", default_value = "pdfs")]
    pub artifact_prefix: String,
}

#[derive(clap::Args, Debug)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["manifest", "archive_url"]),
))]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// JSON manifest of discovered URLs (array of {url, provenance})
    #[arg(long, env = "LEGISFETCH_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// URL of a bulk open-data ZIP archive of discovery manifests
    #[arg(long, env = "LEGISFETCH_ARCHIVE_URL")]
    pub archive_url: Option<String>,

    /// Site base URL for absolutizing relative PDF links
    #[arg(long, env = "LEGISFETCH_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Maximum concurrent fetches (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Minimum delay between requests to the same host in milliseconds
    /// (0 to disable, max 60000)
    #[arg(short = 'l', long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: u64,
}

#[derive(clap::Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Maximum concurrent artifact checks (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run_with_manifest_parses() {
        let args =
            Args::try_parse_from(["legisfetch", "run", "--manifest", "urls.json"]).unwrap();
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.manifest.unwrap(), PathBuf::from("urls.json"));
                assert!(run.archive_url.is_none());
                assert_eq!(run.concurrency, DEFAULT_CONCURRENCY as u8);
                assert_eq!(run.rate_limit, 1000);
                assert_eq!(run.base_url, DEFAULT_BASE_URL);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_run_requires_a_discovery_source() {
        let result = Args::try_parse_from(["legisfetch", "run"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_run_rejects_both_sources() {
        let result = Args::try_parse_from([
            "legisfetch",
            "run",
            "--manifest",
            "urls.json",
            "--archive-url",
            "https://example.fr/export.zip",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_verify_defaults() {
        let args = Args::try_parse_from(["legisfetch", "verify"]).unwrap();
        match args.command {
            Command::Verify(verify) => {
                assert_eq!(verify.store.store_root, PathBuf::from("store"));
                assert_eq!(verify.store.ledger_key, "ledger.csv");
                assert_eq!(verify.store.artifact_prefix, "pdfs");
            }
            other => panic!("expected verify, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_status_parses_store_flags() {
        let args = Args::try_parse_from([
            "legisfetch",
            "status",
            "--store-root",
            "/data/store",
        ])
        .unwrap();
        match args.command {
            Command::Status(store) => {
                assert_eq!(store.store_root, PathBuf::from("/data/store"));
            }
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_verbose_and_quiet_are_global() {
        let args = Args::try_parse_from(["legisfetch", "verify", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["legisfetch", "status", "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_concurrency_range_enforced() {
        let result =
            Args::try_parse_from(["legisfetch", "run", "--manifest", "m.json", "-c", "0"]);
        assert!(result.is_err());

        let result =
            Args::try_parse_from(["legisfetch", "run", "--manifest", "m.json", "-c", "101"]);
        assert!(result.is_err());
    }
}
