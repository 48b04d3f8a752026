//! Command-line interface for the resign iOS re-signing tool.
//!
//! Resigns an `.ipa` archive or an unpacked `.app` directory with a new
//! provisioning profile and signing identity.

use clap::Parser;
use resign::{Codesign, Resign, Toolchain};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "resign")]
#[command(about = "Re-sign iOS apps with a new provisioning profile")]
struct Cli {
    /// Input file (IPA or app bundle directory)
    input: PathBuf,

    /// Output IPA (IPA input only, default: <input>.signed.ipa)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Signing identity passed to codesign (name, SHA-1 hash, or "-")
    #[arg(short = 's', long)]
    identity: String,

    /// Provisioning profile
    #[arg(short = 'm', long)]
    profile: PathBuf,

    /// Explicit team-prefixed bundle id (TEAMID.com.example.app)
    #[arg(short = 'b', long)]
    bundle_id: Option<String>,

    /// ZIP compression level (0-9, default: 6)
    #[arg(short = 'z', long, default_value = "6")]
    zip_level: u32,

    /// codesign executable
    #[arg(long, default_value = "codesign")]
    codesign: PathBuf,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut resign = Resign::new()
        .provisioning_profile(&cli.profile)
        .compression_level(cli.zip_level);

    if let Some(bundle_id) = &cli.bundle_id {
        resign = resign.bundle_id(bundle_id);
    }

    let codesign = Codesign::new().program(&cli.codesign);
    let tools = Toolchain::new(&codesign, &codesign, cli.identity.as_str());

    if is_ipa(&cli.input) {
        let output = cli.output.clone().unwrap_or_else(|| default_output(&cli.input));
        resign.sign_ipa(&cli.input, &output, &tools)?;
        println!("Signed: {}", output.display());
    } else if cli.input.is_dir() {
        if cli.output.is_some() {
            return Err("--output only applies to IPA input; app bundles are resigned in place".into());
        }
        resign.sign_bundle(&cli.input, &tools)?;
        println!("Signed: {}", cli.input.display());
    } else {
        return Err(format!("Not an IPA or app bundle: {}", cli.input.display()).into());
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn is_ipa(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ipa"))
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("signed.ipa")
}
