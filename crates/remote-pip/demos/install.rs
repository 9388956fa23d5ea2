//! Install (or uninstall) a package on a remote host.
//!
//! Connection settings come from `REMOTE_PIP_*` variables, optionally on top
//! of a config file:
//!
//! ```sh
//! REMOTE_PIP_HOST=10.0.0.12 REMOTE_PIP_USER=deploy REMOTE_PIP_KEY_FILE=~/.ssh/id_ed25519 \
//!     cargo run --example install -- requests 2.32.3
//!
//! cargo run --example install -- --config remote-pip.toml --uninstall requests
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use remote_pip::prelude::*;
use remote_pip::{LoggingConfig, logging};

/// Install or uninstall one package on the configured host.
#[derive(Parser)]
#[command(name = "install")]
#[command(about = "Run pip on a remote host over SSH", long_about = None)]
struct Args {
    /// TOML or JSON config file, overridden by REMOTE_PIP_* variables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Uninstall instead of installing
    #[arg(long)]
    uninstall: bool,

    /// Package name
    package: String,

    /// Version to pin (install only)
    version: Option<String>,
}

async fn run(args: Args) -> Result<()> {
    let config = RemotePipConfig::load(args.config.as_deref())?;
    let mut pip = RemotePip::connect(config).await?;

    let outcome = if args.uninstall {
        pip.uninstall(&args.package, UninstallOptions::new()).await
    } else {
        let mut options = InstallOptions::new();
        if let Some(version) = args.version {
            options = options.version(version);
        }
        pip.install(&args.package, options).await
    };

    pip.close().await?;
    let output = outcome?;
    println!("{}", output.stdout.trim_end());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init(&LoggingConfig::new()) {
        eprintln!("{e}");
    }

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
