//! Pin: keep any macOS window visually on top by mirroring it into a
//! floating overlay.

use std::path::PathBuf;

use clap::Parser;

mod app;
mod tray;
mod urlscheme;

#[derive(Parser, Debug)]
#[command(name = "pin", about = "Keep any macOS window on top by mirroring it", version)]
struct Cli {
    /// Where command replies are written (default /tmp/pin-response.json)
    #[arg(long, value_name = "PATH")]
    response_file: Option<PathBuf>,

    #[command(flatten)]
    log: logging::LogArgs,
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(logging::env_filter_from_spec(&cli.log.spec()))
        .init();

    let status = permissions::probe();
    if !status.capture_ok {
        tracing::warn!(
            "Screen Recording permission missing; pinning will fail until it is granted"
        );
    }
    if !status.accessibility_ok {
        // Non-fatal: geometry polling works without it, precision degrades.
        permissions::prompt_accessibility();
    }

    app::run(cli.response_file);
}
