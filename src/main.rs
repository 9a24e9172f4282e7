//! castkit command-line entry point.

use clap::Parser;

use castkit::cli::{self, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    cli::run(Cli::parse()).await
}
