use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

mod cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> miette::Result<()> {
    // stdout carries the JSON report
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args = cli::Cli::parse();
    args.run().await
}
