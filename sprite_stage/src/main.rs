use anyhow::Result;

mod cli;
mod runtime;
mod scenario;

use cli::Command;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let (command, verbose) = cli::parse()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "info" } else { "warn" }),
    )
    .init();

    match command {
        Command::Play(args) => runtime::execute(args).await,
        Command::ListBlocks => runtime::list_blocks(),
    }
}
