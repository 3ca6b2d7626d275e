mod board;
mod cli;
mod config;
mod error;
mod executor;
mod journal;
mod template;
mod validate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let board = match board::Board::parse().await {
        Ok(board) => board,
        Err(err) => {
            eprintln!("Failed to load config: {:#}", err);
            std::process::exit(error::LOAD_EXIT_CODE);
        }
    };
    let code = board.run().await?;
    std::process::exit(code)
}
