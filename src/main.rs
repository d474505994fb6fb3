use anyhow::Result;
use env_logger::Env;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with custom format
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use chrono::Local;
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    // API keys may live in a .env file next to the binary
    dotenvy::dotenv().ok();

    let serve_only = std::env::args().any(|arg| arg == "--serve");

    info!("Starting planchat");
    planchat::run(serve_only).await
}
