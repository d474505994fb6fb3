pub mod api_server;
pub mod app;
pub mod config;
pub mod conflict;
pub mod error;
pub mod event;
pub mod parser;
pub mod scheduler;
pub mod time_format;
pub mod validation;

use anyhow::Result;
use log::*;

pub async fn run(serve_only: bool) -> Result<()> {
    // Create and run the application
    let app = app::Application::new()?;
    info!("Initializing planchat application");
    if serve_only {
        app.serve().await
    } else {
        app.run().await
    }
}

pub fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

// Re-export commonly used types
pub use config::Config;
pub use error::ScheduleError;
pub use event::{Event, EventDraft, EventSet};
pub use scheduler::{ScheduleOutcome, Scheduler};
