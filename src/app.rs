use anyhow::Result;
use chrono::Local;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api_server::{self, ApiState};
use crate::config::Config;
use crate::error::ScheduleError;
use crate::event::EventSet;
use crate::scheduler::Scheduler;
use crate::time_format;

pub struct Application {
    state: Arc<ApiState>,
    port: u16,
}

impl Application {
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        let port = config.server_port();
        let scheduler = Scheduler::from_config(&config)?;
        let state = Arc::new(ApiState { scheduler, events: Mutex::new(EventSet::new()) });
        Ok(Self { state, port })
    }

    /// Run the API server alone, without the interactive prompt.
    pub async fn serve(&self) -> Result<()> {
        api_server::start_api_server(self.state.clone(), self.port).await
    }

    /// Interactive mode: the API server runs in the background while
    /// requests typed at the prompt go through the same pipeline.
    pub async fn run(&self) -> Result<()> {
        log::info!("Starting API server on port {}", self.port);
        let server_state = self.state.clone();
        let port = self.port;
        let api_handle = tokio::spawn(async move {
            if let Err(e) = api_server::start_api_server(server_state, port).await {
                log::error!("API server error: {:?}", e);
            }
        });

        let mut rl = DefaultEditor::new()?;

        println!("Welcome to planchat! Type a scheduling request, 'events' to list, or 'exit'.");
        let prompt = "📅 ";

        loop {
            match rl.readline(prompt) {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    let line = line.trim();
                    match line {
                        "" => continue,
                        "exit" | "quit" => break,
                        "events" => self.print_events().await,
                        _ => {
                            if let Err(err) = self.process_request(line).await {
                                log::error!("Failed to process request: {:?}", err);
                            }
                        }
                    }
                }
                Err(rustyline::error::ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(rustyline::error::ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    break;
                }
            }
        }

        // Shut down the background API server with the prompt
        api_handle.abort();
        Ok(())
    }

    async fn process_request(&self, line: &str) -> Result<()> {
        let reference_now = Local::now().naive_local();
        let mut events = self.state.events.lock().await;
        match self.state.scheduler.schedule(line, reference_now, &mut events).await {
            Ok(outcome) => {
                for event in &outcome.scheduled {
                    println!(
                        "✅ Scheduled \"{}\" on {} from {} to {}",
                        event.title,
                        event.date,
                        time_format::format_12_hour(event.start),
                        time_format::format_12_hour(event.end)
                    );
                }
                for event in &outcome.evicted {
                    println!("🗑 Evicted \"{}\" ({})", event.title, event.date);
                }
                for event in &outcome.rejected {
                    println!("⛔ Refused \"{}\": overlaps an existing event", event.title);
                }
            }
            Err(err @ (ScheduleError::Extraction(_) | ScheduleError::TimeFormat(_))) => {
                log::debug!("Request not understood: {}", err);
                println!("❌ Couldn't schedule that — please rephrase");
            }
            Err(err) => {
                println!("❌ Error: {}", err);
            }
        }
        Ok(())
    }

    async fn print_events(&self) {
        let events = self.state.events.lock().await;
        if events.is_empty() {
            println!("No events scheduled.");
            return;
        }
        for event in events.iter() {
            println!(
                "  {}  {} – {}  {}",
                event.date,
                time_format::format_12_hour(event.start),
                time_format::format_12_hour(event.end),
                event.title
            );
        }
    }
}
