// src/fetch/mod.rs
//! Acquisition of raw agent output.

pub mod agent;

pub use agent::{Agent, CommandAgent, ReplayAgent};

use anyhow::Result;

use crate::config::AgentSource;
use crate::process::shape::RawAgentOutput;
use crate::request::ScrapeRequest;

/// Run whichever agent `source` names for `request`.
#[tracing::instrument(level = "info", skip_all)]
pub async fn fetch_raw_output(source: &AgentSource, request: &ScrapeRequest) -> Result<RawAgentOutput> {
    match source {
        AgentSource::Command { command_line, timeout } => {
            CommandAgent::from_command_line(command_line, *timeout)?
                .run(request)
                .await
        }
        AgentSource::Replay(path) => ReplayAgent::new(path).run(request).await,
    }
}
