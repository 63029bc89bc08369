//! Invocation and runtime configuration.
//!
//! The four positional parameters become a validated [`ScrapeRequest`];
//! everything else (file locations, how to reach the agent) becomes a
//! [`Config`]. Every flag can also be set from the environment or a `.env`
//! file loaded before parsing.

use clap::Parser;
use std::{path::PathBuf, time::Duration};

use crate::process::OutputPaths;
use crate::request::{RequestError, ScrapeRequest};

/// Scrape course offerings through the browser agent and write the
/// canonical course table for one year of study.
#[derive(Debug, Parser)]
#[command(name = "course-offerings", version)]
pub struct Cli {
    /// Portal username, passed through to the agent.
    pub username: String,

    /// Portal password, passed through to the agent.
    pub password: String,

    /// Term label, e.g. "SP 2024-25", "SU 1 2024-25", "FA 2025-26".
    pub semester: String,

    /// Year of study, a single digit 1-9.
    pub year_of_study: String,

    /// Canonical course table.
    #[arg(long, env = "COURSES_OUTPUT", default_value = "courses.csv")]
    pub output: PathBuf,

    /// First-pass dump of the agent output.
    #[arg(long, env = "COURSES_WORKING_FILE", default_value = "courses.raw.csv")]
    pub working_file: PathBuf,

    /// Replay agent output captured in this file instead of running the agent.
    #[arg(long, env = "COURSES_RAW_INPUT")]
    pub raw_input: Option<PathBuf>,

    /// Command line that runs the agent; its stdout is the extracted content.
    #[arg(long, env = "COURSES_AGENT_COMMAND")]
    pub agent_command: Option<String>,

    /// Give up on the agent after this many seconds.
    #[arg(long, env = "COURSES_AGENT_TIMEOUT_SECS", default_value_t = 900)]
    pub agent_timeout_secs: u64,
}

/// Where raw agent output comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentSource {
    Command {
        command_line: String,
        timeout: Duration,
    },
    Replay(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub paths: OutputPaths,
    pub agent: AgentSource,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("no agent configured: pass --agent-command or --raw-input")]
    NoAgent,

    #[error("agent timeout must be at least one second")]
    ZeroTimeout,
}

impl ConfigError {
    pub fn exit_code(&self) -> u8 {
        2
    }
}

impl Cli {
    /// Validate the invocation. A replay file takes precedence over the agent
    /// command when both are set.
    pub fn into_parts(self) -> Result<(ScrapeRequest, Config), ConfigError> {
        let request = ScrapeRequest::parse(
            &self.username,
            &self.password,
            &self.semester,
            &self.year_of_study,
        )?;

        if self.agent_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        let agent = match (self.raw_input, self.agent_command) {
            (Some(path), _) => AgentSource::Replay(path),
            (None, Some(cmd)) if !cmd.trim().is_empty() => AgentSource::Command {
                command_line: cmd,
                timeout: Duration::from_secs(self.agent_timeout_secs),
            },
            _ => return Err(ConfigError::NoAgent),
        };

        Ok((
            request,
            Config {
                paths: OutputPaths {
                    canonical: self.output,
                    working: self.working_file,
                },
                agent,
            },
        ))
    }
}
