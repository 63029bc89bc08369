use anyhow::{anyhow, bail, Context, Result};
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use tokio::{fs, process::Command, time::Instant};
use tracing::info;

use crate::process::shape::RawAgentOutput;
use crate::request::ScrapeRequest;

/// The upstream scraping agent: run it, get back whatever it extracted.
#[allow(async_fn_in_trait)]
pub trait Agent {
    async fn run(&self, request: &ScrapeRequest) -> Result<RawAgentOutput>;
}

/// Agent running as a child process. The request is handed over in
/// environment variables; the extracted content is the child's stdout.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAgent {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Build from a whitespace-separated command line such as
    /// `python scrape_agent.py`.
    pub fn from_command_line(command_line: &str, timeout: Duration) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("agent command is empty"))?;
        Ok(Self::new(program, parts.collect(), timeout))
    }
}

impl Agent for CommandAgent {
    async fn run(&self, request: &ScrapeRequest) -> Result<RawAgentOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("SCRAPE_USERNAME", request.username.expose())
            .env("SCRAPE_PASSWORD", request.password.expose())
            .env("SCRAPE_SEMESTER", request.semester.to_string())
            .env("SCRAPE_YEAR_OF_STUDY", request.year_of_study.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        info!(program = %self.program, semester = %request.semester, year = %request.year_of_study, "starting agent");
        let start = Instant::now();
        let child = cmd
            .spawn()
            .with_context(|| format!("spawning agent {:?}", self.program))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("agent did not finish within {:?}", self.timeout))?
            .context("waiting for agent")?;
        if !output.status.success() {
            bail!("agent exited with {}", output.status);
        }

        let text = String::from_utf8(output.stdout).context("agent output is not UTF-8")?;
        info!(elapsed = ?start.elapsed(), bytes = text.len(), "agent finished");
        Ok(RawAgentOutput::Text(text))
    }
}

/// Replays agent output captured earlier to a file.
#[derive(Debug, Clone)]
pub struct ReplayAgent {
    path: PathBuf,
}

impl ReplayAgent {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Agent for ReplayAgent {
    async fn run(&self, _request: &ScrapeRequest) -> Result<RawAgentOutput> {
        let text = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading captured agent output {}", self.path.display()))?;
        info!(path = %self.path.display(), bytes = text.len(), "replaying captured agent output");
        Ok(RawAgentOutput::Text(text))
    }
}
