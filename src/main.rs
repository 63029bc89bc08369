use clap::Parser;
use course_offerings::{
    config::Cli,
    error::PipelineError,
    fetch,
    process::{self, RunReport},
};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // ─── 1) init env + logging ───────────────────────────────────────
    let dotenv = dotenvy::dotenv();
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,course_offerings=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded .env");
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) validate the invocation ──────────────────────────────────
    let (request, config) = match Cli::parse().into_parts() {
        Ok(parts) => parts,
        Err(e) => {
            error!("invalid invocation: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };
    info!(semester = %request.semester, year = %request.year_of_study, "startup");

    // ─── 3) run the agent ────────────────────────────────────────────
    let raw = match fetch::fetch_raw_output(&config.agent, &request).await {
        Ok(raw) => raw,
        Err(e) => {
            let err = PipelineError::Agent(e);
            error!("{}", err);
            return ExitCode::from(err.exit_code());
        }
    };

    // ─── 4) extract, normalize, filter, write ────────────────────────
    match process::run_pipeline(raw, request.year_of_study, &config.paths) {
        Ok(report) => {
            emit_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn emit_report(report: &RunReport) {
    for (kind, count) in &report.warnings {
        warn!(kind, count, "warnings this run");
    }
    match serde_json::to_string(report) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("serializing run report: {}", e),
    }
    info!(written = report.written, output = ?report.output, "all done");
}
