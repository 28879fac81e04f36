//! monitor_ae_bw_auto event script entry point.
//!
//! Invoked by the Junos event daemon with the script arguments and the
//! `<event-script-input>` document on stdin. Anything printed to stdout
//! ends up in the event script output file.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use ae_bw_auto::{
    normalize_junos_args, Args, AuditLog, HandlerSettings, JunosConnector, Pipeline, RunConfig,
    RunOutcome, TriggerEvent,
};
use junos_script_common::LoggerSink;

/// Initialize tracing/logging. Stdout belongs to the event script output.
fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

async fn read_trigger_event(args: &Args) -> anyhow::Result<TriggerEvent> {
    if let Some(message) = &args.event_message {
        return Ok(TriggerEvent::new(message.clone(), args.event_facility.clone()));
    }

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("Failed to read event script input from stdin")?;
    Ok(TriggerEvent::from_script_input(&input)?)
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let config = RunConfig::from_args(&args)?;
    let settings = HandlerSettings::load_or_default(&args.config)?;
    let event = read_trigger_event(&args).await?;
    info!(facility = %event.facility, message = %event.message, "Trigger event");

    let sink = LoggerSink::new(settings.syslog.logger.clone(), settings.syslog.tag.clone());
    let audit = AuditLog::new(
        &sink,
        settings.syslog_priority()?,
        &settings.syslog.tag,
        config.debug,
    );
    let connector = JunosConnector::new(settings.session_config());

    let outcome = Pipeline::new(&config, &connector, audit)
        .with_settle_delay(settings.settle_delay())
        .with_commit_policy(settings.commit_policy())
        .run(&event)
        .await?;

    match &outcome {
        RunOutcome::CommitFailed { message, .. } | RunOutcome::LoadFailed { message, .. } => {
            println!("{}", message);
        }
        _ => {}
    }
    Ok(outcome.is_success())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse_from(normalize_junos_args(std::env::args_os()));
    init_logging(args.debug == ae_bw_auto::config::DEBUG_ENABLE);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("monitor_ae_bw_auto error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
