use anyhow::Context;
use chrono::Utc;
use std::process::ExitCode;
use wwm::app::App;
use wwm::cli::{Cli, Command, execute, parse_cli};
use wwm::error::{ErrorBody, WwmError};
use wwm::logging;
use wwm::scheduler;
use wwm::store::MemoryStore;

fn main() -> ExitCode {
    let cli = parse_cli();
    logging::init(cli.verbose, cli.quiet);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let body = e
                .downcast_ref::<WwmError>()
                .map_or_else(|| ErrorBody::internal(format!("{e:#}")), WwmError::body);
            eprintln!("{}", serde_json::to_string(&body).unwrap_or_else(|_| format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.settings();
    let store_path = settings.store_path.clone();
    let store = MemoryStore::open(&store_path)
        .with_context(|| format!("failed to open store {}", store_path.display()))?;
    let app = App::new(store, settings);
    let now = cli.now.unwrap_or_else(Utc::now);

    if let Command::Run = cli.command {
        log::info!("Scheduler running every {} minutes", app.settings.tick_interval_minutes);
        scheduler::run_forever(&app, |_| {
            if let Err(e) = app.store.save() {
                log::error!("Failed to save store {}: {e}", store_path.display());
            }
        });
    }

    let output = execute(&app, cli.user, cli.command, now)?;
    app.store
        .save()
        .with_context(|| format!("failed to save store {}", store_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
