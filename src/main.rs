//! thermometer-bridge binary entry point.

use std::process::ExitCode;

use thermometer_bridge::api::{serve, AppState};
use thermometer_bridge::cli::{self, Args};
use thermometer_bridge::config::Config;
use thermometer_bridge::{logging, runtime, SimulatedSensorService};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'thermometer-bridge --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&args)?;
    let _ = logging::try_init_with_level(Some(config.log_filter()));

    info!("thermometer-bridge v{}", env!("CARGO_PKG_VERSION"));

    let server = config.to_server_config()?;
    let options = config.session_options()?;
    let settings = config.simulator_settings()?;

    if !settings.present {
        warn!("simulated device has no ambient temperature sensor");
    }

    let (plugin, task) = runtime::spawn(
        move |sink| SimulatedSensorService::new(settings, sink),
        options,
    );
    let state = AppState::new(plugin.clone());

    serve(server, state, shutdown_signal()).await?;

    info!("Shutting down thermometer plugin");
    if let Err(e) = plugin.shutdown().await {
        warn!(error = %e, "plugin loop already stopped");
    }
    drop(plugin);
    let _ = task.await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
