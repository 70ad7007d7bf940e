use std::process::ExitCode;

use log::{error, info, LevelFilter};
use thiserror::Error;

const LOG_CONFIG: &str = "log4rs.yaml";

/// Failures that stop the server from running at all.
#[derive(Debug, Error)]
enum LaunchError {
    #[error("Server failed to start or crashed: {0}")]
    Rocket(#[from] rocket::Error),
}

async fn serve() -> Result<(), LaunchError> {
    info!("Igniting voting server...");
    let rocket = evoting_backend::build().ignite().await?;
    info!("...ignition complete, database ready");

    // Request logging takes over from here.
    log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
    rocket.launch().await?;
    Ok(())
}

#[rocket::main]
async fn main() -> ExitCode {
    if let Err(e) = log4rs::init_file(LOG_CONFIG, log4rs_dynamic_filters::default_deserializers()) {
        eprintln!("Could not load logging config from {LOG_CONFIG}: {e}");
        return ExitCode::FAILURE;
    }

    match serve().await {
        Ok(()) => {
            info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
