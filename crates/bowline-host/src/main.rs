//! Entry point for the Bowline native-messaging host.

use std::io;
use std::process::ExitCode;

use tracing::{error, info};

use bowline_config::Config;
use bowline_host::{Dispatcher, Session, SocketConnector, pump, telemetry};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(source) => {
            eprintln!("bowline-host: failed to load configuration: {source}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(source) = telemetry::initialise(&config) {
        eprintln!("bowline-host: failed to initialise telemetry: {source}");
        return ExitCode::FAILURE;
    }

    info!(
        endpoint = %config.channel_endpoint(),
        mode = %config.framing_mode(),
        "bowline host starting"
    );

    let connector = SocketConnector::new(config.channel_endpoint().clone());
    let session = Session::new(
        Box::new(connector),
        config.connect_timeout(),
        config.invoke_timeout(),
    );
    let mut dispatcher = Dispatcher::new(session);

    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    match pump::run(stdin, stdout, config.framing_mode(), &mut dispatcher) {
        Ok(()) => ExitCode::SUCCESS,
        Err(source) => {
            error!(%source, "host terminated on stdio failure");
            ExitCode::FAILURE
        }
    }
}
