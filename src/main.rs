use chat_bridge::api_proxy::{server, ProxyConfig};
use std::net::SocketAddr;
use std::process::ExitCode;

/// Logger for the given toggle. When logging is disabled the environment
/// filter is not read at all, so no `RUST_LOG` directive can turn it back on.
fn logger_builder(enabled: bool, env: env_logger::Env<'_>) -> env_logger::Builder {
    if enabled {
        env_logger::Builder::from_env(env)
    } else {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(log::LevelFilter::Off);
        builder
    }
}

fn init_logging(enabled: bool) {
    logger_builder(enabled, env_logger::Env::default().default_filter_or("info")).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; variables may come from the real environment
    let _ = dotenvy::dotenv();

    let config = match ProxyConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(config.logging_enabled);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    match server::run_server(config, addr).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
