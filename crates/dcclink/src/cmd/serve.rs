use std::io::BufRead;
use std::sync::Arc;

use dcclink_frame::PollConfig;
use dcclink_regs::{SimulatedDebugger, StdDelay};
use dcclink_relay::{
    spawn_echo_target, ConsoleCommand, LinkPump, RelayConfig, RelayControl, RelayServer,
};
use tracing::{debug, info};

use crate::cmd::ServeArgs;
use crate::exit::{io_error, relay_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = resolve_config(&args)?;

    let debugger = SimulatedDebugger::new(true);
    spawn_echo_target(&debugger, config.frame_size, PollConfig::default())
        .map_err(|err| io_error("loopback target failed to start", err))?;

    let server =
        RelayServer::bind(config.clone()).map_err(|err| relay_error("bind failed", err))?;
    let addr = server
        .local_addr()
        .map_err(|err| relay_error("bind failed", err))?;
    print_event("listening", &addr.to_string(), format);

    let control = server.control();
    install_ctrlc_handler(Arc::clone(&control))?;
    spawn_console(Arc::clone(&control), format)?;

    let pump = LinkPump::probe(debugger.probe(), StdDelay, &config);
    server
        .run(pump)
        .map_err(|err| relay_error("relay failed", err))?;

    info!("relay stopped");
    Ok(SUCCESS)
}

fn resolve_config(args: &ServeArgs) -> CliResult<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::from_json_file(path)
            .map_err(|err| relay_error("config load failed", err))?,
        None => RelayConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = &args.bind {
        config.bind_address = bind.clone();
    }
    if args.disabled {
        config.enabled = false;
    }
    Ok(config)
}

/// Read `dcc ...` commands from stdin until it closes.
fn spawn_console(control: Arc<RelayControl>, format: OutputFormat) -> CliResult<()> {
    std::thread::Builder::new()
        .name("dcc-console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match ConsoleCommand::parse(&line) {
                    Ok(command) => print_event("console", command.apply(&control), format),
                    Err(err) => print_event("console", &err.to_string(), format),
                }
            }
            debug!("console input closed");
        })
        .map(|_| ())
        .map_err(|err| io_error("console failed to start", err))
}

fn install_ctrlc_handler(control: Arc<RelayControl>) -> CliResult<()> {
    ctrlc::set_handler(move || control.stop()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ServeArgs {
        ServeArgs {
            port: None,
            bind: None,
            config: None,
            disabled: false,
        }
    }

    #[test]
    fn defaults_without_flags() {
        let config = resolve_config(&args()).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn flags_override_config_file() {
        let path = std::env::temp_dir().join(format!("dcclink-serve-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "port": 4000, "frame_size": 64 }"#).unwrap();

        let config = resolve_config(&ServeArgs {
            port: Some(5000),
            bind: Some("0.0.0.0".into()),
            config: Some(path.clone()),
            disabled: true,
        })
        .unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.frame_size, 64);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert!(!config.enabled);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let err = resolve_config(&ServeArgs {
            config: Some("/nonexistent/dcclink.json".into()),
            ..args()
        })
        .unwrap_err();
        assert_eq!(err.code, crate::exit::CONFIG_ERROR);
    }
}
