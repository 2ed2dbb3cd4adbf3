//! pttlink command-line entry point

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use cli::{Cli, Command, LineArg, ProfileAction};
use pttlink_lib::adapters::{MockSerial, SerialPortFactory};
use pttlink_lib::domain::{PttConfig, PttError, PttResult, PttType};
use pttlink_lib::keyer::{CwKeyer, CwTiming};
use pttlink_lib::ports::SerialFactory;
use pttlink_lib::profiles::ProfileStore;
use pttlink_lib::{build_ptt, LineSelector, PortHandle, SharedPortRegistry};

/// Where profiles live when `--config-dir` is not given
const DEFAULT_CONFIG_DIR: &str = ".pttlink";

/// Slack on top of the computed CW air time before `cw` gives up
const CW_FLUSH_MARGIN: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> PttResult<()> {
    let store = ProfileStore::new(
        cli.config_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
    );
    let base = match &cli.profile {
        Some(name) => store.load(name)?,
        None => PttConfig::default(),
    };

    match cli.command {
        Command::List => {
            let factory = transport(cli.mock, base.port.as_deref());
            let ports = factory
                .list_ports()
                .map_err(|e| PttError::Config(format!("Failed to list ports: {e}")))?;
            if ports.is_empty() {
                println!("No serial ports found");
            }
            for port in ports {
                println!("{}\t{}", port.name, port.port_type);
            }
            Ok(())
        }
        Command::Key {
            port,
            line,
            delay_ms,
            tail_ms,
            hold_ms,
        } => {
            let config = PttConfig {
                port: port.or(base.port.clone()),
                ptt_type: line.map_or(base.ptt_type, PttType::from),
                delay_ms: delay_ms.unwrap_or(base.delay_ms),
                tail_ms: tail_ms.unwrap_or(base.tail_ms),
                ..base
            };
            let factory = transport(cli.mock, config.port.as_deref());
            let registry = Arc::new(SharedPortRegistry::new(factory));
            key(&config, &registry, Duration::from_millis(hold_ms))
        }
        Command::Cw {
            port,
            line,
            wpm,
            text,
        } => {
            let port = port
                .or(base.port.clone())
                .ok_or_else(|| PttError::Config("No serial port given".to_string()))?;
            let selector = match line {
                Some(LineArg::Dtr) => LineSelector::Primary,
                Some(LineArg::Rts) => LineSelector::Secondary,
                None => LineSelector::for_ptt_type(base.ptt_type).unwrap_or_default(),
            };
            let factory = transport(cli.mock, Some(&port));
            let mut keyer =
                CwKeyer::exclusive(port, factory, selector, wpm.unwrap_or(base.cw_wpm))?;
            let limit = CwTiming::from_wpm(keyer.wpm())?.air_time(&text) + CW_FLUSH_MARGIN;
            keyer.connect()?;
            keyer.send(&text)?;
            let flushed = keyer.flush(limit);
            keyer.disconnect();
            flushed
        }
        Command::Profile { action } => profile(&store, action),
    }
}

/// Build the transport; the mock gets the requested port plugged in.
fn transport(mock: bool, port: Option<&str>) -> Arc<dyn SerialFactory> {
    if mock {
        log::info!("Using mock serial ports");
        Arc::new(MockSerial::with_ports(port))
    } else {
        Arc::new(SerialPortFactory)
    }
}

fn key(
    config: &PttConfig,
    registry: &Arc<SharedPortRegistry>,
    hold: Duration,
) -> PttResult<()> {
    // In shared mode this process also plays the radio-control side.
    let radio = match (&config.port, config.share_port) {
        (Some(port), true) => Some(registry.acquire(port.as_str())?),
        _ => None,
    };

    let keyed = key_for(config, registry, radio.clone(), hold);

    // Given back on every path, so a failed connect does not strand the port
    let released = match radio {
        Some(radio) => registry.release(&radio),
        None => Ok(()),
    };
    keyed.and(released)
}

fn key_for(
    config: &PttConfig,
    registry: &Arc<SharedPortRegistry>,
    radio: Option<PortHandle>,
    hold: Duration,
) -> PttResult<()> {
    let mut ptt = build_ptt(config, registry, radio)?;
    ptt.connect()?;
    ptt.on();
    std::thread::sleep(hold);
    ptt.off();
    ptt.disconnect();
    Ok(())
}

fn profile(store: &ProfileStore, action: ProfileAction) -> PttResult<()> {
    match action {
        ProfileAction::List => {
            for name in store.list()? {
                println!("{name}");
            }
        }
        ProfileAction::Save {
            name,
            port,
            ptt_type,
            share,
            delay_ms,
            tail_ms,
            wpm,
        } => {
            let config = PttConfig {
                name,
                ptt_type,
                port,
                share_port: share,
                delay_ms,
                tail_ms,
                cw_wpm: wpm,
            };
            config.validate()?;
            store.save(&config)?;
            log::info!("Saved profile '{}' in {}", config.name, store.dir().display());
        }
        ProfileAction::Show { name } => {
            let config = store.load(&name)?;
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| PttError::Config(format!("Serialization error: {e}")))?;
            println!("{json}");
        }
        ProfileAction::Delete { name } => store.delete(&name)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pttlink_lib::domain::ControlLine;

    fn shared_profile(port: &str) -> PttConfig {
        PttConfig {
            port: Some(port.to_string()),
            share_port: true,
            delay_ms: 0,
            ..PttConfig::default()
        }
    }

    #[test]
    fn shared_key_gives_the_radio_port_back() {
        let mock = MockSerial::with_ports(["COM3"]);
        let registry = Arc::new(SharedPortRegistry::new(Arc::new(mock.clone())));
        key(&shared_profile("COM3"), &registry, Duration::ZERO).unwrap();
        assert!(registry.tracked_ports().is_empty());
        assert!(!mock.is_open("COM3"));
        assert!(!mock.line_state("COM3", ControlLine::Dtr));
    }

    #[test]
    fn failed_shared_connect_still_releases_the_radio_port() {
        let mock = MockSerial::with_ports(["COM3"]);
        mock.fail_line_writes("COM3", true);
        let registry = Arc::new(SharedPortRegistry::new(Arc::new(mock.clone())));

        let err = key(&shared_profile("COM3"), &registry, Duration::ZERO).unwrap_err();
        assert!(matches!(err, PttError::LineControlFailed { .. }));
        assert!(registry.tracked_ports().is_empty());
        assert!(!mock.is_open("COM3"));
        assert_eq!(mock.close_count("COM3"), 1);
    }

    #[test]
    fn invalid_shared_profile_still_releases_the_radio_port() {
        let mock = MockSerial::with_ports(["COM3"]);
        let registry = Arc::new(SharedPortRegistry::new(Arc::new(mock.clone())));
        let config = PttConfig {
            cw_wpm: 0,
            ..shared_profile("COM3")
        };

        assert!(matches!(
            key(&config, &registry, Duration::ZERO),
            Err(PttError::Config(_))
        ));
        assert!(registry.tracked_ports().is_empty());
        assert!(!mock.is_open("COM3"));
    }
}
