use std::env;
use std::path::PathBuf;
use clap::Parser;
use crate::gui::application::run_application;
use crate::error::AppRunError;

pub mod car;
pub mod config;
pub mod device;
pub mod error;
pub mod gui;

/// Control panel for Bluetooth LE RC cars.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Path to the config file. Defaults to rc-car-remote.json next to the executable, or the
    /// platform config directory.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log debug messages
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn init_logging(verbose: bool) {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // iced_winit logs every window event at debug level
        .level_for("iced_winit", log::LevelFilter::Info)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        match fern::log_file(&log_file) {
            Ok(file) => dispatch = dispatch.chain(file),
            Err(err) => eprintln!("Failed to open LOG_FILE {}: {}", log_file, err),
        }
    }

    if let Err(err) = dispatch.apply() {
        eprintln!("Failed to initialize logger: {}", err);
    }
}

pub fn run(args: Args) -> Result<(), AppRunError> {
    run_application(args.config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_config_and_verbose() {
        let args = Args::parse_from(["rc-car-remote", "--config", "/tmp/car.json", "-v"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/car.json")));
        assert!(args.verbose);
    }

    #[test]
    fn args_default_to_nothing() {
        let args = Args::parse_from(["rc-car-remote"]);
        assert_eq!(args.config, None);
        assert!(!args.verbose);
    }
}
