//! Command-line front end for saved-dl.

use std::io::Write;
use std::path::PathBuf;

use crate::{AppConfig, Pipeline, RunSummary, read_export};

/// Usage text printed for `-h`/`--help` and argument errors.
pub const USAGE: &str = "\
Usage: saved-dl [OPTIONS] [EXPORT_FILE] [BASE_DIR]

Downloads the media behind every link in a saved-links HTML export.

Arguments:
  EXPORT_FILE         Saved-links export (overrides paths.export_file)
  BASE_DIR            Download root (overrides paths.base_dir)

Options:
  -c, --config <FILE> Config file (default: <config dir>/saved-dl/config.toml)
  -w, --workers <N>   Number of concurrent workers (default: 4)
  -h, --help          Show this help

Set RUST_LOG to change the log level (default: info).";

/// Parsed command-line arguments.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Explicit config file.
    pub config: Option<PathBuf>,
    /// Worker count override.
    pub workers: Option<usize>,
    /// Export file override.
    pub export_file: Option<PathBuf>,
    /// Download root override.
    pub base_dir: Option<PathBuf>,
    /// Whether help was requested.
    pub help: bool,
}

impl CliArgs {
    /// Parses arguments (without the program name).
    ///
    /// # Errors
    ///
    /// Returns a message for unknown flags, missing or invalid flag values,
    /// and surplus positional arguments.
    pub fn parse<I, S>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = Self::default();
        let mut positional = Vec::new();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => parsed.help = true,
                "-c" | "--config" => {
                    let value = args.next().ok_or("--config requires a value")?;
                    parsed.config = Some(PathBuf::from(value));
                }
                "-w" | "--workers" => {
                    let value = args.next().ok_or("--workers requires a value")?;
                    let n = value
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| format!("invalid worker count: {value}"))?;
                    parsed.workers = Some(n);
                }
                s if s.starts_with('-') && s.len() > 1 => {
                    return Err(format!("unknown option: {s}"));
                }
                _ => positional.push(PathBuf::from(arg)),
            }
        }

        let mut positional = positional.into_iter();
        parsed.export_file = positional.next();
        parsed.base_dir = positional.next();
        if let Some(extra) = positional.next() {
            return Err(format!("unexpected argument: {}", extra.display()));
        }
        Ok(parsed)
    }

    /// Loads the config file and applies command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is invalid.
    pub fn into_config(self) -> crate::Result<AppConfig> {
        let path = self.config.unwrap_or_else(AppConfig::default_path);
        let mut config = AppConfig::load(&path)?;
        if let Some(workers) = self.workers {
            config.download.workers = workers;
        }
        if let Some(export_file) = self.export_file {
            config.paths.export_file = export_file;
        }
        if let Some(base_dir) = self.base_dir {
            config.paths.base_dir = base_dir;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Installs the process logger: local timestamp, `file:line`, message.
///
/// Defaults to `info`; `RUST_LOG` overrides.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {}:{}: {}",
                chrono::Local::now().format("%Y/%m/%d %H:%M:%S"),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}

/// Reads the export and runs the download pipeline over it.
///
/// # Errors
///
/// Returns an error if the export cannot be read or the HTTP client cannot
/// be built. Individual download failures are part of the summary instead.
pub async fn run(config: &AppConfig) -> crate::Result<RunSummary> {
    let jobs = read_export(&config.paths.export_file, &config.paths.base_dir)?;
    let pipeline = Pipeline::new(config)?;
    log::info!(
        "Downloading {} link(s) into {} with {} worker(s)",
        jobs.len(),
        config.paths.base_dir.display(),
        pipeline.workers()
    );
    Ok(pipeline.run(jobs).await)
}
