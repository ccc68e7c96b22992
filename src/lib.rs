pub mod commands;
pub mod config;
pub mod inference;
pub mod launcher;
pub mod prompt;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use config::LoggingConfig;

/// File name of the log written when file logging is enabled.
const LOG_FILE_NAME: &str = "sqlcoder-tgi.log";

/// Return the platform-standard data directory for sqlcoder-tgi.
///
/// - macOS: `~/Library/Application Support/sqlcoder-tgi/`
/// - Linux: `$XDG_DATA_HOME/sqlcoder-tgi/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.sqlcoder-tgi/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("sqlcoder-tgi");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sqlcoder-tgi")
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over `config.filter`. With `config.file` set, existing logs
/// are rotated and a fresh line-flushed `sqlcoder-tgi.log` is opened;
/// otherwise events go to stderr. Returns the log file path, if any.
pub fn init_tracing(config: &LoggingConfig) -> io::Result<Option<PathBuf>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let (writer, log_path) = if config.file {
        let log_dir = config
            .dir
            .as_deref()
            .map(|dir| PathBuf::from(config::expand_tilde(dir)))
            .unwrap_or_else(data_dir);
        std::fs::create_dir_all(&log_dir)?;

        let log_path = log_dir.join(LOG_FILE_NAME);
        rotate_log_file(&log_path, config.keep);

        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        (BoxMakeWriter::new(FlushingWriter::new(log_file)), Some(log_path))
    } else {
        (BoxMakeWriter::new(std::io::stderr), None)
    };

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(!config.file)
        .with_target(true)
        .with_thread_ids(false);

    // A second initialization (tests, embedding) keeps the first subscriber.
    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = ?log_path.as_ref().map(|p| p.display().to_string()),
        pid = std::process::id(),
        "=== sqlcoder-tgi starting ==="
    );

    Ok(log_path)
}

/// Path of the `n`th rotated copy of `base`, e.g. `sqlcoder-tgi.log.2`.
fn rotated_path(base: &Path, n: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Move the previous run's log out of the way before a new one is opened.
///
/// Copies are numbered from 1 (newest) to `keep`; whatever was at `keep`
/// is discarded. Gaps in the numbering are tolerated. `keep == 0` keeps no
/// history at all.
fn rotate_log_file(base: &Path, keep: u32) {
    if keep == 0 {
        let _ = std::fs::remove_file(base);
        return;
    }

    let _ = std::fs::remove_file(rotated_path(base, keep));
    for n in (1..keep).rev() {
        let _ = std::fs::rename(rotated_path(base, n), rotated_path(base, n + 1));
    }
    if base.exists() {
        let _ = std::fs::rename(base, rotated_path(base, 1));
    }
}

/// Shared log file handle whose every write is pushed to disk immediately.
///
/// The launcher can sit in weight loading for minutes; if the supervisor is
/// killed meanwhile, the log still ends at the last event emitted.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<Mutex<File>>,
}

impl FlushingWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))
    }
}

impl Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.lock()?;
        let written = file.write(buf)?;
        file.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
