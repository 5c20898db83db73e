use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use backup_restore::error::BrError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

pub type CliResult<T> = Result<T, CliError>;

/// Backtrace captured when a non-[`BrError`] variant is created.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the `brctl` binary.
#[derive(Debug)]
pub enum CliError {
    /// Failure reported by the orchestration core.
    Operation(BrError),
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    Output(serde_json::Error, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
}

impl CliError {
    pub fn category(&self) -> &'static str {
        match self {
            CliError::Operation(_) => "operation error",
            CliError::Config(_, _) => "configuration error",
            CliError::Output(_, _) => "output error",
            CliError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            CliError::Operation(err) => err.backtrace(),
            CliError::Config(_, backtrace) => Some(&backtrace.0),
            CliError::Output(_, backtrace) => Some(&backtrace.0),
            CliError::Io(_, backtrace) => Some(&backtrace.0),
        }
    }

    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        CliError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a multi-line report for the terminal.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("brctl failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Operation(err) => write!(f, "{}", err.summary()),
            CliError::Config(source, _) => write!(f, "configuration error: {source}"),
            CliError::Output(source, _) => write!(f, "cannot write output: {source}"),
            CliError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CliError::Operation(err) => err.source(),
            CliError::Config(source, _) => Some(source.as_ref()),
            CliError::Output(source, _) => Some(source),
            CliError::Io(source, _) => Some(source),
        }
    }
}

impl From<BrError> for CliError {
    fn from(err: BrError) -> Self {
        CliError::Operation(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Output(err, CapturedBacktrace::capture())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err, CapturedBacktrace::capture())
    }
}
