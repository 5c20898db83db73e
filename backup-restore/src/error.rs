//! Error types and result definitions for backup and restore orchestration.
//!
//! [`BrError`] classifies every failure with an [`ErrorKind`], keeps a static description
//! plus optional dynamic detail, and records where it was raised. Several errors can be
//! aggregated into one, which the lifecycle coordinator uses when cleanup also fails.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used across the crate.
pub type BrResult<T> = Result<T, BrError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for backup and restore operations.
#[derive(Debug, Clone)]
pub struct BrError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Several failures reported together, e.g. an operation error followed by a cleanup error.
    Many {
        errors: Vec<BrError>,
        location: &'static Location<'static>,
    },
}

/// Categories of failures raised by the orchestration.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Lifecycle
    OperationAlreadyRunning,
    OperationCancelled,
    OperationPanicked,

    // Maintenance
    WorkersStillRunning,
    ModeToggleFailed,

    // Schema swap
    SchemaSwapFailed,
    InvalidIdentifier,

    // Collaborators
    CoordinationStoreFailed,
    LogChannelFailed,
    JobRegistryFailed,
    DatabaseConnectionFailed,
    DatabaseQueryFailed,

    // Data & configuration
    SerializationError,
    DeserializationError,
    ConfigError,
    InvalidState,
    IoError,

    Unknown,

    /// Raised by a failpoint configured without a kind parameter.
    #[cfg(feature = "failpoints")]
    FailpointInjected,
}

impl BrError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// Aggregated errors report the kind of their first error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error, flattened.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("multiple errors"),
        }
    }

    /// Returns the dynamic detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Returns a one line summary without location or backtrace.
    ///
    /// Used for log channel entries shown to operators.
    pub fn summary(&self) -> String {
        match (&self.repr, self.detail()) {
            (ErrorRepr::Single(payload), Some(detail)) => {
                format!("{}: {detail}", payload.description)
            }
            (ErrorRepr::Single(payload), None) => payload.description.to_string(),
            (ErrorRepr::Many { errors, .. }, _) => errors
                .iter()
                .map(|err| err.summary())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    /// Attaches an originating error, exposed through [`error::Error::source`].
    ///
    /// Has no effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        BrError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for BrError {
    fn eq(&self, other: &BrError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for BrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write_indented(f, "Detail:", detail)?;
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write_indented(f, "Backtrace:", &backtrace)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

fn write_indented(f: &mut fmt::Formatter<'_>, header: &str, body: &str) -> fmt::Result {
    if body.trim().is_empty() {
        return write!(f, "\n  {header} <empty>");
    }

    write!(f, "\n  {header}")?;
    for line in body.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

impl error::Error for BrError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for BrError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> BrError {
        BrError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for BrError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> BrError {
        BrError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl<E> From<Vec<E>> for BrError
where
    E: Into<BrError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> BrError {
        let location = Location::caller();
        let mut errors: Vec<BrError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        BrError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for BrError {
    #[track_caller]
    fn from(err: std::io::Error) -> BrError {
        let detail = err.to_string();
        BrError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for BrError {
    #[track_caller]
    fn from(err: serde_json::Error) -> BrError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        BrError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<sqlx::Error> for BrError {
    #[track_caller]
    fn from(err: sqlx::Error) -> BrError {
        let (kind, description) = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut => (
                ErrorKind::DatabaseConnectionFailed,
                "Database connection failed",
            ),
            sqlx::Error::Configuration(_) => {
                (ErrorKind::ConfigError, "Database configuration is invalid")
            }
            _ => (ErrorKind::DatabaseQueryFailed, "Database operation failed"),
        };

        let detail = err.to_string();
        BrError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<fred::error::Error> for BrError {
    #[track_caller]
    fn from(err: fred::error::Error) -> BrError {
        let detail = err.to_string();
        BrError::from_components(
            ErrorKind::CoordinationStoreFailed,
            Cow::Borrowed("Redis command failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<tokio::task::JoinError> for BrError {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> BrError {
        let kind = if err.is_panic() {
            ErrorKind::OperationPanicked
        } else {
            ErrorKind::OperationCancelled
        };

        let detail = err.to_string();
        BrError::from_components(
            kind,
            Cow::Borrowed("Background task did not complete"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<config::LoadConfigError> for BrError {
    #[track_caller]
    fn from(err: config::LoadConfigError) -> BrError {
        let detail = err.to_string();
        BrError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Configuration could not be loaded"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<config::shared::ValidationError> for BrError {
    #[track_caller]
    fn from(err: config::shared::ValidationError) -> BrError {
        let detail = err.to_string();
        BrError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Configuration is invalid"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
