use russh_sftp::{client::error::Error as SftpError, protocol::StatusCode};
use std::{fmt, io};
use thiserror::Error;
use tokio::time::error::Elapsed;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes surfaced to gateway callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No live session; raised before any network traffic
    NotConnected,
    /// Authentication, handshake or connect timeout
    Connection,
    NotFound,
    PermissionDenied,
    AlreadyExists,
    /// Directory removal refused because it still has entries
    NotEmpty,
    /// Operation applied to the wrong kind of entry
    WrongType,
    /// Caller supplied missing or malformed parameters
    InvalidInput,
    /// Anything else, carrying the raw description
    Unclassified,
}

/// Filesystem operation the failure came from. Selects the wording of
/// not-found messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    List,
    Read,
    Write,
    Mkdir,
    Remove,
    Rename,
    Stat,
    Upload,
    Download,
}

impl Op {
    const fn subject(self) -> &'static str {
        match self {
            Self::List => "Directory",
            Self::Read | Self::Write | Self::Rename | Self::Upload | Self::Download => "File",
            Self::Mkdir | Self::Remove | Self::Stat => "Path",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::Read => "read",
            Self::Write => "write",
            Self::Mkdir => "mkdir",
            Self::Remove => "remove",
            Self::Rename => "rename",
            Self::Stat => "stat",
            Self::Upload => "upload",
            Self::Download => "download",
        };
        f.write_str(name)
    }
}

/// Classified gateway error with a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new<M: Into<String>>(kind: ErrorKind, message: M) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn not_connected() -> Self {
        Self::new(ErrorKind::NotConnected, "Not connected")
    }

    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn auth_failed<M: fmt::Display>(detail: M) -> Self {
        Self::new(
            ErrorKind::Connection,
            format!("Authentication failed - {detail}"),
        )
    }

    pub fn handshake<M: fmt::Display>(detail: M) -> Self {
        Self::new(
            ErrorKind::Connection,
            format!("SSH connection failed - {detail}"),
        )
    }

    pub fn connect_timeout<M: fmt::Display>(detail: M) -> Self {
        Self::new(
            ErrorKind::Connection,
            format!("Connection timeout - {detail}"),
        )
    }

    pub fn not_found(op: Op, path: &str) -> Self {
        Self::new(
            ErrorKind::NotFound,
            format!("{} not found: {path}", op.subject()),
        )
    }

    pub fn permission_denied(path: &str) -> Self {
        Self::new(
            ErrorKind::PermissionDenied,
            format!("Permission denied: {path}"),
        )
    }

    pub fn already_exists(path: &str) -> Self {
        Self::new(
            ErrorKind::AlreadyExists,
            format!("Directory already exists: {path}"),
        )
    }

    pub fn not_empty(path: &str) -> Self {
        Self::new(ErrorKind::NotEmpty, format!("Directory not empty: {path}"))
    }

    pub fn is_directory(path: &str) -> Self {
        Self::new(ErrorKind::WrongType, format!("'{path}' is a directory"))
    }

    pub fn unclassified<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorKind::Unclassified, message)
    }

    /// Local staging I/O failure, never attributed to the remote side
    pub fn staging(error: &io::Error) -> Self {
        Self::unclassified(format!("Staging: {error}"))
    }
}

/// Maps a failure reported by the SFTP channel onto the error taxonomy.
///
/// Servers report most conditions through status codes. A generic
/// `SSH_FX_FAILURE` is refined by its message text where the server is
/// explicit about it; callers that can probe the remote side refine it further.
pub fn classify(op: Op, path: &str, error: SftpError) -> Error {
    let classified = match &error {
        SftpError::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => Error::not_found(op, path),
            StatusCode::PermissionDenied => Error::permission_denied(path),
            StatusCode::Failure => {
                let text = status.error_message.to_lowercase();
                if text.contains("not empty") {
                    Error::not_empty(path)
                } else if text.contains("exist") {
                    Error::already_exists(path)
                } else {
                    Error::unclassified(error.to_string())
                }
            }
            _ => Error::unclassified(error.to_string()),
        },
        _ => Error::unclassified(error.to_string()),
    };

    warn!("{op} {path}: {classified}");
    classified
}

/// Same as [`classify`] for errors raised while streaming file contents,
/// which the channel reports as [`io::Error`].
pub fn classify_io(op: Op, path: &str, error: &io::Error) -> Error {
    let classified = match error.kind() {
        io::ErrorKind::NotFound => Error::not_found(op, path),
        io::ErrorKind::PermissionDenied => Error::permission_denied(path),
        _ => Error::unclassified(error.to_string()),
    };

    warn!("{op} {path}: {classified}");
    classified
}

/// Returns `true` for a bare `SSH_FX_FAILURE` status that [`classify`]
/// could not refine from its message.
pub(crate) fn is_generic_failure(error: &SftpError) -> bool {
    matches!(
        error,
        SftpError::Status(status) if status.status_code == StatusCode::Failure
    )
}

impl From<russh::Error> for Error {
    fn from(error: russh::Error) -> Self {
        match error {
            russh::Error::NotAuthenticated => Self::auth_failed(error),
            russh::Error::ConnectionTimeout | russh::Error::Elapsed(_) => {
                Self::connect_timeout(error)
            }
            error => Self::handshake(error),
        }
    }
}

impl From<Elapsed> for Error {
    fn from(error: Elapsed) -> Self {
        Self::connect_timeout(error)
    }
}
