//! Application errors
use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
}

impl std::error::Error for AppError {}

#[derive(Debug)]
pub enum ErrorKind {
    Jack(jack::JackError),
    Io(std::io::Error),
    /// Path is neither a source file nor a directory of them.
    InvalidPath(PathBuf),
    /// One or more compilation units failed.
    Failed(usize),
}

impl AppError {
    pub fn invalid_path(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ErrorKind::InvalidPath(path.into()),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "application error: {}", self.kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jack(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::InvalidPath(path) => {
                write!(f, "expected a .jack file or a directory: {}", path.display())
            }
            Self::Failed(count) => write!(f, "{count} unit(s) failed to compile"),
        }
    }
}

impl From<jack::JackError> for AppError {
    fn from(err: jack::JackError) -> Self {
        Self {
            kind: ErrorKind::Jack(err),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io(err),
        }
    }
}
