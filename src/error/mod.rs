use thiserror::Error;
use tracing::error;

pub const BLOCK_LENGTH_MESSAGE: &str = "Cannot obtain block length";

#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    #[error("Cannot obtain block length for {0}")]
    BlockLengthUnavailable(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("HDFS010 could not copy from {src} to {dest}")]
    CopyFailed { src: String, dest: String },

    #[error("Config error: {0}")]
    Config(String),
}

impl FsError {
    pub fn is_transient(&self) -> bool {
        match self {
            FsError::BlockLengthUnavailable(_) => true,
            FsError::Io(e) => e.to_string().contains(BLOCK_LENGTH_MESSAGE),
            _ => false,
        }
    }

    pub fn from_io(e: std::io::Error, path: &str) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::NotFound => FsError::NotFound(format!("{}: {}", path, e)),
            ErrorKind::PermissionDenied => FsError::PermissionDenied(format!("{}: {}", path, e)),
            ErrorKind::AlreadyExists => FsError::AlreadyExists(format!("{}: {}", path, e)),
            ErrorKind::Interrupted => FsError::Interrupted,
            _ => FsError::Io(e),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            FsError::NotFound(_) => true,
            FsError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        match self {
            FsError::Interrupted => true,
            FsError::Io(e) => e.kind() == std::io::ErrorKind::Interrupted,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

#[derive(Error, Debug)]
#[error("{code} {message}")]
pub struct ReportError {
    pub code: &'static str,
    pub message: String,
    #[source]
    pub cause: FsError,
}

impl ReportError {
    pub fn new(code: &'static str, message: impl Into<String>, cause: FsError) -> Self {
        let message = message.into();
        error!("{} {}: {}", code, message, cause);
        Self {
            code,
            message,
            cause,
        }
    }

    pub fn write(action: &str, path: &str, cause: FsError) -> Self {
        let code = if cause.is_interrupted() { "HDFS021" } else { "HDFS020" };
        Self::new(code, format!("Could not {} file {}", action, path), cause)
    }

    pub fn read(path: &str, cause: FsError) -> Self {
        let code = if cause.is_interrupted() { "HDFS061" } else { "HDFS060" };
        Self::new(code, format!("Could not read file {}", path), cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_transient_classification() {
        assert!(FsError::BlockLengthUnavailable("/a".into()).is_transient());
        let io_err = io::Error::new(io::ErrorKind::Other, "Cannot obtain block length for LocatedBlock{...}");
        assert!(FsError::Io(io_err).is_transient());

        assert!(!FsError::NotFound("/a".into()).is_transient());
        assert!(!FsError::PermissionDenied("/a".into()).is_transient());
        assert!(!FsError::Interrupted.is_transient());
        assert!(!FsError::Io(io::Error::new(io::ErrorKind::Other, "quota exceeded")).is_transient());
    }

    #[test]
    fn test_from_io_mapping() {
        let e = FsError::from_io(io::Error::from(io::ErrorKind::NotFound), "/x");
        assert!(matches!(e, FsError::NotFound(ref p) if p.starts_with("/x: ")));

        let cause = io::Error::new(io::ErrorKind::PermissionDenied, "read-only file system");
        let e = FsError::from_io(cause, "/y");
        assert!(matches!(e, FsError::PermissionDenied(_)));
        assert_eq!(e.to_string(), "Permission denied: /y: read-only file system");

        let cause = io::Error::new(io::ErrorKind::AlreadyExists, "entry exists");
        assert!(FsError::from_io(cause, "/z").to_string().ends_with("/z: entry exists"));

        let os = FsError::from_io(io::Error::from_raw_os_error(2), "/gone");
        assert!(os.is_not_found());
        assert!(os.to_string().contains("No such file or directory"));
        let e = FsError::from_io(io::Error::from(io::ErrorKind::Interrupted), "/x");
        assert!(e.is_interrupted());
    }

    #[test]
    fn test_report_error_codes() {
        let e = ReportError::write("write", "/a.txt", FsError::Interrupted);
        assert_eq!(e.code, "HDFS021");
        assert_eq!(e.to_string(), "HDFS021 Could not write file /a.txt");

        let e = ReportError::read("/a.txt", FsError::NotFound("/a.txt".into()));
        assert_eq!(e.code, "HDFS060");
        assert!(std::error::Error::source(&e).is_some());
    }
}
