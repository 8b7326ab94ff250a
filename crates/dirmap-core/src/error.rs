use thiserror::Error;

/// Result alias used by every fallible entry point of the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by scan, cache and rule entry points.
///
/// Read jobs never return these: a job records failure as a read state on
/// the node it was reading.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O errors from the filesystem or a cache stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The first line of a cache file is not a recognised header.
    #[error("{path}: not a dirmap cache file")]
    BadCacheHeader { path: String },

    /// A scan was requested on something that is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A URL scan was requested but no remote listing service is installed.
    #[error("no directory service available for {0}")]
    NoDirectoryService(String),

    /// An exclude rule failed to compile.
    #[error("invalid exclude pattern: {0}")]
    InvalidExcludePattern(#[from] regex::Error),

    /// The operation needs a scanned tree but there is none.
    #[error("tree is empty")]
    EmptyTree,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn header_error_names_the_file() {
        let err = CoreError::BadCacheHeader {
            path: "/tmp/x.cache".into(),
        };
        assert_eq!(err.to_string(), "/tmp/x.cache: not a dirmap cache file");
    }
}
