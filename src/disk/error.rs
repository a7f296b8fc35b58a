use std::io;

/// Errors that can be returned from disk image operations.  These are
/// generally converted into `io::Error`.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum DiskError {
    /// Unknown error
    #[error("unknown error")]
    Unknown,
    /// The image size does not match the disk geometry
    #[error("image size does not match the disk geometry")]
    InvalidGeometry,
    /// Bad track or sector
    #[error("bad track or sector")]
    InvalidLocation,
    /// Offset out of bounds
    #[error("offset out of bounds")]
    InvalidOffset,
    /// A sector chain loops or leaves the disk
    #[error("corrupt sector chain")]
    CorruptChain,
    /// Invalid chain link
    #[error("invalid chain link")]
    InvalidChainLink,
    /// File not found
    #[error("file not found")]
    NotFound,
}

impl From<DiskError> for io::Error {
    fn from(error: DiskError) -> io::Error {
        use self::DiskError::*;
        use std::io::ErrorKind::*;
        match error {
            Unknown => io::Error::new(Other, error),
            InvalidGeometry => io::Error::new(InvalidData, error),
            InvalidLocation => io::Error::new(InvalidInput, error),
            InvalidOffset => io::Error::new(InvalidInput, error),
            CorruptChain => io::Error::new(InvalidData, error),
            InvalidChainLink => io::Error::new(InvalidData, error),
            self::DiskError::NotFound => io::Error::new(io::ErrorKind::NotFound, error),
        }
    }
}

impl From<io::Error> for DiskError {
    fn from(error: io::Error) -> DiskError {
        DiskError::from_io_error(&error).unwrap_or(DiskError::Unknown)
    }
}

impl DiskError {
    /// If the provided `io::Error` contains a `DiskError`, return the
    /// underlying `DiskError`.  If not, return None.
    pub fn from_io_error(error: &io::Error) -> Option<DiskError> {
        error
            .get_ref()
            .and_then(|e| e.downcast_ref::<DiskError>())
            .cloned()
    }
}

impl PartialEq<io::Error> for DiskError {
    fn eq(&self, other: &io::Error) -> bool {
        matches!(DiskError::from_io_error(other), Some(ref e) if e == self)
    }
}

impl PartialEq<DiskError> for io::Error {
    fn eq(&self, other: &DiskError) -> bool {
        other == self
    }
}
