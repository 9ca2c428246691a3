use std::fmt;

/// Errors surfaced by the paged-file layer (`pf`).
///
/// Carries the stable numeric codes from the external contract
/// (`PFE_*`) via [`PfError::code`], while remaining a normal
/// `std::error::Error` so callers can match on variants instead of
/// integers.
#[derive(Debug)]
pub enum PfError {
    /// Normal end-of-scan/end-of-file condition, not a failure.
    Eof,
    NoMem,
    InvalidPage,
    PageFree,
    PageFixed,
    Io(std::io::Error),
}

impl PfError {
    pub fn code(&self) -> i32 {
        match self {
            PfError::Eof => 1,
            PfError::NoMem => 2,
            PfError::InvalidPage => 3,
            PfError::PageFree => 4,
            PfError::PageFixed => 5,
            PfError::Io(_) => 6,
        }
    }
}

impl fmt::Display for PfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PfError::Eof => write!(f, "PFE_EOF: end of file"),
            PfError::NoMem => write!(f, "PFE_NOMEM: out of memory"),
            PfError::InvalidPage => write!(f, "PFE_INVALIDPAGE: invalid page/slot"),
            PfError::PageFree => write!(f, "PFE_PAGEFREE: slot already deleted"),
            PfError::PageFixed => write!(f, "PFE_PAGEFIXED: page already pinned"),
            PfError::Io(e) => write!(f, "PF I/O error: {}", e),
        }
    }
}

impl std::error::Error for PfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PfError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PfError {
    fn from(e: std::io::Error) -> Self {
        PfError::Io(e)
    }
}

/// Errors surfaced by the access-method layer (`am`).
#[derive(Debug)]
pub enum AmError {
    InvalidAttrType,
    InvalidAttrLength,
    Pf(PfError),
}

impl AmError {
    pub fn code(&self) -> i32 {
        match self {
            AmError::InvalidAttrType => -1,
            AmError::InvalidAttrLength => -2,
            AmError::Pf(_) => -3,
        }
    }
}

impl fmt::Display for AmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AmError::InvalidAttrType => write!(f, "AME_INVALIDATTRTYPE"),
            AmError::InvalidAttrLength => write!(f, "AME_INVALIDATTRLENGTH"),
            AmError::Pf(e) => write!(f, "AME_PF: {}", e),
        }
    }
}

impl std::error::Error for AmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AmError::Pf(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PfError> for AmError {
    fn from(e: PfError) -> Self {
        AmError::Pf(e)
    }
}
