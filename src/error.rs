use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Glob(glob::PatternError),
    AddrParse(std::net::AddrParseError),
    DirectoryNotFound(String),
    /// Traversal or absolute-path attempt. Answered as 404 on purpose so the
    /// response is indistinguishable from a plain missing file.
    PathRejected,
    NotFound,
    Forbidden,
    UnsupportedMediaType,
    /// Carries the total file size so the 416 response can still emit
    /// `Content-Range: bytes */{size}`.
    RangeUnsatisfiable(u64),
    ThumbnailUnavailable,
    BadRequest,
    MethodNotAllowed,
    InternalServerError(String),
}

impl AppError {
    /// HTTP status line for this error.
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            AppError::PathRejected | AppError::NotFound | AppError::ThumbnailUnavailable => {
                (404, "Not Found")
            }
            AppError::Forbidden => (403, "Forbidden"),
            AppError::UnsupportedMediaType => (415, "Unsupported Media Type"),
            AppError::RangeUnsatisfiable(_) => (416, "Range Not Satisfiable"),
            AppError::BadRequest => (400, "Bad Request"),
            AppError::MethodNotAllowed => (405, "Method Not Allowed"),
            _ => (500, "Internal Server Error"),
        }
    }

    /// Classifies an IO error from a filesystem access made on behalf of a
    /// request. Unlike the blanket `From<io::Error>` used for server plumbing,
    /// this maps missing files and ACL failures to their HTTP taxonomy.
    pub fn from_fs(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound,
            std::io::ErrorKind::PermissionDenied => AppError::Forbidden,
            _ => AppError::Io(err),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "IO error: {err}"),
            AppError::Glob(err) => write!(f, "Glob pattern error: {err}"),
            AppError::AddrParse(err) => write!(f, "Address parse error: {err}"),
            AppError::DirectoryNotFound(path) => write!(f, "Directory not found: {path}"),
            AppError::PathRejected => write!(f, "Path rejected"),
            AppError::NotFound => write!(f, "Not Found"),
            AppError::Forbidden => write!(f, "Forbidden"),
            AppError::UnsupportedMediaType => write!(f, "Unsupported media type"),
            AppError::RangeUnsatisfiable(size) => {
                write!(f, "Range not satisfiable against {size} bytes")
            }
            AppError::ThumbnailUnavailable => write!(f, "Thumbnail unavailable"),
            AppError::BadRequest => write!(f, "Bad request"),
            AppError::MethodNotAllowed => write!(f, "Method not allowed"),
            AppError::InternalServerError(msg) => write!(f, "Internal server error: {msg}"),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<glob::PatternError> for AppError {
    fn from(err: glob::PatternError) -> Self {
        AppError::Glob(err)
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(err: std::net::AddrParseError) -> Self {
        AppError::AddrParse(err)
    }
}

impl std::error::Error for AppError {}
