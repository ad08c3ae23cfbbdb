use std::fmt::{self, Display};

use actix_web::{error::BlockingError, HttpResponse, ResponseError};
use http::StatusCode;
use serde::{Serialize, Serializer};

/// Error reason
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    InvalidArgument,
    InvalidState,
    NotFound,
    Unauthorized,
    Forbidden,
    Internal,
}

impl Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Reason::InvalidArgument => "INVALID_ARGUMENT",
            Reason::InvalidState => "INVALID_STATE",
            Reason::NotFound => "NOT_FOUND",
            Reason::Unauthorized => "UNAUTHORIZED",
            Reason::Forbidden => "FORBIDDEN",
            Reason::Internal => "INTERNAL",
        };
        write!(f, "ERR_{name}")
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

/// An Error
#[derive(Debug, Serialize)]
pub struct Error {
    code: u32,
    pub reason: Reason,
    message: String,
}

impl Error {
    /// Create a new error
    pub fn new(reason: Reason, message: String) -> Self {
        let code = match reason {
            Reason::InvalidArgument => 1,
            Reason::InvalidState => 2,
            Reason::NotFound => 3,
            Reason::Unauthorized => 4,
            Reason::Forbidden => 5,
            Reason::Internal => 6,
        };
        Error {
            code,
            reason,
            message,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

// To generate JSON response from Error
impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self.reason {
            Reason::InvalidArgument => StatusCode::BAD_REQUEST,
            Reason::InvalidState => StatusCode::BAD_REQUEST,
            Reason::NotFound => StatusCode::NOT_FOUND,
            Reason::Unauthorized => StatusCode::UNAUTHORIZED,
            Reason::Forbidden => StatusCode::FORBIDDEN,
            Reason::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::build(self.status_code()).json(self)
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => {
                Error::new(Reason::NotFound, "Record not found.".to_string())
            }
            err => {
                log::error!(target: "persistent", "Database error: {err}");
                Error::new(Reason::Internal, err.to_string())
            }
        }
    }
}

impl From<r2d2::Error> for Error {
    fn from(err: r2d2::Error) -> Self {
        log::error!(target: "persistent", "Unable to get a database connection: {err}");
        Error::new(Reason::Internal, err.to_string())
    }
}

impl From<BlockingError> for Error {
    fn from(err: BlockingError) -> Self {
        log::error!("Blocking task failed: {err}");
        Error::new(Reason::Internal, err.to_string())
    }
}
