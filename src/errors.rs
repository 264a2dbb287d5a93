use rocket::http::Status;
use thiserror::Error;

/// Errors from the Snapshot Store (§4.1).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn status(&self) -> Status {
        match self {
            StoreError::NotFound => Status::NotFound,
            StoreError::InvalidId(_) => Status::BadRequest,
            StoreError::Io(_) => Status::InternalServerError,
        }
    }
}

/// Errors from the Room Engine (§4.2).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("room is closed")]
    RoomClosed,

    #[error("malformed change: {0}")]
    Protocol(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn json_error(status: Status, message: impl Into<String>) -> (Status, rocket::serde::json::Json<serde_json::Value>) {
    (status, rocket::serde::json::Json(serde_json::json!({ "error": message.into() })))
}
