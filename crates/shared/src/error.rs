use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Serialize)]
pub enum CommonError {
    #[error("request is not authenticated.")]
    Authentication {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("unknown error")]
    Unknown(
        #[serde(skip)]
        #[from]
        anyhow::Error,
    ),
    #[error("invalid request")]
    InvalidRequest {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("invalid configuration: {msg}")]
    InvalidConfiguration {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<DynError>,
    },
    #[error("io error")]
    IoError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::io::Error,
    },
    #[error("address parse error")]
    AddrParseError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::net::AddrParseError,
    },
}

impl CommonError {
    fn status_code(&self) -> StatusCode {
        match self {
            CommonError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            CommonError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            CommonError::Unknown(_)
            | CommonError::InvalidConfiguration { .. }
            | CommonError::IoError { .. }
            | CommonError::AddrParseError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            CommonError::Authentication { .. } => "Authentication",
            CommonError::InvalidRequest { .. } => "InvalidRequest",
            CommonError::InvalidConfiguration { .. } => "InvalidConfiguration",
            CommonError::Unknown(_)
            | CommonError::IoError { .. }
            | CommonError::AddrParseError { .. } => "InternalServerError",
        }
    }
}

impl IntoResponse for CommonError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            name: self.kind_name().to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    name: String,
    message: String,
}
