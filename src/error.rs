use std::{io, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorDto;

/// Why a single signing attempt, or a whole job, failed.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("could not start signing tool for {endpoint}: {source}")]
    Launch {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("exit {}: {output}", describe_code(.code))]
    Exit { endpoint: String, code: Option<i32>, output: String },
    #[error("signing with {endpoint} did not finish within {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },
    #[error("signing with {endpoint} produced no readable output: {source}")]
    Output {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("could not read input file: {source}")]
    Input {
        #[source]
        source: io::Error,
    },
    #[error("missing configuration {0}")]
    MissingConfig(&'static str),
    #[error("no timestamp endpoints available")]
    NoEndpoints,
}

fn describe_code(code: &Option<i32>) -> String {
    code.map(|code| code.to_string()).unwrap_or_else(|| "signal".to_string())
}

impl SignError {
    /// Endpoint the failure is attributable to, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            SignError::Launch { endpoint, .. } | SignError::Exit { endpoint, .. } | SignError::Timeout { endpoint, .. } | SignError::Output { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("file field required")]
    MissingFile,
    #[error("Invalid upload")]
    Upload(String),
    #[error("Signing failed")]
    Signing(String),
    #[error("Internal error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::MissingFile | ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::Signing(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            ApiError::Upload(detail) | ApiError::Signing(detail) | ApiError::Internal(detail) => Some(detail.clone()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorDto {
            error: self.to_string(),
            detail: self.detail(),
        };
        (self.status(), Json(body)).into_response()
    }
}
