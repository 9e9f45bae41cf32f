use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    pub fn is_invalid_input_error(&self) -> bool {
        self.code == 101
    }

    pub fn is_resource_unavailable_error(&self) -> bool {
        self.code == 102
    }

    pub fn is_route_computation_failed_error(&self) -> bool {
        self.code == 103
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(_: serde_json::Error) -> Self {
        upstream_error()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.code {
            1..=99 => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            _ => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub fn invalid_state_error() -> Error {
    Error {
        code: 100,
        message: "invalid state".into(),
    }
}

pub fn invalid_input_error() -> Error {
    Error {
        code: 101,
        message: "invalid input".into(),
    }
}

/// Invalid input with a message meant for the user.
pub fn validation_error(message: &str) -> Error {
    Error {
        code: 101,
        message: message.into(),
    }
}

/// The attachment point is not present yet. Retry `open` once it exists.
pub fn resource_unavailable_error() -> Error {
    Error {
        code: 102,
        message: "resource unavailable".into(),
    }
}

pub fn route_computation_failed_error() -> Error {
    Error {
        code: 103,
        message: "route computation failed".into(),
    }
}

pub fn authentication_error(message: String) -> Error {
    Error { code: 104, message }
}

pub fn env_var_error(_: env::VarError) -> Error {
    Error {
        code: 1,
        message: "environment variable error".into(),
    }
}

pub fn reqwest_error(_: reqwest::Error) -> Error {
    Error {
        code: 3,
        message: "reqwest error".into(),
    }
}

pub fn upstream_error() -> Error {
    Error {
        code: 4,
        message: "upstream error".into(),
    }
}

pub fn unexpected_error() -> Error {
    Error {
        code: 5,
        message: "unexpected error".into(),
    }
}

pub fn surface_error() -> Error {
    Error {
        code: 6,
        message: "surface error".into(),
    }
}

#[test]
fn into_response_status_test() {
    let response = upstream_error().into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = resource_unavailable_error().into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = authentication_error("Invalid username or password".into()).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
