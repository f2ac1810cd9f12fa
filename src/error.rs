use reqwest::StatusCode;

use crate::models::{ProblemDetails, ValidationProblemDetails};

/// Failures reported by the LulaSafe API or while talking to it.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid assessment request (400): {0}")]
    BadRequest(ProblemDetails),
    #[error("session not found (404)")]
    SessionNotFound,
    #[error("session expired (410)")]
    SessionExpired,
    #[error("incorrect parameters supplied (422): {0}")]
    Validation(ValidationProblemDetails),
    #[error("unexpected response status {status}: {body}")]
    Unexpected { status: u16, body: String },
    #[error("graphql error: {message}")]
    GraphQl { message: String },
    #[error("response from {endpoint} is missing `{field}`")]
    MissingField {
        endpoint: &'static str,
        field: &'static str,
    },
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http transport failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    /// Map an error status and its body onto the documented failure cases.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            400 => Self::BadRequest(serde_json::from_str(body).unwrap_or_else(|_| ProblemDetails {
                status: Some(400),
                detail: non_empty(body),
                ..ProblemDetails::default()
            })),
            404 => Self::SessionNotFound,
            410 => Self::SessionExpired,
            422 => Self::Validation(serde_json::from_str(body).unwrap_or_else(|_| {
                ValidationProblemDetails {
                    problem: ProblemDetails {
                        status: Some(422),
                        detail: non_empty(body),
                        ..ProblemDetails::default()
                    },
                    ..ValidationProblemDetails::default()
                }
            })),
            status => Self::Unexpected {
                status,
                body: body.to_string(),
            },
        }
    }

    /// Status code the failure corresponds to, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::SessionNotFound => Some(404),
            Self::SessionExpired => Some(410),
            Self::Validation(_) => Some(422),
            Self::Unexpected { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Fill an empty problem detail (or prefix an unexpected body) with a server message.
    pub fn with_message(self, message: &str) -> Self {
        let Some(message) = non_empty(message) else {
            return self;
        };
        match self {
            Self::BadRequest(mut problem) => {
                problem.detail.get_or_insert(message);
                Self::BadRequest(problem)
            }
            Self::Validation(mut details) => {
                details.problem.detail.get_or_insert(message);
                Self::Validation(details)
            }
            Self::Unexpected { status, body } => Self::Unexpected {
                status,
                body: match non_empty(&body) {
                    Some(body) => format!("{message} {body}"),
                    None => message,
                },
            },
            other => other,
        }
    }

    /// Per-field validation messages for a 422 response.
    pub fn field_errors(&self) -> Option<&std::collections::HashMap<String, Vec<String>>> {
        match self {
            Self::Validation(details) => Some(&details.errors),
            _ => None,
        }
    }
}

fn non_empty(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Return the response untouched on success, otherwise turn it into an [`ApiError`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    checked(response, ApiError::from_status).await
}

/// Like [`check_status`] for the login endpoints, where the session statuses do not apply.
pub(crate) async fn check_login_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    checked(response, |status, body| ApiError::Unexpected {
        status,
        body: body.to_string(),
    })
    .await
}

async fn checked(
    response: reqwest::Response,
    map: impl FnOnce(u16, &str) -> ApiError,
) -> Result<reqwest::Response, ApiError> {
    let status: StatusCode = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    crate::log_error!("Request failed with status: {}", status);
    crate::log_debug!("Error details: {}", body);
    Err(map(status.as_u16(), &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_map_to_named_cases() {
        assert!(matches!(
            ApiError::from_status(404, ""),
            ApiError::SessionNotFound
        ));
        assert!(matches!(
            ApiError::from_status(410, ""),
            ApiError::SessionExpired
        ));
        assert!(matches!(
            ApiError::from_status(503, "down"),
            ApiError::Unexpected { status: 503, .. }
        ));
    }

    #[test]
    fn bad_request_keeps_problem_details() {
        let err = ApiError::from_status(
            400,
            r#"{"title":"Bad Request","status":400,"detail":"assessee is required"}"#,
        );
        match &err {
            ApiError::BadRequest(problem) => {
                assert_eq!(problem.detail.as_deref(), Some("assessee is required"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.status(), Some(400));
        assert_eq!(
            err.to_string(),
            "invalid assessment request (400): Bad Request: assessee is required"
        );
    }

    #[test]
    fn unparseable_bodies_are_kept_as_detail() {
        match ApiError::from_status(400, "plain text failure") {
            ApiError::BadRequest(problem) => {
                assert_eq!(problem.detail.as_deref(), Some("plain text failure"));
                assert_eq!(problem.status, Some(400));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn server_message_fills_missing_detail() {
        let err = ApiError::from_status(400, r#"{"statusCode":400}"#)
            .with_message("assessee.dateOfBirth is required");
        assert_eq!(
            err.to_string(),
            "invalid assessment request (400): no title: assessee.dateOfBirth is required"
        );

        let err = ApiError::from_status(400, r#"{"title":"Bad Request","detail":"kept"}"#)
            .with_message("ignored");
        assert_eq!(err.to_string(), "invalid assessment request (400): Bad Request: kept");

        match ApiError::from_status(500, r#"{"statusCode":500}"#).with_message("boom") {
            ApiError::Unexpected { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, r#"boom {"statusCode":500}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validation_errors_are_exposed_per_field() {
        let err = ApiError::from_status(
            422,
            r#"{"title":"Validation failed","errors":{"DrivingLicense.Id":["required"]}}"#,
        );
        let fields = err.field_errors().expect("validation errors");
        assert_eq!(fields["DrivingLicense.Id"], vec!["required".to_string()]);
        assert!(ApiError::SessionExpired.field_errors().is_none());
    }
}
