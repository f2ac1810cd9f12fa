use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(
    /// Identifier of one login handshake.
    FlowId
);
opaque_id!(
    /// Identifier of an assessment session.
    SessionId
);
opaque_id!(
    /// Identifier returned when an assessment is submitted.
    AssessmentId
);

/// Bearer token returned by the login flow.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form safe to put in logs. Tokens too short to spare a prefix show nothing.
    pub fn redacted(&self) -> String {
        if self.0.chars().count() <= 12 {
            return "…".to_string();
        }
        let visible: String = self.0.chars().take(6).collect();
        format!("{visible}…")
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({})", self.redacted())
    }
}

/// Client id and secret used for the password login method.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// Body of `POST /login/submit`.
#[derive(Debug, Serialize)]
pub struct FlowSessionRequest<'a> {
    pub method: &'a str,
    pub identifier: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<&'a str>,
}

impl<'a> FlowSessionRequest<'a> {
    pub fn password(credentials: &'a Credentials) -> Self {
        Self {
            method: "password",
            identifier: &credentials.client_id,
            password: &credentials.client_secret,
            csrf_token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlowResponse {
    pub id: Option<FlowId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlowSessionResponse {
    pub session_token: Option<SessionToken>,
}

/// Session returned by `POST /sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_assessment_id: Option<AssessmentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessee {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub date_of_birth: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrivingLicense {
    pub id: String,
    pub expiry_date: NaiveDate,
    pub issuer_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub zip_code: String,
    pub country: String,
    pub state: String,
    pub city: String,
}

/// Everything the vendor needs to run a driver assessment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverAssessmentRequest {
    pub assessee: Assessee,
    pub driving_license: DrivingLicense,
    pub address: Address,
}

impl DriverAssessmentRequest {
    /// Staging test identity used by the vendor's walkthrough.
    pub fn sample() -> Self {
        Self {
            assessee: Assessee {
                first_name: "Antonio".to_string(),
                last_name: "Bernette".to_string(),
                middle_name: None,
                date_of_birth: ymd(1982, 11, 17),
                phone: Some("270-555-7152".to_string()),
                email: Some("antonio@email.com".to_string()),
            },
            driving_license: DrivingLicense {
                id: "111119615".to_string(),
                expiry_date: ymd(2024, 10, 20),
                issuer_state: "KY".to_string(),
            },
            address: Address {
                line1: "7104 Cadillac Boulevard".to_string(),
                line2: None,
                zip_code: "76016".to_string(),
                country: "US".to_string(),
                state: "TX".to_string(),
                city: "Arlington".to_string(),
            },
        }
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// RFC 7807 problem document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self.title.as_deref().unwrap_or("no title");
        match &self.detail {
            Some(detail) => write!(f, "{title}: {detail}"),
            None => f.write_str(title),
        }
    }
}

/// Problem document extended with per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ValidationProblemDetails {
    #[serde(flatten)]
    pub problem: ProblemDetails,
    #[serde(default)]
    pub errors: HashMap<String, Vec<String>>,
}

impl fmt::Display for ValidationProblemDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.problem)?;
        let mut fields: Vec<_> = self.errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        for (field, messages) in fields {
            write!(f, "; {field}: {}", messages.join(", "))?;
        }
        Ok(())
    }
}

/// Result of a full login, session, submit and poll run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentOutcome {
    pub session_id: SessionId,
    pub assessment_id: AssessmentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_credentials: Option<serde_json::Value>,
    pub results: serde_json::Value,
}
