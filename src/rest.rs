use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::LulaSafeClient;
use crate::error::{ApiError, check_status};
use crate::models::{AssessmentId, DriverAssessmentRequest, SessionId, SessionToken};

/// Accepted driver assessment and the per-check statuses the API returned with it.
#[derive(Debug, Clone)]
pub struct DriverAssessmentSubmission {
    pub assessment_id: AssessmentId,
    pub statuses: Value,
}

/// REST flavor of the risk API.
pub struct RestApi<'a> {
    client: &'a LulaSafeClient,
}

impl<'a> RestApi<'a> {
    pub(crate) fn new(client: &'a LulaSafeClient) -> Self {
        Self { client }
    }

    /// `POST /sessions/{sessionId}/driver-assessments`
    pub async fn request_driver_assessment(
        &self,
        session_id: &SessionId,
        request: &DriverAssessmentRequest,
    ) -> Result<DriverAssessmentSubmission, ApiError> {
        let url = self.client.config().risk_url(&[
            "sessions",
            session_id.as_str(),
            "driver-assessments",
        ])?;
        crate::log_info!("Requesting driver assessment: {}", url);

        let response = self
            .client
            .http()
            .post(url)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;
        let statuses: Value = check_status(response).await?.json().await?;

        let assessment_id = assessment_id_from_statuses(&statuses)?;
        crate::log_info!("Driver assessment accepted with id: {}", assessment_id);
        Ok(DriverAssessmentSubmission {
            assessment_id,
            statuses,
        })
    }

    /// Credentials a browser front-end needs for document and selfie verification
    pub async fn identity_verification_credentials(
        &self,
        session_id: &SessionId,
        assessment_id: Option<&AssessmentId>,
    ) -> Result<Value, ApiError> {
        let mut url = self.client.config().risk_url(&[
            "sessions",
            session_id.as_str(),
            "stripe-identity-verification-credentials",
        ])?;
        if let Some(assessment_id) = assessment_id {
            url.query_pairs_mut()
                .append_pair("driverAssessmentId", assessment_id.as_str());
        }
        crate::log_info!("Fetching identity verification credentials: {}", url);

        self.get_json(self.client.http().get(url)).await
    }

    /// `GET /driver-assessments/{id}`, authorized with the bearer token
    pub async fn driver_assessment_by_id(
        &self,
        token: &SessionToken,
        assessment_id: &AssessmentId,
    ) -> Result<Value, ApiError> {
        let url = self
            .client
            .config()
            .risk_url(&["driver-assessments", assessment_id.as_str()])?;
        crate::log_info!("Fetching driver assessment results: {}", url);

        self.get_json(self.client.http().get(url).bearer_auth(token.as_str()))
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.header("Accept", "application/json").send().await?;
        Ok(check_status(response).await?.json().await?)
    }
}

fn assessment_id_from_statuses(statuses: &Value) -> Result<AssessmentId, ApiError> {
    statuses
        .pointer("/assessment/value/id")
        .or_else(|| statuses.pointer("/id"))
        .and_then(Value::as_str)
        .map(AssessmentId::new)
        .ok_or(ApiError::MissingField {
            endpoint: "driver-assessments",
            field: "assessment.value.id",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assessment_id_is_read_from_nested_status() {
        let statuses = json!({
            "assessment": { "status": "Started", "value": { "id": "da-42" } },
            "identityVerification": { "status": "Pending" }
        });
        assert_eq!(
            assessment_id_from_statuses(&statuses).unwrap(),
            AssessmentId::new("da-42")
        );
    }

    #[test]
    fn missing_assessment_id_is_reported() {
        let err = assessment_id_from_statuses(&json!({ "assessment": { "status": "Failed" } }))
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::MissingField {
                field: "assessment.value.id",
                ..
            }
        ));
    }
}
