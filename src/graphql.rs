use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;

use crate::LulaSafeClient;
use crate::error::{ApiError, check_status};
use crate::models::{Address, Assessee, AssessmentId, SessionId};

pub const CHECK_INSURANCE_AND_REQUEST_VEHICLES: &str =
    include_str!("../graphql/CheckInsuranceAndRequestVehicles.gql");
pub const RETRIEVE_INSURANCE_AND_VEHICLES_RESULT: &str =
    include_str!("../graphql/RetrieveInsuranceAndVehiclesResult.gql");
pub const INTROSPECTION: &str = include_str!("../graphql/Introspection.gql");

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
    #[serde(default)]
    extensions: Option<Value>,
}

impl GraphQlErrorEntry {
    fn into_api_error(self) -> ApiError {
        let status = self
            .extensions
            .as_ref()
            .and_then(|ext| ext.get("statusCode"))
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok());

        match (status, self.extensions) {
            (Some(status), Some(extensions)) => {
                crate::log_error!("GraphQL error {}: {}", status, self.message);
                ApiError::from_status(status, &extensions.to_string()).with_message(&self.message)
            }
            _ => ApiError::GraphQl {
                message: self.message,
            },
        }
    }
}

/// Operations loaded from disk in place of the built-in ones.
#[derive(Debug, Clone)]
pub struct Operations {
    pub assess: String,
    pub result: String,
}

impl Default for Operations {
    fn default() -> Self {
        Self {
            assess: CHECK_INSURANCE_AND_REQUEST_VEHICLES.to_string(),
            result: RETRIEVE_INSURANCE_AND_VEHICLES_RESULT.to_string(),
        }
    }
}

impl Operations {
    /// Load `CheckInsuranceAndRequestVehicles.gql` and `RetrieveInsuranceAndVehiclesResult.gql`
    /// from a directory.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        use anyhow::Context;

        let dir = dir.as_ref();
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read GraphQL document: {}", path.display()))
        };
        Ok(Self {
            assess: read("CheckInsuranceAndRequestVehicles.gql")?,
            result: read("RetrieveInsuranceAndVehiclesResult.gql")?,
        })
    }
}

/// GraphQL endpoint bound to one assessment session.
pub struct GraphQlClient<'a> {
    client: &'a LulaSafeClient,
    session_id: SessionId,
    url: url::Url,
    operations: Operations,
}

impl<'a> GraphQlClient<'a> {
    pub(crate) fn new(client: &'a LulaSafeClient, session_id: SessionId) -> Result<Self, ApiError> {
        let url = client.config().graphql_url()?;
        Ok(Self {
            client,
            session_id,
            url,
            operations: Operations::default(),
        })
    }

    pub fn with_operations(mut self, operations: Operations) -> Self {
        self.operations = operations;
        self
    }

    /// Run a raw document and return its `data`
    pub async fn execute(&self, query: &str, variables: Value) -> Result<Value, ApiError> {
        crate::log_debug!("Sending GraphQL document to: {}", self.url);
        let response = self
            .client
            .http()
            .post(self.url.clone())
            .header("session-id", self.session_id.as_str())
            .header("Accept", "application/json")
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;
        let body: GraphQlResponse = check_status(response).await?.json().await?;

        if let Some(error) = body.errors.into_iter().next() {
            return Err(error.into_api_error());
        }
        Ok(body.data.unwrap_or(Value::Null))
    }

    /// Start insurance and vehicle checks and return the assessment id
    pub async fn assess(
        &self,
        assessee: &Assessee,
        address: &Address,
    ) -> Result<AssessmentId, ApiError> {
        crate::log_info!("Running CheckInsuranceAndRequestVehicles mutation");
        let data = self
            .execute(
                &self.operations.assess,
                json!({ "assessee": assessee, "address": address }),
            )
            .await?;

        let id = data
            .pointer("/assess/id")
            .and_then(Value::as_str)
            .map(AssessmentId::new)
            .ok_or(ApiError::MissingField {
                endpoint: "graphql assess",
                field: "assess.id",
            })?;
        crate::log_info!("Assessment query ID returned from server: {}", id);
        Ok(id)
    }

    /// Fetch what has accumulated for an assessment so far
    pub async fn assessment_result(&self, assessment_id: &AssessmentId) -> Result<Value, ApiError> {
        crate::log_info!("Retrieving results for assessment: {}", assessment_id);
        self.execute(&self.operations.result, json!({ "id": assessment_id }))
            .await
    }

    /// Introspect the schema and write it as JSON to `output`
    pub async fn introspect<P: AsRef<Path>>(&self, output: P) -> anyhow::Result<Value> {
        use anyhow::Context;

        let output = output.as_ref();
        let schema = self.execute(INTROSPECTION, json!({})).await?;
        let contents = serde_json::to_string(&schema)?;
        std::fs::write(output, contents)
            .with_context(|| format!("Failed to write schema: {}", output.display()))?;
        crate::log_info!("Schema written to {}", output.display());
        Ok(schema)
    }
}
