use anyhow::{Context, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ApiError;
use crate::graphql::Operations;
use crate::models::{AssessmentOutcome, DriverAssessmentRequest, Session, SessionToken};
use crate::step::StepController;
use crate::LulaSafeClient;

/// Which surface of the risk API submits the assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKind {
    Rest,
    GraphQl,
}

impl ApiKind {
    /// Results take a while to accumulate server side.
    pub fn default_poll_delay(self) -> Duration {
        match self {
            Self::Rest => Duration::from_secs(10),
            Self::GraphQl => Duration::from_secs(5),
        }
    }
}

impl FromStr for ApiKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "graphql" | "gql" => Ok(Self::GraphQl),
            other => Err(format!("unknown api '{other}', expected 'rest' or 'graphql'")),
        }
    }
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest => f.write_str("rest"),
            Self::GraphQl => f.write_str("graphql"),
        }
    }
}

/// Inputs of one assessment run.
#[derive(Debug, Clone)]
pub struct FlowOptions {
    pub api: ApiKind,
    pub request: DriverAssessmentRequest,
    pub poll_delay: Duration,
    pub operations: Operations,
    /// Also fetch identity-verification credentials (REST only)
    pub verification_credentials: bool,
}

impl FlowOptions {
    pub fn new(api: ApiKind, request: DriverAssessmentRequest) -> Self {
        Self {
            api,
            request,
            poll_delay: api.default_poll_delay(),
            operations: Operations::default(),
            verification_credentials: true,
        }
    }
}

/// Log a failed API call the way each documented status deserves.
pub fn report_api_error(err: &ApiError) {
    match err {
        ApiError::BadRequest(problem) => {
            crate::log_error!("Return code 400: Invalid assessment request. {}", problem);
        }
        ApiError::SessionNotFound => crate::log_error!("Return code 404: SessionNotFound."),
        ApiError::SessionExpired => crate::log_error!("Return code 410: SessionExpired."),
        ApiError::Validation(details) => {
            crate::log_error!("Return code 422: Incorrect parameters supplied. {}", details.problem);
            let mut fields: Vec<_> = details.errors.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            for (field, messages) in fields {
                crate::log_error!("  {}: {}", field, messages.join(", "));
            }
        }
        other => crate::log_error!("{}", other),
    }
}

async fn open_session(
    client: &LulaSafeClient,
    steps: &StepController,
) -> Result<(SessionToken, Session)> {
    steps.pause("Log in with client credentials")?;
    let token = client.login().await.context("Failed to obtain session token")?;

    steps.pause("Create assessment session")?;
    let session = client
        .create_session(&token)
        .await
        .context("Failed to create session")?;

    Ok((token, session))
}

async fn wait_for_results(delay: Duration, steps: &StepController) -> Result<()> {
    steps.pause("Fetch assessment results")?;
    if !delay.is_zero() {
        crate::log_info!(
            "Waiting {} ms for results to accumulate on server...",
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
    }
    Ok(())
}

/// Log in, open a session, submit the assessment and fetch its results.
pub async fn run_flow(
    client: &LulaSafeClient,
    options: &FlowOptions,
    steps: &StepController,
) -> Result<AssessmentOutcome> {
    crate::log_info!("Running {} assessment flow against {}", options.api, client.config().base_url);
    match options.api {
        ApiKind::Rest => run_rest_flow(client, options, steps).await,
        ApiKind::GraphQl => run_graphql_flow(client, options, steps).await,
    }
}

pub async fn run_rest_flow(
    client: &LulaSafeClient,
    options: &FlowOptions,
    steps: &StepController,
) -> Result<AssessmentOutcome> {
    let (token, session) = open_session(client, steps).await?;
    let rest = client.rest();

    steps.pause("Request driver assessment")?;
    let submission = rest
        .request_driver_assessment(&session.session_id, &options.request)
        .await
        .inspect_err(report_api_error)
        .context("Driver assessment request was rejected")?;
    crate::log_debug!("Assessment status: {}", submission.statuses);

    let verification_credentials = if options.verification_credentials {
        steps.pause("Fetch identity verification credentials")?;
        match rest
            .identity_verification_credentials(&session.session_id, Some(&submission.assessment_id))
            .await
        {
            Ok(credentials) => {
                crate::log_info!("Verification credentials received");
                Some(credentials)
            }
            Err(err) => {
                crate::log_warn!("Could not fetch verification credentials: {}", err);
                None
            }
        }
    } else {
        None
    };

    wait_for_results(options.poll_delay, steps).await?;
    let results = rest
        .driver_assessment_by_id(&token, &submission.assessment_id)
        .await
        .inspect_err(report_api_error)
        .context("Failed to fetch driver assessment results")?;
    crate::log_info!("Assessment results received by id: {}", submission.assessment_id);

    Ok(AssessmentOutcome {
        session_id: session.session_id,
        assessment_id: submission.assessment_id,
        verification_credentials,
        results,
    })
}

pub async fn run_graphql_flow(
    client: &LulaSafeClient,
    options: &FlowOptions,
    steps: &StepController,
) -> Result<AssessmentOutcome> {
    let (_token, session) = open_session(client, steps).await?;
    let graphql = client
        .graphql(session.session_id.clone())?
        .with_operations(options.operations.clone());

    steps.pause("Run assessment mutation")?;
    let assessment_id = graphql
        .assess(&options.request.assessee, &options.request.address)
        .await
        .inspect_err(report_api_error)
        .context("Assessment mutation failed")?;

    wait_for_results(options.poll_delay, steps).await?;
    let results = graphql
        .assessment_result(&assessment_id)
        .await
        .inspect_err(report_api_error)
        .context("Failed to retrieve assessment results")?;

    Ok(AssessmentOutcome {
        session_id: session.session_id,
        assessment_id,
        verification_credentials: None,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_kind_parses_case_insensitively() {
        assert_eq!("REST".parse::<ApiKind>().unwrap(), ApiKind::Rest);
        assert_eq!("GraphQL".parse::<ApiKind>().unwrap(), ApiKind::GraphQl);
        assert_eq!("gql".parse::<ApiKind>().unwrap(), ApiKind::GraphQl);
        assert!("soap".parse::<ApiKind>().is_err());
    }

    #[test]
    fn each_api_has_its_own_poll_delay() {
        let rest = FlowOptions::new(ApiKind::Rest, DriverAssessmentRequest::sample());
        let graphql = FlowOptions::new(ApiKind::GraphQl, DriverAssessmentRequest::sample());
        assert_eq!(rest.poll_delay, Duration::from_secs(10));
        assert_eq!(graphql.poll_delay, Duration::from_secs(5));
        assert!(rest.verification_credentials);
    }
}
