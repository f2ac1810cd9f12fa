use crate::LulaSafeConfig;
use crate::error::{ApiError, check_login_status, check_status};
use crate::models::{
    Credentials, FlowId, FlowResponse, FlowSessionRequest, FlowSessionResponse, Session,
    SessionToken,
};
use reqwest::Client;

/// Start a login handshake and return its flow id
pub async fn initialize_flow(client: &Client, config: &LulaSafeConfig) -> Result<FlowId, ApiError> {
    let url = config.auth_url(&["login", "initialize"])?;
    crate::log_info!("Initializing login flow: {}", url);

    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await?;
    let body: FlowResponse = check_login_status(response).await?.json().await?;

    let flow_id = body.id.ok_or(ApiError::MissingField {
        endpoint: "login/initialize",
        field: "id",
    })?;
    crate::log_info!("Flow Id: {}", flow_id);
    Ok(flow_id)
}

/// Submit client credentials to the flow and return the bearer token
pub async fn submit_credentials(
    client: &Client,
    config: &LulaSafeConfig,
    flow_id: &FlowId,
    credentials: &Credentials,
) -> Result<SessionToken, ApiError> {
    let mut url = config.auth_url(&["login", "submit"])?;
    url.query_pairs_mut().append_pair("flow", flow_id.as_str());
    crate::log_info!("Submitting credentials for client: {}", credentials.client_id);

    let response = client
        .post(url)
        .header("Accept", "application/json")
        .json(&FlowSessionRequest::password(credentials))
        .send()
        .await?;
    let body: FlowSessionResponse = check_login_status(response).await?.json().await?;

    let token = body.session_token.ok_or(ApiError::MissingField {
        endpoint: "login/submit",
        field: "session_token",
    })?;
    crate::log_info!("Session token received: {}", token.redacted());
    Ok(token)
}

/// Mint an assessment session with the bearer token
pub async fn create_session(
    client: &Client,
    config: &LulaSafeConfig,
    token: &SessionToken,
) -> Result<Session, ApiError> {
    let url = config.risk_url(&["sessions"])?;
    crate::log_info!("Creating session: {}", url);

    let response = client
        .post(url)
        .bearer_auth(token.as_str())
        .header("Accept", "application/json")
        .send()
        .await?;
    let session: Session = check_status(response).await?.json().await?;

    crate::log_info!("Session Id: {}", session.session_id);
    if let Some(assessment_id) = &session.driver_assessment_id {
        crate::log_debug!("Session carries driver assessment id: {}", assessment_id);
    }
    Ok(session)
}
