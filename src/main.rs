use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lulasafe::graphql::Operations;
use lulasafe::step::StepController;
use lulasafe::{
    ApiKind, AssessmentId, DriverAssessmentRequest, FlowOptions, LulaSafeClient, LulaSafeConfig,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lulasafe")]
#[command(about = "Log in to the LulaSafe risk API, run driver assessments and fetch their results")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Prefix log lines with the time of day
    #[arg(long, global = true)]
    timestamps: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration file
    Init {
        /// Path to save the config file
        #[arg(short, long, default_value = "lulasafe_config.pvt.toml")]
        config: PathBuf,
    },
    /// Log in, open a session, submit an assessment and print its results
    Assess {
        /// Path to the config file
        #[arg(short, long, default_value = "lulasafe_config.pvt.toml")]
        config: PathBuf,
        /// Credentials file with ClientId and ClientSecret
        #[arg(short, long)]
        secrets: Option<PathBuf>,
        /// API used to submit the assessment (rest or graphql)
        #[arg(short, long, default_value = "graphql")]
        api: ApiKind,
        /// TOML or JSON file holding the assessee, drivingLicense and address
        #[arg(short, long)]
        request: Option<PathBuf>,
        /// Seconds to wait before fetching results
        #[arg(short, long)]
        delay: Option<u64>,
        /// Directory with replacement GraphQL documents
        #[arg(long)]
        queries: Option<PathBuf>,
        /// Skip fetching identity-verification credentials (REST)
        #[arg(long)]
        no_verification: bool,
        /// Pause before each request
        #[arg(long)]
        step: bool,
        /// Step numbers that should not pause
        #[arg(long = "skip-step", value_delimiter = ',')]
        skip_steps: Vec<usize>,
    },
    /// Fetch the results of an earlier assessment by id
    Result {
        /// Path to the config file
        #[arg(short, long, default_value = "lulasafe_config.pvt.toml")]
        config: PathBuf,
        /// Credentials file with ClientId and ClientSecret
        #[arg(short, long)]
        secrets: Option<PathBuf>,
        /// Driver assessment id
        #[arg(short, long)]
        id: String,
    },
    /// Dump the GraphQL schema of the risk API
    Introspect {
        /// Path to the config file
        #[arg(short, long, default_value = "lulasafe_config.pvt.toml")]
        config: PathBuf,
        /// Credentials file with ClientId and ClientSecret
        #[arg(short, long)]
        secrets: Option<PathBuf>,
        /// Where to write the schema
        #[arg(short, long, default_value = "lulasafe.introspection.json")]
        output: PathBuf,
    },
}

/// Load the config, merge the secrets file and prompt for anything still missing
fn load_with_credentials(path: &Path, secrets: Option<&Path>) -> Result<LulaSafeConfig> {
    let mut config = lulasafe::config::load_config(path)?;
    if let Some(secrets) = secrets {
        config.apply_secrets(lulasafe::config::load_secrets(secrets)?);
    }
    ensure_credentials(&mut config)?;
    Ok(config)
}

/// Prompt for credentials if not set in config
fn ensure_credentials(config: &mut LulaSafeConfig) -> Result<()> {
    if config.auth.client_id.trim().is_empty() {
        print!("Enter client id: ");
        io::stdout().flush()?;
        let mut client_id = String::new();
        io::stdin().read_line(&mut client_id)?;
        config.auth.client_id = client_id.trim().to_string();

        if config.auth.client_id.is_empty() {
            return Err(anyhow::anyhow!("Client id cannot be empty"));
        }
    }

    if config.auth.client_secret.is_empty() {
        let secret = rpassword::prompt_password("Enter client secret: ")?;
        if secret.is_empty() {
            return Err(anyhow::anyhow!("Client secret cannot be empty"));
        }
        config.auth.client_secret = secret;
    }

    lulasafe::log_info!("Credentials configured for client: {}", config.auth.client_id);
    Ok(())
}

/// Read an assessment request from a `.json` or `.toml` file
fn load_request(path: &Path) -> Result<DriverAssessmentRequest> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let request = if is_json {
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON request: {}", path.display()))?
    } else {
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML request: {}", path.display()))?
    };
    Ok(request)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    lulasafe::logging::init_logging(cli.verbose, cli.timestamps);

    match cli.command {
        Commands::Init { config } => {
            let default_config = lulasafe::config::create_default_config();
            lulasafe::config::save_config(&default_config, &config)?;
            println!("Configuration file created at: {}", config.display());
            println!("Please edit the file with your client id and secret.");
        }

        Commands::Assess {
            config,
            secrets,
            api,
            request,
            delay,
            queries,
            no_verification,
            step,
            skip_steps,
        } => {
            let config = load_with_credentials(&config, secrets.as_deref())?;

            let request = match request {
                Some(path) => load_request(&path)?,
                None => {
                    lulasafe::log_info!("No request file given; using the sample assessee");
                    DriverAssessmentRequest::sample()
                }
            };

            let mut options = FlowOptions::new(api, request);
            if let Some(secs) = delay.or(config.poll_delay_secs) {
                options.poll_delay = Duration::from_secs(secs);
            }
            if let Some(dir) = queries {
                options.operations = Operations::from_dir(&dir)?;
            }
            options.verification_credentials = !no_verification;

            let client = LulaSafeClient::new(config)?;
            let steps = StepController::new(step, &skip_steps);
            let outcome = lulasafe::flow::run_flow(&client, &options, &steps).await?;
            print_json(&outcome)?;
        }

        Commands::Result {
            config,
            secrets,
            id,
        } => {
            let config = load_with_credentials(&config, secrets.as_deref())?;
            let client = LulaSafeClient::new(config)?;

            let token = client.login().await.context("Login failed")?;
            let results = client
                .rest()
                .driver_assessment_by_id(&token, &AssessmentId::new(id))
                .await
                .inspect_err(lulasafe::flow::report_api_error)
                .context("Failed to fetch driver assessment results")?;
            print_json(&results)?;
        }

        Commands::Introspect {
            config,
            secrets,
            output,
        } => {
            let config = load_with_credentials(&config, secrets.as_deref())?;
            let client = LulaSafeClient::new(config)?;

            let token = client.login().await.context("Login failed")?;
            let session = client.create_session(&token).await?;
            client
                .graphql(session.session_id)?
                .introspect(&output)
                .await?;
            println!("Schema written to: {}", output.display());
        }
    }

    Ok(())
}
