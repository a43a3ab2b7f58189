//! apiprobe - API Security Testing Client
//!
//! Command-line client for a backend that runs security probes (SQL
//! injection, XSS, SSRF, ...) against an API under test.

mod app;
mod error;
mod http;
mod reporting;
mod request;
mod session;

pub use error::*;

use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use tokio::sync::broadcast;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::{App, Config, Route};
use crate::http::BackendClient;
use crate::reporting::{DashboardReport, OutputFormat, ReportMetadata, ResultReport};
use crate::request::{
    build_payload, load_spec, save_spec, ApiType, AuthMethod, HttpMethod, KeyValue, ProbeId,
    RequestSpec,
};
use crate::session::FileCredentialStore;

/// API Security Testing Client
#[derive(Parser, Debug)]
#[command(name = "apiprobe")]
#[command(author, version, about = "API security testing client", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "APIPROBE_CONFIG")]
    config: Option<String>,

    /// Backend base URL (overrides the configuration file)
    #[arg(long, global = true, env = "APIPROBE_BACKEND_URL")]
    backend_url: Option<String>,

    /// Token verification timeout in milliseconds
    #[arg(long, global = true, env = "APIPROBE_VERIFY_TIMEOUT_MS")]
    verify_timeout_ms: Option<u64>,

    /// Output format (defaults to general.default_output)
    #[arg(short, long, global = true, value_enum)]
    output: Option<OutputFormat>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "APIPROBE_LOG_LEVEL")]
    log_level: String,

    /// Log file path (enables file logging)
    #[arg(long, global = true, env = "APIPROBE_LOG_FILE")]
    log_file: Option<String>,

    /// Enable JSON structured logging
    #[arg(long, global = true, env = "APIPROBE_LOG_JSON")]
    log_json: bool,

    /// Generate default configuration and exit
    #[arg(long)]
    generate_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the access token
    Login {
        /// Account username
        #[arg(short, long)]
        username: String,

        /// Account password (prompted for when omitted)
        #[arg(short, long, env = "APIPROBE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        /// Account password (prompted for when omitted)
        #[arg(short, long, env = "APIPROBE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored credentials
    Logout,

    /// Verify the stored session and show who is logged in
    Status,

    /// Show test statistics
    Dashboard,

    /// Show previously run test results
    Results {
        /// Also write the report to a file (format from extension)
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Submit an API to the backend for testing
    Run(RunArgs),

    /// Manage request spec files
    #[command(subcommand)]
    Spec(SpecCommand),
}

#[derive(Subcommand, Debug)]
enum SpecCommand {
    /// Write the default request spec to a file
    Init {
        /// Target file (.toml or .json)
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Request spec file to start from
    #[arg(short, long)]
    spec: Option<PathBuf>,

    /// URL of the API under test
    #[arg(long)]
    url: Option<String>,

    /// REST, SOAP or GraphQL
    #[arg(long = "api-type")]
    api_type: Option<ApiType>,

    /// HTTP method (forced to POST for GraphQL)
    #[arg(short = 'X', long)]
    method: Option<HttpMethod>,

    /// Header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = KeyValue::parse_header)]
    headers: Vec<KeyValue>,

    /// Query parameter as "name=value" (repeatable)
    #[arg(short = 'P', long = "param", value_parser = KeyValue::parse_param)]
    params: Vec<KeyValue>,

    /// Raw request body
    #[arg(long, conflicts_with = "body_file")]
    body: Option<String>,

    /// Read the request body from a file
    #[arg(long)]
    body_file: Option<PathBuf>,

    /// GraphQL query
    #[arg(long)]
    query: Option<String>,

    /// GraphQL variables as JSON
    #[arg(long)]
    variables: Option<String>,

    /// none, bearer, api-key or basic
    #[arg(long)]
    auth: Option<AuthMethod>,

    /// Credential for the target API
    #[arg(long, env = "APIPROBE_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Probes to run, comma separated (sql,xss,ssrf,xxe,rate_limit,dos,csrf,jwt)
    #[arg(short, long, value_delimiter = ',')]
    tests: Vec<ProbeId>,

    /// Print the payload instead of submitting it
    #[arg(long)]
    dry_run: bool,

    /// Also write the report to a file (format from extension)
    #[arg(long)]
    save: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Handle special commands first
    if cli.generate_config {
        return generate_default_config(cli.config.as_deref());
    }

    init_logging(&cli)?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting apiprobe");

    let config = load_config(&cli)?;

    if cli.validate_config {
        println!("Configuration is valid");
        return Ok(());
    }

    // Prompt before the signal handlers replace the default Ctrl-C behaviour
    prompt_missing_password(&mut cli.command)?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        handle_signals(shutdown_tx_clone).await;
    });

    match run(cli, config, &shutdown_tx).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<ClientError>() {
            Some(client_err) => {
                tracing::debug!("Command failed: {:?}", client_err);
                eprintln!("Error: {}", client_err.user_message());
                std::process::exit(1);
            }
            None => Err(e),
        },
    }
}

/// Initialize the logging system
///
/// Logs go to stderr (or a rotated file) so stdout carries only reports.
fn init_logging(cli: &Cli) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if let Some(log_path) = &cli.log_file {
        let path = Path::new(log_path);
        let file_appender = match (path.parent(), path.file_name()) {
            (Some(dir), Some(name)) if !dir.as_os_str().is_empty() => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
                RollingFileAppender::new(Rotation::DAILY, dir, name)
            }
            _ => {
                // Bare file name: use the default log directory
                let log_dir = Config::data_dir()
                    .map(|d| d.join("logs"))
                    .unwrap_or_else(|_| PathBuf::from("."));
                std::fs::create_dir_all(&log_dir).ok();
                RollingFileAppender::new(Rotation::DAILY, log_dir, log_path)
            }
        };

        if cli.log_json {
            let file_layer = fmt::layer().json().with_writer(file_appender).with_ansi(false);
            subscriber.with(file_layer).init();
        } else {
            let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);
            subscriber.with(file_layer).init();
        }
    } else if cli.log_json {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

/// Load configuration with CLI overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(url) = &cli.backend_url {
        config.backend.base_url = url.clone();
    }
    if let Some(timeout) = cli.verify_timeout_ms {
        config.backend.verify_timeout_ms = timeout;
    }

    config
        .validate()
        .map_err(ClientError::from)
        .context("Invalid configuration")?;

    Ok(config)
}

/// Generate default configuration, written to `path` or printed
fn generate_default_config(path: Option<&str>) -> Result<()> {
    let config = Config::default();

    if let Some(path) = path {
        if std::path::Path::new(path).exists() {
            anyhow::bail!("{} already exists", path);
        }
        config.save(Some(path))?;
        eprintln!("Wrote default configuration to {}", path);
        return Ok(());
    }

    let toml = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    println!("{}", toml);
    Ok(())
}

/// Handle shutdown signals
///
/// A signal interrupts the pending [`busy`] task if there is one; otherwise
/// the process exits with the conventional `128 + signo` status.
async fn handle_signals(shutdown_tx: broadcast::Sender<()>) {
    let Some(exit_code) = wait_for_signal().await else {
        return;
    };

    if !deliver_shutdown(&shutdown_tx) {
        std::process::exit(exit_code);
    }
}

/// Wait for SIGINT/SIGTERM and return the matching exit status
#[cfg(unix)]
async fn wait_for_signal() -> Option<i32> {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!("Failed to register signal handlers: {}", e);
            return None;
        }
    };

    tokio::select! {
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating shutdown");
            Some(130)
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating shutdown");
            Some(143)
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Option<i32> {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to register Ctrl+C handler: {}", e);
        return None;
    }
    tracing::info!("Received Ctrl+C, initiating shutdown");
    Some(130)
}

/// Broadcast a shutdown; `false` when no task was listening for it
fn deliver_shutdown(shutdown_tx: &broadcast::Sender<()>) -> bool {
    shutdown_tx.send(()).is_ok()
}

/// Run the selected command
async fn run(cli: Cli, config: Config, shutdown_tx: &broadcast::Sender<()>) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let format = cli.output.unwrap_or(config.general.default_output);

    if let Command::Spec(SpecCommand::Init { path, force }) = &command {
        return spec_init(path, *force);
    }
    if let Command::Run(args) = &command {
        if args.dry_run {
            return dry_run(args);
        }
    }

    let backend = Arc::new(BackendClient::new(&config).map_err(ClientError::from)?);
    tracing::debug!(backend = backend.base_url(), "Using backend");
    let credentials_path = config.credentials_path().map_err(ClientError::from)?;
    let store = FileCredentialStore::open_or_reset(credentials_path);
    let mut app = App::new(&config, backend, Box::new(store));

    match command {
        Command::Login { username, password } => {
            let password = password.unwrap_or_default();
            let login = busy(shutdown_tx, "Logging in", app.login(&username, &password)).await?;
            if login.is_none() {
                return Ok(());
            }
            let user = app.session().user().map(|u| u.username.clone()).unwrap_or_default();
            println!("Logged in as {}", user);
        }

        Command::Signup {
            username,
            email,
            password,
        } => {
            let password = password.unwrap_or_default();
            let signup = app.signup(&username, &email, &password);
            let Some(account) = busy(shutdown_tx, "Creating account", signup).await? else {
                return Ok(());
            };
            println!(
                "Account '{}' created for {}. Run `apiprobe login -u {}` to continue.",
                account.username, account.email, account.username
            );
        }

        Command::Logout => {
            app.logout();
            println!("Logged out");
        }

        Command::Status => {
            let verify = async { Ok::<_, ClientError>(app.enter(Route::Dashboard).await) };
            if busy(shutdown_tx, "Verifying session", verify).await?.is_none() {
                return Ok(());
            }
            let status = app.status().await;
            match app.session().user() {
                Some(user) => println!("Session {} ({}), opens on {}", status, user.username, app.route()),
                None => println!("Session {}: not logged in, opens on {}", status, app.route()),
            }
        }

        Command::Dashboard => {
            let data = busy(shutdown_tx, "Loading dashboard", app.dashboard()).await?;
            let Some(data) = data else { return Ok(()) };
            let metadata = ReportMetadata::default().with_title("Security Dashboard");
            print!("{}", DashboardReport::new(data, metadata).render(format)?);
        }

        Command::Results { save } => {
            let results = busy(shutdown_tx, "Loading results", app.results()).await?;
            let Some(results) = results else { return Ok(()) };
            let report = ResultReport::new(results, ReportMetadata::default());
            emit(&report, format, save.as_deref())?;
        }

        Command::Run(args) => {
            let spec = build_spec(&args)?;
            let target = spec.url().to_string();
            let results = busy(shutdown_tx, "Running tests", app.run_tests(&spec)).await?;
            let Some(results) = results else { return Ok(()) };
            let report = ResultReport::new(results, ReportMetadata::default().with_target(target));
            emit(&report, format, args.save.as_deref())?;
        }

        Command::Spec(_) => {}
    }

    Ok(())
}

/// Await `task` behind a stderr progress line
///
/// Returns `None` if a shutdown signal arrives first; the pending result
/// is discarded. Signals are only listened for while the task runs.
async fn busy<T, F>(
    shutdown_tx: &broadcast::Sender<()>,
    label: &str,
    task: F,
) -> Result<Option<T>, ClientError>
where
    F: std::future::Future<Output = Result<T, ClientError>>,
{
    let mut shutdown_rx = shutdown_tx.subscribe();
    let interactive = std::io::stderr().is_terminal();
    let label = label.to_string();
    let indicator = tokio::spawn(async move {
        if !interactive {
            return;
        }
        let mut ticks = 0usize;
        loop {
            eprint!("\r{}{:<3}", label, ".".repeat(ticks % 4));
            let _ = std::io::stderr().flush();
            ticks += 1;
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
    });

    let outcome = tokio::select! {
        result = task => result.map(Some),
        _ = shutdown_rx.recv() => {
            tracing::info!("Interrupted, discarding pending response");
            Ok(None)
        }
    };

    indicator.abort();
    if interactive {
        eprint!("\r\x1b[2K");
    }
    outcome
}

fn emit(report: &ResultReport, format: OutputFormat, save: Option<&Path>) -> Result<()> {
    print!("{}", report.render(format)?);
    if let Some(path) = save {
        report
            .save(path)
            .with_context(|| format!("Failed to save report to {}", path.display()))?;
        eprintln!("Report saved to {}", path.display());
    }
    Ok(())
}

/// Start from the spec file (or the defaults) and apply flags on top
fn build_spec(args: &RunArgs) -> Result<RequestSpec> {
    let mut spec = match &args.spec {
        Some(path) => load_spec(path)?,
        None => RequestSpec::new(),
    };

    if let Some(api_type) = args.api_type {
        spec = spec.set_api_type(api_type);
    }
    if let Some(url) = &args.url {
        spec = spec.set_url(url);
    }
    if let Some(method) = args.method {
        spec = spec.set_method(method);
    }
    for header in &args.headers {
        spec = spec.upsert_header(&header.name, &header.value);
    }
    for param in &args.params {
        spec = spec.push_query_param(param.clone());
    }
    if let Some(body) = &args.body {
        spec = spec.set_body(body);
    }
    if let Some(path) = &args.body_file {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read body file: {}", path.display()))?;
        spec = spec.set_body(body);
    }
    if let Some(query) = &args.query {
        spec = spec.set_graphql_query(query);
    }
    if let Some(variables) = &args.variables {
        spec = spec.set_graphql_variables(variables);
    }
    if let Some(auth) = args.auth {
        spec = spec.set_auth_method(auth);
    }
    if let Some(token) = &args.auth_token {
        spec = spec.set_auth_token(token);
    }
    if !args.tests.is_empty() {
        spec = spec.with_tests(args.tests.iter().copied());
    }

    Ok(spec)
}

fn dry_run(args: &RunArgs) -> Result<()> {
    let spec = build_spec(args)?;
    spec.validate().map_err(ClientError::from)?;
    let payload = build_payload(&spec).map_err(ClientError::from)?;
    println!("{}", payload.to_json()?);
    Ok(())
}

fn spec_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists, pass --force to overwrite", path.display());
    }
    save_spec(&RequestSpec::new(), path)?;
    println!("Wrote default request spec to {}", path.display());
    Ok(())
}

/// Ask for the password of `login`/`signup` when no flag or env var gave one
fn prompt_missing_password(command: &mut Option<Command>) -> Result<()> {
    match command {
        Some(Command::Login { password, .. }) | Some(Command::Signup { password, .. })
            if password.is_none() =>
        {
            *password = Some(prompt_secret("Password")?);
        }
        _ => {}
    }
    Ok(())
}

/// Read a secret without echo on a terminal, or a plain line from piped stdin
fn prompt_secret(label: &str) -> Result<String> {
    if std::io::stdin().is_terminal() {
        return rpassword::prompt_password(format!("{}: ", label)).context("Failed to read password");
    }

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
