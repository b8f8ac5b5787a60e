//! Climadash - climate documents and temperature dashboard
//!
//! A CLI that signs in to the climate dashboard API, turns climate documents
//! into yearly risk/economic/mitigation trends, correlates temperature with
//! the economic score of documents, and administers user accounts.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, authentication, config, etc.)
//!   2 - The query returned no usable data

mod analysis;
mod api;
mod cli;
mod config;
mod dashboard;
mod models;
mod report;

use analysis::{AnalysisError, KeywordRule};
use anyhow::{Context, Result};
use api::{
    ApiClient, ApiError, ClientConfig, DocumentFilters, NewUser, Session, SessionStore,
    TemperatureFilters, UserUpdate,
};
use chrono::{Local, Utc};
use cli::{Args, Command, CorrelateArgs, DocumentQueryArgs, DocumentsArgs, OutputFormat, TrendsArgs, UserCommand};
use config::Config;
use dashboard::ViewState;
use indicatif::{ProgressBar, ProgressStyle};
use models::{
    CorrelationReport, DocumentSummary, DocumentsReport, ReportMetadata, TrendSummary,
    TrendsReport,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit code when a query produced nothing to report on.
const EXIT_NO_DATA: i32 = 2;

/// Topics listed in the documents report.
const TOP_TOPICS: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Climadash v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", redacted(&args));

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            if let Some(api_error) = e.downcast_ref::<ApiError>() {
                if api_error.status() == Some(401) {
                    eprintln!("   Your session may have expired. Run `climadash login` again.");
                }
            }
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .climadash.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to change the API URL, query defaults and keyword rules.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Copy of the arguments with secrets masked, for debug logging.
fn redacted(args: &Args) -> Args {
    let mut args = args.clone();
    if args.token.is_some() {
        args.token = Some("***".to_string());
    }
    match args.command {
        Command::Login {
            ref mut password, ..
        }
        | Command::Users(UserCommand::Create {
            ref mut password, ..
        })
        | Command::Users(UserCommand::Passwd {
            ref mut password, ..
        }) => *password = "***".to_string(),
        _ => {}
    }
    args
}

/// Dispatch the subcommand. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let store = SessionStore::new(&config.session.path);
    let client = ApiClient::new(ClientConfig::from(&config.api))?;

    match args.command.clone() {
        Command::Login { email, password } => handle_login(&client, &store, &email, &password, &args).await,
        Command::Logout => handle_logout(&store, &args),
        Command::Whoami => {
            let session = resolve_session(&args, &store)?;
            handle_whoami(&client, &session, &args).await
        }
        Command::Trends(trends) => {
            let session = resolve_session(&args, &store)?;
            match trends.watch {
                Some(secs) => watch_trends(&client, &session, &config, &args, &trends, secs).await,
                None => handle_trends(&client, &session, &config, &args, &trends).await,
            }
        }
        Command::Documents(docs) => {
            let session = resolve_session(&args, &store)?;
            handle_documents(&client, &session, &config, &args, &docs).await
        }
        Command::Correlate(corr) => {
            let session = resolve_session(&args, &store)?;
            handle_correlate(&client, &session, &config, &args, &corr).await
        }
        Command::Users(command) => {
            let session = admin_session(&client, &args, &store).await?;
            handle_users(&client, &session, &config, &args, command).await
        }
        Command::InitConfig => handle_init_config().map(|_| 0),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// The session for this invocation: `--token` wins over the stored session.
fn resolve_session(args: &Args, store: &SessionStore) -> Result<Session> {
    if let Some(ref token) = args.token {
        debug!("Using token from command line");
        return Ok(Session::new(token.clone(), None));
    }

    match store.load()? {
        Some(session) => {
            debug!("Loaded session from {}", store.path().display());
            Ok(session)
        }
        None => Err(ApiError::NotAuthenticated.into()),
    }
}

/// A session whose user is known, so the role can be checked locally.
async fn admin_session(client: &ApiClient, args: &Args, store: &SessionStore) -> Result<Session> {
    let mut session = resolve_session(args, store)?;
    if session.user.is_none() {
        debug!("Session has no user; fetching profile");
        session.user = Some(client.profile(&session).await?);
    }
    session.require_super_admin()?;
    Ok(session)
}

fn spinner(args: &Args, message: impl Into<String>) -> ProgressBar {
    if args.quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(message.into());
    pb
}

/// Print a status line unless running quietly. Reports own stdout.
fn status(args: &Args, line: &str) {
    if !args.quiet {
        eprintln!("{}", line);
    }
}

/// Write the rendered report to the configured file, or stdout.
fn deliver(config: &Config, args: &Args, content: &str) -> Result<()> {
    match config.general.output {
        Some(ref path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write report to {}", path))?;
            status(args, &format!("\n✅ Report saved to: {}", path));
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn metadata(client: &ApiClient, session: &Session, query: String, started: Instant) -> ReportMetadata {
    ReportMetadata {
        api_url: client.base_url().to_string(),
        generated_at: Utc::now(),
        query,
        requested_by: session.email().map(String::from),
        duration_seconds: started.elapsed().as_secs_f64(),
    }
}

async fn handle_login(
    client: &ApiClient,
    store: &SessionStore,
    email: &str,
    password: &str,
    args: &Args,
) -> Result<i32> {
    let pb = spinner(args, format!("Signing in as {}...", email));
    let result = client.login(email.trim(), password).await;
    pb.finish_and_clear();

    let session = result?;
    store.save(&session)?;
    info!("Session stored at {}", store.path().display());

    match session.user {
        Some(ref user) => status(args, &format!("✅ Signed in as {} ({})", user.name, user.role)),
        None => status(args, "✅ Signed in"),
    }
    Ok(0)
}

fn handle_logout(store: &SessionStore, args: &Args) -> Result<i32> {
    if store.clear()? {
        status(args, "👋 Signed out.");
    } else {
        status(args, "Not signed in.");
    }
    Ok(0)
}

async fn handle_whoami(client: &ApiClient, session: &Session, args: &Args) -> Result<i32> {
    let user = client.profile(session).await?;

    match args.format {
        OutputFormat::Json => println!("{}", report::generate_json_report(&user)?),
        OutputFormat::Markdown => {
            println!("👤 {} <{}>", user.name, user.email);
            println!("   Role: {}", user.role);
            println!("   ID: {}", user.id);
        }
    }
    Ok(0)
}

fn document_filters(config: &Config, query: &DocumentQueryArgs) -> Result<DocumentFilters> {
    let years = query.years.unwrap_or(config.documents.years);
    DocumentFilters::last_years(
        Some(query.topic.clone().unwrap_or_else(|| config.documents.topic.clone())),
        Some(query.region.clone().unwrap_or_else(|| config.documents.region.clone())),
        years,
        Local::now().date_naive(),
    )
    .with_context(|| format!("A window of {} years is out of range", years))
}

/// Everything needed to build a trends report, owned so it can be moved
/// into a background refresh.
#[derive(Debug, Clone)]
struct TrendsJob {
    filters: DocumentFilters,
    rules: Vec<KeywordRule>,
    year: Option<i32>,
}

impl TrendsJob {
    fn new(config: &Config, trends: &TrendsArgs) -> Result<Self> {
        Ok(Self {
            filters: document_filters(config, &trends.query)?,
            rules: config.analysis.rules.clone(),
            year: trends.year,
        })
    }
}

async fn build_trends_report(
    client: &ApiClient,
    session: &Session,
    job: &TrendsJob,
) -> Result<TrendsReport, ApiError> {
    let started = Instant::now();

    let documents = client.fetch_documents(session, &job.filters).await?;
    let buckets = analysis::aggregate(&documents, &job.rules);
    let summary = TrendSummary::from_buckets(&buckets);
    let skipped = documents.len().saturating_sub(summary.total_documents);

    let drilldown = job.year.and_then(|year| {
        let drilldown = analysis::drilldown(&documents, &job.rules, year);
        if drilldown.is_none() {
            warn!("No documents published in {}", year);
        }
        drilldown
    });

    Ok(TrendsReport {
        metadata: metadata(client, session, job.filters.describe(), started),
        summary,
        buckets,
        skipped_documents: skipped,
        drilldown,
    })
}

fn render_trends(report: &TrendsReport, config: &Config, args: &Args) -> Result<String> {
    match args.format {
        OutputFormat::Json => report::generate_json_report(report),
        OutputFormat::Markdown => Ok(report::generate_trends_markdown(
            report,
            config.report.include_documents,
        )),
    }
}

async fn handle_trends(
    client: &ApiClient,
    session: &Session,
    config: &Config,
    args: &Args,
    trends: &TrendsArgs,
) -> Result<i32> {
    let job = TrendsJob::new(config, trends)?;
    status(args, &format!("📥 Fetching documents: {}", job.filters.describe()));

    let pb = spinner(args, "Fetching documents...");
    let result = build_trends_report(client, session, &job).await;
    pb.finish_and_clear();
    let report = result?;

    deliver(config, args, &render_trends(&report, config, args)?)?;

    let summary = &report.summary;
    status(args, "\n📊 Trends Summary:");
    status(args, &format!("   Years: {}", summary.years));
    status(args, &format!("   Documents: {}", summary.total_documents));
    status(
        args,
        &format!(
            "   Risk: {} | Economic: {} | Mitigation: {}",
            summary.risk_mentions, summary.economic_mentions, summary.mitigation_mentions
        ),
    );
    status(args, &format!("   Duration: {:.1}s", report.metadata.duration_seconds));

    if report.buckets.is_empty() {
        status(args, "\n⚠️  No dated documents matched the query.");
        return Ok(EXIT_NO_DATA);
    }
    Ok(0)
}

/// Refresh the trends report every `secs` seconds until Ctrl-C.
///
/// Each refresh runs in its own task. A refresh that finishes after a newer
/// one has started is discarded by the [`ViewState`].
async fn watch_trends(
    client: &ApiClient,
    session: &Session,
    config: &Config,
    args: &Args,
    trends: &TrendsArgs,
    secs: u64,
) -> Result<i32> {
    let job = TrendsJob::new(config, trends)?;
    let view: Arc<ViewState<TrendsReport>> = Arc::new(ViewState::new());
    let (applied_tx, mut applied_rx) = tokio::sync::mpsc::unbounded_channel::<u64>();

    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    status(
        args,
        &format!(
            "👀 Watching {} every {}s (Ctrl-C to stop)",
            job.filters.describe(),
            secs
        ),
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ticket = view.begin();
                debug!("Starting refresh {}", ticket.generation());

                let client = client.clone();
                let session = session.clone();
                let job = job.clone();
                let view = Arc::clone(&view);
                let applied_tx = applied_tx.clone();

                tokio::spawn(async move {
                    match build_trends_report(&client, &session, &job).await {
                        Ok(report) => {
                            if view.apply(ticket, report) {
                                let _ = applied_tx.send(ticket.generation());
                            }
                        }
                        Err(e) => warn!("Refresh {} failed: {}", ticket.generation(), e),
                    }
                });
            }
            Some(generation) = applied_rx.recv() => {
                if let Some(report) = view.snapshot() {
                    status(args, &format!(
                        "\n🔄 Refresh #{} at {}",
                        generation,
                        report.metadata.generated_at.format("%H:%M:%S UTC")
                    ));
                    println!("{}", render_trends(&report, config, args)?);
                }
            }
            _ = &mut ctrl_c => {
                info!("Stopping watch");
                break;
            }
        }
    }

    Ok(0)
}

async fn handle_documents(
    client: &ApiClient,
    session: &Session,
    config: &Config,
    args: &Args,
    docs: &DocumentsArgs,
) -> Result<i32> {
    let started = Instant::now();
    let filters = document_filters(config, &docs.query)?;
    status(args, &format!("📥 Fetching documents: {}", filters.describe()));

    let pb = spinner(args, "Fetching documents...");
    let result = client.fetch_documents(session, &filters).await;
    pb.finish_and_clear();
    let documents = result?;

    let mut selected = match docs.year {
        Some(year) => analysis::documents_in_year(&documents, year),
        None => documents.iter().collect(),
    };
    selected.sort_by_key(|d| std::cmp::Reverse(d.published_on()));

    let mut query = filters.describe();
    if let Some(year) = docs.year {
        query.push_str(&format!(", published in {}", year));
    }

    let report = DocumentsReport {
        metadata: metadata(client, session, query, started),
        per_year: analysis::documents_per_year(&documents),
        top_topics: analysis::top_topics(&documents, TOP_TOPICS),
        documents: selected
            .iter()
            .take(docs.limit)
            .map(|d| DocumentSummary::from(*d))
            .collect(),
    };

    let content = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_documents_markdown(&report),
    };
    deliver(config, args, &content)?;

    status(
        args,
        &format!(
            "\n📄 Listed {} of {} matching documents ({} fetched)",
            report.documents.len(),
            selected.len(),
            documents.len()
        ),
    );

    if selected.is_empty() {
        return Ok(EXIT_NO_DATA);
    }
    Ok(0)
}

async fn handle_correlate(
    client: &ApiClient,
    session: &Session,
    config: &Config,
    args: &Args,
    corr: &CorrelateArgs,
) -> Result<i32> {
    let started = Instant::now();
    let temperature = &config.temperature;

    let location = corr.city.as_deref().unwrap_or(&temperature.location);
    let days = corr.days.unwrap_or(temperature.days);
    let temp_filters = TemperatureFilters::last_days(
        api::resolve_location(location),
        corr.datatype.clone().unwrap_or_else(|| temperature.datatype.clone()),
        days,
        Local::now().date_naive(),
        Some(temperature.units.clone()),
    )
    .with_context(|| format!("A window of {} days is out of range", days))?;
    let doc_filters = temp_filters.matching_documents(Some(
        corr.topic.clone().unwrap_or_else(|| temperature.document_topic.clone()),
    ));

    status(args, &format!("🌡️  Temperature: {}", temp_filters.describe()));
    status(args, &format!("📥 Documents: {}", doc_filters.describe()));

    let pb = spinner(args, "Fetching temperature and documents...");
    let result = futures::try_join!(
        client.fetch_temperature(session, &temp_filters),
        client.fetch_documents(session, &doc_filters),
    );
    pb.finish_and_clear();
    let (samples, documents) = result?;

    let points = match analysis::combine(&samples, &documents, &config.analysis.economic_vocabulary) {
        Ok(points) => points,
        Err(AnalysisError::NoMatchingData) => {
            eprintln!(
                "\n⚠️  {} ({} temperature samples, {} documents)",
                AnalysisError::NoMatchingData,
                samples.len(),
                documents.len()
            );
            return Ok(EXIT_NO_DATA);
        }
        Err(e) => return Err(e.into()),
    };

    let coefficient = analysis::reportable_coefficient(&points);

    let query = format!("{}; {}", temp_filters.describe(), doc_filters.describe());
    let report = CorrelationReport {
        metadata: metadata(client, session, query, started),
        location_id: temp_filters.location_id.clone(),
        points,
        coefficient,
    };

    let content = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => {
            report::generate_correlation_markdown(&report, config.report.max_table_rows)
        }
    };
    deliver(config, args, &content)?;

    let r = report
        .coefficient
        .map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "N/A".to_string());
    status(
        args,
        &format!("\n📈 Correlation: {} over {} data points", r, report.points.len()),
    );
    Ok(0)
}

async fn handle_users(
    client: &ApiClient,
    session: &Session,
    config: &Config,
    args: &Args,
    command: UserCommand,
) -> Result<i32> {
    let response = match command {
        UserCommand::List => {
            let users = client.list_users(session).await?;
            let content = match args.format {
                OutputFormat::Json => report::generate_json_report(&users)?,
                OutputFormat::Markdown => report::generate_users_markdown(&users),
            };
            deliver(config, args, &content)?;
            return Ok(0);
        }
        UserCommand::Create {
            name,
            email,
            password,
        } => {
            let user = NewUser {
                name,
                email: email.trim().to_string(),
                password,
            };
            client.create_user(session, &user).await?
        }
        UserCommand::Update { id, name, email } => {
            let update = UserUpdate {
                name,
                email: email.trim().to_string(),
            };
            client.update_user(session, &id, &update).await?
        }
        UserCommand::Delete { id } => client.delete_user(session, &id).await?,
        UserCommand::Passwd { id, password } => {
            client.change_password(session, &id, &password).await?
        }
    };

    match args.format {
        OutputFormat::Json => println!("{}", report::generate_json_report(&response)?),
        OutputFormat::Markdown => println!("✅ {}", server_message(&response)),
    }
    Ok(0)
}

/// The `message` of a mutation response, or a generic confirmation.
fn server_message(response: &Value) -> String {
    response
        .get("message")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| "Done.".to_string())
}
