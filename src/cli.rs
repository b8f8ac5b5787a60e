//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Climadash - climate documents and temperature dashboard
///
/// Fetches climate documents and temperature readings from the dashboard
/// API, aggregates them into yearly trends, correlates temperature with an
/// economic score, and manages user accounts.
///
/// Examples:
///   climadash login --email admin@example.org
///   climadash trends --years 3
///   climadash trends --year 2023 --format json -o trends.json
///   climadash correlate --city chicago --days 365
///   climadash users list
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .climadash.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, global = true, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// API server root URL
    #[arg(long, global = true, value_name = "URL", env = "CLIMADASH_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token to use instead of the stored session
    #[arg(long, global = true, env = "CLIMADASH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "CLIMADASH_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Yearly climate-economic trends from documents
    Trends(TrendsArgs),

    /// List documents, optionally for a single year
    Documents(DocumentsArgs),

    /// Correlate temperature with the economic score of documents
    Correlate(CorrelateArgs),

    /// Manage user accounts (super_admin only)
    #[command(subcommand)]
    Users(UserCommand),

    /// Generate a default .climadash.toml configuration file
    InitConfig,
}

/// Filters shared by the document commands.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct DocumentQueryArgs {
    /// Document topic to search for
    #[arg(long)]
    pub topic: Option<String>,

    /// Region code (sent as admreg_exact)
    #[arg(long)]
    pub region: Option<String>,

    /// Number of years back from the current year
    #[arg(long, value_name = "N")]
    pub years: Option<u32>,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct TrendsArgs {
    #[command(flatten)]
    pub query: DocumentQueryArgs,

    /// Include a drilldown for this year
    #[arg(long)]
    pub year: Option<i32>,

    /// Refresh every SECS seconds until interrupted
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DocumentsArgs {
    #[command(flatten)]
    pub query: DocumentQueryArgs,

    /// Only documents published in this year
    #[arg(long)]
    pub year: Option<i32>,

    /// Maximum documents listed
    #[arg(long, default_value = "20", value_name = "N")]
    pub limit: usize,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct CorrelateArgs {
    /// City alias (nyc, la, chicago) or location id
    #[arg(long)]
    pub city: Option<String>,

    /// Number of days back from today
    #[arg(long, value_name = "N")]
    pub days: Option<u32>,

    /// NOAA datatype id (e.g. TMAX, TMIN, TAVG)
    #[arg(long)]
    pub datatype: Option<String>,

    /// Topic of the documents to score
    #[arg(long)]
    pub topic: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// List all users
    List,

    /// Create a user
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "CLIMADASH_NEW_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Update a user's name and email
    Update {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },

    /// Delete a user
    Delete { id: String },

    /// Set a new password for a user
    Passwd {
        id: String,
        #[arg(long, env = "CLIMADASH_NEW_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Minimum password length accepted for new passwords.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Widest temperature window accepted by `correlate --days`.
pub const MAX_DAYS: u32 = 36_500;

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match &self.command {
            Command::Login { email, .. } => validate_email(email)?,
            Command::Trends(trends) => {
                validate_query(&trends.query)?;
                if trends.watch == Some(0) {
                    return Err("Watch interval must be at least 1 second".to_string());
                }
                if trends.watch.is_some() && self.output.is_some() {
                    return Err("--watch prints to the terminal; drop --output".to_string());
                }
            }
            Command::Documents(docs) => {
                validate_query(&docs.query)?;
                if docs.limit == 0 {
                    return Err("Limit must be at least 1".to_string());
                }
            }
            Command::Correlate(corr) => {
                if let Some(days) = corr.days {
                    if days == 0 || days > MAX_DAYS {
                        return Err(format!("Days must be between 1 and {}", MAX_DAYS));
                    }
                }
            }
            Command::Users(UserCommand::Create {
                email, password, ..
            }) => {
                validate_email(email)?;
                validate_password(password)?;
            }
            Command::Users(UserCommand::Update { email, .. }) => validate_email(email)?,
            Command::Users(UserCommand::Passwd { password, .. }) => validate_password(password)?,
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn validate_query(query: &DocumentQueryArgs) -> Result<(), String> {
    if let Some(years) = query.years {
        if years == 0 || years > 100 {
            return Err("Years must be between 1 and 100".to_string());
        }
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(format!("Invalid email address: {}", email)),
    }
}

fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}
