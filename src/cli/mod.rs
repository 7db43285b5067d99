//! CLI module for the Ajali command-line client.
//!
//! Each subcommand stands in for one page of the web client:
//! - `login` / `signup` / `logout` / `whoami` - session management
//! - `report` - submit an emergency report with optional media
//! - `attach` - attach media to a report whose upload failed
//! - `reports list` / `reports status` - admin triage
//! - `contacts add|list|remove` - local emergency contacts
//! - `open <path>` / `nav` - route guard and navigation bar

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

use crate::admin::ReportBoard;
use crate::api::{ApiClient, Report, StatusTone};
use crate::config::Config;
use crate::contacts::{ContactBook, ContactForm};
use crate::error::ClientError;
use crate::report::{MediaFile, ReportForm, StagedMedia, SubmissionFlow, INCIDENT_TYPES};
use crate::routes::{self, NavAction, Navigation, Route};
use crate::session::{self, FileStore, LoginForm, SessionStore, SignupForm, SignupResult};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "ajali")]
#[command(author, version, about = "Report emergencies and track their status", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ajali.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API URL to connect to (overrides api.base_url)
    #[arg(long, env = "AJALI_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "AJALI_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create a new account
    Signup {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "AJALI_PASSWORD", hide_env_values = true)]
        password: String,
        /// 10-digit phone number
        #[arg(long)]
        phone: String,
    },

    /// Forget the stored session
    Logout,

    /// Show who is logged in
    Whoami,

    /// Submit an emergency report
    Report {
        /// Incident type (Fire, Traffic accident, ...)
        #[arg(short, long)]
        incident: String,
        #[arg(short, long)]
        details: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<String>,
        /// Image or video files to attach
        #[arg(short, long, num_args = 1..)]
        media: Vec<PathBuf>,
        /// Take coordinates from a `lat=..&lng=..` query string
        #[arg(long)]
        from_query: Option<String>,
    },

    /// Attach media to a report created earlier, one upload attempt per run
    Attach {
        /// Id of the report the files belong to
        report_id: i64,
        /// Image or video files to attach
        #[arg(short, long, num_args = 1.., required = true)]
        media: Vec<PathBuf>,
    },

    /// Admin report commands
    #[command(subcommand)]
    Reports(ReportsCommands),

    /// Emergency contact commands
    #[command(subcommand)]
    Contacts(ContactsCommands),

    /// Show what navigating to a page would do
    Open {
        /// Page path, e.g. /user-dashboard
        path: String,
    },

    /// Show the navigation bar for the current session
    Nav {
        /// Page the bar is rendered on
        #[arg(default_value = "/user-dashboard")]
        page: String,
    },
}

/// Reports subcommands
#[derive(Subcommand, Debug)]
pub enum ReportsCommands {
    /// List all reports
    List,
    /// Change a report's status
    Status {
        id: i64,
        /// pending, under_investigation, rejected, resolved or completed
        status: String,
    },
}

/// Contacts subcommands
#[derive(Subcommand, Debug)]
pub enum ContactsCommands {
    /// Add an emergency contact
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "")]
        relation: String,
        #[arg(long)]
        email: Option<String>,
        /// Owner of the contact (default: the logged-in user)
        #[arg(long)]
        user_id: Option<String>,
    },
    /// List emergency contacts
    List,
    /// Remove an emergency contact
    Remove { id: u32 },
}

/// Everything a command needs, built once from the config.
struct App {
    config: Config,
    sessions: SessionStore,
    api: ApiClient,
}

impl App {
    fn new(cli: &Cli, mut config: Config) -> Result<Self> {
        if let Some(url) = &cli.api_url {
            config.api.base_url = url.clone();
        }

        let store = FileStore::open(&config.session_path()).map_err(banner)?;
        let sessions = SessionStore::new(Box::new(store)).map_err(banner)?;
        let api = ApiClient::new(&config.api.base_url, config.api.timeout()).map_err(banner)?;

        Ok(Self {
            config,
            sessions,
            api,
        })
    }

    /// Refuse to run a command whose page the route guard would not render.
    fn guard(&self, route: Route) -> Result<()> {
        match routes::resolve(route, &self.sessions) {
            Navigation::Render(_) => Ok(()),
            Navigation::Redirect(_) => Err(banner(ClientError::AuthenticationRequired)),
        }
    }
}

/// Turn a client error into the line shown to the user, with one line per
/// field for validation failures.
fn banner(err: ClientError) -> anyhow::Error {
    match &err {
        ClientError::Validation(errors) => {
            let mut text = err.banner();
            for (field, message) in errors.iter() {
                text.push_str(&format!("\n  {}: {}", field, message));
            }
            anyhow::anyhow!(text)
        }
        _ => anyhow::anyhow!(err.banner()),
    }
}

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: Config) -> Result<()> {
    let mut ctx = App::new(cli, config)?;

    match &cli.command {
        Commands::Login { email, password } => cmd_login(&mut ctx, email, password).await,
        Commands::Signup {
            first_name,
            last_name,
            email,
            password,
            phone,
        } => {
            let form = SignupForm {
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                email: email.clone(),
                password: password.clone(),
                phone_number: phone.clone(),
            };
            cmd_signup(&mut ctx, &form).await
        }
        Commands::Logout => cmd_logout(&mut ctx),
        Commands::Whoami => cmd_whoami(&ctx),
        Commands::Report {
            incident,
            details,
            lat,
            lng,
            media,
            from_query,
        } => {
            let mut form = ReportForm::new(incident.as_str(), details.as_str());
            if let Some(query) = from_query {
                if !form.prefill_from_query(query) {
                    warn!("Query string has no lat/lng pair, ignoring it");
                }
            }
            if let Some(lat) = lat {
                form.latitude = lat.clone();
            }
            if let Some(lng) = lng {
                form.longitude = lng.clone();
            }
            cmd_report(&ctx, form, media).await
        }
        Commands::Attach { report_id, media } => cmd_attach(&ctx, *report_id, media).await,
        Commands::Reports(ReportsCommands::List) => cmd_reports_list(&ctx).await,
        Commands::Reports(ReportsCommands::Status { id, status }) => {
            cmd_reports_status(&ctx, *id, status).await
        }
        Commands::Contacts(ContactsCommands::Add {
            name,
            phone,
            relation,
            email,
            user_id,
        }) => {
            let form = ContactForm {
                user_id: user_id
                    .clone()
                    .or_else(|| ctx.sessions.user_id().map(str::to_string))
                    .unwrap_or_default(),
                relation: relation.clone(),
                contact_name: name.clone(),
                phone_number: phone.clone(),
                email: email.clone(),
            };
            cmd_contacts_add(&ctx, form)
        }
        Commands::Contacts(ContactsCommands::List) => cmd_contacts_list(&ctx),
        Commands::Contacts(ContactsCommands::Remove { id }) => cmd_contacts_remove(&ctx, *id),
        Commands::Open { path } => cmd_open(&ctx, path),
        Commands::Nav { page } => cmd_nav(&ctx, page),
    }
}

async fn cmd_login(ctx: &mut App, email: &str, password: &str) -> Result<()> {
    println!("Connecting to {}...", ctx.api.base_url());

    let form = LoginForm::new(email, password);
    let session = session::login(&mut ctx.sessions, &ctx.api, &form)
        .await
        .map_err(banner)?;

    println!(
        "Logged in as {} ({})",
        greeting_name(&session.display_name, &session.email),
        session.role
    );
    Ok(())
}

async fn cmd_signup(ctx: &mut App, form: &SignupForm) -> Result<()> {
    match session::signup(&mut ctx.sessions, &ctx.api, form)
        .await
        .map_err(banner)?
    {
        SignupResult::LoggedIn(session) => {
            println!("Account created. Logged in as {}", session.email);
        }
        SignupResult::Registered { message } => {
            println!("{}", message.unwrap_or_else(|| "Account created.".to_string()));
            println!("Run `ajali login` to sign in.");
        }
    }
    Ok(())
}

fn cmd_logout(ctx: &mut App) -> Result<()> {
    ctx.sessions.logout().map_err(banner)?;
    println!("Logged out.");
    Ok(())
}

fn cmd_whoami(ctx: &App) -> Result<()> {
    match ctx.sessions.current() {
        Some(session) => {
            println!();
            println!("User ID:    {}", session.user_id);
            println!("Name:       {}", greeting_name(&session.display_name, "-"));
            println!("Email:      {}", session.email);
            println!("Role:       {}", session.role);
            println!();
        }
        None => println!("Not logged in."),
    }
    Ok(())
}

async fn cmd_report(ctx: &App, form: ReportForm, media_paths: &[PathBuf]) -> Result<()> {
    ctx.guard(Route::ShareLocation)?;

    if !INCIDENT_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(form.incident.trim()))
    {
        warn!(incident = %form.incident, "Incident type is not one of the listed types");
    }

    let mut flow = SubmissionFlow::with_form(form);
    flow.media = stage_files(media_paths).await?;

    println!("Submitting report...");
    let outcome = match flow.submit(&ctx.sessions, &ctx.api).await {
        Ok(outcome) => outcome,
        Err(ClientError::PartialFailure { report_id, message }) => {
            println!("Report #{} was created.", report_id);
            println!("Attaching media failed: {}", message);
            println!("{}", attach_hint(report_id, media_paths));
            anyhow::bail!("Report #{} has no media attached", report_id);
        }
        Err(e) => {
            if e.is_retryable_by_resubmit() {
                println!("Nothing was saved. You can run the same command again.");
            }
            return Err(banner(e));
        }
    };

    println!();
    println!("Report #{} submitted.", outcome.report.id);
    print_report(&outcome.report);
    if outcome.media_count > 0 {
        println!("Media:      {} file(s) attached", outcome.media_count);
    }
    println!();
    Ok(())
}

async fn cmd_attach(ctx: &App, report_id: i64, media_paths: &[PathBuf]) -> Result<()> {
    ctx.guard(Route::ShareLocation)?;

    let staged = stage_files(media_paths).await?;
    if staged.is_empty() {
        anyhow::bail!("No image or video files to attach");
    }

    let mut flow = SubmissionFlow::for_pending_media(report_id, staged);
    println!("Attaching {} file(s) to report #{}...", flow.media.len(), report_id);
    match flow.retry_media(&ctx.sessions, &ctx.api).await {
        Ok(_) => {
            println!("Media attached to report #{}.", report_id);
            Ok(())
        }
        Err(e) => {
            println!("Attaching media failed: {}", e.banner());
            println!("{}", attach_hint(report_id, media_paths));
            Err(banner(e))
        }
    }
}

/// Load the files at `paths` and keep the images and videos among them
async fn stage_files(paths: &[PathBuf]) -> Result<StagedMedia> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(MediaFile::from_path(path).await.map_err(banner)?);
    }

    let mut staged = StagedMedia::new();
    let rejected = staged.stage(files);
    if rejected > 0 {
        println!("Skipped {} file(s) that are not images or videos.", rejected);
    }
    for file in staged.files() {
        println!("  + {} ({} KB)", file.file_name, file.size_kb());
    }
    Ok(staged)
}

fn attach_hint(report_id: i64, media_paths: &[PathBuf]) -> String {
    let files: Vec<String> = media_paths.iter().map(|p| p.display().to_string()).collect();
    format!(
        "Run `ajali attach {} --media {}` to try again.",
        report_id,
        files.join(" ")
    )
}

async fn cmd_reports_list(ctx: &App) -> Result<()> {
    ctx.guard(Route::AdminDashboard)?;

    let mut board = ReportBoard::new();
    let reports = board.refresh(&ctx.api).await.map_err(banner)?;

    if reports.is_empty() {
        println!("No reports found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<8}  {:<20}  {:<30}  {:<26}  {:<22}  {:<5}",
        "ID", "INCIDENT", "DETAILS", "STATUS", "LOCATION", "MEDIA"
    );
    println!("{}", "-".repeat(121));

    for report in reports {
        println!("{}", report_row(report));
    }

    println!();
    Ok(())
}

async fn cmd_reports_status(ctx: &App, id: i64, status: &str) -> Result<()> {
    ctx.guard(Route::UpdateReportStatus)?;

    let mut board = ReportBoard::new();
    let status = board
        .update_status(&ctx.api, Some(id), Some(status))
        .await
        .map_err(banner)?;

    println!("Report #{} is now {}.", id, status);
    Ok(())
}

fn open_contacts(ctx: &App) -> Result<ContactBook> {
    let path = ctx.config.contacts_path();
    ContactBook::open(&path)
        .map_err(banner)
        .with_context(|| format!("Failed to open contacts at {}", path.display()))
}

fn cmd_contacts_add(ctx: &App, form: ContactForm) -> Result<()> {
    ctx.guard(Route::EmergencyContact)?;

    let mut book = open_contacts(ctx)?;
    let contact = book.add(form).map_err(banner)?;
    println!("Contact #{} added: {}", contact.id, contact.contact_name);
    Ok(())
}

fn cmd_contacts_list(ctx: &App) -> Result<()> {
    ctx.guard(Route::EmergencyContact)?;

    let book = open_contacts(ctx)?;
    let contacts: Vec<_> = match ctx.sessions.user_id() {
        Some(user_id) => book.for_user(user_id).collect(),
        None => book.list().iter().collect(),
    };

    if contacts.is_empty() {
        println!("No emergency contacts.");
        return Ok(());
    }

    println!();
    println!(
        "{:<4}  {:<12}  {:<24}  {:<16}  {:<30}",
        "ID", "RELATION", "NAME", "PHONE", "EMAIL"
    );
    println!("{}", "-".repeat(92));
    for contact in contacts {
        println!(
            "{:<4}  {:<12}  {:<24}  {:<16}  {:<30}",
            contact.id,
            truncate(&contact.relation, 12),
            truncate(&contact.contact_name, 24),
            contact.phone_number,
            contact.email.as_deref().unwrap_or("-")
        );
    }
    println!();
    Ok(())
}

fn cmd_contacts_remove(ctx: &App, id: u32) -> Result<()> {
    ctx.guard(Route::EmergencyContact)?;

    let mut book = open_contacts(ctx)?;
    match book.remove(id).map_err(banner)? {
        Some(contact) => println!("Removed {}.", contact.contact_name),
        None => anyhow::bail!("Contact not found: {}", id),
    }
    Ok(())
}

fn cmd_open(ctx: &App, path: &str) -> Result<()> {
    let route = Route::from_path(path).with_context(|| format!("Unknown page: {}", path))?;

    match routes::resolve(route, &ctx.sessions) {
        Navigation::Render(route) => println!("Render {}", route),
        Navigation::Redirect(target) => println!("Redirect to {}", target),
    }
    Ok(())
}

fn cmd_nav(ctx: &App, page: &str) -> Result<()> {
    let current = Route::from_path(page).with_context(|| format!("Unknown page: {}", page))?;

    for item in routes::nav_links(&ctx.sessions, current) {
        match item.action {
            NavAction::Go(route) => println!("  {:<20} {}", item.label, route),
            NavAction::Logout => println!("  {:<20} (logout)", item.label),
        }
    }
    Ok(())
}

fn print_report(report: &Report) {
    println!("Incident:   {}", report.incident);
    println!("Details:    {}", report.details);
    println!("Location:   {}", report.location_label());
    println!("Status:     {}", status_badge(report));
}

/// One line of the admin report table
fn report_row(report: &Report) -> String {
    format!(
        "{:<8}  {:<20}  {:<30}  {:<26}  {:<22}  {:<5}",
        report.id,
        truncate(&report.incident, 20),
        truncate(report.details.trim(), 30),
        status_badge(report),
        report.location_label(),
        report.media.len()
    )
}

/// Status text prefixed with a badge for its tone
fn status_badge(report: &Report) -> String {
    let status = report.status.as_deref().unwrap_or("pending");
    let icon = match report.status_enum().map(|s| s.tone()) {
        Some(StatusTone::Negative) => "[!!]",
        Some(StatusTone::Positive) => "[OK]",
        Some(StatusTone::Neutral) | None => "[..]",
    };
    format!("{} {}", icon, status)
}

fn greeting_name<'a>(display_name: &'a str, fallback: &'a str) -> &'a str {
    if display_name.trim().is_empty() {
        fallback
    } else {
        display_name
    }
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
