//! Command line interface.
//!
//! `serve` runs the backend. Every other command builds the client component
//! it needs from the configured API URL and local state file, runs one
//! operation and prints the rendered result.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::client::report::LocationSource;
use crate::client::{
    chatbot, render_admin_list, render_dashboard, render_login_prompt, AdminManager, AdminQuery,
    ApiClient, Auth, ConfiguredGeolocator, Confirm, Dashboard, DashboardView, LocalStore,
    PhotoFile, ReportManager, Settings, SignupForm, StatusFilter, Submission, Theme,
};
use crate::config::{parse_location, Config};
use crate::models::{Location, ReportStatus};

#[derive(Debug, Parser)]
#[command(name = "civicbridge", version, about = "Report and track local issues")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn is_server(&self) -> bool {
        matches!(self.command, Command::Serve)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the REST backend
    Serve,
    /// Ask the help assistant; with no message, start an interactive chat
    Chat { message: Vec<String> },
    #[command(flatten)]
    Client(ClientCommand),
}

/// Commands that talk to the backend or the local state file.
#[derive(Debug, Subcommand)]
pub enum ClientCommand {
    /// Check that the backend is reachable
    Health,
    /// Create an account
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Repeat the password
        #[arg(long)]
        confirm: String,
    },
    /// Log in as a citizen
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log in as the administrator
    AdminLogin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the current session
    Logout,
    /// Submit a new report
    Report(ReportArgs),
    /// Show your reports and their status
    Dashboard {
        /// all, pending, in_progress or resolved
        #[arg(long, default_value = "all")]
        filter: StatusFilter,
    },
    /// Moderate reports (admin session required)
    #[command(subcommand)]
    Admin(AdminCommand),
    /// Retry reports that were saved only on this device
    Sync,
    /// Show or change preferences
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommand>,
    },
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Issue type, e.g. pothole or graffiti
    #[arg(long = "type")]
    pub issue_type: String,
    #[arg(long)]
    pub description: String,
    #[arg(long)]
    pub address: Option<String>,
    /// Coordinate as "lat,lng"
    #[arg(long, value_parser = parse_coordinate, conflicts_with = "here")]
    pub at: Option<Location>,
    /// Use the device's current location
    #[arg(long)]
    pub here: bool,
    /// Image file to attach; repeat for more (up to 5)
    #[arg(long = "photo")]
    pub photos: Vec<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// List reports with optional search and filters
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "all")]
        status: StatusFilter,
        /// Only reports by this user name
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = crate::client::admin::DEFAULT_PAGE_SIZE)]
        per_page: usize,
    },
    /// List everyone who has submitted a report
    Users,
    /// Change the status of a report
    Status {
        id: String,
        #[arg(value_parser = parse_status)]
        status: ReportStatus,
    },
    /// Delete a report
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Add a comment to a report
    Comment { id: String, text: Vec<String> },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Set the theme: light, dark or auto
    Theme {
        #[arg(value_parser = parse_theme)]
        theme: Theme,
    },
    /// Turn notification channels on or off
    Notifications {
        #[arg(long)]
        push: Option<bool>,
        #[arg(long)]
        email: Option<bool>,
    },
}

fn parse_coordinate(raw: &str) -> Result<Location, String> {
    parse_location(raw).ok_or_else(|| format!("expected \"lat,lng\" within range, got {}", raw))
}

fn parse_status(raw: &str) -> Result<ReportStatus, String> {
    ReportStatus::parse(raw).ok_or_else(|| format!("unknown status: {}", raw))
}

fn parse_theme(raw: &str) -> Result<Theme, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "light" => Ok(Theme::Light),
        "dark" => Ok(Theme::Dark),
        "auto" => Ok(Theme::Auto),
        _ => Err(format!("unknown theme: {}", raw)),
    }
}

/// Asks on the terminal before a destructive action.
struct PromptConfirm;

impl Confirm for PromptConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Always agrees; used for `--yes`.
struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Execute one command.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve => crate::serve(config).await,
        Command::Chat { message } => chat(&message.join(" ")),
        Command::Client(command) => run_client(command, &config).await,
    }
}

async fn run_client(command: ClientCommand, config: &Config) -> anyhow::Result<()> {
    let store = LocalStore::open(&config.state_path).with_context(|| {
        format!("could not open local state {}", config.state_path.display())
    })?;
    let api = ApiClient::new(config.api_url.clone(), config.api_psk.clone());

    match command {
        ClientCommand::Health => {
            api.health().await?;
            println!("Backend at {} is up.", api.base_url());
        }
        ClientCommand::Signup {
            name,
            email,
            password,
            confirm,
        } => {
            let form = SignupForm {
                name,
                email,
                password,
                confirm,
            };
            Auth::new(api, store).signup(&form).await?;
            println!("Account created successfully! Please log in.");
        }
        ClientCommand::Login { email, password } => {
            let session = Auth::new(api, store).login(&email, &password).await?;
            println!("Welcome back, {}!", session.user.name);
        }
        ClientCommand::AdminLogin { username, password } => {
            let session = Auth::new(api, store).admin_login(&username, &password).await?;
            println!("Logged in as {}.", session.user.name);
        }
        ClientCommand::Logout => {
            Auth::new(api, store).logout()?;
            println!("Logged out.");
        }
        ClientCommand::Report(args) => submit_report(api, store, config, args).await?,
        ClientCommand::Dashboard { filter } => match Dashboard::new(api, store).load().await {
            DashboardView::LoginPrompt => print!("{}", render_login_prompt()),
            DashboardView::Admin => {
                println!("You are logged in as an administrator. Use `civicbridge admin list`.")
            }
            DashboardView::User(dashboard) => print!("{}", render_dashboard(&dashboard, filter)),
        },
        ClientCommand::Admin(command) => admin(AdminManager::new(api, store), command).await?,
        ClientCommand::Sync => {
            let summary = ReportManager::new(api, store).sync_pending().await?;
            println!("Synced {} report(s).", summary.synced.len());
            for (id, error) in &summary.failed {
                println!("Still pending {}: {}", id, error);
            }
        }
        ClientCommand::Settings { command } => {
            let settings = Settings::new(store);
            match command {
                Some(SettingsCommand::Theme { theme }) => settings.set_theme(theme)?,
                Some(SettingsCommand::Notifications { push, email }) => {
                    settings.set_notifications(push, email)?;
                }
                None => {}
            }
            let notifications = settings.notifications();
            println!("Theme: {}", settings.theme());
            println!("Push notifications: {}", on_off(notifications.push));
            println!("Email notifications: {}", on_off(notifications.email));
        }
    }

    Ok(())
}

async fn submit_report(
    api: ApiClient,
    store: LocalStore,
    config: &Config,
    args: ReportArgs,
) -> anyhow::Result<()> {
    let mut manager = ReportManager::new(api, store);
    manager.set_issue_type(args.issue_type);
    manager.set_description(args.description);
    if let Some(address) = args.address {
        manager.set_address(address);
    }

    if !args.photos.is_empty() {
        let files = args
            .photos
            .iter()
            .map(|path| {
                PhotoFile::read(path).with_context(|| format!("could not read {}", path.display()))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let outcome = manager.add_photos(files);
        for (name, reason) in &outcome.rejected {
            eprintln!("Skipped {}: {}", name, reason);
        }
        if outcome.ignored > 0 {
            eprintln!("Only the first 5 photos are attached.");
        }
    }

    if let Some(location) = args.at {
        manager.set_location(location, LocationSource::MapClick)?;
    } else if args.here {
        let geolocator = ConfiguredGeolocator::new(config.device_location);
        let location = manager.use_current_location(&geolocator)?;
        println!("Using your location: {}", location);
    }

    match manager.submit().await? {
        Submission::Synced(report) => {
            println!("Report submitted successfully! Reference: {}", report.id);
        }
        Submission::CachedLocally { report, error } => {
            println!(
                "Could not reach the server ({}). The report was saved on this device as {}; \
                 run `civicbridge sync` to send it later.",
                error, report.id
            );
        }
    }
    Ok(())
}

async fn admin(mut manager: AdminManager, command: AdminCommand) -> anyhow::Result<()> {
    manager.refresh().await?;

    match command {
        AdminCommand::List {
            search,
            status,
            user,
            page,
            per_page,
        } => {
            let query = AdminQuery {
                search,
                status,
                user,
                page,
                per_page,
            };
            print!("{}", render_admin_list(&manager.query(&query), &manager.stats()));
        }
        AdminCommand::Users => {
            for user in manager.users() {
                println!("{}", user);
            }
        }
        AdminCommand::Status { id, status } => {
            manager.update_status(&id, status).await?;
            println!("Report {} is now {}.", id, status.label());
        }
        AdminCommand::Delete { id, yes } => {
            let confirm: &dyn Confirm = if yes { &AssumeYes } else { &PromptConfirm };
            if manager.delete(&id, confirm).await? {
                println!("Report {} deleted.", id);
            } else {
                println!("Cancelled.");
            }
        }
        AdminCommand::Comment { id, text } => {
            let text = text.join(" ");
            manager.add_comment(&id, &text).await?;
            println!("Comment added to report {}.", id);
        }
    }
    Ok(())
}

fn chat(message: &str) -> anyhow::Result<()> {
    if !message.trim().is_empty() {
        println!("{}", chatbot::reply(message));
        return Ok(());
    }

    println!("CivicAssist: Ask me anything about CivicBridge. Type `exit` to leave.");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.is_empty() {
            continue;
        }
        println!("CivicAssist: {}", chatbot::reply(line));
    }
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
