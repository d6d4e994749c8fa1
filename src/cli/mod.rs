//! CLI module for the TenderHub command-line client.
//!
//! Every subcommand talks to the TenderHub API through [`ApiClient`], so
//! the stored session is refreshed transparently. Highlights:
//! - `login` / `logout` / `whoami` - manage the stored session
//! - `tenders`, `bids`, `projects` - the marketplace workflow
//! - `config check` - validate the configuration file

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::models::{
    NewBid, NewCategory, NewPortfolioItem, NewReview, NewTender, ProfileUpdate, Project,
    TenderFilter, TenderStatus, UserProfile,
};
use crate::api::{available_actions, ActionKind, ProjectAction};
use crate::client::{ApiClient, Attachment, Registration, SessionObserver};
use crate::config::Config;
use crate::error::ApiError;
use crate::session::{Role, RoleResolver, TokenStore, UserDescriptor, UserId};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "tenderhub")]
#[command(author, version, about = "Command-line client for the TenderHub marketplace", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "TENDERHUB_CONFIG", default_value = "tenderhub.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API base URL, including the version prefix
    #[arg(long, env = "TENDERHUB_API_URL")]
    pub api_url: Option<String>,

    /// Session file holding the stored tokens
    #[arg(long, env = "TENDERHUB_SESSION")]
    pub session: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Command-line flags win over the configuration file.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.api.base_url = url.clone();
        }
        if let Some(path) = &self.session {
            config.session.path = path.clone();
        }
    }
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long, env = "TENDERHUB_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Create a new account
    Register {
        username: String,
        email: String,
        /// client or vendor
        #[arg(long)]
        role: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// Read (and confirmed) from stdin when omitted
        #[arg(long, env = "TENDERHUB_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Show the signed-in user and their role
    Whoami,

    #[command(subcommand)]
    Tenders(TenderCommands),

    #[command(subcommand)]
    Bids(BidCommands),

    #[command(subcommand)]
    Projects(ProjectCommands),

    #[command(subcommand)]
    Comments(CommentCommands),

    #[command(subcommand)]
    Reviews(ReviewCommands),

    #[command(subcommand)]
    Portfolio(PortfolioCommands),

    #[command(subcommand)]
    Profile(ProfileCommands),

    #[command(subcommand)]
    Categories(CategoryCommands),

    #[command(subcommand)]
    Skills(ListCommand),

    #[command(subcommand)]
    Tags(ListCommand),

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum TenderCommands {
    /// List tenders
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// open, closed, awarded or cancelled
        #[arg(long, value_parser = parse_tender_status)]
        status: Option<TenderStatus>,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Show one tender
    Show { id: i64 },
    /// Publish a new tender
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        budget_min: f64,
        #[arg(long)]
        budget_max: f64,
        /// YYYY-MM-DD
        #[arg(long)]
        deadline: NaiveDate,
        #[arg(long)]
        category: Option<String>,
        /// Repeat for several skills
        #[arg(long = "skill")]
        skills: Vec<String>,
        /// Repeat for several files
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Delete a tender
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum BidCommands {
    /// List bids on a tender
    List { tender: i64 },
    /// Bid on a tender
    Place {
        tender: i64,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        days: u32,
        #[arg(long)]
        proposal: String,
    },
    /// Accept a bid and open a project
    Accept { bid: i64 },
    /// Withdraw your bid
    Withdraw { bid: i64 },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// List your projects
    List,
    /// Show a project, its activity feed and the actions open to you
    Show { id: i64 },
    /// Take an action on a project
    Act {
        id: i64,
        /// comment, deliver, request_revision, complete, update_price, update_deadline
        action: String,
        #[arg(long, short)]
        message: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        deadline: Option<NaiveDate>,
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CommentCommands {
    /// List comments on a tender
    List { tender: i64 },
    /// Comment on a tender
    Add { tender: i64, text: String },
}

#[derive(Subcommand, Debug)]
pub enum ReviewCommands {
    /// Reviews received by a user
    List {
        #[arg(value_parser = parse_user_id)]
        user: UserId,
    },
    /// Review a completed project
    Add {
        project: i64,
        #[arg(long)]
        rating: u8,
        #[arg(long, default_value = "")]
        comment: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PortfolioCommands {
    /// Portfolio of a user (yourself by default)
    List {
        #[arg(value_parser = parse_user_id)]
        user: Option<UserId>,
    },
    /// Add a portfolio item
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Remove a portfolio item
    Remove { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Show a profile (yours by default)
    Show {
        #[arg(value_parser = parse_user_id)]
        user: Option<UserId>,
    },
    /// Update your profile
    Update {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        /// Replaces the skill list; repeat for several
        #[arg(long = "skill")]
        skills: Vec<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommands {
    /// List categories
    List,
    /// Create a category (admin)
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a category (admin)
    Remove { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// List all entries
    List,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

fn parse_tender_status(value: &str) -> Result<TenderStatus, String> {
    match value.to_ascii_lowercase().as_str() {
        "open" => Ok(TenderStatus::Open),
        "closed" => Ok(TenderStatus::Closed),
        "awarded" => Ok(TenderStatus::Awarded),
        "cancelled" | "canceled" => Ok(TenderStatus::Cancelled),
        other => Err(format!("unknown tender status '{}'", other)),
    }
}

fn parse_user_id(value: &str) -> Result<UserId, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("user id cannot be empty".to_string());
    }
    Ok(value
        .parse::<i64>()
        .map(UserId::Number)
        .unwrap_or_else(|_| UserId::Text(value.to_string())))
}

// ============================================================================
// Session plumbing
// ============================================================================

/// Tells the user to sign in again once the stored session is gone.
struct CliObserver;

impl SessionObserver for CliObserver {
    fn session_expired(&self, _error: &ApiError) {
        eprintln!("[!!] Your session has expired. Run 'tenderhub login <username>' to sign in again.");
    }
}

fn create_client(config: &Config) -> Result<ApiClient> {
    let store = Arc::new(TokenStore::file(&config.session.path));
    ApiClient::with_observer(&config.api, store, Arc::new(CliObserver))
        .context("Failed to create HTTP client")
}

/// Fail early, without a network round trip, when nobody is signed in.
fn require_session(client: &ApiClient) -> Result<()> {
    if !client.session().is_authenticated() {
        anyhow::bail!("Not signed in. Run 'tenderhub login <username>' first.");
    }
    Ok(())
}

fn prompt_secret(label: &str) -> Result<String> {
    eprint!("{}: ", label);
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn read_attachments(paths: &[PathBuf]) -> Result<Vec<Attachment>, ApiError> {
    let mut attachments = Vec::with_capacity(paths.len());
    for path in paths {
        attachments.push(Attachment::from_path(path).await?);
    }
    Ok(attachments)
}

async fn read_optional_attachment(path: Option<&Path>) -> Result<Option<Attachment>, ApiError> {
    match path {
        Some(path) => Ok(Some(Attachment::from_path(path).await?)),
        None => Ok(None),
    }
}

/// Login failures get specific copy; everything else shows the error chain.
fn login_error_message(error: &ApiError) -> String {
    let Some(status) = error.status() else {
        return match error {
            ApiError::Transport(_) => "Cannot reach the TenderHub server. Check the API URL and your connection.".to_string(),
            other => other.to_string(),
        };
    };

    match status {
        StatusCode::BAD_REQUEST => "Please enter both a username and a password.".to_string(),
        StatusCode::UNAUTHORIZED => "Invalid username or password.".to_string(),
        StatusCode::FORBIDDEN => "This account is not allowed to sign in. It may be inactive or suspended.".to_string(),
        StatusCode::NOT_FOUND => "The sign-in service was not found. Check the API URL.".to_string(),
        s if s.is_server_error() => "The server ran into a problem. Please try again later.".to_string(),
        _ => error.to_string(),
    }
}

// ============================================================================
// CLI Command Handlers
// ============================================================================

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    if let Commands::Config(ConfigCommands::Check) = &cli.command {
        return cmd_config_check(cli, config);
    }

    let client = create_client(config)?;
    match &cli.command {
        Commands::Login { username, password } => {
            cmd_login(&client, config, username, password.as_deref()).await
        }
        Commands::Logout => cmd_logout(&client),
        Commands::Register {
            username,
            email,
            role,
            first_name,
            last_name,
            password,
        } => {
            let password = match password {
                Some(p) => (p.clone(), p.clone()),
                None => (prompt_secret("Password")?, prompt_secret("Confirm password")?),
            };
            let registration = Registration {
                username: username.clone(),
                email: email.clone(),
                password: password.0,
                password_confirmation: password.1,
                role: Role::parse(role),
                first_name: first_name.clone(),
                last_name: last_name.clone(),
            };
            cmd_register(&client, &registration).await
        }
        Commands::Whoami => cmd_whoami(&client, config).await,
        Commands::Tenders(cmd) => cmd_tenders(&client, cmd).await,
        Commands::Bids(cmd) => cmd_bids(&client, cmd).await,
        Commands::Projects(cmd) => cmd_projects(&client, config, cmd).await,
        Commands::Comments(cmd) => cmd_comments(&client, cmd).await,
        Commands::Reviews(cmd) => cmd_reviews(&client, cmd).await,
        Commands::Portfolio(cmd) => cmd_portfolio(&client, cmd).await,
        Commands::Profile(cmd) => cmd_profile(&client, cmd).await,
        Commands::Categories(cmd) => cmd_categories(&client, cmd).await,
        Commands::Skills(ListCommand::List) => {
            require_session(&client)?;
            print_labels(&client.catalog().skills().await?);
            Ok(())
        }
        Commands::Tags(ListCommand::List) => {
            require_session(&client)?;
            print_labels(&client.catalog().tags().await?);
            Ok(())
        }
        Commands::Config(ConfigCommands::Check) => Ok(()),
    }
}

async fn cmd_login(
    client: &ApiClient,
    config: &Config,
    username: &str,
    password: Option<&str>,
) -> Result<()> {
    let password = match password {
        Some(p) => p.to_string(),
        None => prompt_secret("Password")?,
    };

    let user = match client.login(username, &password).await {
        Ok(user) => user,
        Err(e) => anyhow::bail!(login_error_message(&e)),
    };

    // Probe failures must not turn a successful sign-in into an error.
    let resolver = RoleResolver::new(client.clone(), &config.roles);
    let role = match resolver.resolve().await {
        Ok(role) => role,
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine role after sign-in");
            Role::Unknown
        }
    };

    println!("[OK] Signed in as {} ({})", user.username, role);
    Ok(())
}

fn cmd_logout(client: &ApiClient) -> Result<()> {
    client.logout()?;
    println!("[OK] Signed out");
    Ok(())
}

async fn cmd_register(client: &ApiClient, registration: &Registration) -> Result<()> {
    let profile = client.register(registration).await?;
    println!("[OK] Account '{}' created as {}.", profile.username, registration.role);
    println!("Run 'tenderhub login {}' to sign in.", profile.username);
    Ok(())
}

/// Signed-in user and role; the descriptor is rebuilt by the resolver when
/// the stored one is missing or unreadable.
async fn current_user(client: &ApiClient, config: &Config) -> Result<Option<(UserDescriptor, Role)>> {
    if !client.session().is_authenticated() {
        return Ok(None);
    }

    let role = RoleResolver::new(client.clone(), &config.roles).resolve().await?;
    let user = client
        .store()
        .user()
        .unwrap_or_else(|| UserDescriptor {
            username: "-".to_string(),
            user_id: None,
            role,
        });
    Ok(Some((user, role)))
}

async fn cmd_whoami(client: &ApiClient, config: &Config) -> Result<()> {
    let Some((user, role)) = current_user(client, config).await? else {
        println!("Not signed in.");
        return Ok(());
    };

    println!("Username:  {}", user.username);
    if let Some(id) = &user.user_id {
        println!("User ID:   {}", id);
    }
    println!("Role:      {}", role);
    println!("API:       {}", client.base_url());
    Ok(())
}

async fn cmd_tenders(client: &ApiClient, cmd: &TenderCommands) -> Result<()> {
    require_session(client)?;
    match cmd {
        TenderCommands::List {
            search,
            category,
            status,
            page,
        } => {
            let filter = TenderFilter {
                search: search.clone(),
                category: category.clone(),
                status: *status,
                page: *page,
            };
            let tenders = client.tenders().list(&filter).await?;
            if tenders.is_empty() {
                println!("No tenders found.");
                return Ok(());
            }

            println!();
            println!(
                "{:<6}  {:<40}  {:<10}  {:<22}  {:<10}  {:<5}",
                "ID", "TITLE", "STATUS", "BUDGET", "DEADLINE", "BIDS"
            );
            println!("{}", "-".repeat(104));
            for tender in tenders {
                println!(
                    "{:<6}  {:<40}  {:<10}  {:<22}  {:<10}  {:<5}",
                    tender.id,
                    truncate(&tender.title, 40),
                    tender.status,
                    format!("{:.2} - {:.2}", tender.budget_min, tender.budget_max),
                    format_date(tender.deadline),
                    tender.bid_count
                );
            }
            println!();
        }
        TenderCommands::Show { id } => {
            let tender = client.tenders().get(*id).await?;
            println!();
            println!("=== Tender #{}: {} ===", tender.id, tender.title);
            println!();
            println!("Status:      {}", tender.status);
            println!("Category:    {}", tender.category.as_deref().unwrap_or("-"));
            println!("Budget:      {:.2} - {:.2}", tender.budget_min, tender.budget_max);
            println!("Deadline:    {}", format_date(tender.deadline));
            println!("Client:      {}", tender.client.as_deref().unwrap_or("-"));
            if !tender.skills.is_empty() {
                println!("Skills:      {}", tender.skills.join(", "));
            }
            for attachment in &tender.attachments {
                println!("Attachment:  {}", attachment);
            }
            println!();
            println!("{}", tender.description);
            println!();
        }
        TenderCommands::Create {
            title,
            description,
            budget_min,
            budget_max,
            deadline,
            category,
            skills,
            attachments,
        } => {
            let tender = NewTender {
                title: title.clone(),
                description: description.clone(),
                category: category.clone(),
                budget_min: *budget_min,
                budget_max: *budget_max,
                deadline: *deadline,
                skills: skills.clone(),
                attachments: read_attachments(attachments).await?,
            };
            let created = client.tenders().create(&tender).await?;
            println!("[OK] Tender #{} published: {}", created.id, created.title);
        }
        TenderCommands::Delete { id } => {
            client.tenders().delete(*id).await?;
            println!("[OK] Tender #{} deleted", id);
        }
    }
    Ok(())
}

async fn cmd_bids(client: &ApiClient, cmd: &BidCommands) -> Result<()> {
    require_session(client)?;
    match cmd {
        BidCommands::List { tender } => {
            let bids = client.bids().list(*tender).await?;
            if bids.is_empty() {
                println!("No bids on tender #{}.", tender);
                return Ok(());
            }

            println!();
            println!(
                "{:<6}  {:<20}  {:>12}  {:>6}  {:<10}  {:<40}",
                "ID", "VENDOR", "AMOUNT", "DAYS", "STATUS", "PROPOSAL"
            );
            println!("{}", "-".repeat(104));
            for bid in bids {
                println!(
                    "{:<6}  {:<20}  {:>12.2}  {:>6}  {:<10}  {:<40}",
                    bid.id,
                    truncate(bid.vendor.as_deref().unwrap_or("-"), 20),
                    bid.amount,
                    bid.delivery_days,
                    bid.status,
                    truncate(&bid.proposal, 40)
                );
            }
            println!();
        }
        BidCommands::Place {
            tender,
            amount,
            days,
            proposal,
        } => {
            let bid = NewBid {
                amount: *amount,
                delivery_days: *days,
                proposal: proposal.clone(),
            };
            let placed = client.bids().place(*tender, &bid).await?;
            println!("[OK] Bid #{} placed on tender #{}", placed.id, tender);
        }
        BidCommands::Accept { bid } => {
            let project = client.bids().accept(*bid).await?;
            println!("[OK] Bid #{} accepted. Project #{} is now {}.", bid, project.id, project.status);
        }
        BidCommands::Withdraw { bid } => {
            let withdrawn = client.bids().withdraw(*bid).await?;
            println!("[OK] Bid #{} is now {}", withdrawn.id, withdrawn.status);
        }
    }
    Ok(())
}

async fn cmd_projects(client: &ApiClient, config: &Config, cmd: &ProjectCommands) -> Result<()> {
    require_session(client)?;
    match cmd {
        ProjectCommands::List => {
            let projects = client.projects().list().await?;
            if projects.is_empty() {
                println!("No projects yet.");
                return Ok(());
            }

            println!();
            println!(
                "{:<6}  {:<36}  {:<20}  {:>12}  {:<10}",
                "ID", "TITLE", "STATUS", "PRICE", "DEADLINE"
            );
            println!("{}", "-".repeat(92));
            for project in projects {
                println!(
                    "{:<6}  {:<36}  {:<20}  {:>12.2}  {:<10}",
                    project.id,
                    truncate(&project.title, 36),
                    project.status,
                    project.price,
                    format_date(project.deadline)
                );
            }
            println!();
        }
        ProjectCommands::Show { id } => {
            let resolver = RoleResolver::new(client.clone(), &config.roles);
            let project = client.projects().get(*id).await?;
            let activities = client.projects().activities(*id).await?;
            let role = resolver.resolve().await?;
            print_project(&project, role);

            if !activities.is_empty() {
                println!("Activity:");
                for activity in activities {
                    println!(
                        "  [{}] {} {}: {}",
                        activity.created_at.as_deref().unwrap_or("-"),
                        activity.author.as_deref().unwrap_or("-"),
                        activity.kind,
                        activity.message.as_deref().unwrap_or("")
                    );
                    for file in &activity.attachments {
                        println!("      + {}", file);
                    }
                }
                println!();
            }
        }
        ProjectCommands::Act {
            id,
            action,
            message,
            price,
            deadline,
            attachments,
        } => {
            let kind = ActionKind::from_slug(action)
                .with_context(|| format!("Unknown project action '{}'", action))?;
            let message = message.clone().unwrap_or_default();
            let action = match kind {
                ActionKind::Comment => ProjectAction::Comment {
                    message,
                    attachments: read_attachments(attachments).await?,
                },
                ActionKind::Deliver => ProjectAction::Deliver {
                    message,
                    attachments: read_attachments(attachments).await?,
                },
                ActionKind::RequestRevision => ProjectAction::RequestRevision { message },
                ActionKind::Complete => ProjectAction::Complete,
                ActionKind::UpdatePrice => ProjectAction::UpdatePrice {
                    price: (*price).context("--price is required for update_price")?,
                },
                ActionKind::UpdateDeadline => ProjectAction::UpdateDeadline {
                    deadline: (*deadline).context("--deadline is required for update_deadline")?,
                },
            };

            let resolver = RoleResolver::new(client.clone(), &config.roles);
            let role = resolver.resolve().await?;
            let project = client.projects().get(*id).await?;
            let updated = client.projects().perform(&project, role, &action).await?;
            println!(
                "[OK] {} on project #{}. Status: {}",
                kind.label(),
                updated.id,
                updated.status
            );
        }
    }
    Ok(())
}

fn print_project(project: &Project, role: Role) {
    println!();
    println!("=== Project #{}: {} ===", project.id, project.title);
    println!();
    println!("Status:      {}", project.status);
    println!("Price:       {:.2}", project.price);
    println!("Deadline:    {}", format_date(project.deadline));
    println!("Client:      {}", project.client.as_deref().unwrap_or("-"));
    println!("Vendor:      {}", project.vendor.as_deref().unwrap_or("-"));
    if let Some(tender) = project.tender {
        println!("Tender:      #{}", tender);
    }

    let actions = available_actions(role, project.status);
    if actions.is_empty() {
        println!("Actions:     none available to you");
    } else {
        let menu: Vec<String> = actions
            .iter()
            .map(|a| format!("{} ({})", a.label(), a.slug()))
            .collect();
        println!("Actions:     {}", menu.join(", "));
    }
    println!();
}

async fn cmd_comments(client: &ApiClient, cmd: &CommentCommands) -> Result<()> {
    require_session(client)?;
    match cmd {
        CommentCommands::List { tender } => {
            let comments = client.comments().list(*tender).await?;
            if comments.is_empty() {
                println!("No comments on tender #{}.", tender);
            }
            for comment in comments {
                println!(
                    "[{}] {}: {}",
                    comment.created_at.as_deref().unwrap_or("-"),
                    comment.author.as_deref().unwrap_or("-"),
                    comment.text
                );
            }
        }
        CommentCommands::Add { tender, text } => {
            let comment = client.comments().add(*tender, text).await?;
            println!("[OK] Comment #{} added to tender #{}", comment.id, tender);
        }
    }
    Ok(())
}

async fn cmd_reviews(client: &ApiClient, cmd: &ReviewCommands) -> Result<()> {
    require_session(client)?;
    match cmd {
        ReviewCommands::List { user } => {
            let reviews = client.reviews().for_user(user).await?;
            if reviews.is_empty() {
                println!("No reviews yet.");
                return Ok(());
            }
            let average =
                reviews.iter().map(|r| f64::from(r.rating)).sum::<f64>() / reviews.len() as f64;
            println!("Average rating: {:.1} ({} reviews)", average, reviews.len());
            println!();
            for review in reviews {
                println!(
                    "{:<5}  {:<20}  {}",
                    stars(review.rating),
                    truncate(review.reviewer.as_deref().unwrap_or("-"), 20),
                    review.comment.as_deref().unwrap_or("")
                );
            }
        }
        ReviewCommands::Add {
            project,
            rating,
            comment,
        } => {
            let project = client.projects().get(*project).await?;
            let review = NewReview {
                rating: *rating,
                comment: comment.clone(),
            };
            client.reviews().add(&project, &review).await?;
            println!("[OK] Review submitted for project #{}", project.id);
        }
    }
    Ok(())
}

async fn cmd_portfolio(client: &ApiClient, cmd: &PortfolioCommands) -> Result<()> {
    require_session(client)?;
    match cmd {
        PortfolioCommands::List { user } => {
            let user = match user {
                Some(user) => user.clone(),
                None => client.profiles().me().await?.id,
            };
            let items = client.portfolios().for_user(&user).await?;
            if items.is_empty() {
                println!("No portfolio items.");
                return Ok(());
            }
            println!();
            println!("{:<6}  {:<40}  {:<40}", "ID", "TITLE", "LINK");
            println!("{}", "-".repeat(90));
            for item in items {
                println!(
                    "{:<6}  {:<40}  {:<40}",
                    item.id,
                    truncate(&item.title, 40),
                    truncate(item.link.as_deref().unwrap_or("-"), 40)
                );
            }
            println!();
        }
        PortfolioCommands::Add {
            title,
            description,
            link,
            image,
        } => {
            let item = NewPortfolioItem {
                title: title.clone(),
                description: description.clone(),
                link: link.clone(),
                image: read_optional_attachment(image.as_deref()).await?,
            };
            let created = client.portfolios().add(&item).await?;
            println!("[OK] Portfolio item #{} added", created.id);
        }
        PortfolioCommands::Remove { id } => {
            client.portfolios().delete(*id).await?;
            println!("[OK] Portfolio item #{} removed", id);
        }
    }
    Ok(())
}

async fn cmd_profile(client: &ApiClient, cmd: &ProfileCommands) -> Result<()> {
    require_session(client)?;
    match cmd {
        ProfileCommands::Show { user } => {
            let profile = match user {
                Some(id) => client.profiles().get(id).await?,
                None => client.profiles().me().await?,
            };
            print_profile(&profile);
        }
        ProfileCommands::Update {
            first_name,
            last_name,
            bio,
            skills,
            image,
        } => {
            let update = ProfileUpdate {
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                bio: bio.clone(),
                skills: (!skills.is_empty()).then(|| skills.clone()),
                image: read_optional_attachment(image.as_deref()).await?,
            };
            let profile = client.profiles().update(&update).await?;
            println!("[OK] Profile updated");
            print_profile(&profile);
        }
    }
    Ok(())
}

fn print_profile(profile: &UserProfile) {
    println!();
    println!("=== {} ===", profile.display_name());
    println!();
    println!("Username:    {}", profile.username);
    println!("User ID:     {}", profile.id);
    println!("Role:        {}", profile.role);
    if let Some(email) = &profile.email {
        println!("Email:       {}", email);
    }
    if let Some(rating) = profile.rating {
        println!("Rating:      {:.1}", rating);
    }
    if !profile.skills.is_empty() {
        println!("Skills:      {}", profile.skills.join(", "));
    }
    if let Some(bio) = &profile.bio {
        println!();
        println!("{}", bio);
    }
    println!();
}

async fn cmd_categories(client: &ApiClient, cmd: &CategoryCommands) -> Result<()> {
    require_session(client)?;
    match cmd {
        CategoryCommands::List => {
            let categories = client.catalog().categories().await?;
            println!();
            println!("{:<6}  {:<30}  {:<30}", "ID", "NAME", "SLUG");
            println!("{}", "-".repeat(70));
            for category in categories {
                println!(
                    "{:<6}  {:<30}  {:<30}",
                    category.id,
                    truncate(&category.name, 30),
                    category.slug.as_deref().unwrap_or("-")
                );
            }
            println!();
        }
        CategoryCommands::Add { name, description } => {
            let created = client
                .catalog()
                .create_category(&NewCategory {
                    name: name.clone(),
                    description: description.clone(),
                })
                .await?;
            println!("[OK] Category #{} created: {}", created.id, created.name);
        }
        CategoryCommands::Remove { id } => {
            client.catalog().delete_category(*id).await?;
            println!("[OK] Category #{} deleted", id);
        }
    }
    Ok(())
}

fn print_labels(labels: &[crate::api::models::Label]) {
    if labels.is_empty() {
        println!("Nothing found.");
    }
    for label in labels {
        println!("{:<6}  {}", label.id, label.name);
    }
}

fn cmd_config_check(cli: &Cli, config: &Config) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!("Built-in defaults are in effect.");
        println!();
    } else {
        println!("[OK] Configuration file is valid!");
        println!();
    }

    println!("=== Configuration Summary ===");
    println!();
    println!("API:");
    println!("  Base URL:     {}", config.api.base_url);
    println!("  Token path:   {}", config.api.token_path);
    println!("  Refresh path: {}", config.api.refresh_path);
    println!("  Timeout:      {}s", config.api.timeout_secs);
    println!();
    println!("Session:");
    println!("  File:         {}", config.session.path.display());
    println!();
    println!("Role probes:");
    for probe in &config.roles.probes {
        println!("  {:<24} -> {}", probe.path, probe.role);
    }
    println!("  Profile:      {}", config.roles.profile_path);
    println!("  Token claims: {}", config.roles.claim_names.join(", "));
    println!();

    if config.api.base_url.starts_with("http://")
        && !config.api.base_url.contains("localhost")
        && !config.api.base_url.contains("127.0.0.1")
    {
        println!("Warnings:");
        println!("  [!] Tokens are sent over plain HTTP to a remote host");
        println!();
    }
    Ok(())
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn stars(rating: u8) -> String {
    "*".repeat(usize::from(rating.min(5)))
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
