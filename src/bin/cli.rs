//! orgdesk - command-line admin console for the relationship database
//!
//! Usage: orgdesk [OPTIONS] <COMMAND>
//!
//! Talks to the backend REST API. Supports JSON output for scripting and an
//! interactive TUI browser (`orgdesk tui`).

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use orgdesk_lib::api::client::{OrgPayload, PersonPayload};
use orgdesk_lib::api::{ApiClient, AssociationLink, ContactKind, OrgKind};
use orgdesk_lib::{reconcile, settings, tree};
use std::io::Write;
use std::path::PathBuf;

// ============================================================================
// Logging Infrastructure
// ============================================================================

use chrono::{Datelike, Local, Timelike};
use std::fs::{self, File, OpenOptions};
use std::sync::Mutex;

pub(crate) static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

/// Initialize logging - creates log file and cleans old logs
fn init_logging() -> Option<PathBuf> {
    let log_dir = dirs::data_dir()
        .map(|p| p.join("orgdesk").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if fs::create_dir_all(&log_dir).is_err() {
        return None;
    }

    // Clean logs older than 7 days
    if let Ok(entries) = fs::read_dir(&log_dir) {
        let cutoff = Local::now() - chrono::Duration::days(7);
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if let Some(date_str) = name
                    .strip_prefix("orgdesk-")
                    .and_then(|s| s.strip_suffix(".log"))
                {
                    if let Ok(date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                        if date < cutoff.date_naive() {
                            let _ = fs::remove_file(&path);
                        }
                    }
                }
            }
        }
    }

    // Create today's log file
    let today = Local::now();
    let log_filename = format!(
        "orgdesk-{:04}-{:02}-{:02}.log",
        today.year(),
        today.month(),
        today.day()
    );
    let log_path = log_dir.join(&log_filename);

    if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
        *LOG_FILE.lock().unwrap() = Some(file);
        Some(log_path)
    } else {
        None
    }
}

/// Log to both terminal and file
pub(crate) fn log_both(msg: &str) {
    let now = Local::now();
    let timestamp = format!("[{:02}:{:02}:{:02}]", now.hour(), now.minute(), now.second());

    println!("{}", msg);

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "{} {}", timestamp, msg);
        }
    }
}

/// Log error to both terminal and file
pub(crate) fn elog_both(msg: &str) {
    let now = Local::now();
    let timestamp = format!("[{:02}:{:02}:{:02}]", now.hour(), now.minute(), now.second());

    eprintln!("{}", msg);

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "{} [ERROR] {}", timestamp, msg);
        }
    }
}

/// Macro for logging to both terminal and file
macro_rules! log {
    ($($arg:tt)*) => {
        log_both(&format!($($arg)*))
    };
}

/// Macro for error logging to both terminal and file
macro_rules! elog {
    ($($arg:tt)*) => {
        elog_both(&format!($($arg)*))
    };
}

#[path = "cli/tui.rs"]
mod tui;

// ============================================================================
// CLI definition
// ============================================================================

#[derive(Parser)]
#[command(name = "orgdesk", version, about = "Admin console for the relationship database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the org tree (companies and divisions, group annotations)
    Tree {
        /// Only show subtrees matching this term (case-insensitive)
        #[arg(long, short)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Organization operations
    Org {
        #[command(subcommand)]
        cmd: OrgCommands,
    },
    /// Person operations
    Person {
        #[command(subcommand)]
        cmd: PersonCommands,
    },
    /// Contact method operations (phones, emails, locations)
    Contact {
        #[command(subcommand)]
        cmd: ContactCommands,
    },
    /// Show the audit trail
    Audit {
        /// Number of entries to show
        #[arg(long, short)]
        limit: Option<u32>,
    },
    /// Configuration settings
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// Interactive tree browser
    Tui,
    /// Generate shell completions
    Completions {
        /// Shell to generate for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum OrgCommands {
    /// List all organization records (flat)
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one organization
    Show { id: String },
    /// Create an organization
    Create {
        name: String,
        /// company, group, or division
        #[arg(long, default_value = "company")]
        kind: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        short_name: Option<String>,
        #[arg(long)]
        industry: Option<String>,
        #[arg(long)]
        city: Option<String>,
    },
    /// Update an organization (unset flags keep current values)
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        short_name: Option<String>,
        #[arg(long)]
        industry: Option<String>,
        #[arg(long)]
        city: Option<String>,
    },
    /// Delete an organization
    Delete {
        id: String,
        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum PersonCommands {
    /// List persons, optionally filtered by a search term
    List {
        #[arg(long, short)]
        search: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show one person
    Show { id: String },
    /// Create a person
    Create {
        first_name: String,
        last_name: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        company: Option<i64>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Delete a person
    Delete {
        id: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ContactCommands {
    /// List contact methods of one kind
    List {
        /// phone, email, or location
        kind: String,
    },
    /// Show one contact method with its association links
    Show { kind: String, id: i64 },
    /// Replace the association links of a contact method.
    ///
    /// The new link set is given with repeated flags; the persisted set is
    /// fetched, diffed, and only the differences are sent to the backend.
    Links {
        kind: String,
        id: i64,
        /// Company link: ID or ID:DEPT1,DEPT2
        #[arg(long = "company")]
        companies: Vec<String>,
        /// Person link: ID or ID:DEPT1,DEPT2
        #[arg(long = "person")]
        persons: Vec<String>,
        /// Print the plan without applying it
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current settings
    Show,
    /// Set the backend server URL
    SetServer { url: String },
    /// Set the API token (empty clears)
    SetToken { token: String },
    /// Set the default list page size
    SetPageSize { size: u32 },
}

// ============================================================================
// Entry point
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging();
    settings::init(settings::default_config_dir());

    if let Err(e) = run(cli).await {
        elog!("Error: {}", e);
        std::process::exit(1);
    }
}

fn make_client() -> ApiClient {
    ApiClient::new(&settings::get_server_url(), settings::get_api_token())
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Tree { search, json } => cmd_tree(search.as_deref(), json).await,
        Commands::Org { cmd } => cmd_org(cmd).await,
        Commands::Person { cmd } => cmd_person(cmd).await,
        Commands::Contact { cmd } => cmd_contact(cmd).await,
        Commands::Audit { limit } => cmd_audit(limit).await,
        Commands::Config { cmd } => cmd_config(cmd),
        Commands::Tui => tui::run_tui(&make_client()).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "orgdesk", &mut std::io::stdout());
            Ok(())
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_tree(search: Option<&str>, json: bool) -> Result<(), String> {
    let client = make_client();
    let records = client.list_orgs().await.map_err(|e| e.to_string())?;
    let forest = tree::build_forest(&records);
    let forest = tree::filter_forest(&forest, search.unwrap_or(""));

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&forest_to_json(&forest))
                .map_err(|e| e.to_string())?
        );
        return Ok(());
    }

    if forest.is_empty() {
        log!("No matches");
        return Ok(());
    }
    for node in &forest {
        print_node(node, 0);
    }
    Ok(())
}

fn print_node(node: &tree::OrgNode, indent: usize) {
    let prefix = "  ".repeat(indent);
    let group = node
        .group_name
        .as_deref()
        .map(|g| format!("  ({})", g))
        .unwrap_or_default();
    log!(
        "{}{} [{}]{}",
        prefix,
        node.record.name,
        node.record.kind.as_str(),
        group
    );
    for child in &node.children {
        print_node(child, indent + 1);
    }
}

fn forest_to_json(forest: &[tree::OrgNode]) -> serde_json::Value {
    serde_json::Value::Array(
        forest
            .iter()
            .map(|n| {
                serde_json::json!({
                    "id": n.record.id,
                    "name": n.record.name,
                    "kind": n.record.kind.as_str(),
                    "group": n.group_name,
                    "children": forest_to_json(&n.children),
                })
            })
            .collect(),
    )
}

async fn cmd_org(cmd: OrgCommands) -> Result<(), String> {
    let client = make_client();
    match cmd {
        OrgCommands::List { json } => {
            let records = client.list_orgs().await.map_err(|e| e.to_string())?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&records).map_err(|e| e.to_string())?
                );
            } else {
                for rec in &records {
                    log!(
                        "{}  {} [{}]{}",
                        rec.id,
                        rec.name,
                        rec.kind.as_str(),
                        rec.parent_id
                            .as_deref()
                            .map(|p| format!("  parent={}", p))
                            .unwrap_or_default()
                    );
                }
                log!("{} records", records.len());
            }
        }
        OrgCommands::Show { id } => {
            let rec = client.get_org(&id).await.map_err(|e| e.to_string())?;
            log!("id:         {}", rec.id);
            log!("name:       {}", rec.name);
            log!("kind:       {}", rec.kind.as_str());
            log!("parent:     {}", rec.parent_id.as_deref().unwrap_or("-"));
            log!("short name: {}", rec.short_name.as_deref().unwrap_or("-"));
            log!("industry:   {}", rec.industry.as_deref().unwrap_or("-"));
            log!("city:       {}", rec.city.as_deref().unwrap_or("-"));
        }
        OrgCommands::Create {
            name,
            kind,
            parent,
            short_name,
            industry,
            city,
        } => {
            let kind = OrgKind::from_str(&kind)
                .ok_or_else(|| format!("Unknown kind '{}' (company, group, division)", kind))?;
            let payload = OrgPayload {
                name,
                kind,
                parent_id: parent,
                short_name,
                industry,
                city,
            };
            let created = client.create_org(&payload).await.map_err(|e| e.to_string())?;
            log!("Created {} ({})", created.name, created.id);
        }
        OrgCommands::Update {
            id,
            name,
            parent,
            short_name,
            industry,
            city,
        } => {
            let current = client.get_org(&id).await.map_err(|e| e.to_string())?;
            let payload = OrgPayload {
                name: name.unwrap_or(current.name),
                kind: current.kind,
                parent_id: parent.or(current.parent_id),
                short_name: short_name.or(current.short_name),
                industry: industry.or(current.industry),
                city: city.or(current.city),
            };
            let updated = client
                .update_org(&id, &payload)
                .await
                .map_err(|e| e.to_string())?;
            log!("Updated {} ({})", updated.name, updated.id);
        }
        OrgCommands::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete organization {}?", id))? {
                log!("Cancelled");
                return Ok(());
            }
            client.delete_org(&id).await.map_err(|e| e.to_string())?;
            log!("Deleted {}", id);
        }
    }
    Ok(())
}

async fn cmd_person(cmd: PersonCommands) -> Result<(), String> {
    let client = make_client();
    match cmd {
        PersonCommands::List { search, json } => {
            let persons = client
                .list_persons(search.as_deref())
                .await
                .map_err(|e| e.to_string())?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&persons).map_err(|e| e.to_string())?
                );
            } else {
                for p in &persons {
                    log!(
                        "{}  {}{}",
                        p.id,
                        p.full_name(),
                        p.title.as_deref().map(|t| format!("  ({})", t)).unwrap_or_default()
                    );
                }
                log!("{} persons", persons.len());
            }
        }
        PersonCommands::Show { id } => {
            let p = client.get_person(&id).await.map_err(|e| e.to_string())?;
            log!("id:      {}", p.id);
            log!("name:    {}", p.full_name());
            log!("title:   {}", p.title.as_deref().unwrap_or("-"));
            log!(
                "company: {}",
                p.company_id.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
            );
            log!("email:   {}", p.email.as_deref().unwrap_or("-"));
        }
        PersonCommands::Create {
            first_name,
            last_name,
            title,
            company,
            email,
        } => {
            let payload = PersonPayload {
                first_name,
                last_name,
                title,
                company_id: company,
                email,
            };
            let created = client
                .create_person(&payload)
                .await
                .map_err(|e| e.to_string())?;
            log!("Created {} ({})", created.full_name(), created.id);
        }
        PersonCommands::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete person {}?", id))? {
                log!("Cancelled");
                return Ok(());
            }
            client.delete_person(&id).await.map_err(|e| e.to_string())?;
            log!("Deleted {}", id);
        }
    }
    Ok(())
}

async fn cmd_contact(cmd: ContactCommands) -> Result<(), String> {
    let client = make_client();
    match cmd {
        ContactCommands::List { kind } => {
            let kind = parse_contact_kind(&kind)?;
            let contacts = client.list_contacts(kind).await.map_err(|e| e.to_string())?;
            for c in &contacts {
                log!(
                    "{}  {}{}",
                    c.id,
                    c.value,
                    c.label.as_deref().map(|l| format!("  ({})", l)).unwrap_or_default()
                );
            }
            log!("{} {}", contacts.len(), kind.resource());
        }
        ContactCommands::Show { kind, id } => {
            let kind = parse_contact_kind(&kind)?;
            let contact = client.get_contact(kind, id).await.map_err(|e| e.to_string())?;
            log!("{} {} ({})", kind.as_str(), contact.value, contact.id);
            if let Some(label) = &contact.label {
                log!("label: {}", label);
            }
            if contact.associations.is_empty() {
                log!("no associations");
            }
            for link in &contact.associations {
                log!("  {}", describe_link(link));
            }
        }
        ContactCommands::Links {
            kind,
            id,
            companies,
            persons,
            dry_run,
        } => {
            let kind = parse_contact_kind(&kind)?;

            let mut after: Vec<AssociationLink> = Vec::new();
            for spec in &companies {
                after.push(parse_link_spec(spec, LinkTarget::Company)?);
            }
            for spec in &persons {
                after.push(parse_link_spec(spec, LinkTarget::Person)?);
            }

            let contact = client.get_contact(kind, id).await.map_err(|e| e.to_string())?;
            let plan = reconcile::diff_associations(&contact.associations, &after);

            if plan.is_empty() {
                log!("Already up to date ({} links)", after.len());
                return Ok(());
            }

            log!(
                "Plan: {} create, {} update, {} delete",
                plan.to_create.len(),
                plan.to_update.len(),
                plan.to_delete.len()
            );
            for link in &plan.to_create {
                log!("  + {}", describe_link(link));
            }
            for link in &plan.to_update {
                log!("  ~ {}", describe_link(link));
            }
            for link in &plan.to_delete {
                log!("  - {}", describe_link(link));
            }
            if plan.skipped_deletes > 0 {
                elog!(
                    "Warning: {} delete(s) skipped (missing persisted id)",
                    plan.skipped_deletes
                );
            }

            if dry_run {
                log!("Dry run, nothing applied");
                return Ok(());
            }

            let report = client.apply_plan(kind, id, &plan).await;
            log!("Applied {}/{} operations", report.applied, plan.operation_count());
            if let Some(failure) = report.first_failure() {
                return Err(failure);
            }
        }
    }
    Ok(())
}

async fn cmd_audit(limit: Option<u32>) -> Result<(), String> {
    let client = make_client();
    let limit = limit.unwrap_or_else(settings::get_page_size);
    let entries = client.list_audit(limit).await.map_err(|e| e.to_string())?;
    for e in &entries {
        log!(
            "{}  {:8}  {} {}  by {}",
            e.occurred_at.format("%Y-%m-%d %H:%M:%S"),
            e.action,
            e.entity_kind,
            e.entity_id,
            e.actor.as_deref().unwrap_or("system")
        );
    }
    log!("{} entries", entries.len());
    Ok(())
}

fn cmd_config(cmd: ConfigCommands) -> Result<(), String> {
    match cmd {
        ConfigCommands::Show => {
            log!("server:    {}", settings::get_server_url());
            log!(
                "token:     {}",
                settings::get_masked_api_token().unwrap_or_else(|| "(not set)".to_string())
            );
            log!("page size: {}", settings::get_page_size());
            Ok(())
        }
        ConfigCommands::SetServer { url } => settings::set_server_url(url),
        ConfigCommands::SetToken { token } => settings::set_api_token(token),
        ConfigCommands::SetPageSize { size } => settings::set_page_size(size),
    }
}

// ============================================================================
// Helpers
// ============================================================================

enum LinkTarget {
    Company,
    Person,
}

/// Parse "ID" or "ID:DEPT1,DEPT2" into an association link.
fn parse_link_spec(spec: &str, target: LinkTarget) -> Result<AssociationLink, String> {
    let (id_part, dept_part) = match spec.split_once(':') {
        Some((id, depts)) => (id, Some(depts)),
        None => (spec, None),
    };

    let id: i64 = id_part
        .parse()
        .map_err(|_| format!("Invalid link spec '{}' (expected ID or ID:DEPT,...)", spec))?;

    let departments = dept_part.map(|d| {
        d.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
    });

    let mut link = AssociationLink {
        departments,
        ..Default::default()
    };
    match target {
        LinkTarget::Company => link.company_id = Some(id),
        LinkTarget::Person => link.person_id = Some(id),
    }
    Ok(link)
}

fn parse_contact_kind(s: &str) -> Result<ContactKind, String> {
    ContactKind::from_str(s)
        .ok_or_else(|| format!("Unknown contact kind '{}' (phone, email, location)", s))
}

fn describe_link(link: &AssociationLink) -> String {
    let mut parts = Vec::new();
    if let Some(c) = link.company_id {
        parts.push(format!("company {}", c));
    }
    if let Some(p) = link.person_id {
        parts.push(format!("person {}", p));
    }
    if parts.is_empty() {
        parts.push("(unscoped)".to_string());
    }
    let depts = link
        .departments
        .as_ref()
        .filter(|d| !d.is_empty())
        .map(|d| format!("  [{}]", d.join(", ")))
        .unwrap_or_default();
    format!("{}{}", parts.join(" + "), depts)
}

fn confirm(prompt: &str) -> Result<bool, String> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush().map_err(|e| e.to_string())?;
    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    Ok(matches!(input.trim(), "y" | "Y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_spec_bare_id() {
        let link = parse_link_spec("5", LinkTarget::Company).unwrap();
        assert_eq!(link.company_id, Some(5));
        assert_eq!(link.person_id, None);
        assert_eq!(link.departments, None);
    }

    #[test]
    fn test_parse_link_spec_with_departments() {
        let link = parse_link_spec("3:HR, IT", LinkTarget::Person).unwrap();
        assert_eq!(link.person_id, Some(3));
        assert_eq!(
            link.departments,
            Some(vec!["HR".to_string(), "IT".to_string()])
        );
    }

    #[test]
    fn test_parse_link_spec_rejects_garbage() {
        assert!(parse_link_spec("abc", LinkTarget::Company).is_err());
        assert!(parse_link_spec("", LinkTarget::Person).is_err());
    }
}
