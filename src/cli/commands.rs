//! CLI commands implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::helpers::parse_csv_line;
use crate::collector::{Collector, RunSummary, MAX_LOOKBACK_DAYS, MIN_LOOKBACK_DAYS};
use crate::config::Settings;
use crate::llm::ClaudeClient;
use crate::mailbox::ImapMailbox;
use crate::models::Contact;

#[derive(Parser)]
#[command(name = "foliomail")]
#[command(about = "Portfolio company update collection and metrics extraction")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Collect and process forwarded emails from the mailbox
    Collect {
        /// Number of days back to check for emails (1-365)
        #[arg(long, default_value_t = 7)]
        days: u32,
        /// Run the full pipeline without writing to database or disk
        #[arg(long)]
        dry_run: bool,
    },

    /// Show current database statistics (reads aggregates only, no fetch)
    Stats,

    /// List portfolio companies overdue for an update
    Alerts {
        /// Months without an update before a company is listed
        #[arg(long, default_value_t = 1)]
        months: u32,
    },

    /// Import company contacts from a CSV file
    /// (columns: company,first_name,last_name,email,job_title,is_primary)
    ImportContacts {
        /// CSV file to import
        file: PathBuf,
    },
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init => cmd_init(&settings).await,
        Commands::Collect { days, dry_run } => cmd_collect(&settings, days, dry_run).await,
        Commands::Stats => cmd_stats(&settings).await,
        Commands::Alerts { months } => cmd_alerts(&settings, months).await,
        Commands::ImportContacts { file } => cmd_import_contacts(&settings, &file).await,
    }
}

/// Initialize the data directory and database schema.
async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    let config_path = settings.data_dir.join("foliomail.toml");
    settings.write_example_config(&config_path)?;

    println!(
        "{} Initialized foliomail in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  Database:    {}", settings.database_path().display());
    println!("  Attachments: {}", settings.attachments_dir().display());
    println!("  Config:      {}", config_path.display());
    println!();
    println!("Set IMAP_USERNAME, IMAP_PASSWORD and ANTHROPIC_API_KEY in the");
    println!("environment (or a .env file), then add forwarder addresses to");
    println!("the [mailbox] section of the config.");
    Ok(())
}

/// Run one collection pass.
async fn cmd_collect(settings: &Settings, days: u32, dry_run: bool) -> anyhow::Result<()> {
    if !(MIN_LOOKBACK_DAYS..=MAX_LOOKBACK_DAYS).contains(&days) {
        anyhow::bail!(
            "--days must be between {} and {}",
            MIN_LOOKBACK_DAYS,
            MAX_LOOKBACK_DAYS
        );
    }

    settings.ensure_directories()?;
    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    if dry_run {
        println!(
            "{} dry-run mode: no database or disk writes",
            style("!").yellow()
        );
    }
    println!("Collecting emails from the last {} days...", days);

    let mailbox = Arc::new(ImapMailbox::new(settings.mailbox.clone()));
    let analyzer = Arc::new(ClaudeClient::new(settings.llm.clone())?);
    let collector = Collector::new(
        mailbox,
        analyzer,
        ctx,
        settings.attachments_dir(),
        dry_run,
        settings.llm.max_retries,
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("processing mailbox...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    let result = collector.run(days).await;
    spinner.finish_and_clear();

    let summary = result?;
    print_summary(&summary);

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    let heading = if summary.dry_run {
        "COLLECTION COMPLETE (DRY RUN)"
    } else {
        "COLLECTION COMPLETE"
    };
    println!("{}", style(heading).bold());
    println!("  Messages found:     {}", summary.messages_found);
    println!("  Duplicates skipped: {}", summary.duplicates_skipped);
    println!("  Not updates:        {}", summary.not_updates);
    println!("  New companies:      {}", summary.new_companies);
    println!("  New email updates:  {}", summary.new_updates);
    println!("  New attachments:    {}", summary.new_attachments);
    println!("  New metric records: {}", summary.new_metric_rows);
    if summary.failures > 0 {
        println!(
            "  Failures:           {}",
            style(summary.failures).red().bold()
        );
    } else {
        println!("  Failures:           0");
    }
}

/// Show aggregate database statistics.
async fn cmd_stats(settings: &Settings) -> anyhow::Result<()> {
    let ctx = settings.create_db_context();
    ctx.init_schema().await?;
    let stats = ctx.stats().await?;

    println!("{}", style("Database statistics").bold());
    println!("  Portfolio companies:     {}", stats.portfolio_companies);
    println!("  Observed companies:      {}", stats.observed_companies);
    println!("  Total companies:         {}", stats.total_companies());
    println!("  Contacts:                {}", stats.contacts);
    println!("  Email updates:           {}", stats.email_updates);
    println!(
        "  Updates w/ attachments:  {} ({:.1}%)",
        stats.emails_with_attachments,
        stats.attachment_rate()
    );
    println!("  Financial metric rows:   {}", stats.metrics_rows);
    println!("  Failed extractions:      {}", stats.failed_extractions);
    println!("  Emails in last 7 days:   {}", stats.recent_emails_7d);

    let recent = ctx.emails().recent_with_company(5).await?;
    if !recent.is_empty() {
        println!();
        println!("{}", style("Most recent updates").bold());
        for (update, company) in recent {
            let name = company.unwrap_or_else(|| "(unclassified)".to_string());
            println!(
                "  {} {} - {}",
                update.received_at.format("%Y-%m-%d"),
                name,
                truncate(&update.subject, 50)
            );
        }
    }
    Ok(())
}

/// List portfolio companies overdue for an update, with alert contacts.
async fn cmd_alerts(settings: &Settings, months: u32) -> anyhow::Result<()> {
    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    let now = Utc::now();
    let cutoff = now - Duration::days(30 * months as i64);
    let stale = ctx.companies().stale_portfolio_companies(cutoff).await?;

    if stale.is_empty() {
        println!(
            "{} All portfolio companies have updated within {} month(s)",
            style("✓").green(),
            months
        );
        return Ok(());
    }

    println!(
        "{} {} portfolio company(ies) overdue:",
        style("!").yellow(),
        stale.len()
    );
    let contacts_repo = ctx.contacts();
    for company in stale {
        let tier = escalation_tier(company.last_update_date, now);
        let last = company
            .last_update_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  {} (last update: {}, escalation tier: {})",
            style(&company.name).bold(),
            last,
            tier
        );
        for contact in contacts_repo.for_company(company.id).await? {
            if !contact.email_bounced {
                println!("    -> {} <{}>", contact.display_name(), contact.email);
            }
        }
    }
    Ok(())
}

/// Escalation tier from months since the last update: 1, 2, or 3
/// (3 = final escalation, also used for companies that never updated).
fn escalation_tier(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    match last_update {
        None => 3,
        Some(last) => {
            let days = (now - last).num_days().max(0);
            ((days / 30) as u32).clamp(1, 3)
        }
    }
}

/// Import contacts from a CSV file. Companies must already exist; rows
/// naming unknown companies are reported and skipped.
async fn cmd_import_contacts(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    let raw = std::fs::read_to_string(file)?;
    let companies = ctx.companies();
    let contacts = ctx.contacts();

    let mut imported = 0usize;
    let mut skipped = 0usize;
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = parse_csv_line(line);
        // Header row
        if line_no == 0 && fields.iter().any(|f| f.eq_ignore_ascii_case("email")) {
            continue;
        }
        if fields.len() < 4 || fields[3].is_empty() {
            println!(
                "{} line {}: expected company,first,last,email[,title,is_primary]",
                style("!").yellow(),
                line_no + 1
            );
            skipped += 1;
            continue;
        }

        let company = match companies.find_by_normalized(&fields[0]).await? {
            Some(company) => company,
            None => {
                println!(
                    "{} line {}: unknown company '{}'",
                    style("!").yellow(),
                    line_no + 1,
                    fields[0]
                );
                skipped += 1;
                continue;
            }
        };

        let contact = Contact {
            id: 0,
            company_id: company.id,
            first_name: non_empty(fields.get(1)),
            last_name: non_empty(fields.get(2)),
            email: fields[3].clone(),
            job_title: non_empty(fields.get(4)),
            is_primary: fields
                .get(5)
                .map(|f| f.eq_ignore_ascii_case("true") || f == "1")
                .unwrap_or(false),
            email_bounced: false,
        };
        match contacts.insert_unique(&contact).await? {
            Some(_) => imported += 1,
            None => skipped += 1,
        }
    }

    println!(
        "{} Imported {} contact(s), skipped {}",
        style("✓").green(),
        imported,
        skipped
    );
    Ok(())
}

fn non_empty(field: Option<&String>) -> Option<String> {
    field.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_tier() {
        let now = Utc::now();
        assert_eq!(escalation_tier(None, now), 3);
        assert_eq!(escalation_tier(Some(now - Duration::days(35)), now), 1);
        assert_eq!(escalation_tier(Some(now - Duration::days(70)), now), 2);
        assert_eq!(escalation_tier(Some(now - Duration::days(200)), now), 3);
        // Fresh updates clamp up to the first tier
        assert_eq!(escalation_tier(Some(now), now), 1);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer subject line", 8), "a longer...");
    }
}
