//! Match CLI entry point.
//!
//! This binary loads student profiles from a JSON file, builds the similarity
//! index, and answers match queries. It supports both single-query and
//! interactive REPL modes, with table or JSON output.
//!
//! # Examples
//!
//! Top matches for one user:
//! ```bash
//! match-cli --profiles profiles.json --user u1
//! ```
//!
//! Compatibility breakdown for a pair, as JSON:
//! ```bash
//! match-cli --profiles profiles.json --compare u1 u2 --format json
//! ```
//!
//! Interactive mode acting as a user:
//! ```bash
//! match-cli --profiles profiles.json --interactive --user u1
//! ```

use anyhow::{Context, Result};
use campus_match::{
    api::{InteractRequest, MatchEngine, MatchesRequest, SearchRequest},
    config::MatchConfig,
    matching::TextSearchResult,
    models::ScoredMatch,
    scoring::CompatibilityReport,
    storage::{memory::MemoryStore, ProfileSource},
};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format for query results
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table with colored scores
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Study-buddy matching from the command line
#[derive(Parser, Debug)]
#[command(
    name = "match-cli",
    version,
    about = "Find compatible study partners in a set of student profiles",
    long_about = "Load student profiles from a JSON file, build the similarity index and \
                  query it. Supports single queries and an interactive mode.

EXAMPLES:
  Top matches for a user:
    match-cli --profiles profiles.json --user u1

  Pairwise compatibility:
    match-cli --profiles profiles.json --compare u1 u2

  Free-text search:
    match-cli --profiles profiles.json --search \"linear algebra visual\"

  Interactive mode:
    match-cli --profiles profiles.json --interactive --user u1"
)]
struct Args {
    /// JSON file holding an array of profile records
    #[arg(long, value_name = "PATH")]
    profiles: PathBuf,

    /// JSON file overriding engine configuration
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// User to find matches for (acting user in interactive mode)
    #[arg(long, value_name = "ID")]
    user: Option<String>,

    /// Show the compatibility breakdown for two users
    #[arg(long, num_args = 2, value_names = ["ID_A", "ID_B"], conflicts_with_all = ["search", "interactive"])]
    compare: Option<Vec<String>>,

    /// Search profiles by free text
    #[arg(long, value_name = "TEXT", conflicts_with = "interactive")]
    search: Option<String>,

    /// Number of results to return
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Minimum compatibility score (0-100)
    #[arg(long, value_name = "SCORE")]
    min_score: Option<u32>,

    /// Recompute matches instead of reading the cache
    #[arg(long)]
    refresh: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Truncate to at most `max` characters, marking the cut with "...".
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

fn score_color(score: u8) -> Color {
    match score {
        80..=100 => Color::Green,
        60..=79 => Color::Cyan,
        40..=59 => Color::Yellow,
        _ => Color::White,
    }
}

fn bold_header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Format matches as a pretty table
fn format_matches_table(matches: &[ScoredMatch]) -> String {
    if matches.is_empty() {
        return "No matches found.".to_string();
    }

    let mut table = new_table();
    table.set_header(bold_header(&["Rank", "User", "Name", "Score", "Similarity", "Reasons"]));

    for (idx, m) in matches.iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(&m.user.id),
            Cell::new(truncate(m.user.name.as_deref().unwrap_or("-"), 24)),
            Cell::new(m.compatibility_score).fg(score_color(m.compatibility_score)),
            Cell::new(format!("{:.4}", m.vector_similarity)),
            Cell::new(truncate(&m.match_reasons.join("; "), 80)),
        ]);
    }

    table.to_string()
}

/// Format a compatibility report as a per-signal table
fn format_report_table(user_a: &str, user_b: &str, report: &CompatibilityReport) -> String {
    let b = &report.breakdown;
    let mut table = new_table();
    table.set_header(bold_header(&["Signal", "Sub-score", "Weight", "Points"]));

    for (name, signal) in [
        ("Vector similarity", b.vector_similarity),
        ("Shared courses", b.shared_courses),
        ("Learning style", b.learning_style),
        ("Availability", b.availability),
        ("Shared interests", b.shared_interests),
        ("Same department", b.same_department),
    ] {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(format!("{:.3}", signal.score)),
            Cell::new(format!("{:.0}", signal.weight)),
            Cell::new(format!("{:.2}", signal.points)),
        ]);
    }

    format!(
        "{} vs {}: {} / 100\n{}\nCourses in common: {} of {} ({:.0}%)\nInterests in common: {} of {} ({:.0}%)\nReasons:\n  - {}",
        user_a,
        user_b,
        report.score,
        table,
        b.course_overlap.common,
        b.course_overlap.total,
        b.course_overlap.percentage * 100.0,
        b.interest_overlap.common,
        b.interest_overlap.total,
        b.interest_overlap.percentage * 100.0,
        report.reasons.join("\n  - ")
    )
}

/// Format text search results as a pretty table
fn format_search_table(results: &[TextSearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = new_table();
    table.set_header(bold_header(&["Rank", "User", "Name", "Score", "Courses"]));

    for (idx, result) in results.iter().enumerate() {
        let name = result
            .user
            .as_ref()
            .and_then(|u| u.name.as_deref())
            .unwrap_or("-");
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(&result.user_id),
            Cell::new(truncate(name, 24)),
            Cell::new(format!("{:.4}", result.score)),
            Cell::new(truncate(&result.metadata.courses.join(", "), 60)),
        ]);
    }

    table.to_string()
}

/// Serialize any response as pretty JSON
fn format_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).with_context(|| "Failed to serialize results to JSON")
}

/// Query state carried across REPL commands
struct Session {
    user: Option<String>,
    request: MatchesRequest,
    search_limit: usize,
    format: OutputFormat,
}

impl Session {
    fn from_args(args: &Args) -> Self {
        Self {
            user: args.user.clone(),
            request: MatchesRequest {
                limit: args.limit,
                min_score: args.min_score,
                refresh: args.refresh,
                exclude_ids: Vec::new(),
            },
            search_limit: args.limit.unwrap_or(10),
            format: args.format,
        }
    }

    fn acting_user(&self) -> Result<&str> {
        self.user
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No acting user. Set one with /user ID"))
    }
}

async fn show_matches(engine: &MatchEngine<MemoryStore>, session: &Session) -> Result<()> {
    let user = session.acting_user()?;
    let start = Instant::now();
    let response = engine
        .get_matches(user, &session.request)
        .await
        .with_context(|| format!("Failed to find matches for user '{}'", user))?;
    let elapsed = start.elapsed();

    match session.format {
        OutputFormat::Table => {
            println!("{}", format_matches_table(&response.matches));
            println!("\nFound {} matches in {:.2}s", response.count, elapsed.as_secs_f64());
        }
        OutputFormat::Json => println!("{}", format_json(&response)?),
    }
    Ok(())
}

async fn show_compatibility(engine: &MatchEngine<MemoryStore>, user_a: &str, user_b: &str, format: OutputFormat) -> Result<()> {
    let response = engine
        .get_compatibility(user_a, user_b)
        .await
        .with_context(|| format!("Failed to compare '{}' and '{}'", user_a, user_b))?;

    match format {
        OutputFormat::Table => println!("{}", format_report_table(user_a, user_b, &response.compatibility)),
        OutputFormat::Json => println!("{}", format_json(&response)?),
    }
    Ok(())
}

async fn show_search(engine: &MatchEngine<MemoryStore>, query: &str, limit: usize, format: OutputFormat) -> Result<()> {
    debug!("Executing search for query: {}", query);
    let request = SearchRequest {
        q: query.to_string(),
        limit,
    };
    let start = Instant::now();
    let response = engine
        .search_by_text(&request)
        .await
        .with_context(|| format!("Failed to execute search for query: '{}'", query))?;
    let elapsed = start.elapsed();

    match format {
        OutputFormat::Table => {
            println!("{}", format_search_table(&response.results));
            println!("\nFound {} results in {:.2}s", response.count, elapsed.as_secs_f64());
        }
        OutputFormat::Json => println!("{}", format_json(&response)?),
    }
    Ok(())
}

async fn record(engine: &MatchEngine<MemoryStore>, session: &Session, target: &str, action: &str) -> Result<()> {
    let user = session.acting_user()?;
    let request = InteractRequest {
        target_user_id: target.to_string(),
        action: action.to_string(),
    };
    let response = engine
        .record_interaction(user, &request)
        .await
        .with_context(|| format!("Failed to record {} on '{}'", action, target))?;

    match session.format {
        OutputFormat::Table => {
            println!("Recorded {} on {}", response.interaction.action, target);
            if response.mutual_match {
                println!("It's a match! {} and {} liked each other.", user, target);
            }
        }
        OutputFormat::Json => println!("{}", format_json(&response)?),
    }
    Ok(())
}

async fn show_stats(engine: &MatchEngine<MemoryStore>) -> Result<()> {
    let index = engine.service().index_stats().await;
    let cache = engine.service().cache_stats().await;
    println!(
        "Index: {} users, {} corpus documents ({} orphaned)",
        index.indexed_users, index.corpus_documents, index.orphaned_documents
    );
    println!(
        "Cache: {} entries, {} hits, {} misses, {} stale writes dropped",
        cache.entries, cache.hits, cache.misses, cache.stale_writes
    );
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  <text>              - Search profiles by free text");
    println!("  /user ID            - Act as user ID");
    println!("  /matches            - Show matches for the acting user");
    println!("  /next               - Show the best match not yet decided on");
    println!("  /compare ID [ID]    - Compatibility with ID (or between two users)");
    println!("  /like ID            - Like a user");
    println!("  /pass ID            - Pass on a user");
    println!("  /superlike ID       - Superlike a user");
    println!("  /limit N            - Set number of results to N");
    println!("  /min-score N        - Set minimum compatibility score");
    println!("  /refresh on|off     - Bypass the match cache");
    println!("  /sync [ID]          - Re-index one user, or everyone");
    println!("  /stats              - Show index and cache statistics");
    println!("  /format table|json  - Set output format");
    println!("  /help               - Show this help");
    println!("  Ctrl+D or Ctrl+C    - Exit");
}

/// Handle one slash command. Returns an error for the caller to print.
async fn run_command(engine: &MatchEngine<MemoryStore>, session: &mut Session, decided: &mut Vec<String>, parts: &[&str]) -> Result<()> {
    match parts {
        ["/help"] => print_help(),
        ["/user", id] => {
            session.user = Some(id.to_string());
            decided.clear();
            println!("Acting as {}", id);
        }
        ["/matches"] => show_matches(engine, session).await?,
        ["/next"] => {
            let user = session.acting_user()?;
            let response = engine.next_match(user, decided.clone()).await?;
            match (&response.next, session.format) {
                (_, OutputFormat::Json) => println!("{}", format_json(&response)?),
                (Some(next), OutputFormat::Table) => {
                    println!("{}", format_matches_table(std::slice::from_ref(next)))
                }
                (None, OutputFormat::Table) => {
                    println!("{}", response.message.as_deref().unwrap_or("No more matches available"))
                }
            }
        }
        ["/compare", other] => {
            let user = session.acting_user()?.to_string();
            show_compatibility(engine, &user, other, session.format).await?
        }
        ["/compare", a, b] => show_compatibility(engine, a, b, session.format).await?,
        [action @ ("/like" | "/pass" | "/superlike"), target] => {
            record(engine, session, target, &action[1..]).await?;
            decided.push(target.to_string());
        }
        ["/limit", n] => match n.parse::<usize>() {
            Ok(n) if n > 0 => {
                session.request.limit = Some(n);
                session.search_limit = n;
                println!("Set limit to {}", n);
            }
            _ => anyhow::bail!("Invalid number: must be a positive integer"),
        },
        ["/min-score", n] => {
            let score = n
                .parse::<u32>()
                .with_context(|| format!("Invalid score: {}", n))?;
            session.request.min_score = Some(score);
            println!("Set minimum score to {}", score);
        }
        ["/refresh", flag] => {
            session.request.refresh = matches!(*flag, "on" | "true");
            println!("Refresh {}", if session.request.refresh { "enabled" } else { "disabled" });
        }
        ["/sync"] => {
            let spinner = create_spinner("Rebuilding index...");
            let response = engine.sync_all_users().await;
            spinner.finish_and_clear();
            println!("{}", response?.message);
        }
        ["/sync", id] => {
            let response = engine.sync_profile(id).await?;
            println!("{}", response.message);
        }
        ["/stats"] => show_stats(engine).await?,
        ["/format", "table"] => {
            session.format = OutputFormat::Table;
            println!("Set output format to table");
        }
        ["/format", "json"] => {
            session.format = OutputFormat::Json;
            println!("Set output format to JSON");
        }
        [command, ..] => anyhow::bail!("Unknown command or arguments: {}. Type /help for available commands.", command),
        [] => {}
    }
    Ok(())
}

/// Run interactive REPL mode
async fn run_interactive(engine: MatchEngine<MemoryStore>, mut session: Session) -> Result<()> {
    println!("Interactive Study-Buddy Matching");
    print_help();
    println!();

    let mut rl = DefaultEditor::new().with_context(|| "Failed to create readline editor")?;
    let mut decided: Vec<String> = Vec::new();

    loop {
        let prompt = format!("{}> ", session.user.as_deref().unwrap_or("match"));
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line).ok();

                let outcome = if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    run_command(&engine, &mut session, &mut decided, &parts).await
                } else {
                    show_search(&engine, line, session.search_limit, session.format).await
                };

                if let Err(e) = outcome {
                    eprintln!("Error: {:#}", e);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level);

    if !args.interactive && args.user.is_none() && args.compare.is_none() && args.search.is_none() {
        anyhow::bail!(
            "One of --user, --compare, --search or --interactive must be specified.\n\
             Use --help for usage information."
        );
    }

    let config = match &args.config {
        Some(path) => MatchConfig::from_json_file(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => MatchConfig::default(),
    };

    info!("Loading profiles from: {}", args.profiles.display());
    let store = MemoryStore::from_json_file(&args.profiles)
        .await
        .with_context(|| "Failed to load profiles")?;

    let profile_count = store
        .count_profiles()
        .await
        .with_context(|| "Failed to count profiles")?;
    if profile_count == 0 {
        anyhow::bail!("Profile file is empty (0 profiles found).");
    }

    let engine = MatchEngine::new(Arc::new(store), config).with_context(|| "Invalid configuration")?;

    let spinner = create_spinner(&format!("Indexing {} profiles...", profile_count));
    let start = Instant::now();
    let synced = engine.sync_all_users().await;
    spinner.finish_and_clear();
    synced.with_context(|| "Failed to build similarity index")?;
    info!(
        "Indexed {} profiles in {:.2}s",
        profile_count,
        start.elapsed().as_secs_f64()
    );

    let session = Session::from_args(&args);

    if args.interactive {
        return run_interactive(engine, session).await;
    }

    if let Some(pair) = &args.compare {
        let [a, b] = pair.as_slice() else {
            anyhow::bail!("--compare takes exactly two user ids");
        };
        return show_compatibility(&engine, a, b, args.format).await;
    }

    if let Some(query) = &args.search {
        return show_search(&engine, query, session.search_limit, args.format).await;
    }

    show_matches(&engine, &session).await
}
