//! Kioku CLI
//!
//! Command-line client for the Kioku review engine: add items, list what is
//! due, and run interactive review sessions against the local database.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use kioku_core::{
    Clock, Configuration, Facet, KnowledgeUnitDetails, LearningState, MemoryModel, Question, Rating,
    ReviewResult, SessionController, SqliteRepository, SystemClock,
};
use tracing_subscriber::EnvFilter;

/// Kioku - spaced repetition reviews from the terminal
#[derive(Parser)]
#[command(name = "kioku")]
#[command(author = "Kioku Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Spaced repetition reviews: drill until correct, commit once")]
#[command(long_about = "Kioku schedules reviews with a stability/difficulty memory model.\n\nWrong answers in a session send the item to the back of the queue; the first correct answer commits one schedule update, penalised by every miss.")]
struct Cli {
    /// Directory holding kioku.db (defaults to the platform data directory)
    #[arg(long, global = true, env = "KIOKU_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Learner whose items are used
    #[arg(long, global = true, env = "KIOKU_USER", default_value = "default")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a knowledge unit and start learning it
    Add {
        /// Knowledge unit id
        ku_id: String,
        /// The word or character being learned
        #[arg(long)]
        subject: String,
        /// Accepted meaning (repeatable)
        #[arg(long = "meaning")]
        meanings: Vec<String>,
        /// Accepted reading (repeatable)
        #[arg(long = "reading")]
        readings: Vec<String>,
        /// Example sentence containing the subject
        #[arg(long)]
        cloze: Option<String>,
        /// Facets to learn (comma-separated: meaning, reading, cloze)
        #[arg(long, default_value = "meaning")]
        facets: String,
    },

    /// List items due for review
    Due {
        /// Maximum number of items to show
        #[arg(long)]
        limit: Option<usize>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run an interactive review session
    Review {
        /// Maximum number of items in the session
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show what again/pass would do to an item, without saving
    Preview {
        /// Knowledge unit id
        ku_id: String,
        /// Facet to preview
        #[arg(long, default_value = "meaning")]
        facet: String,
        /// Misses to assume before the correct answer
        #[arg(long, default_value = "0")]
        misses: u32,
    },

    /// Show review statistics
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show or set the target retention (0.5 - 0.99)
    Retention {
        /// New target retention
        value: Option<f64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with prompts and answers
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let repo = Arc::new(open_repository(cli.data_dir)?);
    let user = cli.user;

    match cli.command {
        Commands::Add {
            ku_id,
            subject,
            meanings,
            readings,
            cloze,
            facets,
        } => run_add(
            &repo,
            &user,
            KnowledgeUnitDetails {
                ku_id,
                subject,
                meanings,
                readings,
                cloze,
            },
            &facets,
        ),
        Commands::Due { limit, json } => run_due(&repo, &user, limit, json),
        Commands::Review { limit } => run_review(repo, &user, limit),
        Commands::Preview { ku_id, facet, misses } => run_preview(&repo, &user, &ku_id, &facet, misses),
        Commands::Stats { json } => run_stats(&repo, &user, json),
        Commands::Retention { value } => run_retention(&repo, &user, value),
    }
}

fn open_repository(data_dir: Option<PathBuf>) -> anyhow::Result<SqliteRepository> {
    let path = data_dir.map(|dir| dir.join("kioku.db"));
    let shown = match &path {
        Some(p) => p.display().to_string(),
        None => "default location".to_string(),
    };
    SqliteRepository::new(path).with_context(|| format!("Failed to open database ({})", shown))
}

/// Add a knowledge unit and create missing learning states
fn run_add(repo: &SqliteRepository, user: &str, unit: KnowledgeUnitDetails, facets: &str) -> anyhow::Result<()> {
    let facets = parse_facets(facets)?;
    repo.upsert_knowledge_unit(&unit)?;

    for facet in facets {
        if repo.get_state(user, &unit.ku_id, &facet)?.is_some() {
            println!("{} {} ({}) already being learned", "=".dimmed(), unit.subject, facet);
            continue;
        }
        repo.upsert_state(&LearningState::new(user, unit.ku_id.as_str(), facet.clone()))?;
        println!("{} {} ({})", "+".green().bold(), unit.subject, facet);
    }
    Ok(())
}

/// List due items
fn run_due(repo: &SqliteRepository, user: &str, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let now = Utc::now();
    let due = repo.due_states(user, now, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&due)?);
        return Ok(());
    }

    if due.is_empty() {
        println!("{}", "Nothing due. Come back later.".dimmed());
        return Ok(());
    }

    println!("{}", format!("=== {} due ===", due.len()).cyan().bold());
    for state in &due {
        let overdue = match state.next_review {
            Some(at) => format!("overdue {}", format_interval(now - at)),
            None => "new".to_string(),
        };
        println!(
            "  {:24} {:10} {:10} S={:<8.2} D={:<5.2} {}",
            state.ku_id,
            state.facet.to_string(),
            state.stage.to_string(),
            state.stability,
            state.difficulty,
            overdue.dimmed()
        );
    }
    Ok(())
}

/// Interactive drill-then-commit session
fn run_review(repo: Arc<SqliteRepository>, user: &str, limit: Option<usize>) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut controller = SessionController::new(repo.clone(), repo.clone(), clock);

    if due_count(&repo, user)? == 0 {
        println!("{}", "Nothing due. Come back later.".dimmed());
        return Ok(());
    }

    let total = controller.start_session(user, limit)?.progress.total_items;
    println!(
        "{}",
        format!("=== Review: {} items (target retention {:.0}%) ===", total, controller.target_retention() * 100.0)
            .cyan()
            .bold()
    );
    println!("{}", "Type the answer, or :q to stop.".dimmed());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while let Some(item) = controller.get_next_item() {
        let details = repo
            .get_knowledge_unit(&item.ku_id)?
            .unwrap_or_else(|| KnowledgeUnitDetails {
                ku_id: item.ku_id.clone(),
                subject: item.ku_id.clone(),
                ..Default::default()
            });
        let question = match controller.current_question(&details) {
            Some(q) => q,
            None => break,
        };

        let remaining = controller.progress().map(|p| p.remaining()).unwrap_or(0);
        println!();
        println!("{} {}", format!("[{} left]", remaining).dimmed(), question.prompt.bold());
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        if line.trim() == ":q" {
            break;
        }

        let rating = match judge(&question, &line) {
            Some(rating) => rating,
            None => {
                println!("{}", "Answer y or n.".yellow());
                continue;
            }
        };

        if rating == Rating::Again {
            if !question.answers.is_empty() {
                println!("{} {}", "✗".red().bold(), question.answers.join(", ").dimmed());
            }
            controller.submit_answer(rating)?;
            continue;
        }

        let committed = match controller.submit_answer(rating) {
            Ok(committed) => committed,
            Err(e) => retry_commit(&mut controller, e)?,
        };
        if committed {
            if let Some(commit) = controller.last_commit() {
                print_commit(&commit.result, commit.wrong_count);
            }
        }
    }

    match controller.progress() {
        Some(progress) if controller.is_finished() => {
            println!();
            println!("{}", "=== Session complete ===".green().bold());
            println!("{}: {}", "Committed".white().bold(), progress.committed);
            println!("{}: {}", "Misses".white().bold(), progress.incorrect_attempts);
            println!("{}: {:.0}%", "First-try accuracy".white().bold(), progress.accuracy() * 100.0);
        }
        Some(progress) => {
            controller.abandon();
            println!();
            println!(
                "{}",
                format!("Stopped with {} of {} items committed.", progress.committed, progress.total_items).yellow()
            );
        }
        None => {}
    }
    Ok(())
}

/// A failed commit is retried a few times before giving up
fn retry_commit(controller: &mut SessionController, first_error: kioku_core::SessionError) -> anyhow::Result<bool> {
    if !controller.has_pending_commit() {
        return Err(first_error.into());
    }
    tracing::warn!("Commit failed, retrying: {}", first_error);

    let mut last_error = first_error;
    for _ in 0..3 {
        match controller.retry_commit() {
            Ok(committed) => return Ok(committed),
            Err(e) => {
                tracing::warn!("Retry failed: {}", e);
                last_error = e;
            }
        }
    }
    Err(anyhow::Error::new(last_error).context("Could not save the review; the session was left unfinished"))
}

/// Grade a typed answer
///
/// Items without stored answers are self-graded with y/n.
fn judge(question: &Question, input: &str) -> Option<Rating> {
    if !question.answers.is_empty() {
        return Some(if question.accepts(input) { Rating::Pass } else { Rating::Again });
    }
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(Rating::Pass),
        "n" | "no" => Some(Rating::Again),
        other => other.parse().ok(),
    }
}

fn print_commit(result: &ReviewResult, wrong_count: u32) {
    let mark = if wrong_count == 0 { "✓".green().bold() } else { "✓".yellow().bold() };
    match result.next_review {
        Some(_) => println!(
            "{} next in {} {}",
            mark,
            format_interval(result.interval),
            format!("(S={:.2}, D={:.2}, {})", result.state.stability, result.state.difficulty, result.state.stage)
                .dimmed()
        ),
        None => println!("{} {}", mark, "burned - never scheduled again".magenta().bold()),
    }
}

fn run_preview(repo: &SqliteRepository, user: &str, ku_id: &str, facet: &str, misses: u32) -> anyhow::Result<()> {
    let facet: Facet = facet.parse()?;
    let state = repo
        .get_state(user, ku_id, &facet)?
        .with_context(|| format!("No {} state for {}", facet, ku_id))?;

    let model = MemoryModel::new();
    let preview = model.preview(&state, misses, repo.target_retention(user), Utc::now());

    println!("{}", format!("=== {} ({}) ===", ku_id, facet).cyan().bold());
    println!(
        "{}: {}  S={:.2}  D={:.2}  reps={}  lapses={}",
        "Now".white().bold(),
        state.stage,
        state.stability,
        state.difficulty,
        state.reps,
        state.lapses
    );
    for (label, result) in [("Again", &preview.again), ("Pass", &preview.pass)] {
        println!(
            "{:>6}: {:10} S={:<8.2} D={:<5.2} {}",
            label.white().bold(),
            result.state.stage.to_string(),
            result.state.stability,
            result.state.difficulty,
            match result.next_review {
                Some(_) => format!("in {}", format_interval(result.interval)),
                None => "burned".to_string(),
            }
        );
    }
    Ok(())
}

fn run_stats(repo: &SqliteRepository, user: &str, json: bool) -> anyhow::Result<()> {
    let stats = repo.get_stats(user, Utc::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", format!("=== Kioku statistics ({}) ===", user).cyan().bold());
    println!();
    println!("{}: {}", "Total Items".white().bold(), stats.total_items);
    println!("{}: {}", "Due Now".white().bold(), stats.due_now);
    println!("{}: {:.2}", "Average Stability (days)".white().bold(), stats.average_stability);
    println!("{}: {:.1}%", "Average Recall".white().bold(), stats.average_retrievability * 100.0);
    println!("{}: {}", "Finished Sessions".white().bold(), stats.finished_sessions);
    let accuracy = if stats.total_attempts > 0 {
        stats.correct_attempts as f64 / stats.total_attempts as f64 * 100.0
    } else {
        0.0
    };
    println!("{}: {:.1}% of {}", "Answer Accuracy".white().bold(), accuracy, stats.total_attempts);

    if stats.total_items > 0 {
        println!();
        println!("{}", "=== Stage Distribution ===".magenta().bold());
        print_distribution_bar("New", stats.new_items, stats.total_items, "white");
        print_distribution_bar("Learning", stats.learning_items, stats.total_items, "yellow");
        print_distribution_bar("Review", stats.review_items, stats.total_items, "green");
        print_distribution_bar("Relearning", stats.relearning_items, stats.total_items, "red");
        print_distribution_bar("Burned", stats.burned_items, stats.total_items, "magenta");
    }
    Ok(())
}

fn print_distribution_bar(label: &str, count: usize, total: usize, color: &str) {
    let percentage = if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    let bar_width: usize = 30;
    let filled = ((percentage / 100.0) * bar_width as f64) as usize;
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(bar_width.saturating_sub(filled)));
    let colored_bar = match color {
        "green" => bar.green(),
        "yellow" => bar.yellow(),
        "red" => bar.red(),
        "magenta" => bar.magenta(),
        _ => bar.white(),
    };

    println!("  {:12} [{}] {:>4} ({:>5.1}%)", label, colored_bar, count, percentage);
}

fn run_retention(repo: &SqliteRepository, user: &str, value: Option<f64>) -> anyhow::Result<()> {
    match value {
        Some(value) => {
            let stored = repo.set_target_retention(user, value)?;
            if (stored - value).abs() > f64::EPSILON {
                println!("{}", format!("{} is out of range, clamped", value).yellow());
            }
            println!("{}: {:.2}", "Target retention".white().bold(), stored);
        }
        None => {
            println!("{}: {:.2}", "Target retention".white().bold(), repo.target_retention(user));
        }
    }
    Ok(())
}

fn parse_facets(input: &str) -> anyhow::Result<Vec<Facet>> {
    let mut facets: Vec<Facet> = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let facet: Facet = part.parse()?;
        if !facets.contains(&facet) {
            facets.push(facet);
        }
    }
    anyhow::ensure!(!facets.is_empty(), "at least one facet is required");
    Ok(facets)
}

/// Human-readable interval: minutes, hours, days or years
fn format_interval(interval: Duration) -> String {
    let minutes = interval.num_minutes().max(0);
    if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 60 * 24 {
        format!("{}h", minutes / 60)
    } else if interval.num_days() < 365 {
        format!("{}d", interval.num_days())
    } else {
        format!("{:.1}y", interval.num_days() as f64 / 365.0)
    }
}

fn due_count(repo: &SqliteRepository, user: &str) -> anyhow::Result<usize> {
    Ok(repo.due_states(user, Utc::now(), None)?.len())
}
