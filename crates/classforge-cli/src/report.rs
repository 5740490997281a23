//! Human and JSON rendering of command results.

use anyhow::Result;
use clap::ValueEnum;
use console::style;

use classforge_core::github::{Commit, Repository, Team};
use classforge_core::provision::{EntityOutcome, OutcomeSummary};

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

pub fn print_outcomes(outcomes: &[EntityOutcome], format: OutputFormat) -> Result<()> {
    let summaries: Vec<OutcomeSummary> = outcomes.iter().map(EntityOutcome::summary).collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Table => print_outcome_table(&summaries),
    }
    Ok(())
}

fn print_outcome_table(summaries: &[OutcomeSummary]) {
    if summaries.is_empty() {
        println!("Batch file lists no entities.");
        return;
    }

    println!("{:<24} {:<20} Detail", "Entity", "Status");
    println!("{}", "-".repeat(80));

    for summary in summaries {
        let status = match summary.status {
            "ok" => style(format!("{:<20}", summary.status)).green(),
            "already-provisioned" => style(format!("{:<20}", summary.status)).yellow(),
            _ => style(format!("{:<20}", summary.status)).red(),
        };
        let detail = summary
            .error
            .as_deref()
            .or(summary.repo_url.as_deref())
            .unwrap_or("-");
        println!(
            "{:<24} {} {}",
            truncate(&summary.entity, 24),
            status,
            detail
        );
    }

    let failed = summaries.iter().filter(|s| s.status != "ok").count();
    println!();
    if failed == 0 {
        println!("Summary: {} entities, all OK", summaries.len());
    } else {
        println!(
            "Summary: {} entities, {}",
            summaries.len(),
            style(format!("{failed} not provisioned by this run")).red()
        );
    }
}

pub fn print_teams(teams: &[Team], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(teams)?),
        OutputFormat::Table => {
            println!("{:<12} {:<32} Slug", "Id", "Name");
            println!("{}", "-".repeat(70));
            for team in teams {
                println!("{:<12} {:<32} {}", team.id, truncate(&team.name, 32), team.slug);
            }
        }
    }
    Ok(())
}

pub fn print_repos(repos: &[Repository], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(repos)?),
        OutputFormat::Table => {
            println!("{:<12} {:<32} Url", "Id", "Name");
            println!("{}", "-".repeat(80));
            for repo in repos {
                println!("{:<12} {:<32} {}", repo.id, truncate(&repo.name, 32), repo.html_url);
            }
        }
    }
    Ok(())
}

pub fn print_commit(repo: &str, commit: Option<&Commit>, format: OutputFormat) -> Result<()> {
    match (format, commit) {
        (OutputFormat::Json, commit) => println!("{}", serde_json::to_string_pretty(&commit)?),
        (OutputFormat::Table, None) => {
            println!("{}", style(format!("No commit in {repo} before the deadline")).yellow());
        }
        (OutputFormat::Table, Some(commit)) => {
            let when = commit
                .authored_at()
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            let subject = commit.commit.message.lines().next().unwrap_or_default();
            println!("{}  {}  {}", style(&commit.sha).bold(), when, subject);
            if !commit.html_url.is_empty() {
                println!("{}", commit.html_url);
            }
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
