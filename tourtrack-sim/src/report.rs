use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use tourtrack_core::{ExecutionStatus, TourExecution, elapsed_since};

use crate::drive::{Ending, Outcome};

#[derive(Debug, Clone, Serialize)]
pub struct KeyPointReport {
    pub ordinal: u32,
    pub id: String,
    pub name: String,
    pub reached_at: Option<DateTime<Utc>>,
    /// Time since the tour started, `HH:MM:SS`.
    pub reached_after: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub tour_id: String,
    pub tour_name: String,
    pub user: String,
    pub source: String,
    pub ending: Ending,
    pub status: ExecutionStatus,
    pub completed: usize,
    pub total: usize,
    pub elapsed: String,
    pub movement_ticks: usize,
    pub arrived: bool,
    pub wall_time_ms: u128,
    pub key_points: Vec<KeyPointReport>,
    pub execution: TourExecution,
}

impl RunReport {
    pub fn from_outcome(outcome: &Outcome) -> Self {
        let execution = &outcome.execution;
        let key_points = outcome
            .tour
            .key_points()
            .iter()
            .map(|kp| {
                let reached_at = execution
                    .completed_key_points
                    .iter()
                    .find(|done| done.key_point_id == kp.id)
                    .map(|done| done.completion_time);
                KeyPointReport {
                    ordinal: kp.ordinal,
                    id: kp.id.to_string(),
                    name: kp.label().to_string(),
                    reached_at,
                    reached_after: reached_at.map(|at| elapsed_since(execution.start_time, at)),
                }
            })
            .collect();
        let progress = execution.progress(&outcome.tour);
        Self {
            tour_id: outcome.tour.id.to_string(),
            tour_name: outcome.tour.name.clone(),
            user: execution.user_id.to_string(),
            source: outcome.source.to_string(),
            ending: outcome.ending,
            status: execution.status,
            completed: progress.completed,
            total: progress.total,
            elapsed: outcome.elapsed.clone(),
            movement_ticks: outcome.movement_ticks,
            arrived: outcome.arrived,
            wall_time_ms: outcome.wall_time.as_millis(),
            key_points,
            execution: execution.clone(),
        }
    }
}

pub fn generate_console_report(out: &mut dyn Write, report: &RunReport) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Tour Execution Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=========================".cyan())?;

    let status = match report.status {
        ExecutionStatus::Completed => "✅ COMPLETED".green(),
        ExecutionStatus::Abandoned => "🛑 ABANDONED".red(),
        ExecutionStatus::Active => "⏳ ACTIVE".yellow(),
    };
    writeln!(out, "{status} {}", report.tour_id.bold())?;
    writeln!(out, "Execution: {}", report.execution.id)?;
    writeln!(out, "Tourist: {} ({} positions)", report.user, report.source)?;
    writeln!(
        out,
        "Key points: {}/{}",
        report.completed.to_string().green(),
        report.total
    )?;
    writeln!(out, "Elapsed: {}", report.elapsed)?;
    if report.movement_ticks > 0 {
        writeln!(
            out,
            "Movement: {} ticks{}",
            report.movement_ticks,
            if report.arrived { ", arrived" } else { "" }
        )?;
    }
    writeln!(out)?;

    for kp in &report.key_points {
        match &kp.reached_after {
            Some(after) => writeln!(out, "  ✅ {:>2}. {} ({after})", kp.ordinal, kp.name)?,
            None => writeln!(out, "  ⬜ {:>2}. {}", kp.ordinal, kp.name.dimmed())?,
        }
    }
    writeln!(out)?;
    writeln!(out, "🏁 Wall time: {} ms", report.wall_time_ms)?;
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, report: &RunReport) -> Result<()> {
    let json_output = serde_json::to_string_pretty(report)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, report: &RunReport) -> Result<()> {
    let title = if report.tour_name.is_empty() {
        &report.tour_id
    } else {
        &report.tour_name
    };
    writeln!(out, "# Tour Execution: {title}\n")?;

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Execution**: `{}`", report.execution.id)?;
    writeln!(out, "- **Tourist**: {}", report.user)?;
    writeln!(out, "- **Source**: {}", report.source)?;
    writeln!(out, "- **Status**: {}", report.status)?;
    writeln!(out, "- **Key points**: {}/{}", report.completed, report.total)?;
    writeln!(out, "- **Elapsed**: {}\n", report.elapsed)?;

    writeln!(out, "## Key Points\n")?;
    writeln!(out, "| # | Key point | Reached after |")?;
    writeln!(out, "|---|-----------|---------------|")?;
    for kp in &report.key_points {
        writeln!(
            out,
            "| {} | {} | {} |",
            kp.ordinal,
            kp.name,
            kp.reached_after.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}
