use clap::ValueEnum;
use colored::Colorize;

use crate::error::Result;
use crate::legacy::migrator::{MigrationPlan, MigrationResult, RollbackResult};
use crate::model::{Status, Task};
use crate::render::truncate_comment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

fn colored_status(status: Status) -> String {
    match status {
        Status::ToDo => status.as_str().yellow().to_string(),
        Status::Doing => status.as_str().cyan().to_string(),
        Status::Done => status.as_str().green().to_string(),
    }
}

pub fn print_task(task: &Task, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(&task)?),
        Format::Pretty => {
            println!("[{}] {} ({})", task.id, task.title.bold(), colored_status(task.status));
            println!("  {}", task.comment);
            println!("  selector: {}", task.selector);
            let r = task.bounding_rect;
            if r != Default::default() {
                println!("  rect: {},{} {}x{}", r.x, r.y, r.w, r.h);
            }
            if task.has_screenshot() {
                println!("  screenshot: {}", task.screenshot_path);
            }
            println!("  created: {}", task.timestamp.to_rfc3339());
            if let Some(modified) = task.last_modified {
                println!("  modified: {}", modified.to_rfc3339());
            }
        }
        Format::Minimal => println!("{}", minimal_row(task)),
    }
    Ok(())
}

fn minimal_row(task: &Task) -> String {
    format!(
        "{:36} {:6} {:16} {}",
        task.id,
        task.status,
        truncate_comment(&task.title, 16),
        truncate_comment(&task.comment, 40)
    )
}

pub fn print_tasks(tasks: &[Task], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(tasks)?),
        Format::Pretty => {
            for task in tasks {
                print_task(task, Format::Pretty)?;
                println!();
            }
        }
        Format::Minimal => {
            println!("{:36} {:6} {:16} COMMENT", "ID", "STATUS", "TITLE");
            println!("{}", "-".repeat(72));
            for task in tasks {
                print_task(task, Format::Minimal)?;
            }
        }
    }
    Ok(())
}

pub fn print_migration(result: &MigrationResult, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(result)?),
        Format::Pretty | Format::Minimal => {
            let headline = if result.success {
                "migrated".green().bold()
            } else if result.rolled_back {
                "rolled back".yellow().bold()
            } else {
                "failed".red().bold()
            };
            println!(
                "{headline}: {} task(s) converted, {} file(s) archived",
                result.tasks_converted, result.files_archived
            );
            if format == Format::Pretty {
                for warning in &result.warnings {
                    println!("  {} {warning}", "warning:".yellow());
                }
            }
            for error in &result.errors {
                println!("  {} {error}", "error:".red());
            }
        }
    }
    Ok(())
}

pub fn print_plan(plan: Option<&MigrationPlan>, format: Format) -> Result<()> {
    let Some(plan) = plan else {
        match format {
            Format::Json => println!(
                "{}",
                serde_json::json!({ "dryRun": true, "files": [], "tasks": [] })
            ),
            _ => println!("nothing to migrate"),
        }
        return Ok(());
    };

    let files: Vec<_> = plan
        .parsed
        .iter()
        .zip(&plan.artifacts)
        .map(|((source, outcome), artifact)| {
            serde_json::json!({
                "file": artifact.name,
                "source": source,
                "annotations": outcome.annotations.len(),
                "skipped": outcome.skipped.iter().map(ToString::to_string).collect::<Vec<_>>(),
            })
        })
        .collect();

    match format {
        Format::Json => println!(
            "{}",
            serde_json::json!({
                "dryRun": true,
                "files": files,
                "existingTasks": plan.existing_tasks,
                "tasks": plan.conversion.tasks,
                "warnings": plan.conversion.warnings,
            })
        ),
        Format::Pretty | Format::Minimal => {
            for artifact in &plan.artifacts {
                println!("found {} ({})", artifact.name.bold(), artifact.source);
            }
            println!(
                "would convert {} task(s) ({} merged, {} dropped)",
                plan.conversion.tasks.len(),
                plan.conversion.enhanced,
                plan.conversion.dropped
            );
            if format == Format::Pretty {
                for task in &plan.conversion.tasks {
                    print_task(task, Format::Minimal)?;
                }
                for warning in &plan.conversion.warnings {
                    println!("  {} {warning}", "warning:".yellow());
                }
            }
        }
    }
    Ok(())
}

pub fn print_rollback(result: &RollbackResult, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(result)?),
        Format::Pretty | Format::Minimal => {
            for name in &result.restored {
                println!("{} {name}", "restored".green());
            }
            for name in &result.removed {
                println!("{} {name}", "removed".yellow());
            }
            for error in &result.errors {
                println!("{} {error}", "error:".red());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};

    fn task(title: &str, status: Status) -> Task {
        Task {
            id: "t-1".into(),
            title: title.into(),
            comment: "make   this\nblue".into(),
            selector: ".btn".into(),
            bounding_rect: Default::default(),
            screenshot_path: String::new(),
            status,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            last_modified: None,
        }
    }

    #[test]
    fn minimal_row_pads_status_column() {
        let row = minimal_row(&task("Btn", Status::Done));
        assert_eq!(row, format!("{:36} done   {:16} make this blue", "t-1", "Btn"));
    }

    #[test]
    fn minimal_row_truncates_like_markdown() {
        let row = minimal_row(&task("a long title here too", Status::ToDo));
        assert!(row.contains(" to-do  a long title... "), "{row}");
    }
}
