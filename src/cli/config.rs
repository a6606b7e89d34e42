//! Config command handler.

use std::path::Path;

use anyhow::{Context, Result};
use kubepilot::config::validate::{validate_config, DiagnosticLevel};
use kubepilot::config::Config;

/// Print the effective configuration, secrets masked, or check the file.
pub(crate) fn cmd_config(config: &Config, path: &Path, check: bool) -> Result<()> {
    println!("Config file: {}", path.display());

    if check {
        return check_file(path);
    }

    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    let problems = config.validate();
    if !problems.is_empty() {
        println!();
        for problem in &problems {
            println!("[ERROR] {}", problem);
        }
    }
    Ok(())
}

fn check_file(path: &Path) -> Result<()> {
    if !path.exists() {
        println!("[OK] No config file found (using defaults)");
        return Ok(());
    }

    let content = std::fs::read_to_string(path).context("Failed to read config file")?;
    let raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            println!("[ERROR] Invalid JSON: {}", e);
            return Ok(());
        }
    };

    let diagnostics = validate_config(&raw);
    for diag in &diagnostics {
        println!("{}", diag);
    }

    let count = |level: DiagnosticLevel| diagnostics.iter().filter(|d| d.level == level).count();
    let errors = count(DiagnosticLevel::Error);
    let warnings = count(DiagnosticLevel::Warn);
    if errors == 0 && warnings == 0 {
        println!("\nConfiguration looks good!");
    } else {
        println!("\nFound {} error(s), {} warning(s)", errors, warnings);
    }
    Ok(())
}
