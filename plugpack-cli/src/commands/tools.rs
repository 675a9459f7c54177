//! `plugpack tools`: report tool availability and the gate verdict.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use plugpack_detector::{check_gate, probe_tools, COMPOSER, NPM};

use super::ProjectArgs;

/// Arguments for `plugpack tools`.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Tabled)]
struct ToolRow {
    #[tabled(rename = "tool")]
    tool: String,
    #[tabled(rename = "role")]
    role: &'static str,
    #[tabled(rename = "location")]
    location: String,
}

fn location(path: Option<&PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "not found".to_string(),
    }
}

impl ToolsArgs {
    pub fn run(self) -> Result<ExitCode> {
        let (root, config) = self.project.load()?;
        let tools = probe_tools(&root, &config);

        let rows = vec![
            ToolRow {
                tool: config.task_runner.clone(),
                role: "task runner",
                location: location(tools.task_runner.as_ref()),
            },
            ToolRow {
                tool: config.archiver_plugin.clone(),
                role: "archiver plugin",
                location: if tools.archiver_plugin {
                    "node_modules".to_string()
                } else {
                    "not installed".to_string()
                },
            },
            ToolRow {
                tool: config.translation_tool.clone(),
                role: "translation extractor",
                location: location(tools.translation_tool.as_ref()),
            },
            ToolRow {
                tool: COMPOSER.to_string(),
                role: if tools.needs_php_dependencies {
                    "PHP dependencies (required)"
                } else {
                    "PHP dependencies"
                },
                location: location(tools.php_dependency_manager.as_ref()),
            },
            ToolRow {
                tool: NPM.to_string(),
                role: "Node dependencies",
                location: location(tools.node_dependency_manager.as_ref()),
            },
            ToolRow {
                tool: config.validation_script.display().to_string(),
                role: "validation script",
                location: location(tools.validation_script.as_ref()),
            },
        ];
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        match check_gate(&tools, &config) {
            Ok(notices) => {
                for notice in &notices {
                    if notice.is_warning() {
                        println!("{} {notice}", "⚠".yellow().bold());
                    } else {
                        println!("{} {notice}", "·".bright_black());
                    }
                }
                println!("{} ready to build", "✓".green().bold());
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                println!("{} {err}", "✗".red().bold());
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
