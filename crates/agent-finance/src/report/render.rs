//! Report renderers and output files

use super::model::{Block, Report};
use crate::config::FinanceConfig;
use crate::error::{FinanceError, Result};
use agent_core::{ChartRef, Table};
use comfy_table::presets::ASCII_MARKDOWN;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::process::Command;
use tracing::{info, warn};

/// Output format of a rendered report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Pdf,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "pdf" => Ok(Self::Pdf),
            other => Err(FinanceError::ConfigError(format!(
                "unknown output format '{other}' (expected markdown or pdf)"
            ))),
        }
    }
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}

fn markdown_table(table: &Table) -> String {
    let mut rendered = comfy_table::Table::new();
    rendered
        .load_preset(ASCII_MARKDOWN)
        .set_header(table.columns.iter().map(|c| escape_cell(c)));
    for row in &table.rows {
        rendered.add_row(row.iter().map(|c| escape_cell(c)));
    }
    rendered.to_string()
}

fn chart_line(chart: &ChartRef) -> String {
    if chart.series.is_empty() {
        format!("> Chart `{}`: {} ({})", chart.id, chart.title, chart.kind)
    } else {
        format!(
            "> Chart `{}`: {} ({}; series: {})",
            chart.id,
            chart.title,
            chart.kind,
            chart.series.join(", ")
        )
    }
}

/// Render a report as markdown
pub fn to_markdown(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", report.title);
    let _ = writeln!(
        out,
        "*Generated: {}*\n",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    for section in &report.sections {
        let _ = writeln!(out, "## {}\n", section.title);
        for block in &section.blocks {
            match block {
                Block::Paragraph {
                    title,
                    text,
                    source,
                } => {
                    if let Some(title) = title {
                        let _ = write!(out, "**{title}**: ");
                    }
                    out.push_str(text);
                    if let Some(source) = source {
                        let _ = write!(out, " ([source]({source}))");
                    }
                    out.push_str("\n\n");
                }
                Block::Table(table) => {
                    if !table.caption.is_empty() {
                        let _ = writeln!(out, "**{}**\n", table.caption);
                    }
                    let _ = writeln!(out, "{}\n", markdown_table(table));
                }
                Block::ChartReference(chart) => {
                    let _ = writeln!(out, "{}\n", chart_line(chart));
                }
                Block::DataUnavailable { reason } => {
                    let _ = writeln!(out, "> **Data unavailable:** {reason}\n");
                }
            }
        }
    }
    out
}

/// File name stem: title with spaces replaced, plus the generation timestamp
pub fn file_stem(report: &Report) -> String {
    let title: String = report
        .title
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ',' => '_',
            c => c,
        })
        .collect();
    format!(
        "{title}_{}",
        report.generated_at.format("%Y%m%d_%H%M%S")
    )
}

/// Writes rendered reports to the output directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    pdf_command: Option<String>,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, pdf_command: Option<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            pdf_command,
        }
    }

    pub fn from_config(config: &FinanceConfig) -> Self {
        Self::new(config.output_dir.clone(), config.pdf_command.clone())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write the report and return the path of the produced file
    ///
    /// PDF output goes through the markdown file; if conversion fails the
    /// markdown path is returned instead.
    pub async fn write(&self, report: &Report, format: OutputFormat) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let stem = file_stem(report);
        let markdown_path = self.output_dir.join(format!("{stem}.md"));
        tokio::fs::write(&markdown_path, to_markdown(report)).await?;
        info!(path = %markdown_path.display(), "Markdown report written");

        if format == OutputFormat::Markdown {
            return Ok(markdown_path);
        }

        let pdf_path = self.output_dir.join(format!("{stem}.pdf"));
        match self.convert(&markdown_path, &pdf_path).await {
            Ok(()) => {
                info!(path = %pdf_path.display(), "PDF report written");
                Ok(pdf_path)
            }
            Err(e) => {
                warn!(error = %e, "PDF conversion failed, keeping markdown report");
                Ok(markdown_path)
            }
        }
    }

    async fn convert(&self, markdown: &Path, pdf: &Path) -> Result<()> {
        let Some(command) = self.pdf_command.as_deref() else {
            return Err(FinanceError::RenderError(
                "no PDF converter configured".to_string(),
            ));
        };

        let output = Command::new(command)
            .arg(markdown)
            .arg("-o")
            .arg(pdf)
            .output()
            .await
            .map_err(|e| FinanceError::RenderError(format!("failed to run {command}: {e}")))?;

        if !output.status.success() {
            return Err(FinanceError::RenderError(format!(
                "{command} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !tokio::fs::try_exists(pdf).await.unwrap_or(false) {
            return Err(FinanceError::RenderError(format!(
                "{command} produced no output file"
            )));
        }
        Ok(())
    }
}
