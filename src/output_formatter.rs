use crate::errors::Result;
use crate::report::{FileReport, Outcome, RunReport, StopReason, Summary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

/// Defines the possible output formats for a run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// A simple, human-readable text format.
    Text,
    /// JSON format, suitable for machine processing.
    Json,
    /// Comma-Separated Values format, one record per file.
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Text,
        }
    }
}

/// Handles the formatting of run reports into various output formats.
pub struct OutputFormatter {
    format: OutputFormat,
    /// Text format only: also list unchanged files.
    verbose: bool,
    /// Text format only: print the summary block.
    include_summary: bool,
    tool_name: String,
    tool_version: String,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            verbose: false,
            include_summary: true,
            tool_name: env!("CARGO_PKG_NAME").to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn include_summary(mut self, include_summary: bool) -> Self {
        self.include_summary = include_summary;
        self
    }

    /// Writes the formatted report to a given writer.
    pub fn write_output<W: Write>(&self, writer: &mut W, report: &RunReport) -> Result<()> {
        let output = match self.format {
            OutputFormat::Text => self.format_text(report),
            OutputFormat::Json => self.format_json(report)?,
            OutputFormat::Csv => self.format_csv(report)?,
        };
        writer.write_all(output.as_bytes())?;
        Ok(())
    }

    fn format_text(&self, report: &RunReport) -> String {
        let mut output = String::new();

        for file in &report.files {
            let path = file.path.display();
            let line = match &file.outcome {
                Outcome::Modified {
                    edits,
                    simulated: true,
                    ..
                } => format!("Would modify: {path} ({edits} edits)"),
                Outcome::Modified { edits, .. } => format!("Modified: {path} ({edits} edits)"),
                Outcome::Unchanged if self.verbose => format!("Unchanged: {path}"),
                Outcome::Unchanged => continue,
                Outcome::Skipped(reason) => format!("Skipped: {path} ({reason})"),
                Outcome::Errored { cause, .. } => format!("Error: {cause}"),
            };
            output.push_str(&line);
            output.push('\n');
        }

        if self.include_summary {
            output.push_str(&self.format_summary(report));
        }
        output
    }

    fn format_summary(&self, report: &RunReport) -> String {
        let Summary {
            files_scanned,
            files_modified,
            files_skipped,
            files_errored,
            total_edits,
            ..
        } = report.summary;
        let verb = if report.dry_run { "would modify" } else { "modified" };
        let mut summary = format!(
            "\nProcessed {files_scanned} files, {verb} {files_modified} files ({total_edits} edits), \
             skipped {files_skipped}, errors {files_errored}\n"
        );
        match report.stop_reason {
            Some(StopReason::Cancelled) => summary.push_str("Run cancelled before all files were processed\n"),
            Some(StopReason::DeadlineExceeded) => summary.push_str("Deadline reached before all files were processed\n"),
            None => {}
        }
        summary
    }

    fn format_json(&self, report: &RunReport) -> Result<String> {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            tool: ToolInfo<'a>,
            generated_at: DateTime<Utc>,
            #[serde(flatten)]
            report: &'a RunReport,
        }

        #[derive(Serialize)]
        struct ToolInfo<'a> {
            name: &'a str,
            version: &'a str,
        }

        let output = JsonOutput {
            tool: ToolInfo {
                name: &self.tool_name,
                version: &self.tool_version,
            },
            generated_at: Utc::now(),
            report,
        };
        Ok(serde_json::to_string_pretty(&output)?)
    }

    fn format_csv(&self, report: &RunReport) -> Result<String> {
        use csv::Writer;

        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(["Path", "Status", "Edits", "NewSize", "Detail"])?;

        for file in &report.files {
            let (status, edits, new_size, detail) = csv_columns(file);
            wtr.write_record([
                file.path.display().to_string(),
                status.to_string(),
                edits,
                new_size,
                detail,
            ])?;
        }

        let data = wtr.into_inner().map_err(|e| format!("CSV writer error: {}", e))?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

fn csv_columns(file: &FileReport) -> (&'static str, String, String, String) {
    match &file.outcome {
        Outcome::Modified {
            edits,
            new_size,
            simulated,
        } => (
            if *simulated { "would_modify" } else { "modified" },
            edits.to_string(),
            new_size.to_string(),
            String::new(),
        ),
        Outcome::Unchanged => ("unchanged", String::new(), String::new(), String::new()),
        Outcome::Skipped(reason) => ("skipped", String::new(), String::new(), reason.to_string()),
        Outcome::Errored { cause, .. } => ("errored", String::new(), String::new(), cause.clone()),
    }
}
