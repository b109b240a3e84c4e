pub mod tidy_classify;
pub mod tidy_execute;
pub mod tidy_plan;
pub mod tidy_scan;
pub mod tidy_status;
pub mod tidy_summarize;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    /// Human-readable form printed when `--json` is not set.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{}: {}",
            self.command,
            if self.ok { "ok" } else { "failed" }
        );
        for detail in &self.details {
            out.push_str(&format!("\n  {detail}"));
        }
        for issue in &self.issues {
            out.push_str(&format!("\n  issue: {issue}"));
        }
        out
    }
}
