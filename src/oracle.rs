//! Request and response payloads exchanged with the code-assist oracle.
//!
//! The oracle itself is remote; this module only shapes requests and
//! interprets its JSON answers. Lint and terminal answers are parsed
//! tolerantly, fix answers strictly.

use crate::error::{PreviewError, PreviewResult};
use crate::manifest::{Package, PackageChange};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Marker placed in the code where generated text should go
pub const CURSOR_MARKER: &str = "<--CURSOR-->";

const TERMINAL_PARSE_FAILURE: &str = "Error: AI response was not valid JSON.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OracleRequest {
    Lint {
        code: String,
        language: String,
    },
    #[serde(rename_all = "camelCase")]
    Fix {
        code: String,
        language: String,
        error_message: String,
    },
    Format {
        code: String,
        language: String,
    },
    #[serde(rename_all = "camelCase")]
    Generate {
        prompt: String,
        language: String,
        code_with_cursor: String,
    },
    #[serde(rename_all = "camelCase")]
    TerminalExec {
        command: String,
        session_history: String,
        installed_packages: Vec<Package>,
    },
}

impl OracleRequest {
    /// Generation request with [`CURSOR_MARKER`] spliced in at byte offset
    /// `cursor`, clamped to the nearest char boundary at or before it
    pub fn generate(prompt: &str, file_name: &str, code: &str, cursor: usize) -> Self {
        let at = floor_char_boundary(code, cursor);
        Self::Generate {
            prompt: prompt.to_string(),
            language: language_name(file_name).to_string(),
            code_with_cursor: format!("{}{}{}", &code[..at], CURSOR_MARKER, &code[at..]),
        }
    }

    pub fn lint(file_name: &str, code: &str) -> Self {
        Self::Lint {
            code: code.to_string(),
            language: language_name(file_name).to_string(),
        }
    }

    pub fn fix(file_name: &str, code: &str, error_message: &str) -> Self {
        Self::Fix {
            code: code.to_string(),
            language: language_name(file_name).to_string(),
            error_message: error_message.to_string(),
        }
    }

    pub fn format(file_name: &str, code: &str) -> Self {
        Self::Format {
            code: code.to_string(),
            language: language_name(file_name).to_string(),
        }
    }
}

/// Human language name used in prompts
pub fn language_name(file_name: &str) -> &'static str {
    match crate::virtual_fs::extension_of(file_name).as_str() {
        "js" | "mjs" | "jsx" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "html" | "htm" => "HTML",
        "css" => "CSS",
        "json" => "JSON",
        "md" => "Markdown",
        _ => "plain text",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintIssue {
    #[serde(default)]
    pub line: Option<u32>,
    pub severity: Severity,
    pub message: String,
}

/// Issues from a lint answer. Entries missing a message or severity are
/// dropped; anything that is not a JSON array yields no issues.
pub fn parse_lint(raw: &str) -> Vec<LintIssue> {
    let items = match serde_json::from_str::<Value>(strip_fences(raw)) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            warn!("Lint response is not an array");
            return Vec::new();
        }
        Err(e) => {
            warn!("Lint response is not JSON: {}", e);
            return Vec::new();
        }
    };

    let total = items.len();
    let issues: Vec<LintIssue> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if issues.len() < total {
        warn!("Dropped {} malformed lint issue(s)", total - issues.len());
    }
    issues
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSuggestion {
    pub explanation: String,
    pub fixed_code: String,
}

pub fn parse_fix(raw: &str) -> PreviewResult<FixSuggestion> {
    serde_json::from_str(strip_fences(raw)).map_err(|e| PreviewError::OracleError(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalExecutionResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default = "undefined")]
    pub result: String,
    #[serde(default)]
    pub package_changes: Vec<PackageChange>,
}

fn undefined() -> String {
    "undefined".to_string()
}

impl TerminalExecutionResult {
    /// Lines shown in the terminal pane. The result value is echoed only when
    /// it is meaningful and stdout has not already printed it.
    pub fn transcript(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.stdout.is_empty() {
            lines.push(self.stdout.clone());
        }
        if !self.stderr.is_empty() {
            lines.push(self.stderr.clone());
        }
        if !self.result.is_empty() && self.result != "undefined" && !self.stdout.contains(&self.result) {
            lines.push(format!("=> {}", self.result));
        }
        lines
    }
}

/// Never fails: an unreadable answer becomes an error shown on stderr
pub fn parse_terminal(raw: &str) -> TerminalExecutionResult {
    serde_json::from_str(strip_fences(raw)).unwrap_or_else(|e| {
        warn!("Terminal response is not valid JSON: {}", e);
        TerminalExecutionResult {
            stdout: String::new(),
            stderr: TERMINAL_PARSE_FAILURE.to_string(),
            result: undefined(),
            package_changes: Vec::new(),
        }
    })
}

/// Plain-text answers (format, generate) with surrounding whitespace and any
/// markdown fence removed
pub fn clean_code(raw: &str) -> String {
    strip_fences(raw).to_string()
}

/// Splice generated text in at `cursor`
pub fn insert_at_cursor(code: &str, cursor: usize, generated: &str) -> String {
    let at = floor_char_boundary(code, cursor);
    format!("{}{}{}", &code[..at], generated, &code[at..])
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the info string (```json) on the opening line
    match body.find('\n') {
        Some(nl) => body[nl + 1..].trim(),
        None => body.trim(),
    }
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut at = index.min(s.len());
    while !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}
