use crate::oracle::FixSuggestion;
use crate::virtual_fs::FileNode;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

const CONTEXT_LINES: usize = 3;

/// One line of a hunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffChange {
    /// 1-based line in the old text for equal/delete, in the new text for insert
    pub line_number: usize,
    pub content: String,
    pub change_type: DiffChangeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffChangeType {
    Equal,
    Insert,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedDiff {
    pub label: String,
    pub hunks: Vec<DiffHunk>,
}

/// Changed lines plus surrounding context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
    pub changes: Vec<DiffChange>,
}

pub struct DiffEngine;

impl DiffEngine {
    /// Line diff of two buffers of the same file
    pub fn unified_diff(old: &str, new: &str, label: &str) -> UnifiedDiff {
        let diff = TextDiff::from_lines(old, new);
        let mut hunks = Vec::new();

        for group in diff.grouped_ops(CONTEXT_LINES) {
            let (Some(first), Some(last)) = (group.first(), group.last()) else {
                continue;
            };
            let old_range = first.old_range().start..last.old_range().end;
            let new_range = first.new_range().start..last.new_range().end;

            let mut changes = Vec::new();
            for op in &group {
                for change in diff.iter_changes(op) {
                    let (line_number, change_type) = match change.tag() {
                        ChangeTag::Equal => (change.old_index(), DiffChangeType::Equal),
                        ChangeTag::Delete => (change.old_index(), DiffChangeType::Delete),
                        ChangeTag::Insert => (change.new_index(), DiffChangeType::Insert),
                    };
                    changes.push(DiffChange {
                        line_number: line_number.map_or(0, |i| i + 1),
                        content: change.to_string_lossy().into_owned(),
                        change_type,
                    });
                }
            }

            hunks.push(DiffHunk {
                old_start: old_range.start + 1,
                old_lines: old_range.len(),
                new_start: new_range.start + 1,
                new_lines: new_range.len(),
                changes,
            });
        }

        UnifiedDiff {
            label: label.to_string(),
            hunks,
        }
    }

    pub fn format_unified_diff(diff: &UnifiedDiff) -> String {
        let mut output = format!("--- a/{}\n+++ b/{}\n", diff.label, diff.label);

        for hunk in &diff.hunks {
            output.push_str(&format!(
                "@@ -{},{} +{},{} @@\n",
                hunk.old_start, hunk.old_lines, hunk.new_start, hunk.new_lines
            ));

            for change in &hunk.changes {
                let prefix = match change.change_type {
                    DiffChangeType::Equal => " ",
                    DiffChangeType::Insert => "+",
                    DiffChangeType::Delete => "-",
                };
                output.push_str(prefix);
                output.push_str(&change.content);
                if !change.content.ends_with('\n') {
                    output.push_str("\n\\ No newline at end of file\n");
                }
            }
        }

        output
    }

    pub fn diff_summary(old: &str, new: &str) -> DiffSummary {
        let diff = TextDiff::from_lines(old, new);
        let mut summary = DiffSummary::default();

        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Delete => summary.deleted += 1,
                ChangeTag::Insert => summary.added += 1,
                ChangeTag::Equal => summary.unchanged += 1,
            }
        }

        summary
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.deleted > 0
    }

    pub fn format(&self) -> String {
        format!("+{} -{}", self.added, self.deleted)
    }
}

/// What accepting a suggested fix would do to a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixPreview {
    pub explanation: String,
    pub summary: DiffSummary,
    pub diff: UnifiedDiff,
}

impl FixPreview {
    pub fn new(file: &FileNode, fix: &FixSuggestion) -> Self {
        Self {
            explanation: fix.explanation.clone(),
            summary: DiffEngine::diff_summary(&file.content, &fix.fixed_code),
            diff: DiffEngine::unified_diff(&file.content, &fix.fixed_code, &file.name),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.explanation,
            self.summary.format(),
            DiffEngine::format_unified_diff(&self.diff)
        )
    }
}
