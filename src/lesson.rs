use crate::shim::is_html_name;
use crate::virtual_fs::{Dialect, FileNode, Node, NodeId, VirtualFilesystem};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A lesson topic: a pre-authored snippet, optionally shipping its own
/// mini-project for the preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub prompt: String,
    /// Extension of the synthesised file, `js` when absent
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub dialect: Option<Dialect>,
    #[serde(default)]
    pub project_files: Option<Vec<Node>>,
}

impl Topic {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            prompt: String::new(),
            file_type: None,
            dialect: None,
            project_files: None,
        }
    }

    pub fn with_file_type(mut self, ext: &str) -> Self {
        self.file_type = Some(ext.to_string());
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn with_project(mut self, files: Vec<Node>) -> Self {
        self.project_files = Some(files);
        self
    }

    /// Synthesised file for this topic. Its id derives from the title.
    pub fn to_file(&self) -> FileNode {
        let ext = self.file_type.as_deref().unwrap_or("js");
        let slug = self.title.split_whitespace().collect::<Vec<_>>().join("-");
        FileNode::lesson(
            NodeId::from_raw(format!("topic-{}", slug)),
            format!("{}.{}", self.title, ext),
            self.content.clone(),
            self.dialect,
        )
    }

    /// Select this topic: its file becomes active and its mini-project, if
    /// any, overrides the preview tree
    pub fn open(&self) -> ActiveSelection {
        let selection = ActiveSelection::new(self.to_file());
        match &self.project_files {
            Some(files) => selection.with_override(PreviewOverride::new(files.clone())),
            None => selection,
        }
    }
}

/// Ephemeral tree substituted for the project tree while a lesson topic with
/// its own mini-project is open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewOverride {
    tree: VirtualFilesystem,
}

impl PreviewOverride {
    pub fn new(files: Vec<Node>) -> Self {
        Self {
            tree: VirtualFilesystem::from_nodes(files),
        }
    }

    pub fn tree(&self) -> &VirtualFilesystem {
        &self.tree
    }
}

/// The open file (a copy, not a live reference into the tree) plus an
/// optional preview override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSelection {
    pub file: FileNode,
    pub preview_override: Option<PreviewOverride>,
}

impl ActiveSelection {
    pub fn new(file: FileNode) -> Self {
        Self {
            file,
            preview_override: None,
        }
    }

    pub fn with_override(mut self, preview_override: PreviewOverride) -> Self {
        self.preview_override = Some(preview_override);
        self
    }

    /// Tree the preview resolves against. A lesson script or stylesheet
    /// without its own mini-project previews standalone and gets no tree; a
    /// lesson HTML page resolves its references against the project.
    pub fn preview_tree<'a>(&'a self, project: &'a VirtualFilesystem) -> Option<&'a VirtualFilesystem> {
        match &self.preview_override {
            Some(o) => Some(o.tree()),
            None if self.file.origin.is_lesson() && !is_html_name(&self.file.name) => None,
            None => Some(project),
        }
    }

    /// Apply edited content. Lesson files only change the selection; user
    /// files also change the project tree.
    pub fn apply_content(
        &self,
        project: &VirtualFilesystem,
        content: &str,
    ) -> (ActiveSelection, VirtualFilesystem) {
        let mut selection = self.clone();
        selection.file.content = content.to_string();
        if self.file.origin.is_lesson() {
            debug!("Lesson file {} edited; project tree untouched", self.file.id);
            return (selection, project.clone());
        }
        (selection, project.update_content(&self.file.id, content))
    }

    /// Re-read the file from the tree after a rename or external edit.
    /// `None` when the file was deleted.
    pub fn refresh(&self, project: &VirtualFilesystem) -> Option<ActiveSelection> {
        if self.file.origin.is_lesson() {
            return Some(self.clone());
        }
        let file = project.find_by_id(&self.file.id)?.as_file()?.clone();
        Some(ActiveSelection {
            file,
            preview_override: self.preview_override.clone(),
        })
    }
}
