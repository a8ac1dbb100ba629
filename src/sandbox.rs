use crate::config::PreviewConfig;
use crate::diff_engine::FixPreview;
use crate::error::{PreviewError, PreviewResult};
use crate::lesson::{ActiveSelection, Topic};
use crate::manifest::{self, Package};
use crate::oracle::{FixSuggestion, TerminalExecutionResult};
use crate::permissions::IsolationLevel;
use crate::renderer::{iframe_element, SandboxRenderer};
use crate::shim::ShimKind;
use crate::virtual_fs::{FileOrigin, Node, NodeId, VirtualFilesystem};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// One rendered preview document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewFrame {
    pub id: String,
    pub shim: Option<ShimKind>,
    pub entry: Option<String>,
    pub html: String,
    /// Value of the frame's `sandbox` attribute
    pub sandbox: String,
    pub isolation: IsolationLevel,
    /// SHA-256 of `html`
    pub digest: String,
    pub rendered_at: i64,
    /// True when the html came from the previous frame
    pub reused: bool,
}

impl PreviewFrame {
    pub fn iframe_markup(&self) -> String {
        iframe_element(&self.sandbox, &self.html)
    }
}

/// A preview session: the project tree, the open file and the last frame
#[derive(Debug)]
pub struct Previewer {
    pub id: String,
    config: PreviewConfig,
    tree: VirtualFilesystem,
    selection: Option<ActiveSelection>,
    last: Option<(String, PreviewFrame)>,
    frames_rendered: usize,
    frames_reused: usize,
}

impl Previewer {
    /// Start a session on `tree` with its first file open
    pub fn new(tree: VirtualFilesystem, config: PreviewConfig) -> Self {
        let selection = tree.find_first_file().cloned().map(ActiveSelection::new);
        Self {
            id: Uuid::new_v4().to_string(),
            config,
            tree,
            selection,
            last: None,
            frames_rendered: 0,
            frames_reused: 0,
        }
    }

    /// Start a session on a real directory
    pub fn mount(path: &Path, config: PreviewConfig) -> PreviewResult<Self> {
        Ok(Self::new(VirtualFilesystem::mount(path)?, config))
    }

    pub fn tree(&self) -> &VirtualFilesystem {
        &self.tree
    }

    pub fn selection(&self) -> Option<&ActiveSelection> {
        self.selection.as_ref()
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Open the project file with this name
    pub fn open(&mut self, name: &str) -> PreviewResult<()> {
        let file = self
            .tree
            .find_by_name(name)
            .ok_or_else(|| PreviewError::NodeNotFound(name.to_string()))?;
        debug!("Opening {}", file.name);
        self.selection = Some(ActiveSelection::new(file.clone()));
        Ok(())
    }

    /// Open the project file at `path`, walked folder by folder from the
    /// roots. A bare name opens the first file with that name.
    pub fn open_path(&mut self, path: &str) -> PreviewResult<()> {
        let file = self
            .tree
            .find_by_path(path)
            .ok_or_else(|| PreviewError::NodeNotFound(path.to_string()))?;
        debug!("Opening {}", path);
        self.selection = Some(ActiveSelection::new(file.clone()));
        Ok(())
    }

    pub fn open_id(&mut self, id: &NodeId) -> PreviewResult<()> {
        let node = self
            .tree
            .find_by_id(id)
            .ok_or_else(|| PreviewError::NodeNotFound(id.to_string()))?;
        let file = node
            .as_file()
            .ok_or_else(|| PreviewError::NotAFile(id.to_string()))?;
        self.selection = Some(ActiveSelection::new(file.clone()));
        Ok(())
    }

    pub fn open_topic(&mut self, topic: &Topic) {
        debug!("Opening lesson topic {}", topic.title);
        self.selection = Some(topic.open());
    }

    pub fn close(&mut self) {
        self.selection = None;
    }

    /// Editor change to the open file
    pub fn edit(&mut self, content: &str) {
        let Some(selection) = &self.selection else {
            debug!("Edit ignored: no file open");
            return;
        };
        let (selection, tree) = selection.apply_content(&self.tree, content);
        self.selection = Some(selection);
        self.tree = tree;
    }

    pub fn insert(&mut self, parent: Option<&NodeId>, node: Node) -> PreviewResult<()> {
        self.tree = self.tree.try_insert(parent, node)?;
        Ok(())
    }

    pub fn rename(&mut self, id: &NodeId, new_name: &str) {
        self.replace_tree_keep_selection(self.tree.rename(id, new_name));
    }

    pub fn remove(&mut self, id: &NodeId) {
        self.replace_tree_keep_selection(self.tree.remove(id));
    }

    /// Swap in an imported project; its first file becomes active
    pub fn replace_tree(&mut self, tree: VirtualFilesystem) {
        self.selection = tree.find_first_file().cloned().map(ActiveSelection::new);
        self.tree = tree;
    }

    pub fn packages(&self) -> Vec<Package> {
        manifest::packages(&self.tree)
    }

    /// Diff of the open file against a suggested fix
    pub fn preview_fix(&self, fix: &FixSuggestion) -> Option<FixPreview> {
        self.selection
            .as_ref()
            .map(|selection| FixPreview::new(&selection.file, fix))
    }

    /// Replace the open file's content with the fix
    pub fn apply_fix(&mut self, fix: &FixSuggestion) -> Option<FixPreview> {
        let preview = self.preview_fix(fix)?;
        info!("Applying fix: {}", preview.summary.format());
        self.edit(&fix.fixed_code);
        Some(preview)
    }

    /// Record package changes reported by the terminal in `package.json`
    pub fn apply_terminal_result(&mut self, result: &TerminalExecutionResult) -> PreviewResult<()> {
        let tree = manifest::apply_to_tree(&self.tree, &result.package_changes)?;
        self.replace_tree_keep_selection(tree);
        Ok(())
    }

    /// Render the current selection. The previous frame's html is reused when
    /// nothing it depends on has changed.
    pub fn render(&mut self) -> PreviewFrame {
        let key = self.input_digest();
        self.frames_rendered += 1;

        if let Some((last_key, last)) = &self.last {
            if *last_key == key {
                self.frames_reused += 1;
                debug!("Preview inputs unchanged; reusing frame {}", last.id);
                let frame = PreviewFrame {
                    id: Uuid::new_v4().to_string(),
                    rendered_at: chrono::Utc::now().timestamp(),
                    reused: true,
                    ..last.clone()
                };
                self.last = Some((key, frame.clone()));
                return frame;
            }
        }

        let rendered = SandboxRenderer::new(&self.config).render(self.selection.as_ref(), &self.tree);
        let frame = PreviewFrame {
            id: Uuid::new_v4().to_string(),
            shim: rendered.shim,
            entry: rendered.entry,
            digest: hex::encode(Sha256::digest(rendered.html.as_bytes())),
            html: rendered.html,
            sandbox: rendered.policy.attribute(),
            isolation: rendered.policy.level(),
            rendered_at: chrono::Utc::now().timestamp(),
            reused: false,
        };
        self.last = Some((key, frame.clone()));
        frame
    }

    pub fn status(&self) -> PreviewerStatus {
        PreviewerStatus {
            id: self.id.clone(),
            file_count: self.tree.files().len(),
            active_file: self.selection.as_ref().map(|s| s.file.name.clone()),
            frames_rendered: self.frames_rendered,
            frames_reused: self.frames_reused,
        }
    }

    fn replace_tree_keep_selection(&mut self, tree: VirtualFilesystem) {
        self.selection = self.selection.as_ref().and_then(|s| s.refresh(&tree));
        self.tree = tree;
    }

    /// Digest of everything a render reads
    fn input_digest(&self) -> String {
        let mut hasher = Sha256::new();
        match &self.selection {
            None => hasher.update(b"none"),
            Some(selection) => {
                let file = &selection.file;
                for part in [file.id.as_str(), file.name.as_str(), file.content.as_str()] {
                    hasher.update(part.len().to_le_bytes());
                    hasher.update(part.as_bytes());
                }
                match file.origin {
                    FileOrigin::User => hasher.update(b"user"),
                    FileOrigin::Lesson { dialect } => hasher.update(format!("lesson:{:?}", dialect)),
                }
                if let Some(tree) = selection.preview_tree(&self.tree) {
                    hasher.update(tree.fingerprint());
                }
            }
        }
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewerStatus {
    pub id: String,
    pub file_count: usize,
    pub active_file: Option<String>,
    pub frames_rendered: usize,
    pub frames_reused: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{PackageAction, PackageChange};
    use crate::virtual_fs::{Dialect, FileNode, FolderNode};

    fn project() -> VirtualFilesystem {
        VirtualFilesystem::from_nodes(vec![FolderNode::new("My Project")
            .with_children(vec![
                FileNode::new("package.json", r#"{"dependencies":{}}"#).into(),
                FileNode::new("index.html", "<html><head></head><body><h1>Hi</h1></body></html>").into(),
                FileNode::new("style.css", "h1{color:red}").into(),
            ])
            .into()])
    }

    #[test]
    fn open_path_picks_the_nested_duplicate() {
        let tree = VirtualFilesystem::from_nodes(vec![
            FolderNode::new("a")
                .with_children(vec![FileNode::new("style.css", "a{color:red}").into()])
                .into(),
            FileNode::new("style.css", "root{x:1}").into(),
        ]);
        let mut previewer = Previewer::new(tree, PreviewConfig::default());

        previewer.open_path("style.css").unwrap();
        assert_eq!(previewer.selection().unwrap().file.content, "a{color:red}");
        previewer.open_path("/style.css").unwrap();
        assert_eq!(previewer.selection().unwrap().file.content, "root{x:1}");
        previewer.open_path("a/style.css").unwrap();
        let id = previewer.selection().unwrap().file.id.clone();
        assert_eq!(previewer.tree().path_of(&id).as_deref(), Some("a/style.css"));

        assert!(matches!(previewer.open_path("b/style.css"), Err(PreviewError::NodeNotFound(_))));
    }

    #[test]
    fn first_file_skips_the_manifest() {
        let previewer = Previewer::new(project(), PreviewConfig::default());
        assert_eq!(previewer.selection().unwrap().file.name, "index.html");
    }

    #[test]
    fn unchanged_inputs_reuse_the_frame() {
        let mut previewer = Previewer::new(project(), PreviewConfig::default());
        let first = previewer.render();
        let second = previewer.render();
        assert!(!first.reused);
        assert!(second.reused);
        assert_eq!(first.html, second.html);
        assert_eq!(first.digest, second.digest);
        assert_ne!(first.id, second.id);

        previewer.edit("<html><head></head><body>changed</body></html>");
        let third = previewer.render();
        assert!(!third.reused);
        assert_ne!(third.digest, first.digest);
        assert_eq!(previewer.status().frames_reused, 1);
    }

    #[test]
    fn project_frames_get_the_relaxed_policy() {
        let mut previewer = Previewer::new(project(), PreviewConfig::default());
        let frame = previewer.render();
        assert_eq!(frame.shim, Some(ShimKind::PlainHtml));
        assert_eq!(frame.entry.as_deref(), Some("index.html"));
        assert_eq!(frame.isolation, IsolationLevel::Relaxed);
        assert!(frame.iframe_markup().contains("srcdoc=\"&lt;html&gt;"));
    }

    #[test]
    fn lesson_topics_render_standalone() {
        let mut previewer = Previewer::new(project(), PreviewConfig::default());
        previewer.open_topic(
            &Topic::new("Counter", "export default function App() { return <p/>; }")
                .with_file_type("jsx")
                .with_dialect(Dialect::ReactLike),
        );
        let frame = previewer.render();
        assert_eq!(frame.shim, Some(ShimKind::ComponentFrameworkA));
        assert_eq!(frame.sandbox, "allow-scripts allow-modals");

        let before = previewer.tree().clone();
        previewer.edit("export default () => null;");
        assert_eq!(previewer.tree(), &before);
    }

    #[test]
    fn lesson_page_inlines_project_stylesheets() {
        let mut previewer = Previewer::new(project(), PreviewConfig::default());
        previewer.open_topic(
            &Topic::new("Headings", r#"<link rel="stylesheet" href="style.css"><h1>Hi</h1>"#)
                .with_file_type("html"),
        );
        let frame = previewer.render();
        assert_eq!(frame.shim, Some(ShimKind::PlainHtml));
        assert!(frame.html.contains("<style>\nh1{color:red}\n</style>"));
        assert!(!frame.html.contains("CSS file not found"));
    }

    #[test]
    fn closing_shows_the_placeholder() {
        let mut previewer = Previewer::new(project(), PreviewConfig::default());
        previewer.close();
        let frame = previewer.render();
        assert_eq!(frame.shim, None);
        assert!(frame.html.contains("Select a file to preview"));
    }

    #[test]
    fn removing_the_open_file_clears_the_selection() {
        let mut previewer = Previewer::new(project(), PreviewConfig::default());
        previewer.open("style.css").unwrap();
        let id = previewer.selection().unwrap().file.id.clone();
        previewer.rename(&id, "main.css");
        assert_eq!(previewer.selection().unwrap().file.name, "main.css");
        previewer.remove(&id);
        assert!(previewer.selection().is_none());
        assert!(previewer.open("nope.css").is_err());
    }

    #[test]
    fn fixes_rewrite_the_open_file() {
        let mut previewer = Previewer::new(project(), PreviewConfig::default());
        previewer.open("style.css").unwrap();
        let fix = FixSuggestion {
            explanation: "blue".to_string(),
            fixed_code: "h1{color:blue}".to_string(),
        };
        let preview = previewer.apply_fix(&fix).unwrap();
        assert!(preview.summary.has_changes());
        assert_eq!(previewer.tree().find_by_name("style.css").unwrap().content, "h1{color:blue}");
    }

    #[test]
    fn terminal_package_changes_reach_the_manifest() {
        let mut previewer = Previewer::new(project(), PreviewConfig::default());
        previewer.open("package.json").unwrap();
        let result = TerminalExecutionResult {
            stdout: "added 1 package".to_string(),
            stderr: String::new(),
            result: "undefined".to_string(),
            package_changes: vec![PackageChange {
                action: PackageAction::Add,
                name: "lodash".to_string(),
                version: "4.17.21".to_string(),
            }],
        };
        previewer.apply_terminal_result(&result).unwrap();
        assert_eq!(previewer.packages()[0].name, "lodash");
        assert!(previewer.selection().unwrap().file.content.contains("lodash"));
    }

    #[test]
    fn inserting_a_duplicate_id_is_an_error() {
        let mut previewer = Previewer::new(project(), PreviewConfig::default());
        let file = FileNode::with_boilerplate("app.js");
        previewer.insert(None, file.clone().into()).unwrap();
        assert!(previewer.insert(None, file.into()).is_err());
    }
}
