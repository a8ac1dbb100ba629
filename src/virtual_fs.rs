use crate::boilerplate;
use crate::error::{PreviewError, PreviewResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Opaque identifier of a node, stable for the node's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Component dialect of a lesson snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// JSX components mounted through a virtual DOM root
    ReactLike,
    /// Options-object components mounted through `createApp`
    VueLike,
}

/// Where a file came from, decided once when the file is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FileOrigin {
    /// Created or imported by the user; lives in the project tree
    #[default]
    User,
    /// Synthesised from a lesson topic; never part of the project tree
    Lesson { dialect: Option<Dialect> },
}

impl FileOrigin {
    pub fn is_lesson(&self) -> bool {
        matches!(self, FileOrigin::Lesson { .. })
    }

    pub fn dialect(&self) -> Option<Dialect> {
        match self {
            FileOrigin::Lesson { dialect } => *dialect,
            FileOrigin::User => None,
        }
    }
}

/// A file in the virtual tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub id: NodeId,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub origin: FileOrigin,
}

impl FileNode {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            content: content.into(),
            origin: FileOrigin::User,
        }
    }

    /// New user file pre-filled with starter content for its extension
    pub fn with_boilerplate(name: impl Into<String>) -> Self {
        let name = name.into();
        let content = boilerplate::for_file(&name);
        Self::new(name, content)
    }

    pub fn lesson(
        id: NodeId,
        name: impl Into<String>,
        content: impl Into<String>,
        dialect: Option<Dialect>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            content: content.into(),
            origin: FileOrigin::Lesson { dialect },
        }
    }

    /// Lower-cased text after the last dot, or empty
    pub fn extension(&self) -> String {
        extension_of(&self.name)
    }

    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        hex::encode(hasher.finalize())
    }
}

pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// A folder in the virtual tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl FolderNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    File(FileNode),
    Folder(FolderNode),
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::File(file) => &file.id,
            Node::Folder(folder) => &folder.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::File(file) => &file.name,
            Node::Folder(folder) => &folder.name,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Node::File(file) => Some(file),
            Node::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&FolderNode> {
        match self {
            Node::Folder(folder) => Some(folder),
            Node::File(_) => None,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }

    fn collect_ids<'a>(&'a self, out: &mut Vec<&'a NodeId>) {
        out.push(self.id());
        if let Node::Folder(folder) = self {
            for child in &folder.children {
                child.collect_ids(out);
            }
        }
    }
}

impl From<FileNode> for Node {
    fn from(file: FileNode) -> Self {
        Node::File(file)
    }
}

impl From<FolderNode> for Node {
    fn from(folder: FolderNode) -> Self {
        Node::Folder(folder)
    }
}

/// Immutable project tree. Every mutation returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualFilesystem {
    roots: Vec<Node>,
}

impl VirtualFilesystem {
    pub fn new() -> Self {
        Self { roots: Vec::new() }
    }

    pub fn from_nodes(roots: Vec<Node>) -> Self {
        Self { roots }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Build a tree from a real directory. Hidden entries are skipped and
    /// siblings are ordered by name.
    pub fn mount(path: &Path) -> PreviewResult<Self> {
        if !path.is_dir() {
            return Err(PreviewError::MountError(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        // (depth, folder) pairs for the folders currently open
        let mut open: Vec<(usize, FolderNode)> = Vec::new();
        let mut roots = Vec::new();

        let walker = walkdir::WalkDir::new(path)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = entry?;
            let depth = entry.depth();
            while open.last().is_some_and(|(d, _)| *d >= depth) {
                close_folder(&mut open, &mut roots);
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().is_dir() {
                open.push((depth, FolderNode::new(name)));
            } else if entry.file_type().is_file() {
                let bytes = std::fs::read(entry.path())?;
                let file = FileNode::new(name, String::from_utf8_lossy(&bytes).into_owned());
                match open.last_mut() {
                    Some((_, folder)) => folder.children.push(file.into()),
                    None => roots.push(file.into()),
                }
            }
        }
        while !open.is_empty() {
            close_folder(&mut open, &mut roots);
        }

        let vfs = Self { roots };
        info!(
            "Mounted {} ({} files)",
            path.display(),
            vfs.files().len()
        );
        Ok(vfs)
    }

    /// Pre-order depth-first lookup
    pub fn find_by_id(&self, id: &NodeId) -> Option<&Node> {
        find_by_id_in(&self.roots, id)
    }

    /// First file named `name` in pre-order traversal. Names are not unique
    /// tree-wide, so this is a first-match policy.
    pub fn find_by_name(&self, name: &str) -> Option<&FileNode> {
        find_by_name_in(&self.roots, name)
    }

    /// File at a `/`- or `\`-separated path from the roots. A bare name
    /// falls back to [`find_by_name`](Self::find_by_name).
    pub fn find_by_path(&self, path: &str) -> Option<&FileNode> {
        if !path.contains(['/', '\\']) {
            return self.find_by_name(path);
        }
        let segments: Vec<&str> = path
            .split(['/', '\\'])
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        walk_path(&self.roots, &segments)
    }

    /// Names from the roots down to `id`, joined with `/`
    pub fn path_of(&self, id: &NodeId) -> Option<String> {
        let mut names = Vec::new();
        path_in(&self.roots, id, &mut names).then(|| names.join("/"))
    }

    /// First file other than `package.json` in pre-order traversal
    pub fn find_first_file(&self) -> Option<&FileNode> {
        self.files().into_iter().find(|f| f.name != "package.json")
    }

    /// The sibling list that holds `id`: the root list or the parent's children
    pub fn siblings_of(&self, id: &NodeId) -> Option<&[Node]> {
        siblings_in(&self.roots, id)
    }

    /// All files in pre-order traversal
    pub fn files(&self) -> Vec<&FileNode> {
        let mut out = Vec::new();
        collect_files(&self.roots, &mut out);
        out
    }

    /// Append `node` to `parent`'s children, or to the root list when
    /// `parent` is `None`. A parent that is missing or not a folder, or a
    /// node whose ids already exist in the tree, leaves the tree unchanged.
    pub fn insert(&self, parent: Option<&NodeId>, node: Node) -> Self {
        match self.try_insert(parent, node) {
            Ok(next) => next,
            Err(e) => {
                debug!("Insert ignored: {}", e);
                self.clone()
            }
        }
    }

    pub fn try_insert(&self, parent: Option<&NodeId>, node: Node) -> PreviewResult<Self> {
        let mut incoming = Vec::new();
        node.collect_ids(&mut incoming);
        if let Some(dup) = incoming.iter().find(|id| self.find_by_id(id).is_some()) {
            return Err(PreviewError::DuplicateId(dup.to_string()));
        }

        let Some(parent) = parent else {
            let mut roots = self.roots.clone();
            roots.push(node);
            return Ok(Self { roots });
        };

        match self.find_by_id(parent) {
            None => Err(PreviewError::NodeNotFound(parent.to_string())),
            Some(Node::File(_)) => Err(PreviewError::NotAFolder(parent.to_string())),
            Some(Node::Folder(_)) => Ok(Self {
                roots: insert_into(&self.roots, parent, &node),
            }),
        }
    }

    /// Replace the name of `id`. Sibling names are not checked for clashes.
    pub fn rename(&self, id: &NodeId, new_name: &str) -> Self {
        Self {
            roots: map_nodes(&self.roots, &mut |node| {
                if node.id() != id {
                    return None;
                }
                let mut renamed = node.clone();
                match &mut renamed {
                    Node::File(file) => file.name = new_name.to_string(),
                    Node::Folder(folder) => folder.name = new_name.to_string(),
                }
                Some(renamed)
            }),
        }
    }

    /// Drop `id` together with its whole subtree
    pub fn remove(&self, id: &NodeId) -> Self {
        Self {
            roots: remove_from(&self.roots, id),
        }
    }

    /// Replace the content of file `id`; folders and misses are ignored
    pub fn update_content(&self, id: &NodeId, content: &str) -> Self {
        match self.try_update_content(id, content) {
            Ok(next) => next,
            Err(e) => {
                debug!("Content update ignored: {}", e);
                self.clone()
            }
        }
    }

    pub fn try_update_content(&self, id: &NodeId, content: &str) -> PreviewResult<Self> {
        match self.find_by_id(id) {
            None => Err(PreviewError::NodeNotFound(id.to_string())),
            Some(Node::Folder(_)) => Err(PreviewError::NotAFile(id.to_string())),
            Some(Node::File(_)) => Ok(Self {
                roots: map_nodes(&self.roots, &mut |node| match node {
                    Node::File(file) if &file.id == id => Some(Node::File(FileNode {
                        content: content.to_string(),
                        ..file.clone()
                    })),
                    _ => None,
                }),
            }),
        }
    }

    /// SHA-256 over structure, ids, names and contents
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hash_nodes(&self.roots, &mut hasher);
        hex::encode(hasher.finalize())
    }

    /// Indented listing of the tree
    pub fn outline(&self) -> String {
        let mut out = String::new();
        outline_nodes(&self.roots, 0, &mut out);
        out
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn close_folder(open: &mut Vec<(usize, FolderNode)>, roots: &mut Vec<Node>) {
    if let Some((_, folder)) = open.pop() {
        match open.last_mut() {
            Some((_, parent)) => parent.children.push(folder.into()),
            None => roots.push(folder.into()),
        }
    }
}

fn find_by_id_in<'a>(nodes: &'a [Node], id: &NodeId) -> Option<&'a Node> {
    for node in nodes {
        if node.id() == id {
            return Some(node);
        }
        if let Node::Folder(folder) = node {
            if let Some(found) = find_by_id_in(&folder.children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn find_by_name_in<'a>(nodes: &'a [Node], name: &str) -> Option<&'a FileNode> {
    for node in nodes {
        match node {
            Node::File(file) if file.name == name => return Some(file),
            Node::File(_) => {}
            Node::Folder(folder) => {
                if let Some(found) = find_by_name_in(&folder.children, name) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Follow folder names down from `nodes`; the last segment names a file
pub fn walk_path<'a>(nodes: &'a [Node], segments: &[&str]) -> Option<&'a FileNode> {
    let (last, folders) = segments.split_last()?;
    let mut current = nodes;
    for segment in folders {
        current = current
            .iter()
            .filter_map(Node::as_folder)
            .find(|f| f.name == *segment)?
            .children
            .as_slice();
    }
    current
        .iter()
        .filter_map(Node::as_file)
        .find(|f| f.name == *last)
}

fn path_in(nodes: &[Node], id: &NodeId, names: &mut Vec<String>) -> bool {
    for node in nodes {
        names.push(node.name().to_string());
        if node.id() == id {
            return true;
        }
        if let Node::Folder(folder) = node {
            if path_in(&folder.children, id, names) {
                return true;
            }
        }
        names.pop();
    }
    false
}

fn siblings_in<'a>(nodes: &'a [Node], id: &NodeId) -> Option<&'a [Node]> {
    if nodes.iter().any(|n| n.id() == id) {
        return Some(nodes);
    }
    nodes
        .iter()
        .filter_map(Node::as_folder)
        .find_map(|folder| siblings_in(&folder.children, id))
}

fn collect_files<'a>(nodes: &'a [Node], out: &mut Vec<&'a FileNode>) {
    for node in nodes {
        match node {
            Node::File(file) => out.push(file),
            Node::Folder(folder) => collect_files(&folder.children, out),
        }
    }
}

/// Rebuild `nodes`, substituting every node for which `f` returns a value.
/// Substituted nodes are not descended into.
fn map_nodes(nodes: &[Node], f: &mut impl FnMut(&Node) -> Option<Node>) -> Vec<Node> {
    nodes
        .iter()
        .map(|node| {
            if let Some(replacement) = f(node) {
                return replacement;
            }
            match node {
                Node::Folder(folder) => Node::Folder(FolderNode {
                    children: map_nodes(&folder.children, f),
                    ..folder.clone()
                }),
                Node::File(_) => node.clone(),
            }
        })
        .collect()
}

fn insert_into(nodes: &[Node], parent: &NodeId, new_node: &Node) -> Vec<Node> {
    map_nodes(nodes, &mut |node| match node {
        Node::Folder(folder) if &folder.id == parent => {
            let mut folder = folder.clone();
            folder.children.push(new_node.clone());
            Some(Node::Folder(folder))
        }
        _ => None,
    })
}

fn remove_from(nodes: &[Node], id: &NodeId) -> Vec<Node> {
    nodes
        .iter()
        .filter(|node| node.id() != id)
        .map(|node| match node {
            Node::Folder(folder) => Node::Folder(FolderNode {
                children: remove_from(&folder.children, id),
                ..folder.clone()
            }),
            Node::File(_) => node.clone(),
        })
        .collect()
}

fn hash_nodes(nodes: &[Node], hasher: &mut Sha256) {
    hasher.update((nodes.len() as u64).to_le_bytes());
    for node in nodes {
        let id = node.id().as_str();
        let name = node.name();
        match node {
            Node::File(file) => {
                hasher.update(b"f");
                hash_field(hasher, id);
                hash_field(hasher, name);
                hash_field(hasher, &file.content);
            }
            Node::Folder(folder) => {
                hasher.update(b"d");
                hash_field(hasher, id);
                hash_field(hasher, name);
                hash_nodes(&folder.children, hasher);
            }
        }
    }
}

fn hash_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn outline_nodes(nodes: &[Node], depth: usize, out: &mut String) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        match node {
            Node::Folder(folder) => {
                out.push_str(&format!("{}{}/\n", indent, folder.name));
                outline_nodes(&folder.children, depth + 1, out);
            }
            Node::File(file) => {
                out.push_str(&format!("{}{} ({} bytes)\n", indent, file.name, file.content.len()));
            }
        }
    }
}

/// Names carried by more than one file. Name lookups on these resolve to
/// whichever comes first in traversal order.
pub fn duplicate_file_names(vfs: &VirtualFilesystem) -> Vec<String> {
    let mut seen = std::collections::BTreeMap::<&str, usize>::new();
    for file in vfs.files() {
        *seen.entry(file.name.as_str()).or_default() += 1;
    }
    let dups: Vec<String> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_string())
        .collect();
    if !dups.is_empty() {
        warn!("Duplicate file names resolve first-match: {}", dups.join(", "));
    }
    dups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (VirtualFilesystem, NodeId, NodeId) {
        let style = FileNode::new("style.css", "body{}");
        let style_id = style.id.clone();
        let src = FolderNode::new("src").with_children(vec![
            FileNode::new("app.js", "console.log('a')").into(),
            FileNode::new("style.css", "p{}").into(),
        ]);
        let src_id = src.id.clone();
        let vfs = VirtualFilesystem::from_nodes(vec![
            FileNode::new("index.html", "<html></html>").into(),
            src.into(),
            style.into(),
        ]);
        (vfs, src_id, style_id)
    }

    #[test]
    fn find_by_name_takes_first_in_traversal_order() {
        let (vfs, _, style_id) = sample();
        let found = vfs.find_by_name("style.css").unwrap();
        assert_eq!(found.content, "p{}");
        assert_ne!(found.id, style_id);
        assert!(vfs.find_by_name("missing.css").is_none());
    }

    #[test]
    fn find_by_id_reaches_nested_nodes() {
        let (vfs, src_id, _) = sample();
        let folder = vfs.find_by_id(&src_id).unwrap();
        assert!(folder.is_folder());
        let nested = folder.as_folder().unwrap().children[0].id().clone();
        assert_eq!(vfs.find_by_id(&nested).unwrap().name(), "app.js");
        assert!(vfs.find_by_id(&NodeId::from_raw("nope")).is_none());
    }

    #[test]
    fn insert_under_folder_and_root() {
        let (vfs, src_id, _) = sample();
        let next = vfs.insert(Some(&src_id), FileNode::new("b.js", "").into());
        let folder = next.find_by_id(&src_id).unwrap().as_folder().unwrap();
        assert_eq!(folder.children.last().unwrap().name(), "b.js");

        let next = next.insert(None, FolderNode::new("assets").into());
        assert_eq!(next.nodes().last().unwrap().name(), "assets");
        // the original value is untouched
        assert_eq!(vfs.files().len(), 4);
    }

    #[test]
    fn insert_under_unknown_or_file_parent_is_a_no_op() {
        let (vfs, _, style_id) = sample();
        let missing = vfs.insert(Some(&NodeId::from_raw("ghost")), FileNode::new("b.js", "").into());
        assert_eq!(missing, vfs);
        assert!(missing.find_by_name("b.js").is_none());

        let under_file = vfs.insert(Some(&style_id), FileNode::new("b.js", "").into());
        assert_eq!(under_file, vfs);

        assert!(matches!(
            vfs.try_insert(Some(&style_id), FileNode::new("b.js", "").into()),
            Err(PreviewError::NotAFolder(_))
        ));
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let (vfs, _, style_id) = sample();
        let clash = FileNode {
            id: style_id,
            ..FileNode::new("clash.js", "")
        };
        assert_eq!(vfs.insert(None, clash.into()), vfs);
    }

    #[test]
    fn rename_allows_duplicate_sibling_names() {
        let (vfs, _, style_id) = sample();
        let renamed = vfs.rename(&style_id, "index.html");
        assert_eq!(renamed.find_by_id(&style_id).unwrap().name(), "index.html");
        assert_eq!(
            renamed.nodes().iter().filter(|n| n.name() == "index.html").count(),
            2
        );
    }

    #[test]
    fn remove_drops_whole_subtree() {
        let (vfs, src_id, _) = sample();
        let nested = vfs.find_by_name("app.js").unwrap().id.clone();
        let next = vfs.remove(&src_id);
        assert!(next.find_by_id(&src_id).is_none());
        assert!(next.find_by_id(&nested).is_none());
        assert_eq!(next.files().len(), 2);
    }

    #[test]
    fn update_content_touches_files_only() {
        let (vfs, src_id, style_id) = sample();
        let next = vfs.update_content(&style_id, "h1{}");
        assert_eq!(
            next.find_by_id(&style_id).unwrap().as_file().unwrap().content,
            "h1{}"
        );
        assert_eq!(vfs.update_content(&src_id, "x"), vfs);
        assert!(vfs.try_update_content(&src_id, "x").is_err());
    }

    #[test]
    fn first_file_skips_package_manifest() {
        let vfs = VirtualFilesystem::from_nodes(vec![FolderNode::new("My Project")
            .with_children(vec![
                FileNode::new("package.json", "{}").into(),
                FileNode::new("index.html", "").into(),
            ])
            .into()]);
        assert_eq!(vfs.find_first_file().unwrap().name, "index.html");
    }

    #[test]
    fn fingerprint_tracks_content() {
        let (vfs, _, style_id) = sample();
        assert_eq!(vfs.fingerprint(), vfs.clone().fingerprint());
        let edited = vfs.update_content(&style_id, "body{color:red}");
        assert_ne!(vfs.fingerprint(), edited.fingerprint());
    }

    #[test]
    fn duplicate_names_are_reported() {
        let (vfs, _, _) = sample();
        assert_eq!(duplicate_file_names(&vfs), vec!["style.css".to_string()]);
    }

    #[test]
    fn paths_walk_folders_and_bare_names_fall_back() {
        let (vfs, _, style_id) = sample();
        assert_eq!(vfs.find_by_path("src/style.css").unwrap().content, "p{}");
        assert_eq!(vfs.find_by_path("./src\\app.js").unwrap().name, "app.js");
        assert_eq!(vfs.find_by_path("/style.css").unwrap().content, "body{}");
        assert_eq!(vfs.find_by_path("style.css").unwrap().content, "p{}");
        assert!(vfs.find_by_path("lib/style.css").is_none());
        assert!(vfs.find_by_path("").is_none());

        assert_eq!(vfs.path_of(&style_id).as_deref(), Some("style.css"));
        let nested = vfs.find_by_path("src/app.js").unwrap();
        assert_eq!(vfs.path_of(&nested.id).as_deref(), Some("src/app.js"));
        assert!(vfs.path_of(&NodeId::new()).is_none());
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("App.JSX"), "jsx");
        assert_eq!(extension_of("Makefile"), "");
    }
}
