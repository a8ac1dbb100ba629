//! Studio Preview - live preview bundling for a browser learning IDE
//!
//! Turns an in-memory project tree plus the file a learner has open into a
//! single self-contained HTML document for a sandboxed preview frame.
//!
//! # Features
//!
//! - **Virtual File Tree**: immutable folder/file tree with pure mutations
//! - **Reference Inlining**: local `<link>`/`<script src>` become inline blocks
//! - **Runtime Shims**: plain HTML, CSS demo page, script console, JSX and
//!   options-object component harnesses
//! - **Sandbox Policies**: capability grants for the preview frame
//! - **Oracle Payloads**: lint, fix, format, generate and terminal answers
//!
//! # Quick Start
//!
//! ```rust
//! use studio_preview::{FileNode, PreviewConfig, Previewer, VirtualFilesystem};
//!
//! let tree = VirtualFilesystem::from_nodes(vec![
//!     FileNode::new("main.js", "console.log('hi')").into(),
//! ]);
//! let mut previewer = Previewer::new(tree, PreviewConfig::default());
//! let frame = previewer.render();
//! assert!(frame.html.contains("console.log('hi')"));
//! ```

pub mod boilerplate;
pub mod config;
pub mod diff_engine;
pub mod error;
pub mod lesson;
pub mod manifest;
pub mod oracle;
pub mod permissions;
pub mod renderer;
pub mod resolver;
pub mod sandbox;
pub mod shim;
pub mod virtual_fs;

// Re-export main types
pub use config::PreviewConfig;
pub use diff_engine::{DiffEngine, DiffSummary, FixPreview, UnifiedDiff};
pub use error::{PreviewError, PreviewResult};
pub use lesson::{ActiveSelection, PreviewOverride, Topic};
pub use manifest::{Package, PackageAction, PackageChange};
pub use oracle::{FixSuggestion, LintIssue, OracleRequest, Severity, TerminalExecutionResult};
pub use permissions::{Capability, IsolationLevel, SandboxPolicy};
pub use renderer::{RenderedPreview, SandboxRenderer};
pub use resolver::ReferenceResolver;
pub use sandbox::{PreviewFrame, Previewer, PreviewerStatus};
pub use shim::{ShimInput, ShimKind};
pub use virtual_fs::{Dialect, FileNode, FileOrigin, FolderNode, Node, NodeId, VirtualFilesystem};
