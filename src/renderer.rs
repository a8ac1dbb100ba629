//! Builds the self-contained document loaded into the preview frame.
//!
//! Every document traps its own runtime errors and shows them inside the
//! frame. Console patching happens only inside the generated markup.

use crate::config::PreviewConfig;
use crate::lesson::ActiveSelection;
use crate::permissions::SandboxPolicy;
use crate::resolver::{escape_inline_script, inject_import_map, ReferenceResolver};
use crate::shim::{self, ShimInput, ShimKind};
use crate::virtual_fs::{FileNode, VirtualFilesystem};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

const EMPTY_DOCUMENT: &str =
    "<!DOCTYPE html><html><body><h1>Select a file to preview</h1></body></html>";

const CSS_TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <title>CSS Preview</title>
    <style>
      body {
        font-family: sans-serif; padding: 20px; color: #333;
        background-color: #f8f9fa;
      }
      .preview-wrapper {
        border: 1px solid #dee2e6;
        padding: 20px;
        background-color: #fff;
        border-radius: 8px;
      }
      h1, h2 { border-bottom: 1px solid #eee; padding-bottom: 5px; margin-bottom: 15px; }
      hr { margin: 20px 0; border: 0; border-top: 1px solid #eee; }
      button, input { font-size: 1em; padding: 8px 12px; margin-top: 10px; }
    </style>
    <style>
{{stylesheet}}
    </style>
  </head>
  <body>
    <h1>CSS Preview: {{title}}</h1>
    <p>The stylesheet is applied to the sample elements below.</p>
    <hr />
    <div class="preview-wrapper">
      <div class="container">
        <h2>Sample Container</h2>
        <p>This is a paragraph with a <a href="#">link</a>.</p>
        <button class="button">A Button</button>
        <ul>
          <li>List Item 1</li>
          <li>List Item 2</li>
        </ul>
      </div>
      <div class="box" style="margin-top: 20px;">A simple box element.</div>
      <input type="text" placeholder="A text input" />
    </div>
  </body>
</html>
"##;

const SCRIPT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <title>{{title}}</title>
    <style>
      body { font-family: sans-serif; padding: 1rem; color: #333; }
      #console-output {
        white-space: pre-wrap;
        word-wrap: break-word;
        background-color: #f1f3f5;
        padding: 10px;
        border-radius: 4px;
        margin-top: 20px;
        border: 1px solid #dee2e6;
      }
      #error-output { color: #c92a2a; font-family: monospace; white-space: pre-wrap; }
    </style>
  </head>
  <body>
    <h1>Previewing {{title}}</h1>
    <div id="app"></div>
    <pre id="console-output"></pre>
    <div id="error-output"></div>
    <script>
      (function () {
        var outputEl = document.getElementById('console-output');
        var errorEl = document.getElementById('error-output');
        var format = function (arg) {
          try {
            return typeof arg === 'object' ? JSON.stringify(arg, null, 2) : String(arg);
          } catch (e) {
            return 'Unserializable Object';
          }
        };
        var capture = function (prefix, original) {
          return function () {
            var args = Array.prototype.slice.call(arguments);
            outputEl.textContent += prefix + args.map(format).join(' ') + '\n';
            original.apply(console, args);
          };
        };
        console.log = capture('', console.log);
        console.info = capture('', console.info);
        console.warn = capture('WARN: ', console.warn);
        console.error = capture('ERROR: ', console.error);
        window.__showError = function (err) {
          var message = err && err.message ? err.name + ': ' + err.message : String(err);
          errorEl.textContent = err && err.stack ? message + '\n' + err.stack : message;
        };
        window.addEventListener('error', function (event) {
          window.__showError(event.error || event.message);
          event.preventDefault();
        });
        window.addEventListener('unhandledrejection', function (event) {
          window.__showError(event.reason);
          event.preventDefault();
        });
      })();
    </script>
    <script>
      try {
{{source}}
      } catch (err) {
        window.__showError(err);
      }
    </script>
  </body>
</html>
"#;

/// Error trap shared by the component shims: replaces the mount root with the
/// error text and stack
const COMPONENT_ERROR_TRAP: &str = r#"<script>
      window.__showError = function (err) {
        var root = document.getElementById('{{root}}');
        var box = document.createElement('pre');
        box.className = 'preview-error';
        var message = err && err.message ? err.name + ': ' + err.message : String(err);
        box.textContent = err && err.stack ? message + '\n\n' + err.stack : message;
        root.innerHTML = '';
        root.appendChild(box);
      };
      window.addEventListener('error', function (event) {
        window.__showError(event.error || event.message);
        event.preventDefault();
      });
      window.addEventListener('unhandledrejection', function (event) {
        window.__showError(event.reason);
        event.preventDefault();
      });
    </script>"#;

const COMPONENT_STYLE: &str = r#"<style>
      body { font-family: sans-serif; margin: 0; padding: 1rem; }
      .preview-error {
        color: #c92a2a; background: #fff5f5; border: 1px solid #ffc9c9;
        padding: 12px; border-radius: 4px; white-space: pre-wrap; font-family: monospace;
      }
    </style>"#;

const REACT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <title>{{title}}</title>
    {{import_map}}
    <script src="{{transpiler}}"></script>
    {{style}}
  </head>
  <body>
    <div id="root"></div>
    {{trap}}
    <script type="text/babel" data-type="module" data-presets="{{presets}}">
{{prelude}}
{{source}}

class __PreviewBoundary extends React.Component {
  constructor(props) {
    super(props);
    this.state = { error: null };
  }
  static getDerivedStateFromError(error) {
    return { error };
  }
  render() {
    const error = this.state.error;
    if (!error) return this.props.children;
    const message = error.message ? error.name + ': ' + error.message : String(error);
    return React.createElement('pre', { className: 'preview-error' }, message + '\n\n' + (error.stack || ''));
  }
}

try {
{{mount}}
} catch (err) {
  window.__showError(err);
}
    </script>
  </body>
</html>
"#;

const VUE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <title>{{title}}</title>
    <script src="{{runtime}}"></script>
    {{style}}
  </head>
  <body>
    <div id="app"></div>
    {{trap}}
    <script>
      try {
{{source}}
{{mount}}
      } catch (err) {
        window.__showError(err);
      }
    </script>
  </body>
</html>
"#;

static EXPORT_DEFAULT_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\s*)export\s+default\s+((?:async\s+)?(?:function\s*\*?|class)\s+([A-Za-z_$][\w$]*))")
        .unwrap()
});

static EXPORT_DEFAULT_IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*export\s+default\s+([A-Za-z_$][\w$]*)\s*;?[ \t]*$").unwrap()
});

static EXPORT_DEFAULT_EXPR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(\s*)export\s+default\s+").unwrap());

static APP_DECL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:function|class|const|let|var)\s+App\b").unwrap());

static CAPITALISED_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:export\s+)?(?:(?:function|class)\s+([A-Z][\w$]*)|(?:const|let|var)\s+([A-Z][\w$]*)\s*=)")
        .unwrap()
});

static REACT_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+(?:\*\s+as\s+)?React\b").unwrap());

static VUE_NAMED_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s*\{([^}]*)\}\s*from\s*['"]vue['"][ \t]*;?"#).unwrap()
});

static VUE_DEFAULT_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s+(?:\*\s+as\s+)?[A-Za-z_$][\w$]*\s+from\s*['"]vue['"][ \t]*;?"#)
        .unwrap()
});

static IMPORT_ALIAS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+as\s+").unwrap());

const ANONYMOUS_COMPONENT: &str = "__PreviewComponent";

/// Result of one render: the document plus the grant it must run under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPreview {
    /// `None` for the placeholder shown without an active file
    pub shim: Option<ShimKind>,
    /// Name of the HTML entry rendered for project previews
    pub entry: Option<String>,
    pub html: String,
    pub policy: SandboxPolicy,
}

impl RenderedPreview {
    /// `<iframe>` element carrying the document inline
    pub fn iframe_markup(&self) -> String {
        iframe_element(&self.policy.attribute(), &self.html)
    }
}

pub fn iframe_element(sandbox: &str, html: &str) -> String {
    format!(
        "<iframe title=\"Live Preview\" sandbox=\"{}\" srcdoc=\"{}\"></iframe>",
        sandbox,
        escape_html(html)
    )
}

pub struct SandboxRenderer<'a> {
    config: &'a PreviewConfig,
}

impl<'a> SandboxRenderer<'a> {
    pub fn new(config: &'a PreviewConfig) -> Self {
        Self { config }
    }

    /// Document for the current selection. Never fails: problems surface as
    /// comments or visible error blocks inside the document.
    pub fn render(
        &self,
        selection: Option<&ActiveSelection>,
        project: &VirtualFilesystem,
    ) -> RenderedPreview {
        let Some(selection) = selection else {
            return RenderedPreview {
                shim: None,
                entry: None,
                html: EMPTY_DOCUMENT.to_string(),
                policy: self.config.policies.isolated.clone(),
            };
        };

        let empty = VirtualFilesystem::new();
        let tree = selection.preview_tree(project);
        let kind = shim::select(&ShimInput::new(&selection.file, tree));
        let tree = tree.unwrap_or(&empty);
        let file = &selection.file;
        debug!("Rendering {} with {}", file.name, kind);

        let mut entry = None;
        let html = match kind {
            ShimKind::PlainHtml => {
                let document = self.entry_document(file, tree);
                entry = Some(document.name.clone());
                self.project_document(document, tree)
            }
            ShimKind::PlainCss => self.stylesheet_document(file),
            ShimKind::PlainScript => self.script_document(file),
            ShimKind::ComponentFrameworkA => self.react_document(file),
            ShimKind::ComponentFrameworkB => self.vue_document(file),
        };

        let policy = match kind {
            ShimKind::PlainHtml => self.config.policies.project.clone(),
            _ => self.config.policies.isolated.clone(),
        };

        RenderedPreview {
            shim: Some(kind),
            entry,
            html,
            policy,
        }
    }

    /// The active file when it is HTML, else the conventional entry, else
    /// the first HTML file of the tree
    fn entry_document<'f>(&self, active: &'f FileNode, tree: &'f VirtualFilesystem) -> &'f FileNode {
        if shim::is_html_name(&active.name) {
            return active;
        }
        tree.find_by_name(&self.config.entry_name)
            .or_else(|| tree.files().into_iter().find(|f| shim::is_html_name(&f.name)))
            .unwrap_or(active)
    }

    /// Project HTML with the import map header and every reference inlined
    pub fn project_document(&self, document: &FileNode, tree: &VirtualFilesystem) -> String {
        let with_map = inject_import_map(&document.content, self.config);
        ReferenceResolver::new(tree, self.config).resolve_html(&with_map, Some(&document.id))
    }

    pub fn stylesheet_document(&self, file: &FileNode) -> String {
        let title = escape_html(&file.name);
        fill(
            CSS_TEMPLATE,
            &[("title", title.as_str()), ("stylesheet", file.content.as_str())],
        )
    }

    pub fn script_document(&self, file: &FileNode) -> String {
        let title = escape_html(&file.name);
        let source = escape_inline_script(&file.content);
        fill(
            SCRIPT_TEMPLATE,
            &[("title", title.as_str()), ("source", &*source)],
        )
    }

    pub fn react_document(&self, file: &FileNode) -> String {
        let component = locate_component(&file.content);
        let prelude = if REACT_IMPORT_RE.is_match(&file.content) {
            "import { createRoot as __createRoot } from 'react-dom/client';"
        } else {
            "import React from 'react';\nimport { createRoot as __createRoot } from 'react-dom/client';"
        };
        let mount = match &component.name {
            Some(name) => format!(
                "  __createRoot(document.getElementById('root')).render(\n    \
                 React.createElement(__PreviewBoundary, null, React.createElement({}))\n  );",
                name
            ),
            None => missing_component_statement(),
        };
        let presets = if file.extension() == "tsx" {
            "typescript,react"
        } else {
            "react"
        };

        let title = escape_html(&file.name);
        let import_map = self.config.import_map_tag();
        let transpiler = escape_html(&self.config.cdn.babel);
        let trap = fill(COMPONENT_ERROR_TRAP, &[("root", "root")]);
        let source = escape_inline_script(&component.source);
        fill(
            REACT_TEMPLATE,
            &[
                ("title", title.as_str()),
                ("import_map", import_map.as_str()),
                ("transpiler", transpiler.as_str()),
                ("style", COMPONENT_STYLE),
                ("trap", trap.as_str()),
                ("presets", presets),
                ("prelude", prelude),
                ("source", &*source),
                ("mount", mount.as_str()),
            ],
        )
    }

    pub fn vue_document(&self, file: &FileNode) -> String {
        let source = vue_imports_to_globals(&file.content);
        let component = locate_component(&source);
        let mount = match &component.name {
            Some(name) => format!(
                "        var __app = Vue.createApp({});\n        \
                 __app.config.errorHandler = function (err) {{ window.__showError(err); }};\n        \
                 __app.mount('#app');",
                name
            ),
            None => missing_component_statement(),
        };

        let title = escape_html(&file.name);
        let runtime = escape_html(&self.config.cdn.vue_global);
        let trap = fill(COMPONENT_ERROR_TRAP, &[("root", "app")]);
        let source = escape_inline_script(&component.source);
        fill(
            VUE_TEMPLATE,
            &[
                ("title", title.as_str()),
                ("runtime", runtime.as_str()),
                ("style", COMPONENT_STYLE),
                ("trap", trap.as_str()),
                ("source", &*source),
                ("mount", mount.as_str()),
            ],
        )
    }
}

/// Component source with its default export turned into a plain binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedComponent {
    pub source: String,
    pub name: Option<String>,
}

/// Find the component to mount: the default export, else `App`, else the
/// first capitalised top-level declaration
pub fn locate_component(source: &str) -> LocatedComponent {
    if let Some(caps) = EXPORT_DEFAULT_DECL_RE.captures(source) {
        let name = caps[3].to_string();
        let rewritten = EXPORT_DEFAULT_DECL_RE.replace(source, |c: &Captures| format!("{}{}", &c[1], &c[2]));
        return LocatedComponent {
            source: rewritten.into_owned(),
            name: Some(name),
        };
    }
    if let Some(caps) = EXPORT_DEFAULT_IDENT_RE.captures(source) {
        let name = caps[1].to_string();
        return LocatedComponent {
            source: EXPORT_DEFAULT_IDENT_RE.replace(source, "").into_owned(),
            name: Some(name),
        };
    }
    if EXPORT_DEFAULT_EXPR_RE.is_match(source) {
        let rewritten = EXPORT_DEFAULT_EXPR_RE.replace(source, |c: &Captures| {
            format!("{}const {} = ", &c[1], ANONYMOUS_COMPONENT)
        });
        return LocatedComponent {
            source: rewritten.into_owned(),
            name: Some(ANONYMOUS_COMPONENT.to_string()),
        };
    }

    let name = if APP_DECL_RE.is_match(source) {
        Some("App".to_string())
    } else {
        CAPITALISED_DECL_RE
            .captures(source)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string())
    };
    LocatedComponent {
        source: source.to_string(),
        name,
    }
}

/// The global runtime build has no module loader: named imports from `vue`
/// become destructuring of the `Vue` global, default imports are dropped
fn vue_imports_to_globals(source: &str) -> String {
    let named = VUE_NAMED_IMPORT_RE.replace_all(source, |c: &Captures| {
        let bindings = IMPORT_ALIAS_RE.replace_all(c[1].trim(), ": ");
        format!("const {{ {} }} = Vue;", bindings)
    });
    VUE_DEFAULT_IMPORT_RE.replace_all(&named, "").into_owned()
}

fn missing_component_statement() -> String {
    let message = "No component found: export a default component or define one named App";
    // a JSON string literal is a valid JS string literal
    let literal = serde_json::Value::String(message.to_string()).to_string();
    format!("  throw new Error({});", literal)
}

/// Single pass over `template`, substituting `{{key}}`. Inserted values are
/// never rescanned, so user content containing braces stays intact.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match values.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
