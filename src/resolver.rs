//! Inlines stylesheet and script references of an HTML document so the result
//! loads without fetching anything from the virtual tree.
//!
//! Lookup order for a reference such as `css/site.css`:
//! 1. the relative path, walked from the folder holding the document
//! 2. a file with the bare name `site.css` among the document's siblings
//! 3. the first file named `site.css` anywhere in the tree
//!
//! A reference that resolves nowhere is replaced by an HTML comment naming it.
//! Absolute URLs are left alone.

use crate::config::PreviewConfig;
use crate::virtual_fs::{walk_path, FileNode, Node, NodeId, VirtualFilesystem};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::{debug, warn};

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<link\b([^>]*)>").unwrap());

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b([^>]*)>\s*</script\s*>").unwrap());

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .unwrap()
});

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\bfrom\s*|\bimport\s*\(\s*|\bimport\s+)(?:'([^'\n]+)'|"([^"\n]+)")"#).unwrap()
});

// static import/export only; a dynamic `import(` works in classic scripts
static MODULE_SYNTAX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(?:import(?:\s+[\w{*]|\s*['"{*])|export\b)"#).unwrap()
});

static HEAD_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<head\b[^>]*>").unwrap());

static HTML_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<html\b[^>]*>").unwrap());

static IMPORTMAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)type\s*=\s*["']?importmap"#).unwrap());

static SCRIPT_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</(script)").unwrap());

static STYLE_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</(style)").unwrap());

pub struct ReferenceResolver<'a> {
    tree: &'a VirtualFilesystem,
    config: &'a PreviewConfig,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(tree: &'a VirtualFilesystem, config: &'a PreviewConfig) -> Self {
        Self { tree, config }
    }

    /// Inline the references of `document`, resolving relative to its folder
    pub fn resolve(&self, document: &FileNode) -> String {
        self.resolve_html(&document.content, Some(&document.id))
    }

    /// Inline the references of `html`. `base` is the id of the document the
    /// markup came from, if it lives in the tree.
    pub fn resolve_html(&self, html: &str, base: Option<&NodeId>) -> String {
        let siblings = base.and_then(|id| self.tree.siblings_of(id));
        let styled = self.inline_stylesheets(html, siblings);
        self.inline_scripts(&styled, siblings)
    }

    fn inline_stylesheets(&self, html: &str, siblings: Option<&'a [Node]>) -> String {
        LINK_RE
            .replace_all(html, |caps: &Captures| {
                let attrs = parse_attributes(&caps[1]);
                let Some(href) = attribute(&attrs, "href") else {
                    return caps[0].to_string();
                };
                let is_stylesheet = match attribute(&attrs, "rel") {
                    Some(rel) => rel
                        .split_whitespace()
                        .any(|r| r.eq_ignore_ascii_case("stylesheet")),
                    None => strip_query(href).to_ascii_lowercase().ends_with(".css"),
                };
                if !is_stylesheet || is_external(href) {
                    return caps[0].to_string();
                }

                match self.lookup(href, siblings) {
                    Some(file) => {
                        debug!("Inlined stylesheet {}", href);
                        format!("<style>\n{}\n</style>", escape_inline_style(&file.content))
                    }
                    None => {
                        warn!("Stylesheet not found: {}", href);
                        format!("<!-- CSS file not found: {} -->", comment_safe(href))
                    }
                }
            })
            .into_owned()
    }

    fn inline_scripts(&self, html: &str, siblings: Option<&'a [Node]>) -> String {
        SCRIPT_RE
            .replace_all(html, |caps: &Captures| {
                let attrs = parse_attributes(&caps[1]);
                let script_type = attribute(&attrs, "type").map(|t| t.trim().to_ascii_lowercase());
                if script_type.as_deref() == Some("importmap") {
                    return caps[0].to_string();
                }
                let Some(src) = attribute(&attrs, "src") else {
                    return caps[0].to_string();
                };
                if is_external(src) {
                    return caps[0].to_string();
                }

                match self.lookup(src, siblings) {
                    Some(file) => {
                        debug!("Inlined script {}", src);
                        let body = rewrite_bare_imports(&file.content, self.config);
                        let body = escape_inline_script(&body);
                        let is_module = script_type.as_deref() == Some("module")
                            || MODULE_SYNTAX_RE.is_match(&body);
                        if is_module {
                            format!("<script type=\"module\">\n{}\n</script>", body)
                        } else {
                            format!("<script>\n{}\n</script>", body)
                        }
                    }
                    None => {
                        warn!("Script not found: {}", src);
                        format!("<!-- JS file not found: {} -->", comment_safe(src))
                    }
                }
            })
            .into_owned()
    }

    fn lookup(&self, reference: &str, siblings: Option<&'a [Node]>) -> Option<&'a FileNode> {
        let path = strip_query(reference);
        let rooted = path.starts_with('/');
        let segments: Vec<&str> = path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        let name = *segments.last()?;

        let start = if rooted { Some(self.tree.nodes()) } else { siblings };
        if let Some(found) = start.and_then(|nodes| walk_path(nodes, &segments)) {
            return Some(found);
        }
        if let Some(found) = siblings.and_then(|nodes| walk_path(nodes, &[name])) {
            return Some(found);
        }
        self.tree.find_by_name(name)
    }
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .map(|c| {
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| m.as_str())
                .unwrap_or("");
            (c[1].to_ascii_lowercase(), value.to_string())
        })
        .collect()
}

fn attribute<'v>(attrs: &'v [(String, String)], name: &str) -> Option<&'v str> {
    attrs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn strip_query(reference: &str) -> &str {
    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    &reference[..end]
}

fn is_external(reference: &str) -> bool {
    let lower = reference.trim().to_ascii_lowercase();
    lower.starts_with("//")
        || ["http:", "https:", "data:", "blob:"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
}

fn comment_safe(text: &str) -> String {
    text.replace("--", "- -")
}

/// Point known bare import specifiers at their ES-module URLs. A specifier
/// matches a table key exactly or as a `key/` prefix; the longest key wins.
pub fn rewrite_bare_imports<'s>(script: &'s str, config: &PreviewConfig) -> Cow<'s, str> {
    IMPORT_RE.replace_all(script, |caps: &Captures| {
        let (quote, spec) = match caps.get(2) {
            Some(m) => ('\'', m.as_str()),
            None => ('"', caps.get(3).map(|m| m.as_str()).unwrap_or("")),
        };
        match module_url(spec, config) {
            Some(url) => format!("{}{quote}{url}{quote}", &caps[1]),
            None => caps[0].to_string(),
        }
    })
}

fn module_url(spec: &str, config: &PreviewConfig) -> Option<String> {
    config
        .bare_modules
        .iter()
        .filter(|(key, _)| {
            spec == key.as_str()
                || spec
                    .strip_prefix(key.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
        .max_by_key(|(key, _)| key.len())
        .map(|(key, url)| format!("{}{}", url, &spec[key.len()..]))
}

/// Put the import map for the bare-module table at the top of `<head>`.
/// Documents declaring their own import map are returned as-is.
pub fn inject_import_map(html: &str, config: &PreviewConfig) -> String {
    if config.bare_modules.is_empty() || IMPORTMAP_RE.is_match(html) {
        return html.to_string();
    }
    let tag = config.import_map_tag();
    let anchor = HEAD_OPEN_RE.find(html).or_else(|| HTML_OPEN_RE.find(html));
    match anchor {
        Some(m) => format!("{}\n{}{}", &html[..m.end()], tag, &html[m.end()..]),
        None => format!("{}\n{}", tag, html),
    }
}

/// Keep inlined CSS from closing its own `<style>` element early. `\/` reads
/// as `/` inside CSS strings, the only place the sequence is legal.
pub fn escape_inline_style(css: &str) -> Cow<'_, str> {
    STYLE_CLOSE_RE.replace_all(css, "<\\/$1")
}

/// Keep a script body from closing its own `<script>` element early
pub fn escape_inline_script(body: &str) -> Cow<'_, str> {
    SCRIPT_CLOSE_RE.replace_all(body, "<\\/$1")
}
