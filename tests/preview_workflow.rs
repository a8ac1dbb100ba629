use std::fs;

use studio_preview::oracle;
use studio_preview::resolver::ReferenceResolver;
use studio_preview::shim::{self, ShimInput};
use studio_preview::{
    Dialect, FileNode, FolderNode, NodeId, PreviewConfig, Previewer, SandboxRenderer, ShimKind,
    Topic, VirtualFilesystem,
};
use tempfile::tempdir;

fn sample_project() -> VirtualFilesystem {
    VirtualFilesystem::from_nodes(vec![
        FileNode::new(
            "index.html",
            r#"<html><head><link href="style.css"></head><body><script src="a.js"></script></body></html>"#,
        )
        .into(),
        FileNode::new("style.css", "body{color:red}").into(),
        FileNode::new("a.js", "console.log(1)").into(),
    ])
}

#[test]
fn project_references_are_inlined() {
    let tree = sample_project();
    let config = PreviewConfig::default();
    let mut previewer = Previewer::new(tree, config);
    previewer.open("index.html").unwrap();

    let frame = previewer.render();
    assert_eq!(frame.shim, Some(ShimKind::PlainHtml));
    assert!(frame.html.contains("<style>\nbody{color:red}\n</style>"));
    assert!(frame.html.contains("<script>\nconsole.log(1)\n</script>"));
    assert!(!frame.html.contains("<link"));
    assert!(!frame.html.contains("<script src"));
}

#[test]
fn missing_stylesheet_becomes_a_comment() {
    let index = FileNode::new(
        "index.html",
        r#"<html><head><link rel="stylesheet" href="other.css"></head><body></body></html>"#,
    );
    let tree = VirtualFilesystem::from_nodes(vec![index.clone().into()]);
    let config = PreviewConfig::default();

    let html = ReferenceResolver::new(&tree, &config).resolve(&index);
    assert!(html.contains("<!-- CSS file not found: other.css -->"));
    assert!(!html.contains("<style>"));
}

#[test]
fn insert_under_unknown_parent_changes_nothing() {
    let tree = sample_project();
    let next = tree.insert(
        Some(&NodeId::from_raw("no-such-folder")),
        FileNode::new("b.js", "").into(),
    );
    assert_eq!(next, tree);
    assert!(next.find_by_name("b.js").is_none());
}

#[test]
fn resolving_twice_is_byte_identical() {
    let tree = sample_project();
    let config = PreviewConfig::default();
    let index = tree.find_by_name("index.html").unwrap();
    let resolver = ReferenceResolver::new(&tree, &config);
    assert_eq!(resolver.resolve(index), resolver.resolve(index));
}

#[test]
fn nested_references_resolve_from_the_document_folder() {
    let page = FileNode::new(
        "index.html",
        r#"<head><link rel="stylesheet" href="css/site.css"></head><script type="module" src="./app.js"></script>"#,
    );
    let tree = VirtualFilesystem::from_nodes(vec![
        FileNode::new("site.css", "/* decoy */").into(),
        FolderNode::new("web")
            .with_children(vec![
                page.clone().into(),
                FileNode::new("app.js", "import _ from 'lodash';\nconsole.log(_.VERSION);").into(),
                FolderNode::new("css")
                    .with_children(vec![FileNode::new("site.css", "main{}").into()])
                    .into(),
            ])
            .into(),
    ]);
    let config = PreviewConfig::default();

    let html = ReferenceResolver::new(&tree, &config).resolve(&page);
    assert!(html.contains("<style>\nmain{}\n</style>"));
    assert!(!html.contains("decoy"));
    assert!(html.contains("<script type=\"module\">"));
    assert!(html.contains("from 'https://esm.sh/lodash@4.17.21'"));
}

#[test]
fn throwing_script_surfaces_its_message() {
    let script = FileNode::new("main.js", r#"throw new Error("boom")"#);
    let tree = VirtualFilesystem::from_nodes(vec![script.clone().into()]);
    let config = PreviewConfig::default();
    let mut previewer = Previewer::new(tree, config);

    let frame = previewer.render();
    assert_eq!(frame.shim, Some(ShimKind::PlainScript));
    assert!(frame.html.contains("boom"));
    assert!(frame.html.contains("__showError"));
}

#[test]
fn stylesheet_preview_embeds_raw_text() {
    let raw = ".card > h2 { content: \"a & b\"; }\n";
    let css = FileNode::new("theme.css", raw);
    let config = PreviewConfig::default();
    let renderer = SandboxRenderer::new(&config);
    let tree = VirtualFilesystem::from_nodes(vec![css.clone().into()]);

    let rendered = renderer.render(Some(&studio_preview::ActiveSelection::new(css)), &tree);
    assert_eq!(rendered.shim, Some(ShimKind::PlainCss));
    assert!(rendered.html.contains(raw));
}

#[test]
fn shim_choice_depends_only_on_its_inputs() {
    let lesson = Topic::new("Todo", "export default { template: '<p/>' }")
        .with_dialect(Dialect::VueLike)
        .to_file();
    let input = ShimInput::new(&lesson, None);
    assert_eq!(shim::select(&input), ShimKind::ComponentFrameworkB);
    assert_eq!(shim::select(&input), shim::select(&input.clone()));
}

#[test]
fn mounted_directory_previews_like_an_imported_project() {
    let dir = tempdir().expect("temp dir");
    fs::create_dir(dir.path().join("css")).unwrap();
    fs::write(
        dir.path().join("index.html"),
        r#"<html><head><link rel="stylesheet" href="css/main.css"></head><body></body></html>"#,
    )
    .unwrap();
    fs::write(dir.path().join("css").join("main.css"), "p{margin:0}").unwrap();
    fs::write(dir.path().join(".hidden"), "secret").unwrap();

    let mut previewer = Previewer::mount(dir.path(), PreviewConfig::default()).unwrap();
    assert!(previewer.tree().find_by_name(".hidden").is_none());
    previewer.open("index.html").unwrap();

    let frame = previewer.render();
    assert!(frame.html.contains("<style>\np{margin:0}\n</style>"));
    assert!(frame.html.contains("<script type=\"importmap\">"));
    assert_eq!(frame.sandbox, PreviewConfig::default().policies.project.attribute());
}

#[test]
fn nested_path_opens_the_file_it_names() {
    let dir = tempdir().expect("temp dir");
    fs::create_dir(dir.path().join("a")).unwrap();
    fs::write(dir.path().join("a").join("style.css"), "a{color:red}").unwrap();
    fs::write(dir.path().join("style.css"), "root{x:1}").unwrap();

    let mut previewer = Previewer::mount(dir.path(), PreviewConfig::default()).unwrap();
    previewer.open_path("style.css").unwrap();
    let bare = previewer.render();
    assert!(bare.html.contains("a{color:red}"));

    previewer.open_path("/style.css").unwrap();
    let root = previewer.render();
    assert!(root.html.contains("root{x:1}"));
    assert!(!root.html.contains("a{color:red}"));

    previewer.open_path("a/style.css").unwrap();
    let selected = previewer.selection().unwrap().file.id.clone();
    let relative = previewer.tree().path_of(&selected).unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join(relative)).unwrap(),
        "a{color:red}"
    );
}

#[test]
fn terminal_answer_installs_into_the_manifest() {
    let tree = VirtualFilesystem::from_nodes(vec![
        FileNode::new("package.json", "{\n  \"name\": \"demo\"\n}").into(),
        FileNode::new("main.js", "").into(),
    ]);
    let mut previewer = Previewer::new(tree, PreviewConfig::default());

    let answer = oracle::parse_terminal(
        r#"{"stdout":"added 1 package","stderr":"","result":"undefined",
            "packageChanges":[{"action":"add","name":"dayjs","version":"1.11.10"}]}"#,
    );
    previewer.apply_terminal_result(&answer).unwrap();

    let packages = previewer.packages();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].version, "1.11.10");
}
