//! Starter content for newly created files.

use crate::virtual_fs::extension_of;

const PACKAGE_JSON: &str = r#"{
  "name": "my-new-project",
  "version": "1.0.0",
  "description": "",
  "main": "index.js",
  "scripts": {
    "test": "echo \"Error: no test specified\" && exit 1"
  },
  "keywords": [],
  "author": "",
  "license": "ISC",
  "dependencies": {}
}"#;

const HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Document</title>
  <link rel="stylesheet" href="style.css">
</head>
<body>
  <h1>Hello, World!</h1>
  <script src="script.js"></script>
</body>
</html>"#;

const CSS: &str = "body {
  font-family: sans-serif;
  margin: 0;
  padding: 20px;
  background-color: #f0f0f0;
}

h1 {
  color: #333;
}";

/// Content a new file called `file_name` starts with
pub fn for_file(file_name: &str) -> String {
    if file_name == "package.json" {
        return PACKAGE_JSON.to_string();
    }

    match extension_of(file_name).as_str() {
        "html" => HTML.to_string(),
        "css" => CSS.to_string(),
        "js" => format!(
            "console.log(\"Hello from {file_name}!\");\n\n\
             // Example function\n\
             function greet(name) {{\n  console.log(`Hello, ${{name}}!`);\n}}\n\n\
             greet('World');"
        ),
        "ts" => format!(
            "console.log(\"Hello from {file_name}!\");\n\n\
             // Example function with types\n\
             function greet(name: string): void {{\n  console.log(`Hello, ${{name}}!`);\n}}\n\n\
             greet('World');"
        ),
        "json" => "{\n  \"key\": \"value\"\n}".to_string(),
        _ => format!("// New file: {file_name}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_starter_links_default_assets() {
        let html = for_file("index.html");
        assert!(html.contains(r#"<link rel="stylesheet" href="style.css">"#));
        assert!(html.contains(r#"<script src="script.js"></script>"#));
    }

    #[test]
    fn scripts_greet_by_file_name() {
        assert!(for_file("main.js").starts_with("console.log(\"Hello from main.js!\");"));
        assert!(for_file("main.ts").contains("function greet(name: string): void {"));
    }

    #[test]
    fn manifest_and_fallback() {
        assert!(for_file("package.json").contains("\"dependencies\": {}"));
        assert_eq!(for_file("notes.txt"), "// New file: notes.txt\n");
    }
}
