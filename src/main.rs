use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use studio_preview::oracle;
use studio_preview::shim::{self, ShimInput};
use studio_preview::{Dialect, PreviewConfig, PreviewError, PreviewResult, Previewer, Topic};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Studio Preview - live preview bundler
///
/// Builds the self-contained document a learning IDE loads into its
/// sandboxed preview frame, straight from a project directory.
#[derive(Parser)]
#[command(name = "studio-preview")]
#[command(version = "0.1.0")]
#[command(about = "Live preview bundler for project directories", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON preview config (CDN URLs, bare modules, sandbox policies)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the preview document for a file
    Render {
        /// Project directory
        dir: PathBuf,
        /// Path of the file to preview (defaults to the first file)
        #[arg(short, long)]
        file: Option<String>,
        /// Preview the file as a standalone lesson snippet
        #[arg(long, value_enum)]
        lesson_dialect: Option<DialectArg>,
        /// Emit an <iframe> element instead of the bare document
        #[arg(long)]
        iframe: bool,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the project tree
    Tree {
        dir: PathBuf,
    },
    /// Show which runtime shim a file would get
    Classify {
        dir: PathBuf,
        /// Path of the file relative to the project directory
        #[arg(short, long)]
        file: String,
    },
    /// List packages declared in package.json
    Packages {
        dir: PathBuf,
    },
    /// Preview (and optionally apply) a fix answer from the oracle
    Fix {
        dir: PathBuf,
        /// Path of the file relative to the project directory
        #[arg(short, long)]
        file: String,
        /// JSON file holding {"explanation", "fixedCode"}
        #[arg(short, long)]
        response: PathBuf,
        /// Write the fixed code back to disk
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    React,
    Vue,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::React => Dialect::ReactLike,
            DialectArg::Vue => Dialect::VueLike,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => match PreviewConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => PreviewConfig::default(),
    };

    let result = match cli.command {
        Commands::Render {
            dir,
            file,
            lesson_dialect,
            iframe,
            out,
        } => render(&dir, file.as_deref(), lesson_dialect, iframe, out.as_deref(), config),
        Commands::Tree { dir } => show_tree(&dir, config),
        Commands::Classify { dir, file } => classify(&dir, &file, config),
        Commands::Packages { dir } => list_packages(&dir, config),
        Commands::Fix {
            dir,
            file,
            response,
            apply,
        } => fix(&dir, &file, &response, apply, config),
    };

    if let Err(e) = result {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Mount `dir` and open `file`, a path relative to `dir` or a bare name
fn open_session(dir: &Path, file: Option<&str>, config: PreviewConfig) -> PreviewResult<Previewer> {
    let mut previewer = Previewer::mount(dir, config)?;
    if let Some(file) = file {
        previewer.open_path(file)?;
    }
    Ok(previewer)
}

fn render(
    dir: &Path,
    file: Option<&str>,
    lesson_dialect: Option<DialectArg>,
    iframe: bool,
    out: Option<&Path>,
    config: PreviewConfig,
) -> PreviewResult<()> {
    let mut previewer = open_session(dir, file, config)?;

    if let Some(dialect) = lesson_dialect {
        if let Some(selection) = previewer.selection() {
            let source = &selection.file;
            let stem = source
                .name
                .rsplit_once('.')
                .map_or(source.name.as_str(), |(stem, _)| stem);
            let topic = Topic::new(stem, source.content.clone())
                .with_file_type(&source.extension())
                .with_dialect(dialect.into());
            previewer.open_topic(&topic);
        }
    }

    let frame = previewer.render();
    info!(
        "Rendered {} ({} bytes, sandbox \"{}\")",
        frame.shim.map_or_else(|| "placeholder".to_string(), |s| s.to_string()),
        frame.html.len(),
        frame.sandbox
    );

    let output = if iframe { frame.iframe_markup() } else { frame.html };
    match out {
        Some(path) => {
            std::fs::write(path, output)?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", output),
    }
    Ok(())
}

fn show_tree(dir: &Path, config: PreviewConfig) -> PreviewResult<()> {
    let previewer = Previewer::mount(dir, config)?;
    print!("{}", previewer.tree().outline());

    let duplicates = studio_preview::virtual_fs::duplicate_file_names(previewer.tree());
    if !duplicates.is_empty() {
        println!("\nAmbiguous names (first match wins): {}", duplicates.join(", "));
    }
    Ok(())
}

fn classify(dir: &Path, file: &str, config: PreviewConfig) -> PreviewResult<()> {
    let previewer = open_session(dir, Some(file), config)?;
    if let Some(selection) = previewer.selection() {
        let input = ShimInput::new(&selection.file, selection.preview_tree(previewer.tree()));
        println!("{}: {}", selection.file.name, shim::select(&input));
    }
    Ok(())
}

fn list_packages(dir: &Path, config: PreviewConfig) -> PreviewResult<()> {
    let previewer = Previewer::mount(dir, config)?;
    let packages = previewer.packages();

    println!("\n{}", "=".repeat(60));
    println!("Installed Packages");
    println!("{}", "=".repeat(60));
    if packages.is_empty() {
        println!("No packages installed.");
    } else {
        for package in &packages {
            println!("  {}@{}", package.name, package.version);
        }
    }
    println!("{}", "=".repeat(60));
    Ok(())
}

fn fix(dir: &Path, file: &str, response: &Path, apply: bool, config: PreviewConfig) -> PreviewResult<()> {
    let mut previewer = open_session(dir, Some(file), config)?;
    // the file actually opened, which a bare name may place in a subfolder
    let relative = previewer
        .selection()
        .and_then(|s| previewer.tree().path_of(&s.file.id))
        .ok_or_else(|| PreviewError::NodeNotFound(file.to_string()))?;
    let raw = std::fs::read_to_string(response)?;
    let suggestion = oracle::parse_fix(&raw)?;

    let Some(preview) = previewer.apply_fix(&suggestion) else {
        return Ok(());
    };
    println!("{}", preview.render());

    if !preview.summary.has_changes() {
        info!("Fix leaves {} unchanged", file);
    } else if apply {
        let target = dir.join(&relative);
        std::fs::write(&target, &suggestion.fixed_code)?;
        info!("Applied fix to {}", target.display());
    } else {
        info!("Dry run; pass --apply to write {}", file);
    }
    Ok(())
}
