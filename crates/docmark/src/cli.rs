//! Command line surface for rendering documents and toggling highlights.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::app::controller::{AnnotationController, AnnotationEvent, Outcome};
use crate::app::render::{DocSource, DocumentRenderer, RenderOptions};
use crate::app::view::HighlightView;
use crate::domain::model::{Highlight, HighlightId, SelectionRange};
use crate::domain::tree::{DocumentTree, NodeId};
use crate::infra::config::Config;
use crate::infra::store::{HighlightStore, JsonFileStore};

#[derive(Debug, Parser)]
#[command(name = "docmark", author, version, about = "Render markdown documents with persistent highlights", long_about = None)]
pub struct Cli {
    /// Highlight store file, overriding configuration.
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render a markdown file to HTML with its highlights applied
    Render {
        file: PathBuf,
        /// Document title; defaults to the file stem
        #[arg(long)]
        title: Option<String>,
        /// Write the page here instead of stdout
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
        /// Include a table of contents
        #[arg(long)]
        toc: bool,
        /// Emit the rendered page, headings, and blocks as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle a highlight from a selection inside one rendered block
    Select {
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
        /// Top-level block index
        #[arg(long)]
        block: usize,
        /// Child of the block the selection lives in
        #[arg(long, default_value_t = 0)]
        child: usize,
        #[arg(long)]
        anchor: usize,
        #[arg(long)]
        focus: usize,
    },
    /// Remove a highlight as if its mark was clicked
    Click {
        id: u64,
        #[arg(long)]
        title: Option<String>,
    },
    /// List stored highlights
    List {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Delete a highlight by id
    Remove { id: u64 },
    /// Print shell completions
    Completions { shell: Shell },
}

/// Execute `cli`, writing command output to `out`.
pub fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(store) = cli.store {
        config.store.path = store;
    }
    let store = JsonFileStore::new(config.store.path.clone());
    tracing::debug!(store = %store.path().display(), "using highlight store");

    match cli.command {
        Commands::Render {
            file,
            title,
            out: target,
            toc,
            json,
        } => {
            let mut options = RenderOptions::from_config(&config);
            options.toc |= toc;
            let doc = read_doc(&file, title)?;

            let mut view = HighlightView::new(doc.title.clone());
            view.refresh(&store);
            let page = DocumentRenderer::new(options)?.render(&doc, view.highlights())?;

            let rendered = if json {
                serde_json::to_string_pretty(&page).context("failed to encode page")?
            } else {
                page.html
            };
            match target {
                Some(path) => fs::write(&path, rendered)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => writeln!(out, "{rendered}")?,
            }
        }
        Commands::Select {
            file,
            title,
            block,
            child,
            anchor,
            focus,
        } => {
            let doc = read_doc(&file, title)?;
            let renderer = DocumentRenderer::new(RenderOptions::from_config(&config))?;
            let converted = renderer.convert(&doc);
            let node = selection_node(&converted.tree, block, child)?;

            let mut controller = AnnotationController::new(&store, doc.title.clone());
            let event = AnnotationEvent::SelectionCompleted(SelectionRange::within(
                node, anchor, focus,
            ));
            let outcome = controller.handle(event, &converted.tree)?;
            report(out, &outcome)?;
        }
        Commands::Click { id, title } => {
            let tree = DocumentTree::new();
            let mut controller = AnnotationController::new(&store, title.unwrap_or_default());
            let outcome = controller.handle(AnnotationEvent::MarkClicked(HighlightId(id)), &tree)?;
            report(out, &outcome)?;
        }
        Commands::List { title, json } => {
            let highlights = match title {
                Some(title) => store.list(&title)?,
                None => store.list_all()?,
            };
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&highlights)?)?;
            } else {
                for highlight in &highlights {
                    writeln!(out, "{}", list_line(highlight))?;
                }
            }
        }
        Commands::Remove { id } => {
            store.delete(HighlightId(id))?;
            writeln!(out, "removed highlight {id}")?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "docmark", out);
        }
    }
    Ok(())
}

fn read_doc(file: &Path, title: Option<String>) -> Result<DocSource> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let title = title.unwrap_or_else(|| {
        file.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    Ok(DocSource {
        title,
        content,
        file_path: Some(file.to_string_lossy().replace('\\', "/")),
    })
}

/// The text node a selection at `block`/`child` starts in: the child itself, or its first
/// text descendant when the child is an inline element.
fn selection_node(tree: &DocumentTree, block: usize, child: usize) -> Result<NodeId> {
    let block_node = *tree
        .blocks()
        .get(block)
        .ok_or_else(|| anyhow!("document has no block {block}"))?;
    let child_node = *tree
        .children(block_node)
        .get(child)
        .ok_or_else(|| anyhow!("block {block} has no child {child}"))?;
    first_text(tree, child_node).ok_or_else(|| anyhow!("block {block} child {child} has no text"))
}

fn first_text(tree: &DocumentTree, id: NodeId) -> Option<NodeId> {
    let node = tree.get(id)?;
    if node.is_text() {
        return Some(id);
    }
    node.children
        .iter()
        .find_map(|child| first_text(tree, *child))
}

fn report(out: &mut dyn Write, outcome: &Outcome) -> Result<()> {
    match outcome {
        Outcome::Ignored => writeln!(out, "selection ignored")?,
        Outcome::Inserted { id, path } => writeln!(out, "added highlight {id} at {path}")?,
        Outcome::Deleted(id) => writeln!(out, "removed highlight {id}")?,
    }
    Ok(())
}

fn list_line(highlight: &Highlight) -> String {
    format!("{}\t{}\t{}", highlight.id, highlight.title, highlight.path)
}
