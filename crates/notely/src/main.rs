//! Notely CLI - notes with tags, kept in a local key-value store.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flexi_logger::Logger;
use log::info;
use notely_core::{
    KeyValueStore, NoteData, NoteFilter, Notebook, Tag, ViewNote, NOTES_KEY, TAGS_KEY,
};
use notely_files::FilesStore;
use notely_sqlite::SqliteStore;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

const NOTELY_DIR: &str = ".notely";
const SQLITE_FILE: &str = "notely.sqlite";

#[derive(Parser)]
#[command(name = "notely", about = "Notes with tags, kept in a local key-value store", version)]
struct Cli {
    /// Notebook directory (defaults to the nearest .notely directory)
    #[arg(long, global = true, env = "NOTELY_DIR")]
    dir: Option<PathBuf>,
    /// Storage backend
    #[arg(long, global = true, env = "NOTELY_BACKEND", value_enum, default_value_t = Backend::Files)]
    backend: Backend,
    /// Log level written to stderr (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "NOTELY_LOG", default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// One JSON file per collection
    Files,
    /// Key-value table in an SQLite database
    Sqlite,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new notebook in the current directory
    Init {
        /// Delete existing notebook and reinitialize
        #[arg(long)]
        reinitialize: bool,
    },
    /// Add a new note
    Add {
        /// Note title
        #[arg(long)]
        title: String,
        /// Comma-separated tag labels; unknown labels become new tags
        #[arg(long)]
        tags: Option<String>,
        /// Note markdown ("-" or omitted reads stdin)
        #[arg(long)]
        markdown: Option<String>,
    },
    /// List notes
    Ls {
        /// Only notes whose title contains this text (case-insensitive)
        #[arg(long)]
        title: Option<String>,
        /// Only notes carrying every one of these comma-separated tag labels
        #[arg(long)]
        tags: Option<String>,
    },
    /// Show a note
    Show {
        /// Note ID
        id: String,
    },
    /// Edit a note
    Edit {
        /// Note ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New comma-separated tag labels (empty string clears tags)
        #[arg(long)]
        tags: Option<String>,
        /// New markdown ("-" reads stdin; omitted keeps the current markdown)
        #[arg(long)]
        markdown: Option<String>,
    },
    /// Delete a note
    Rm {
        /// Note ID
        id: String,
    },
    /// List all tags
    Tags,
    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Search notes with regular expressions
    Grep {
        /// Search pattern (regex)
        pattern: String,
        /// Case-sensitive search
        #[arg(short = 'C', long)]
        case_sensitive: bool,
    },
}

#[derive(Subcommand)]
enum TagCommands {
    /// Create a tag
    Add {
        /// Tag label
        label: String,
    },
    /// Change a tag's label
    Rename {
        /// Tag ID
        id: String,
        /// New label
        label: String,
    },
    /// Delete a tag (notes keep their reference but stop showing it)
    Rm {
        /// Tag ID
        id: String,
    },
}

type Store = Box<dyn KeyValueStore>;

/// Find the .notely directory by searching up from `start`
fn find_notely_dir(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let notely_path = current.join(NOTELY_DIR);
        if notely_path.is_dir() {
            return Some(notely_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Resolve the notebook directory, or error if not initialized
fn get_notely_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        if !dir.is_dir() {
            bail!("Notebook directory {} does not exist.", dir.display());
        }
        return Ok(dir);
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    match find_notely_dir(&cwd) {
        Some(dir) => Ok(dir),
        None => bail!("No .notely directory found. Run 'notely init' to initialize a new notebook."),
    }
}

fn open_store(dir: &Path, backend: Backend) -> Result<Store> {
    let store: Store = match backend {
        Backend::Files => {
            Box::new(FilesStore::open(dir).context("Failed to open notebook files")?)
        }
        Backend::Sqlite => Box::new(
            SqliteStore::open(dir.join(SQLITE_FILE)).context("Failed to open notebook database")?,
        ),
    };
    Ok(store)
}

fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn require_title(title: String) -> Result<String> {
    let title = title.trim().to_string();
    if title.is_empty() {
        bail!("Title cannot be empty");
    }
    Ok(title)
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read from stdin")?;
    Ok(buf)
}

/// Markdown argument, with "-" meaning read stdin
fn read_markdown_arg(markdown: Option<String>) -> Result<Option<String>> {
    match markdown.as_deref() {
        Some("-") => read_stdin().map(Some),
        _ => Ok(markdown),
    }
}

fn format_tags(tags: &[Tag]) -> String {
    tags.iter()
        .map(|tag| tag.label.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn print_summary(note: &ViewNote) {
    if note.tags.is_empty() {
        println!("{}: {}", note.id, note.title);
    } else {
        println!("{}: {} [{}]", note.id, note.title, format_tags(&note.tags));
    }
}

/// Look up a note, failing on unknown ids
fn require_note<S: KeyValueStore>(notebook: &Notebook<S>, id: &str) -> Result<ViewNote> {
    notebook
        .note(id)
        .ok_or_else(|| anyhow!("Note {} not found", id))
}

fn require_tag<S: KeyValueStore>(notebook: &Notebook<S>, id: &str) -> Result<Tag> {
    notebook
        .tag(id)
        .cloned()
        .ok_or_else(|| anyhow!("Tag {} not found", id))
}

/// Trim a tag label and reject empty labels and labels another tag already
/// carries. `own_id` is the tag being renamed, if any.
fn check_tag_label<S: KeyValueStore>(
    notebook: &Notebook<S>,
    label: &str,
    own_id: Option<&str>,
) -> Result<String> {
    let label = label.trim().to_string();
    if label.is_empty() {
        bail!("Tag label cannot be empty");
    }
    if let Some(existing) = notebook.tag_by_label(&label) {
        if Some(existing.id.as_str()) != own_id {
            bail!("Tag {} already exists", label);
        }
    }
    Ok(label)
}

/// Build the replacement for `current`, keeping every field not given.
fn edit_data<S: KeyValueStore>(
    notebook: &mut Notebook<S>,
    current: &ViewNote,
    title: Option<String>,
    markdown: Option<String>,
    tags: Option<String>,
) -> Result<NoteData> {
    let mut data = NoteData::from(current);
    if let Some(title) = title {
        data.title = require_title(title)?;
    }
    if let Some(markdown) = markdown {
        data.markdown = markdown;
    }
    if let Some(tags) = tags {
        data.tags = notebook.ensure_tags(&parse_list(&tags))?;
    }
    Ok(data)
}

/// Files the stores keep in a notebook directory
fn notebook_files() -> Vec<String> {
    vec![
        format!("{}.json", NOTES_KEY),
        format!("{}.json", TAGS_KEY),
        format!("{}.json.tmp", NOTES_KEY),
        format!("{}.json.tmp", TAGS_KEY),
        ".lock".to_string(),
        SQLITE_FILE.to_string(),
    ]
}

fn has_notebook(dir: &Path) -> bool {
    notebook_files()
        .iter()
        .any(|name| name != ".lock" && dir.join(name).exists())
}

/// Map tag labels to tag ids, failing on labels no tag carries
fn lookup_tag_ids<S: KeyValueStore>(notebook: &Notebook<S>, labels: &[String]) -> Result<Vec<String>> {
    labels
        .iter()
        .map(|label| {
            notebook
                .tag_by_label(label)
                .map(|tag| tag.id.clone())
                .ok_or_else(|| anyhow!("Unknown tag: {}", label))
        })
        .collect()
}

fn init(cli_dir: Option<PathBuf>, backend: Backend, reinitialize: bool) -> Result<()> {
    let notely_dir = cli_dir.unwrap_or_else(|| PathBuf::from(NOTELY_DIR));

    if has_notebook(&notely_dir) {
        if !reinitialize {
            bail!("Notely is already initialized here. Use --reinitialize to delete and recreate.");
        }
        // Only the notebook's own files; the directory may hold other things.
        for name in notebook_files() {
            let path = notely_dir.join(&name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
    }

    std::fs::create_dir_all(&notely_dir).context("Failed to create notebook directory")?;
    open_store(&notely_dir, backend)?;

    if reinitialize {
        println!("Reinitialized notely notebook in {}", notely_dir.display());
    } else {
        println!("Initialized notely notebook in {}", notely_dir.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _logger = Logger::try_with_str(&cli.log_level)
        .context("Invalid log level")?
        .log_to_stderr()
        .start()
        .context("Failed to start logger")?;

    if let Commands::Init { reinitialize } = cli.command {
        return init(cli.dir, cli.backend, reinitialize);
    }

    // All other commands need the notebook
    let notely_dir = get_notely_dir(cli.dir)?;
    info!(
        "event=cli_start dir={} backend={:?}",
        notely_dir.display(),
        cli.backend
    );
    let store = open_store(&notely_dir, cli.backend)?;
    let mut notebook = Notebook::open(store).context("Failed to load notebook")?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),

        Commands::Add {
            title,
            tags,
            markdown,
        } => {
            let title = require_title(title)?;
            let markdown = match read_markdown_arg(markdown)? {
                Some(m) => m,
                None => read_stdin()?,
            };
            let labels = tags.map(|t| parse_list(&t)).unwrap_or_default();
            let tags = notebook.ensure_tags(&labels)?;
            let id = notebook.create_note(NoteData {
                title,
                markdown,
                tags,
            })?;
            println!("Added note {}", id);
        }

        Commands::Ls { title, tags } => {
            let labels = tags.map(|t| parse_list(&t)).unwrap_or_default();
            let filter = NoteFilter {
                title,
                tag_ids: lookup_tag_ids(&notebook, &labels)?,
            };
            for note in notebook.filter_notes(&filter) {
                print_summary(&note);
            }
        }

        Commands::Show { id } => {
            let note = require_note(&notebook, &id)?;
            println!("# {}\n", note.title);
            println!("{}", note.markdown);
            println!("\n---\n");
            println!("Id: {}", note.id);
            println!("Tags: {}", format_tags(&note.tags));
        }

        Commands::Edit {
            id,
            title,
            tags,
            markdown,
        } => {
            let current = require_note(&notebook, &id)?;
            let markdown = read_markdown_arg(markdown)?;

            if title.is_none() && tags.is_none() && markdown.is_none() {
                eprintln!("Nothing to update");
                process::exit(1);
            }

            let data = edit_data(&mut notebook, &current, title, markdown, tags)?;
            notebook.update_note(&id, data)?;
            println!("Edited note {}", id);
        }

        Commands::Rm { id } => {
            require_note(&notebook, &id)?;
            notebook.delete_note(&id)?;
            println!("Deleted note {}", id);
        }

        Commands::Tags => {
            for count in notebook.tag_counts() {
                let noun = if count.count == 1 { "note" } else { "notes" };
                println!(
                    "{}: {} ({} {})",
                    count.tag.id, count.tag.label, count.count, noun
                );
            }
        }

        Commands::Tag { command } => match command {
            TagCommands::Add { label } => {
                let label = check_tag_label(&notebook, &label, None)?;
                let tag = notebook
                    .ensure_tags(std::slice::from_ref(&label))?
                    .remove(0);
                println!("Added tag {} ({})", tag.label, tag.id);
            }
            TagCommands::Rename { id, label } => {
                require_tag(&notebook, &id)?;
                let label = check_tag_label(&notebook, &label, Some(id.as_str()))?;
                notebook.update_tag(&id, &label)?;
                println!("Renamed tag {}", id);
            }
            TagCommands::Rm { id } => {
                require_tag(&notebook, &id)?;
                notebook.delete_tag(&id)?;
                println!("Deleted tag {}", id);
            }
        },

        Commands::Grep {
            pattern,
            case_sensitive,
        } => {
            for note in notebook.grep(&pattern, case_sensitive)? {
                print_summary(&note);
            }
        }
    }

    Ok(())
}
