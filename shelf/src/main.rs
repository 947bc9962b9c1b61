mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use output::{
    AttachOutput, CreatedOutput, DeleteModeOutput, FileOutput, InitOutput, LinkOutput, LsOutput,
    MoveOutput, NoteOutput, OutputWriter, PageOutput, RmOutput, render_listing,
};
use shelf_core::{
    ChatId, ChatKind, DEFAULT_PAGE_SIZE, Database, EngineConfig, FileId, FolderId, Library,
    MediaKind, NewFile, PageMove, PageTurn, VertexRef,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Shelf - shared folder trees
#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Shared folder trees with cycle-safe sharing", long_about = None)]
#[command(version)]
struct Cli {
    /// Database file (defaults to SHELF_DB env var or ./shelf.db)
    #[arg(long, global = true, env = "SHELF_DB")]
    db: Option<PathBuf>,

    /// Chat id acting on the library
    #[arg(short, long, global = true, env = "SHELF_USER")]
    user: Option<i64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Entries per listing page
    #[arg(long, global = true, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the user and create their root folder
    Init {
        /// Root folder name (defaults to the chat id)
        #[arg(long)]
        name: Option<String>,

        /// Register as a group chat (public root, read-only view)
        #[arg(long)]
        group: bool,
    },

    /// List the current folder
    Ls,

    /// Create a folder in the current folder
    Mkdir {
        name: String,

        /// Only the author may change or share the folder
        #[arg(long)]
        private: bool,
    },

    /// Add a file to the current folder
    AddFile {
        name: String,

        /// External file reference (e.g. a chat platform file id)
        external_ref: String,

        /// Media kind
        #[arg(long, default_value = "document")]
        kind: String,
    },

    /// Enter a child folder
    Cd {
        /// Folder id (as shown by `ls`, with or without the F: prefix)
        folder: String,
    },

    /// Go back to the parent folder
    Back,

    /// Turn the listing page
    Page {
        #[arg(value_enum)]
        direction: Direction,
    },

    /// Remove a child of the current folder
    Rm {
        /// Child reference, F:<id> or D:<id>
        reference: String,
    },

    /// Switch delete mode
    DeleteMode {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Manage the note shown above the current folder
    #[command(subcommand)]
    Note(NoteCommands),

    /// Print the share link of the current folder
    Link,

    /// Attach a shared folder by its link
    Attach { link: String },

    /// Show a file leaf
    File { id: i64 },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Set the note
    Set { text: String },

    /// Remove the note
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Next,
    Prev,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

/// Exit code for engine rejections (cycles, permissions, bad input).
const REJECTED: u8 = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = OutputWriter::new(cli.json);

    match run(cli, &output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = match err.downcast_ref::<shelf_core::Error>() {
                Some(e) if e.is_rejection() => REJECTED,
                _ => 1,
            };
            if code != REJECTED {
                warn!("Command failed: {:#}", err);
            }
            output.write_error(&err, code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli, output: &OutputWriter) -> Result<()> {
    // Database file: CLI arg > SHELF_DB env var (both via clap) > ./shelf.db
    let db_path = cli.db.unwrap_or_else(|| PathBuf::from("./shelf.db"));
    let chat = ChatId(
        cli.user
            .context("No user given (use --user or SHELF_USER)")?,
    );

    debug!(db = %db_path.display(), %chat, "Opening library");
    let library = open_library(&db_path, cli.page_size)?;

    match cli.command {
        Commands::Init { name, group } => cmd_init(&library, output, chat, name, group, &db_path),
        Commands::Ls => cmd_ls(&library, output, chat),
        Commands::Mkdir { name, private } => cmd_mkdir(&library, output, chat, &name, private),
        Commands::AddFile {
            name,
            external_ref,
            kind,
        } => cmd_add_file(&library, output, chat, name, external_ref, &kind),
        Commands::Cd { folder } => cmd_cd(&library, output, chat, &folder),
        Commands::Back => cmd_back(&library, output, chat),
        Commands::Page { direction } => cmd_page(&library, output, chat, direction),
        Commands::Rm { reference } => cmd_rm(&library, output, chat, &reference),
        Commands::DeleteMode { state } => cmd_delete_mode(&library, output, chat, state),
        Commands::Note(note_cmd) => match note_cmd {
            NoteCommands::Set { text } => cmd_note(&library, output, chat, Some(&text)),
            NoteCommands::Clear => cmd_note(&library, output, chat, None),
        },
        Commands::Link => cmd_link(&library, output, chat),
        Commands::Attach { link } => cmd_attach(&library, output, chat, &link),
        Commands::File { id } => cmd_file(&library, output, FileId(id)),
    }
}

fn open_library(path: &Path, page_size: usize) -> Result<Library> {
    let db = Database::open(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(Library::new(
        db,
        EngineConfig::default().with_page_size(page_size),
    ))
}

fn cmd_init(
    library: &Library,
    output: &OutputWriter,
    chat: ChatId,
    name: Option<String>,
    group: bool,
    db_path: &Path,
) -> Result<()> {
    let kind = if group {
        ChatKind::Group
    } else {
        ChatKind::Private
    };
    let name = name.unwrap_or_else(|| chat.to_string());

    let user = library
        .register_user(chat, kind, &name)
        .with_context(|| format!("Failed to register user {}", chat))?;

    let data = InitOutput {
        success: true,
        result_code: 0,
        chat_id: chat.0,
        root: user.path.root(),
        database: db_path.display().to_string(),
    };
    output.write(&data, || {
        format!(
            "Registered user {} with root folder F:{}\n",
            chat,
            user.path.root()
        )
    })
}

fn cmd_ls(library: &Library, output: &OutputWriter, chat: ChatId) -> Result<()> {
    let listing = library
        .listing(chat)
        .with_context(|| "Failed to list folder")?;

    let text = render_listing(&listing);
    let data = LsOutput {
        success: true,
        result_code: 0,
        listing,
    };
    output.write(&data, || text)
}

fn cmd_mkdir(
    library: &Library,
    output: &OutputWriter,
    chat: ChatId,
    name: &str,
    private: bool,
) -> Result<()> {
    let id = library
        .create_folder(chat, name, private)
        .with_context(|| format!("Failed to create folder: {}", name))?;

    let data = CreatedOutput {
        success: true,
        result_code: 0,
        created: VertexRef::Folder(id),
        name: name.to_string(),
    };
    output.write(&data, || format!("Created F:{} {}\n", id, name))
}

fn cmd_add_file(
    library: &Library,
    output: &OutputWriter,
    chat: ChatId,
    name: String,
    external_ref: String,
    kind: &str,
) -> Result<()> {
    let media: MediaKind = kind
        .parse()
        .with_context(|| format!("Unknown media kind: {}", kind))?;

    let id = library
        .create_file(
            chat,
            NewFile {
                external_ref,
                name: name.clone(),
                media,
            },
        )
        .with_context(|| format!("Failed to add file: {}", name))?;

    let data = CreatedOutput {
        success: true,
        result_code: 0,
        created: VertexRef::File(id),
        name: name.clone(),
    };
    output.write(&data, || format!("Added D:{} {}\n", id, name))
}

fn cmd_cd(library: &Library, output: &OutputWriter, chat: ChatId, folder: &str) -> Result<()> {
    let digits = folder.strip_prefix("F:").unwrap_or(folder);
    let id: i64 = digits
        .parse()
        .with_context(|| format!("Invalid folder id: {}", folder))?;

    library
        .enter(chat, FolderId(id))
        .with_context(|| format!("Failed to enter folder F:{}", id))?;

    write_position(library, output, chat, true)
}

fn cmd_back(library: &Library, output: &OutputWriter, chat: ChatId) -> Result<()> {
    let moved = library
        .back(chat)
        .with_context(|| "Failed to go back")?;

    write_position(library, output, chat, moved)
}

fn write_position(
    library: &Library,
    output: &OutputWriter,
    chat: ChatId,
    moved: bool,
) -> Result<()> {
    let user = library.user(chat)?;
    let folder = library.current_folder(chat)?;

    let data = MoveOutput {
        success: true,
        result_code: 0,
        moved,
        folder: folder.id,
        path: user.path.to_string(),
    };
    output.write(&data, || {
        if moved {
            format!("Now in {} (F:{})\n", folder.name, folder.id)
        } else {
            format!("Already at the root: {} (F:{})\n", folder.name, folder.id)
        }
    })
}

fn cmd_page(
    library: &Library,
    output: &OutputWriter,
    chat: ChatId,
    direction: Direction,
) -> Result<()> {
    let turn = match direction {
        Direction::Next => PageTurn::Next,
        Direction::Prev => PageTurn::Prev,
    };
    let result = library
        .turn_page(chat, turn)
        .with_context(|| "Failed to turn page")?;

    let data = PageOutput {
        success: true,
        result_code: 0,
        result,
    };
    output.write(&data, || match result {
        PageMove::Moved(page) => format!("Page {}\n", page),
        PageMove::AtFirst => "Already on the first page\n".to_string(),
        PageMove::AtLast => "Already on the last page\n".to_string(),
    })
}

fn cmd_rm(library: &Library, output: &OutputWriter, chat: ChatId, reference: &str) -> Result<()> {
    let child: VertexRef = reference
        .parse()
        .with_context(|| format!("Invalid reference: {}", reference))?;

    let report = library
        .delete(chat, child)
        .with_context(|| format!("Failed to remove {}", child))?;
    debug!(
        removed = %child,
        folders = report.deleted_folders.len(),
        files = report.deleted_files.len(),
        "Removed child"
    );

    let text = format!(
        "Removed {} ({} folders, {} files deleted; {} still shared)\n",
        child,
        report.deleted_folders.len(),
        report.deleted_files.len(),
        report.decremented.len()
    );
    let data = RmOutput {
        success: true,
        result_code: 0,
        removed: child,
        report,
    };
    output.write(&data, || text)
}

fn cmd_delete_mode(
    library: &Library,
    output: &OutputWriter,
    chat: ChatId,
    state: Toggle,
) -> Result<()> {
    let enabled = matches!(state, Toggle::On);
    library
        .set_delete_mode(chat, enabled)
        .with_context(|| "Failed to switch delete mode")?;

    let data = DeleteModeOutput {
        success: true,
        result_code: 0,
        delete_mode: enabled,
    };
    output.write(&data, || {
        format!("Delete mode {}\n", if enabled { "on" } else { "off" })
    })
}

fn cmd_note(
    library: &Library,
    output: &OutputWriter,
    chat: ChatId,
    text: Option<&str>,
) -> Result<()> {
    library
        .set_head_text(chat, text)
        .with_context(|| "Failed to update note")?;

    let folder = library.current_folder(chat)?;
    let data = NoteOutput {
        success: true,
        result_code: 0,
        folder: folder.id,
        head_text: folder.head_text.clone(),
    };
    output.write(&data, || match text {
        Some(_) => format!("Note set on {}\n", folder.name),
        None => format!("Note cleared on {}\n", folder.name),
    })
}

fn cmd_link(library: &Library, output: &OutputWriter, chat: ChatId) -> Result<()> {
    let folder = library.current_folder(chat)?;
    let link = library
        .share_link(chat)
        .with_context(|| format!("Failed to build link for F:{}", folder.id))?;

    let data = LinkOutput {
        success: true,
        result_code: 0,
        folder: folder.id,
        link: link.clone(),
    };
    output.write(&data, || format!("{}\n", link))
}

fn cmd_attach(library: &Library, output: &OutputWriter, chat: ChatId, link: &str) -> Result<()> {
    let (folder, name) = library
        .attach_link(chat, link)
        .with_context(|| format!("Failed to attach link: {}", link))?;

    let data = AttachOutput {
        success: true,
        result_code: 0,
        folder,
        name: name.clone(),
    };
    output.write(&data, || format!("Attached {} (F:{})\n", name, folder))
}

fn cmd_file(library: &Library, output: &OutputWriter, id: FileId) -> Result<()> {
    let file = library
        .file(id)
        .with_context(|| format!("Failed to look up file D:{}", id))?;

    let text = format!(
        "D:{} {}\nKind: {}\nRef: {}\n",
        file.id, file.name, file.media, file.external_ref
    );
    let data = FileOutput {
        success: true,
        result_code: 0,
        file,
    };
    output.write(&data, || text)
}
