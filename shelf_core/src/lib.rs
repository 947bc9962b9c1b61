//! # Shelf Core
//!
//! Shared folder trees for chat users, stored in SQLite.
//!
//! Every user owns a root folder. Folders hold files and other folders, and a
//! folder can be attached under several parents at once. The structure is a
//! DAG: attaching is refused when it would close a cycle.
//!
//! ## Features
//!
//! - Cycle-checked sharing of folders between users
//! - Per-folder share counts, so deletion only removes what nobody else reaches
//! - Compact share links that carry the folder id and its name
//! - Paged navigation state per user, healed when folders disappear
//! - One SQLite transaction per operation
//!
//! ## Example
//!
//! ```no_run
//! use shelf_core::{ChatId, ChatKind, Database, EngineConfig, Library};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let library = Library::new(Database::open("./shelf.db")?, EngineConfig::default());
//!
//! let alice = ChatId(1);
//! library.register_user(alice, ChatKind::Private, "alice")?;
//! let trips = library.create_folder(alice, "Trips", false)?;
//!
//! // Hand the link to someone else
//! library.enter(alice, trips)?;
//! let link = library.share_link(alice)?;
//!
//! let bob = ChatId(2);
//! library.register_user(bob, ChatKind::Private, "bob")?;
//! library.attach_link(bob, &link)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod cycle;
mod error;
mod library;
pub mod link;
mod model;
mod mutate;
mod path;
mod store;
mod vertex;

pub use config::{DEFAULT_PAGE_SIZE, DEFAULT_TRAVERSAL_LIMIT, EngineConfig};
pub use cycle::would_create_cycle;
pub use error::{Error, Result};
pub use library::{Library, Listing, ListingEntry, PageMove, PageTurn};
pub use model::{ChatKind, FileLeaf, Folder, MediaKind, NewFile, NewVertex, User};
pub use mutate::{
    Classification, DeleteReport, attach, change_count, classify, create, delete, validate_name,
};
pub use path::{PageStack, PathEntry, PathStack};
pub use store::{Database, StoreCounts, Txn};
pub use vertex::{ChatId, FileId, FolderId, VertexRef, decode_children, encode_children};
