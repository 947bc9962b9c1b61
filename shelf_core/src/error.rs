//! Error types for shelf_core.

use thiserror::Error;

/// Result type alias using shelf_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during graph operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error from the backing store.
    #[error("Storage error: {source}")]
    Storage {
        #[from]
        source: rusqlite::Error,
    },

    /// I/O error occurred while preparing the database location.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Attaching the folder would make it reachable from itself.
    #[error("Folder {folder} cannot be attached here: it would contain itself")]
    Cycle { folder: i64 },

    /// Name is longer than the fixed display width.
    #[error("Name too long: {len} characters (max {max})")]
    NameTooLong { len: usize, max: usize },

    /// Name is empty.
    #[error("Name cannot be empty")]
    EmptyName,

    /// Character has no place in the display alphabet.
    #[error("Unsupported character {ch:?} in name")]
    UnsupportedCharacter { ch: char },

    /// Referenced vertex does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    /// Referenced vertex is not a child of the current folder.
    #[error("{reference} is not in folder {folder}")]
    ChildNotFound { reference: String, folder: i64 },

    /// No user registered for this chat.
    #[error("User not found: {chat_id}")]
    UserNotFound { chat_id: i64 },

    /// Malformed vertex, path or page wire text.
    #[error("Invalid reference: {reason}")]
    InvalidReference { reason: String },

    /// Malformed or dangling share link.
    #[error("Invalid link: {reason}")]
    InvalidLink { reason: String },

    /// Only folders can be shared.
    #[error("{reference} cannot be shared")]
    NotShareable { reference: String },

    /// Private folder attached by someone other than its author.
    #[error("Folder {folder} is private")]
    PrivateFolder { folder: i64 },

    /// Caller may not modify this folder.
    #[error("Folder {folder} is private to its author")]
    PermissionDenied { folder: i64 },

    /// Traversal visited more vertices than the configured limit.
    #[error("Traversal exceeded {limit} vertices")]
    TraversalLimit { limit: usize },
}

impl Error {
    /// Create a Cycle error.
    pub fn cycle(folder: i64) -> Self {
        Error::Cycle { folder }
    }

    /// Create a NameTooLong error.
    pub fn name_too_long(len: usize, max: usize) -> Self {
        Error::NameTooLong { len, max }
    }

    /// Create a NotFound error for a folder.
    pub fn folder_not_found(id: i64) -> Self {
        Error::NotFound { kind: "Folder", id }
    }

    /// Create a NotFound error for a file.
    pub fn file_not_found(id: i64) -> Self {
        Error::NotFound { kind: "File", id }
    }

    /// Create a ChildNotFound error.
    pub fn child_not_found(reference: impl Into<String>, folder: i64) -> Self {
        Error::ChildNotFound {
            reference: reference.into(),
            folder,
        }
    }

    /// Create a UserNotFound error.
    pub fn user_not_found(chat_id: i64) -> Self {
        Error::UserNotFound { chat_id }
    }

    /// Create an InvalidReference error.
    pub fn invalid_reference(reason: impl Into<String>) -> Self {
        Error::InvalidReference {
            reason: reason.into(),
        }
    }

    /// Create an InvalidLink error.
    pub fn invalid_link(reason: impl Into<String>) -> Self {
        Error::InvalidLink {
            reason: reason.into(),
        }
    }

    /// Create a NotShareable error.
    pub fn not_shareable(reference: impl Into<String>) -> Self {
        Error::NotShareable {
            reference: reference.into(),
        }
    }

    /// Whether this error is a rejection of user input rather than a fault.
    ///
    /// Rejections leave storage untouched and should be shown to the user
    /// as-is.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Error::Storage { .. }
                | Error::Io { .. }
                | Error::InvalidReference { .. }
                | Error::TraversalLimit { .. }
        )
    }
}
