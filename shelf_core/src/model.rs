//! Records kept in the graph store.

use crate::error::{Error, Result};
use crate::path::{PageStack, PathStack};
use crate::vertex::{ChatId, FileId, FolderId, VertexRef};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A folder vertex, shareable between users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub author: ChatId,
    pub private: bool,
    /// Number of paths from user roots through which this folder is reachable.
    pub share_count: i64,
    pub children: Vec<VertexRef>,
    /// Note shown above the folder's contents; empty when unset.
    pub head_text: String,
}

impl Folder {
    /// Whether `chat` may change this folder's contents or note.
    ///
    /// Public folders are editable by anyone who can reach them, private
    /// ones only by their author.
    pub fn is_editable_by(&self, chat: ChatId) -> bool {
        !self.private || self.author == chat
    }
}

/// Kind of media a file leaf points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    Sticker,
    VideoNote,
}

impl MediaKind {
    /// Returns the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice",
            MediaKind::Sticker => "sticker",
            MediaKind::VideoNote => "video_note",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            "document" => Ok(MediaKind::Document),
            "audio" => Ok(MediaKind::Audio),
            "voice" => Ok(MediaKind::Voice),
            "sticker" => Ok(MediaKind::Sticker),
            "video_note" => Ok(MediaKind::VideoNote),
            _ => Err(Error::invalid_reference(format!("unknown media kind {:?}", s))),
        }
    }
}

/// A file leaf. Owned by exactly one folder and never shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileLeaf {
    pub id: FileId,
    /// Opaque reference to the media held by the transport.
    pub external_ref: String,
    pub name: String,
    pub media: MediaKind,
}

/// Fields for a new file leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub external_ref: String,
    pub name: String,
    pub media: MediaKind,
}

/// Fields for a new vertex created under the caller's current folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewVertex {
    Folder { name: String, private: bool },
    File(NewFile),
}

/// Whether the user talks from a private chat or a group.
///
/// Group chats can browse and receive files but never change the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Private => "private",
            ChatKind::Group => "group",
        }
    }

    pub fn can_edit(&self) -> bool {
        *self == ChatKind::Private
    }
}

impl FromStr for ChatKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "private" => Ok(ChatKind::Private),
            "group" => Ok(ChatKind::Group),
            _ => Err(Error::invalid_reference(format!("unknown chat kind {:?}", s))),
        }
    }
}

/// Navigation state of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub chat_id: ChatId,
    pub kind: ChatKind,
    pub path: PathStack,
    pub pages: PageStack,
    pub delete_mode: bool,
}
