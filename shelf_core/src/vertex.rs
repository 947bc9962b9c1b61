//! Vertex identifiers and the child-sequence wire format.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Identifier of a folder record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FolderId(pub i64);

/// Identifier of a file leaf record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FileId(pub i64);

/// Identifier of a user (the chat the user talks from).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed reference stored in a folder's child sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexRef {
    /// A (possibly shared) folder.
    Folder(FolderId),
    /// A file leaf.
    File(FileId),
}

impl VertexRef {
    /// Wire tag for folders.
    pub const FOLDER_TAG: &'static str = "F";
    /// Wire tag for files.
    pub const FILE_TAG: &'static str = "D";

    /// The folder id, if this is a folder reference.
    pub fn as_folder(&self) -> Option<FolderId> {
        match self {
            VertexRef::Folder(id) => Some(*id),
            VertexRef::File(_) => None,
        }
    }

    /// Raw numeric id regardless of kind.
    pub fn raw_id(&self) -> i64 {
        match self {
            VertexRef::Folder(id) => id.0,
            VertexRef::File(id) => id.0,
        }
    }
}

impl fmt::Display for VertexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VertexRef::Folder(id) => write!(f, "{}:{}", Self::FOLDER_TAG, id),
            VertexRef::File(id) => write!(f, "{}:{}", Self::FILE_TAG, id),
        }
    }
}

impl FromStr for VertexRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (tag, id) = s
            .split_once(':')
            .ok_or_else(|| Error::invalid_reference(format!("missing ':' in {:?}", s)))?;
        let id = parse_id(id, s)?;

        match tag {
            Self::FOLDER_TAG => Ok(VertexRef::Folder(FolderId(id))),
            Self::FILE_TAG => Ok(VertexRef::File(FileId(id))),
            _ => Err(Error::invalid_reference(format!(
                "unknown vertex kind {:?} in {:?}",
                tag, s
            ))),
        }
    }
}

impl Serialize for VertexRef {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Parse a non-negative decimal id out of a wire token.
pub(crate) fn parse_id(digits: &str, token: &str) -> Result<i64> {
    match digits.parse::<i64>() {
        Ok(id) if id >= 0 => Ok(id),
        _ => Err(Error::invalid_reference(format!("invalid id in {:?}", token))),
    }
}

/// Serialize a child sequence: `;`-joined tokens, empty string when empty.
pub fn encode_children(children: &[VertexRef]) -> String {
    children
        .iter()
        .map(VertexRef::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

/// Parse a child sequence written by [`encode_children`].
///
/// The empty string is the empty sequence (not a single empty token).
pub fn decode_children(text: &str) -> Result<Vec<VertexRef>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    text.split(';').map(str::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_ref_display() {
        assert_eq!(VertexRef::Folder(FolderId(12)).to_string(), "F:12");
        assert_eq!(VertexRef::File(FileId(3)).to_string(), "D:3");
    }

    #[test]
    fn test_vertex_ref_parse() {
        assert_eq!(
            "F:12".parse::<VertexRef>().unwrap(),
            VertexRef::Folder(FolderId(12))
        );
        assert_eq!("D:0".parse::<VertexRef>().unwrap(), VertexRef::File(FileId(0)));
    }

    #[test]
    fn test_vertex_ref_parse_invalid() {
        assert!("U:1".parse::<VertexRef>().is_err());
        assert!("F12".parse::<VertexRef>().is_err());
        assert!("F:".parse::<VertexRef>().is_err());
        assert!("F:-4".parse::<VertexRef>().is_err());
        assert!("D:x".parse::<VertexRef>().is_err());
    }

    #[test]
    fn test_empty_children() {
        assert_eq!(encode_children(&[]), "");
        assert!(decode_children("").unwrap().is_empty());
    }

    #[test]
    fn test_children_wire_format() {
        let children = vec![
            VertexRef::Folder(FolderId(2)),
            VertexRef::File(FileId(9)),
            VertexRef::Folder(FolderId(2)),
        ];
        let text = encode_children(&children);
        assert_eq!(text, "F:2;D:9;F:2");
        assert_eq!(decode_children(&text).unwrap(), children);
    }

    #[test]
    fn test_children_trailing_separator_rejected() {
        assert!(decode_children("F:2;").is_err());
    }

    #[test]
    fn test_as_folder() {
        assert_eq!(VertexRef::Folder(FolderId(5)).as_folder(), Some(FolderId(5)));
        assert_eq!(VertexRef::File(FileId(5)).as_folder(), None);
        assert_eq!(VertexRef::File(FileId(5)).raw_id(), 5);
    }
}
