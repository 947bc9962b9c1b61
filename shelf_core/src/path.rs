//! Per-user navigation state: the path stack and its page cursors.

use crate::error::{Error, Result};
use crate::vertex::{FolderId, parse_id};
use std::fmt;
use std::str::FromStr;

/// One level of a user's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEntry {
    /// The user's own root folder (`U:<id>`).
    Root(FolderId),
    /// A folder entered from the level below (`F:<id>`).
    Folder(FolderId),
}

impl PathEntry {
    /// The folder this level points at.
    pub fn folder(&self) -> FolderId {
        match self {
            PathEntry::Root(id) | PathEntry::Folder(id) => *id,
        }
    }
}

impl fmt::Display for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathEntry::Root(id) => write!(f, "U:{}", id),
            PathEntry::Folder(id) => write!(f, "F:{}", id),
        }
    }
}

/// A user's navigation stack, root first.
///
/// Never empty: the first entry is always [`PathEntry::Root`] and popping at
/// the root does nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStack {
    entries: Vec<PathEntry>,
}

impl PathStack {
    /// A path sitting at the given root folder.
    pub fn new(root: FolderId) -> Self {
        Self {
            entries: vec![PathEntry::Root(root)],
        }
    }

    /// The root folder of the path.
    pub fn root(&self) -> FolderId {
        self.entries[0].folder()
    }

    /// The folder currently being navigated.
    pub fn tip(&self) -> FolderId {
        self.entries[self.entries.len() - 1].folder()
    }

    /// Number of levels, root included.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Whether the path is at its root.
    pub fn is_at_root(&self) -> bool {
        self.entries.len() == 1
    }

    /// Every folder id on the path, root first (the ancestor chain).
    pub fn ancestor_ids(&self) -> Vec<FolderId> {
        self.entries.iter().map(PathEntry::folder).collect()
    }

    /// Descend into a folder.
    pub fn push(&mut self, folder: FolderId) {
        self.entries.push(PathEntry::Folder(folder));
    }

    /// Go up one level. Returns false when already at the root.
    pub fn pop(&mut self) -> bool {
        if self.is_at_root() {
            return false;
        }
        self.entries.pop();
        true
    }

    /// Drop everything above the root.
    pub fn reset(&mut self) {
        self.entries.truncate(1);
    }
}

impl fmt::Display for PathStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("\\")?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

impl FromStr for PathStack {
    type Err = Error;

    /// Parse `U:<root>\F:<id>\...`.
    fn from_str(s: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for (i, token) in s.split('\\').enumerate() {
            let (tag, id) = token
                .split_once(':')
                .ok_or_else(|| Error::invalid_reference(format!("bad path token {:?}", token)))?;
            let id = FolderId(parse_id(id, token)?);

            let entry = match (i, tag) {
                (0, "U") => PathEntry::Root(id),
                (0, _) => {
                    return Err(Error::invalid_reference(format!(
                        "path must start at a root, got {:?}",
                        token
                    )));
                }
                (_, "F") => PathEntry::Folder(id),
                _ => {
                    return Err(Error::invalid_reference(format!(
                        "bad path token {:?}",
                        token
                    )));
                }
            };
            entries.push(entry);
        }

        Ok(Self { entries })
    }
}

/// Page cursors, one per path level (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStack {
    pages: Vec<usize>,
}

impl Default for PageStack {
    fn default() -> Self {
        Self { pages: vec![1] }
    }
}

impl PageStack {
    /// Cursor for the current level.
    pub fn current(&self) -> usize {
        self.pages[self.pages.len() - 1]
    }

    /// Overwrite the cursor for the current level.
    pub fn set_current(&mut self, page: usize) {
        let last = self.pages.len() - 1;
        self.pages[last] = page.max(1);
    }

    /// Open a new level at page 1.
    pub fn push(&mut self) {
        self.pages.push(1);
    }

    /// Close the current level; the root level is kept.
    pub fn pop(&mut self) {
        if self.pages.len() > 1 {
            self.pages.pop();
        }
    }

    /// Make the stack exactly `depth` levels deep, padding with page 1.
    pub fn align_to(&mut self, depth: usize) {
        let depth = depth.max(1);
        self.pages.resize(depth, 1);
    }

    /// Number of levels.
    pub fn depth(&self) -> usize {
        self.pages.len()
    }
}

impl fmt::Display for PageStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: Vec<String> = self.pages.iter().map(usize::to_string).collect();
        f.write_str(&text.join("\\"))
    }
}

impl FromStr for PageStack {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let pages = s
            .split('\\')
            .map(|token| match token.parse::<usize>() {
                Ok(page) if page >= 1 => Ok(page),
                _ => Err(Error::invalid_reference(format!("bad page cursor {:?}", token))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { pages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_path_is_at_root() {
        let path = PathStack::new(FolderId(4));
        assert!(path.is_at_root());
        assert_eq!(path.root(), FolderId(4));
        assert_eq!(path.tip(), FolderId(4));
        assert_eq!(path.to_string(), "U:4");
    }

    #[test]
    fn test_push_pop() {
        let mut path = PathStack::new(FolderId(1));
        path.push(FolderId(5));
        path.push(FolderId(9));
        assert_eq!(path.tip(), FolderId(9));
        assert_eq!(path.depth(), 3);
        assert_eq!(path.to_string(), "U:1\\F:5\\F:9");

        assert!(path.pop());
        assert!(path.pop());
        assert!(!path.pop());
        assert_eq!(path.tip(), FolderId(1));
    }

    #[test]
    fn test_ancestor_ids() {
        let mut path = PathStack::new(FolderId(1));
        path.push(FolderId(5));
        assert_eq!(path.ancestor_ids(), vec![FolderId(1), FolderId(5)]);
    }

    #[test]
    fn test_reset() {
        let mut path: PathStack = "U:1\\F:2\\F:3".parse().unwrap();
        path.reset();
        assert_eq!(path, PathStack::new(FolderId(1)));
    }

    #[test]
    fn test_parse_path() {
        let path: PathStack = "U:1\\F:2".parse().unwrap();
        assert_eq!(path.ancestor_ids(), vec![FolderId(1), FolderId(2)]);

        assert!("F:1".parse::<PathStack>().is_err());
        assert!("U:1\\U:2".parse::<PathStack>().is_err());
        assert!("U:1\\D:2".parse::<PathStack>().is_err());
        assert!("".parse::<PathStack>().is_err());
    }

    #[test]
    fn test_page_stack() {
        let mut pages = PageStack::default();
        assert_eq!(pages.to_string(), "1");

        pages.set_current(3);
        pages.push();
        assert_eq!(pages.to_string(), "3\\1");

        pages.pop();
        pages.pop();
        assert_eq!(pages.current(), 3);
        assert_eq!(pages.depth(), 1);
    }

    #[test]
    fn test_page_stack_parse_and_align() {
        let mut pages: PageStack = "2\\4".parse().unwrap();
        assert_eq!(pages.current(), 4);

        pages.align_to(4);
        assert_eq!(pages.to_string(), "2\\4\\1\\1");
        pages.align_to(1);
        assert_eq!(pages.to_string(), "2");

        assert!("0".parse::<PageStack>().is_err());
        assert!("1\\".parse::<PageStack>().is_err());
    }
}
