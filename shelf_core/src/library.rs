//! The engine façade used by the chat layer.
//!
//! A [`Library`] resolves a user's navigation state, runs one graph operation
//! inside one transaction, and hands back plain data for rendering.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::link;
use crate::model::{ChatKind, FileLeaf, Folder, NewFile, NewVertex, User};
use crate::mutate::{self, DeleteReport};
use crate::path::{PageStack, PathStack};
use crate::store::{Database, Txn};
use crate::vertex::{ChatId, FileId, FolderId, VertexRef};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Direction of a page turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTurn {
    Next,
    Prev,
}

/// Result of a page turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "page", rename_all = "snake_case")]
pub enum PageMove {
    /// The cursor moved to this page.
    Moved(usize),
    /// Already on the first page.
    AtFirst,
    /// Already on the last page.
    AtLast,
}

/// One child shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub reference: VertexRef,
    pub name: String,
}

/// One page of the folder a user is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub folder: FolderId,
    pub name: String,
    pub head_text: String,
    pub private: bool,
    pub share_count: i64,
    pub is_root: bool,
    /// Whether the viewer may add, delete or change the note here.
    pub editable: bool,
    pub delete_mode: bool,
    pub page: usize,
    pub page_count: usize,
    pub total: usize,
    pub entries: Vec<ListingEntry>,
}

/// Shared-folder engine over a [`Database`].
#[derive(Debug)]
pub struct Library {
    db: Database,
    config: EngineConfig,
}

impl Library {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self { db, config }
    }

    /// Open (creating if needed) the database file at `path`.
    pub fn open<P: AsRef<std::path::Path>>(path: P, config: EngineConfig) -> Result<Self> {
        Ok(Self::new(Database::open(path)?, config))
    }

    /// A library over a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?, EngineConfig::default()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Register a user on first contact; returns the existing user otherwise.
    ///
    /// The root folder is named after the chat, keeping only characters a
    /// share link can carry and clipped to the display width. It is private
    /// for private chats. Group chats get a read-only view.
    #[instrument(skip(self, display_name))]
    pub fn register_user(&self, chat: ChatId, kind: ChatKind, display_name: &str) -> Result<User> {
        self.db.transaction(|txn| {
            if let Some(user) = txn.user(chat)? {
                return Ok(user);
            }

            let mut name: String = display_name
                .chars()
                .filter(|&ch| link::is_display_char(ch))
                .take(link::MAX_NAME_LEN)
                .collect();
            if name.trim().is_empty() {
                name = chat.to_string();
            }

            let root = txn.insert_folder(&name, chat, kind == ChatKind::Private, 1)?;
            let user = User {
                chat_id: chat,
                kind,
                path: PathStack::new(root),
                pages: PageStack::default(),
                delete_mode: false,
            };
            txn.insert_user(&user)?;

            info!(root = %root, "Registered user");
            Ok(user)
        })
    }

    pub fn user(&self, chat: ChatId) -> Result<User> {
        self.db.transaction(|txn| session(txn, chat))
    }

    /// The folder at the tip of the user's path.
    pub fn current_folder(&self, chat: ChatId) -> Result<Folder> {
        self.db.transaction(|txn| {
            let user = session(txn, chat)?;
            txn.require_folder(user.path.tip())
        })
    }

    /// The current page of the user's folder.
    ///
    /// Children whose records are gone are dropped from the folder for good.
    /// The page cursor is clamped into range, and delete mode is switched off
    /// in an empty folder.
    #[instrument(skip(self))]
    pub fn listing(&self, chat: ChatId) -> Result<Listing> {
        let page_size = self.config.page_size;

        self.db.transaction(|txn| {
            let mut user = session(txn, chat)?;
            let folder = txn.require_folder(user.path.tip())?;

            let entries = live_entries(txn, &folder)?;

            let total = entries.len();
            let page_count = total.div_ceil(page_size);
            let page = user.pages.current().clamp(1, page_count.max(1));

            let mut dirty = false;
            if page != user.pages.current() {
                user.pages.set_current(page);
                dirty = true;
            }
            if total == 0 && user.delete_mode {
                user.delete_mode = false;
                dirty = true;
            }
            if dirty {
                txn.update_user(&user)?;
            }

            let start = (page - 1) * page_size;
            let entries = entries.into_iter().skip(start).take(page_size).collect();

            Ok(Listing {
                folder: folder.id,
                name: folder.name.clone(),
                head_text: folder.head_text.clone(),
                private: folder.private,
                share_count: folder.share_count,
                is_root: user.path.is_at_root(),
                editable: user.kind.can_edit() && folder.is_editable_by(chat),
                delete_mode: user.delete_mode,
                page,
                page_count,
                total,
                entries,
            })
        })
    }

    /// Step into a child folder of the current folder.
    #[instrument(skip(self))]
    pub fn enter(&self, chat: ChatId, folder: FolderId) -> Result<()> {
        self.db.transaction(|txn| {
            let mut user = session(txn, chat)?;
            let tip = user.path.tip();

            let children = txn.children(tip)?.unwrap_or_default();
            if !children.contains(&VertexRef::Folder(folder)) {
                return Err(Error::child_not_found(VertexRef::Folder(folder).to_string(), tip.0));
            }
            if !txn.folder_exists(folder)? {
                return Err(Error::folder_not_found(folder.0));
            }

            user.path.push(folder);
            user.pages.push();
            txn.update_user(&user)
        })
    }

    /// Step back to the parent level. Returns false at the root.
    #[instrument(skip(self))]
    pub fn back(&self, chat: ChatId) -> Result<bool> {
        self.db.transaction(|txn| {
            let mut user = session(txn, chat)?;
            if !user.path.pop() {
                return Ok(false);
            }
            user.pages.pop();
            txn.update_user(&user)?;
            Ok(true)
        })
    }

    /// Move the page cursor of the current level.
    pub fn turn_page(&self, chat: ChatId, turn: PageTurn) -> Result<PageMove> {
        let page_size = self.config.page_size;

        self.db.transaction(|txn| {
            let mut user = session(txn, chat)?;
            let folder = txn.require_folder(user.path.tip())?;
            let total = live_entries(txn, &folder)?.len();
            let page_count = total.div_ceil(page_size).max(1);
            let page = user.pages.current().min(page_count);

            let next = match turn {
                PageTurn::Prev if page <= 1 => return Ok(PageMove::AtFirst),
                PageTurn::Next if page >= page_count => return Ok(PageMove::AtLast),
                PageTurn::Prev => page - 1,
                PageTurn::Next => page + 1,
            };

            user.pages.set_current(next);
            txn.update_user(&user)?;
            Ok(PageMove::Moved(next))
        })
    }

    /// Switch delete mode. Group chats can only switch it off.
    pub fn set_delete_mode(&self, chat: ChatId, enabled: bool) -> Result<()> {
        self.db.transaction(|txn| {
            let mut user = if enabled {
                editing_session(txn, chat)?
            } else {
                session(txn, chat)?
            };
            user.delete_mode = enabled;
            txn.update_user(&user)
        })
    }

    /// Set (or with `None`, clear) the note of the current folder.
    #[instrument(skip(self, text))]
    pub fn set_head_text(&self, chat: ChatId, text: Option<&str>) -> Result<()> {
        self.db.transaction(|txn| {
            let user = editing_session(txn, chat)?;
            let folder = txn.require_folder(user.path.tip())?;
            if !folder.is_editable_by(chat) {
                return Err(Error::PermissionDenied { folder: folder.id.0 });
            }
            txn.set_head_text(folder.id, text.unwrap_or(""))
        })
    }

    /// Create a folder in the current folder.
    pub fn create_folder(&self, chat: ChatId, name: &str, private: bool) -> Result<FolderId> {
        let vertex = NewVertex::Folder {
            name: name.to_string(),
            private,
        };

        let created = self.db.transaction(|txn| {
            let user = editing_session(txn, chat)?;
            mutate::create(txn, chat, &user.path, &vertex)
        })?;

        created
            .as_folder()
            .ok_or_else(|| Error::invalid_reference(format!("expected a folder, got {}", created)))
    }

    /// Add a file leaf to the current folder.
    pub fn create_file(&self, chat: ChatId, file: NewFile) -> Result<FileId> {
        let vertex = NewVertex::File(file);

        let created = self.db.transaction(|txn| {
            let user = editing_session(txn, chat)?;
            mutate::create(txn, chat, &user.path, &vertex)
        })?;

        match created {
            VertexRef::File(id) => Ok(id),
            VertexRef::Folder(_) => Err(Error::invalid_reference(format!(
                "expected a file, got {}",
                created
            ))),
        }
    }

    /// Share an existing folder into the current folder.
    pub fn attach(&self, chat: ChatId, existing: VertexRef) -> Result<()> {
        let limit = self.config.traversal_limit;
        self.db.transaction(|txn| {
            let user = editing_session(txn, chat)?;
            mutate::attach(txn, chat, &user.path, existing, limit)
        })
    }

    /// Remove a child of the current folder.
    pub fn delete(&self, chat: ChatId, child: VertexRef) -> Result<DeleteReport> {
        let limit = self.config.traversal_limit;
        self.db.transaction(|txn| {
            let user = editing_session(txn, chat)?;
            mutate::delete(txn, chat, &user.path, child, limit)
        })
    }

    /// The share link for the current folder.
    pub fn share_link(&self, chat: ChatId) -> Result<String> {
        let folder = self.current_folder(chat)?;
        link::encode(folder.id, &folder.name)
    }

    /// Attach the folder named by a share link into the current folder.
    ///
    /// Returns the attached folder's id and current name.
    #[instrument(skip(self, text))]
    pub fn attach_link(&self, chat: ChatId, text: &str) -> Result<(FolderId, String)> {
        let (id, _) = link::decode(text.trim())?;
        let limit = self.config.traversal_limit;

        self.db.transaction(|txn| {
            let user = editing_session(txn, chat)?;
            let folder = txn
                .folder(id)?
                .ok_or_else(|| Error::invalid_link("link does not point at a folder"))?;

            mutate::attach(txn, chat, &user.path, VertexRef::Folder(id), limit)?;
            Ok((id, folder.name))
        })
    }

    /// Look up a file leaf for delivery.
    pub fn file(&self, id: FileId) -> Result<FileLeaf> {
        self.db
            .transaction(|txn| txn.file(id)?.ok_or_else(|| Error::file_not_found(id.0)))
    }
}

/// Load a user and repair navigation state that points at deleted folders.
///
/// A path whose tip no longer exists falls back to the root, and the page
/// stack is kept as deep as the path.
fn session(txn: &Txn<'_>, chat: ChatId) -> Result<User> {
    let mut user = txn.require_user(chat)?;
    let mut dirty = false;

    if !user.path.is_at_root() && !txn.folder_exists(user.path.tip())? {
        warn!(%chat, path = %user.path, "Current folder is gone, returning to root");
        user.path.reset();
        user.pages = PageStack::default();
        dirty = true;
    }

    if user.pages.depth() != user.path.depth() {
        user.pages.align_to(user.path.depth());
        dirty = true;
    }

    if dirty {
        txn.update_user(&user)?;
    }
    Ok(user)
}

/// A session for an operation that changes the tree.
///
/// Group chats are read-only and get `PermissionDenied` on their current
/// folder.
fn editing_session(txn: &Txn<'_>, chat: ChatId) -> Result<User> {
    let user = session(txn, chat)?;
    if !user.kind.can_edit() {
        return Err(Error::PermissionDenied {
            folder: user.path.tip().0,
        });
    }
    Ok(user)
}

/// Children of `folder` whose records still exist, with their names.
///
/// Stale edges are dropped from the folder for good.
fn live_entries(txn: &Txn<'_>, folder: &Folder) -> Result<Vec<ListingEntry>> {
    let mut entries = Vec::with_capacity(folder.children.len());
    for child in &folder.children {
        let name = match child {
            VertexRef::Folder(id) => txn.folder(*id)?.map(|f| f.name),
            VertexRef::File(id) => txn.file(*id)?.map(|f| f.name),
        };
        match name {
            Some(name) => entries.push(ListingEntry {
                reference: *child,
                name,
            }),
            None => warn!(folder = %folder.id, %child, "Pruning stale child"),
        }
    }

    if entries.len() != folder.children.len() {
        let live: Vec<VertexRef> = entries.iter().map(|e| e.reference).collect();
        txn.set_children(folder.id, &live)?;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaKind;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    const ALICE: ChatId = ChatId(100);
    const BOB: ChatId = ChatId(200);

    fn library() -> Library {
        let library = Library::open_in_memory().unwrap();
        library.register_user(ALICE, ChatKind::Private, "alice").unwrap();
        library.register_user(BOB, ChatKind::Private, "bob").unwrap();
        library
    }

    fn media(name: &str) -> NewFile {
        NewFile {
            external_ref: format!("file-{}", name),
            name: name.to_string(),
            media: MediaKind::Photo,
        }
    }

    #[test]
    fn test_register_user_is_idempotent() {
        let library = Library::open_in_memory().unwrap();
        let first = library.register_user(ALICE, ChatKind::Private, "alice").unwrap();
        let second = library.register_user(ALICE, ChatKind::Private, "other").unwrap();
        assert_eq!(first, second);

        let root = library.current_folder(ALICE).unwrap();
        assert_eq!(root.name, "alice");
        assert_eq!(root.author, ALICE);
        assert!(root.private);
        assert_eq!(root.share_count, 1);
    }

    #[test]
    fn test_register_clips_long_names() {
        let library = Library::open_in_memory().unwrap();
        library
            .register_user(ChatId(5), ChatKind::Group, &"g".repeat(80))
            .unwrap();
        let root = library.current_folder(ChatId(5)).unwrap();
        assert_eq!(root.name.chars().count(), 50);
        assert!(!root.private);

        library.register_user(ChatId(6), ChatKind::Group, "   ").unwrap();
        assert_eq!(library.current_folder(ChatId(6)).unwrap().name, "6");
    }

    #[test]
    fn test_register_drops_unlinkable_characters() {
        let library = Library::open_in_memory().unwrap();
        library
            .register_user(ChatId(7), ChatKind::Private, "Anna 🌸 К.")
            .unwrap();
        assert_eq!(library.current_folder(ChatId(7)).unwrap().name, "Anna  К.");
        let link = library.share_link(ChatId(7)).unwrap();
        assert_eq!(link::decode(&link).unwrap().1, "Anna  К.");

        library.register_user(ChatId(-8), ChatKind::Group, "🌸🌸").unwrap();
        assert_eq!(library.current_folder(ChatId(-8)).unwrap().name, "-8");
    }

    #[test]
    fn test_group_chats_are_read_only() {
        let library = library();
        let group = ChatId(-5);
        library.register_user(group, ChatKind::Group, "team").unwrap();
        assert_eq!(library.user(group).unwrap().kind, ChatKind::Group);

        let listing = library.listing(group).unwrap();
        assert!(!listing.private);
        assert!(!listing.editable);

        let denied = |result: Result<()>| matches!(result, Err(Error::PermissionDenied { .. }));
        assert!(denied(library.create_folder(group, "x", false).map(|_| ())));
        assert!(denied(library.create_file(group, media("p")).map(|_| ())));
        assert!(denied(library.set_head_text(group, Some("hi"))));
        assert!(denied(library.set_delete_mode(group, true)));
        library.set_delete_mode(group, false).unwrap();

        let docs = library.create_folder(ALICE, "Docs", false).unwrap();
        assert!(denied(library.attach(group, VertexRef::Folder(docs))));
        library.enter(ALICE, docs).unwrap();
        let link = library.share_link(ALICE).unwrap();
        assert!(denied(library.attach_link(group, &link).map(|_| ())));
        assert_eq!(library.current_folder(ALICE).unwrap().share_count, 1);

        assert!(denied(library.delete(group, VertexRef::Folder(docs)).map(|_| ())));
        assert!(library.current_folder(group).unwrap().children.is_empty());
    }

    #[test]
    fn test_unknown_user() {
        let library = Library::open_in_memory().unwrap();
        assert!(matches!(
            library.listing(ChatId(1)),
            Err(Error::UserNotFound { chat_id: 1 })
        ));
    }

    #[test]
    fn test_navigation() {
        let library = library();
        let trips = library.create_folder(ALICE, "Trips", false).unwrap();

        library.enter(ALICE, trips).unwrap();
        let user = library.user(ALICE).unwrap();
        assert_eq!(user.path.tip(), trips);
        assert_eq!(user.pages.depth(), 2);

        let listing = library.listing(ALICE).unwrap();
        assert_eq!(listing.name, "Trips");
        assert!(!listing.is_root);

        assert!(library.back(ALICE).unwrap());
        assert!(!library.back(ALICE).unwrap());
        assert!(library.user(ALICE).unwrap().path.is_at_root());
    }

    #[test]
    fn test_enter_requires_child() {
        let library = library();
        let bobs = library.create_folder(BOB, "Bob's", false).unwrap();
        assert!(matches!(
            library.enter(ALICE, bobs),
            Err(Error::ChildNotFound { .. })
        ));
    }

    #[test]
    fn test_listing_pages() {
        let library = Library::new(
            Database::open_in_memory().unwrap(),
            EngineConfig::default().with_page_size(3),
        );
        library.register_user(ALICE, ChatKind::Private, "alice").unwrap();
        for i in 0..7 {
            library.create_file(ALICE, media(&format!("p{}", i))).unwrap();
        }

        let listing = library.listing(ALICE).unwrap();
        assert_eq!(listing.page, 1);
        assert_eq!(listing.page_count, 3);
        assert_eq!(listing.total, 7);
        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["p0", "p1", "p2"]);

        assert_eq!(library.turn_page(ALICE, PageTurn::Prev).unwrap(), PageMove::AtFirst);
        assert_eq!(library.turn_page(ALICE, PageTurn::Next).unwrap(), PageMove::Moved(2));
        assert_eq!(library.turn_page(ALICE, PageTurn::Next).unwrap(), PageMove::Moved(3));
        assert_eq!(library.turn_page(ALICE, PageTurn::Next).unwrap(), PageMove::AtLast);

        let last = library.listing(ALICE).unwrap();
        assert_eq!(last.page, 3);
        assert_eq!(last.entries.len(), 1);
        assert_eq!(last.entries[0].name, "p6");
    }

    #[test]
    fn test_listing_clamps_page_after_deletes() {
        let library = Library::new(
            Database::open_in_memory().unwrap(),
            EngineConfig::default().with_page_size(2),
        );
        library.register_user(ALICE, ChatKind::Private, "alice").unwrap();
        let files: Vec<FileId> = (0..3)
            .map(|i| library.create_file(ALICE, media(&i.to_string())).unwrap())
            .collect();
        library.turn_page(ALICE, PageTurn::Next).unwrap();

        library.delete(ALICE, VertexRef::File(files[2])).unwrap();
        let listing = library.listing(ALICE).unwrap();
        assert_eq!(listing.page, 1);
        assert_eq!(library.user(ALICE).unwrap().pages.current(), 1);
    }

    #[test]
    fn test_turn_page_ignores_stale_children() {
        let library = Library::new(
            Database::open_in_memory().unwrap(),
            EngineConfig::default().with_page_size(2),
        );
        library.register_user(ALICE, ChatKind::Private, "alice").unwrap();
        let files: Vec<FileId> = (0..3)
            .map(|i| library.create_file(ALICE, media(&i.to_string())).unwrap())
            .collect();

        // The third record vanishes: one page remains.
        library
            .database()
            .transaction(|txn| txn.delete_files(&files[2..]))
            .unwrap();

        assert_eq!(library.turn_page(ALICE, PageTurn::Next).unwrap(), PageMove::AtLast);
        let listing = library.listing(ALICE).unwrap();
        assert_eq!(listing.page_count, 1);
        assert_eq!(library.current_folder(ALICE).unwrap().children.len(), 2);
    }

    #[test]
    fn test_listing_prunes_stale_children_and_delete_mode() {
        let library = library();
        let shared = library.create_folder(ALICE, "shared", false).unwrap();
        library.attach(BOB, VertexRef::Folder(shared)).unwrap();

        // Remove the record behind Bob's back.
        library
            .database()
            .transaction(|txn| txn.delete_folders(&[shared]))
            .unwrap();

        library.set_delete_mode(BOB, true).unwrap();
        let listing = library.listing(BOB).unwrap();
        assert!(listing.entries.is_empty());
        assert!(!listing.delete_mode);

        let root = library.current_folder(BOB).unwrap();
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_stale_tip_returns_to_root() {
        let library = library();
        let shared = library.create_folder(ALICE, "shared", false).unwrap();
        library.attach(BOB, VertexRef::Folder(shared)).unwrap();
        library.enter(BOB, shared).unwrap();

        library
            .database()
            .transaction(|txn| txn.delete_folders(&[shared]))
            .unwrap();

        let user = library.user(BOB).unwrap();
        assert!(user.path.is_at_root());
        assert_eq!(user.pages, PageStack::default());
    }

    #[test]
    fn test_shared_folder_lifecycle() {
        let library = library();
        let docs = library.create_folder(ALICE, "Docs", false).unwrap();
        library.enter(ALICE, docs).unwrap();
        let scan = library.create_file(ALICE, media("scan")).unwrap();
        library.back(ALICE).unwrap();

        let link = library.share_link(ALICE).unwrap();
        assert_eq!(link::decode(&link).unwrap().1, "alice");

        library.enter(ALICE, docs).unwrap();
        let docs_link = library.share_link(ALICE).unwrap();
        let (id, name) = library.attach_link(BOB, &docs_link).unwrap();
        assert_eq!((id, name.as_str()), (docs, "Docs"));
        assert_eq!(library.current_folder(ALICE).unwrap().share_count, 2);

        // Alice drops her edge: Bob still sees the folder and its file.
        library.back(ALICE).unwrap();
        let report = library.delete(ALICE, VertexRef::Folder(docs)).unwrap();
        assert!(report.deleted_folders.is_empty());
        assert_eq!(report.decremented, vec![docs]);
        assert_eq!(library.file(scan).unwrap().name, "scan");

        // Bob drops the last edge: everything goes.
        let report = library.delete(BOB, VertexRef::Folder(docs)).unwrap();
        assert_eq!(report.deleted_folders, vec![docs]);
        assert_eq!(report.deleted_files, vec![scan]);
        assert!(matches!(library.file(scan), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_cycle_rejected_without_side_effects() {
        let library = library();
        let x = library.create_folder(ALICE, "X", false).unwrap();
        library.enter(ALICE, x).unwrap();
        let inner = library.create_folder(ALICE, "inner", false).unwrap();
        library.enter(ALICE, inner).unwrap();

        let result = library.attach(ALICE, VertexRef::Folder(x));
        assert!(matches!(result, Err(Error::Cycle { .. })));
        assert!(result.unwrap_err().is_rejection());

        assert!(library.current_folder(ALICE).unwrap().children.is_empty());
        let counts = library.database().transaction(|txn| txn.share_counts()).unwrap();
        assert!(counts.iter().all(|(_, count)| *count == 1));
    }

    #[test]
    fn test_attach_link_rejects_garbage_and_dangling() {
        let library = library();
        assert!(matches!(
            library.attach_link(BOB, "not a link"),
            Err(Error::InvalidLink { .. })
        ));

        let dangling = link::encode(FolderId(9999), "ghost").unwrap();
        assert!(matches!(
            library.attach_link(BOB, &dangling),
            Err(Error::InvalidLink { .. })
        ));
    }

    #[test]
    fn test_private_folder_rules() {
        let library = library();
        let secret = library.create_folder(ALICE, "secret", true).unwrap();
        let link = link::encode(secret, "secret").unwrap();

        assert!(matches!(
            library.attach_link(BOB, &link),
            Err(Error::PrivateFolder { .. })
        ));

        // Private roots cannot be shared either.
        let alice_root = library.user(ALICE).unwrap().path.root();
        assert!(matches!(
            library.attach(BOB, VertexRef::Folder(alice_root)),
            Err(Error::PrivateFolder { .. })
        ));

        // The author still nests her own private folder elsewhere.
        let other = library.create_folder(ALICE, "other", false).unwrap();
        library.enter(ALICE, other).unwrap();
        library.attach(ALICE, VertexRef::Folder(secret)).unwrap();
    }

    #[test]
    fn test_private_folder_is_read_only_to_others() {
        let library = library();
        let secret = library.create_folder(ALICE, "secret", true).unwrap();
        let open = library.create_folder(ALICE, "open", false).unwrap();
        library.enter(ALICE, open).unwrap();
        library.attach(ALICE, VertexRef::Folder(secret)).unwrap();
        library.back(ALICE).unwrap();

        // Bob reaches the private folder through the open one.
        library.attach(BOB, VertexRef::Folder(open)).unwrap();
        library.enter(BOB, open).unwrap();
        library.enter(BOB, secret).unwrap();

        let listing = library.listing(BOB).unwrap();
        assert!(!listing.editable);
        assert!(matches!(
            library.create_folder(BOB, "mine", false),
            Err(Error::PermissionDenied { .. })
        ));
        assert!(matches!(
            library.set_head_text(BOB, Some("hi")),
            Err(Error::PermissionDenied { .. })
        ));
    }

    #[test]
    fn test_json_shapes() {
        let moved = serde_json::to_value(PageMove::Moved(3)).unwrap();
        assert_eq!(moved, serde_json::json!({"status": "moved", "page": 3}));
        let last = serde_json::to_value(PageMove::AtLast).unwrap();
        assert_eq!(last, serde_json::json!({"status": "at_last"}));

        let entry = ListingEntry {
            reference: VertexRef::File(FileId(7)),
            name: "scan".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({"reference": "D:7", "name": "scan"})
        );
    }

    #[test]
    fn test_head_text() {
        let library = library();
        library.set_head_text(ALICE, Some("Read me first")).unwrap();
        assert_eq!(library.listing(ALICE).unwrap().head_text, "Read me first");

        library.set_head_text(ALICE, None).unwrap();
        assert_eq!(library.listing(ALICE).unwrap().head_text, "");
    }

    #[test]
    fn test_concurrent_attach_and_delete() {
        let library = Arc::new(library());
        let shared = library.create_folder(ALICE, "shared", false).unwrap();
        library.enter(ALICE, shared).unwrap();
        library.create_folder(ALICE, "inner", false).unwrap();
        library.back(ALICE).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let library = Arc::clone(&library);
                thread::spawn(move || {
                    let chat = ChatId(1000 + i);
                    library
                        .register_user(chat, ChatKind::Private, &format!("u{}", i))
                        .unwrap();
                    for _ in 0..5 {
                        library.attach(chat, VertexRef::Folder(shared)).unwrap();
                        library.delete(chat, VertexRef::Folder(shared)).unwrap();
                    }
                    library.attach(chat, VertexRef::Folder(shared)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let folder = library
            .database()
            .transaction(|txn| txn.require_folder(shared))
            .unwrap();
        assert_eq!(folder.share_count, 5);
        let inner = folder.children[0].as_folder().unwrap();
        let inner_count = library
            .database()
            .transaction(|txn| txn.share_count(inner))
            .unwrap();
        assert_eq!(inner_count, Some(5));
    }

    #[test]
    fn test_file_backed_library() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shelf.db");

        {
            let library = Library::open(&path, EngineConfig::default()).unwrap();
            library.register_user(ALICE, ChatKind::Private, "alice").unwrap();
            library.create_folder(ALICE, "kept", false).unwrap();
        }

        let library = Library::open(&path, EngineConfig::default()).unwrap();
        let listing = library.listing(ALICE).unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].name, "kept");
    }
}
