//! Graph mutations: create, attach, delete and share-count propagation.
//!
//! Every function here runs inside a caller-supplied [`Txn`] and never
//! commits on its own, so a failure at any step leaves the store untouched
//! once the transaction is dropped. Traversals use explicit stacks and stop
//! with `TraversalLimit` after `limit` vertex visits.

use crate::cycle::would_create_cycle;
use crate::error::{Error, Result};
use crate::link::{self, MAX_NAME_LEN};
use crate::model::{Folder, NewVertex};
use crate::path::PathStack;
use crate::store::Txn;
use crate::vertex::{ChatId, FileId, FolderId, VertexRef};
use serde::Serialize;
use tracing::{debug, instrument};

/// Outcome of [`delete`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    /// Folders physically removed.
    pub deleted_folders: Vec<FolderId>,
    /// File leaves physically removed.
    pub deleted_files: Vec<FileId>,
    /// Still-shared folders whose subtree share counts were decremented.
    pub decremented: Vec<FolderId>,
}

/// Sets produced by the classification pass of a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub delete_folders: Vec<FolderId>,
    pub delete_files: Vec<FileId>,
    pub decrement: Vec<FolderId>,
}

/// Check a folder name against the display width.
pub fn validate_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 {
        return Err(Error::EmptyName);
    }
    if len > MAX_NAME_LEN {
        return Err(Error::name_too_long(len, MAX_NAME_LEN));
    }
    Ok(())
}

/// The folder at the path tip, checked for write access by `caller`.
fn editable_tip(txn: &Txn<'_>, caller: ChatId, path: &PathStack) -> Result<Folder> {
    let parent = txn.require_folder(path.tip())?;
    if !parent.is_editable_by(caller) {
        return Err(Error::PermissionDenied { folder: parent.id.0 });
    }
    Ok(parent)
}

fn tick(visits: &mut usize, limit: usize) -> Result<()> {
    *visits += 1;
    if *visits > limit {
        return Err(Error::TraversalLimit { limit });
    }
    Ok(())
}

/// Create a folder or file leaf as the last child of the path tip.
///
/// A new folder starts with the parent's share count: it is reachable
/// through exactly the paths that reach its parent.
#[instrument(skip(txn, vertex), fields(parent = %path.tip()))]
pub fn create(
    txn: &Txn<'_>,
    caller: ChatId,
    path: &PathStack,
    vertex: &NewVertex,
) -> Result<VertexRef> {
    let mut parent = editable_tip(txn, caller, path)?;

    let child = match vertex {
        NewVertex::Folder { name, private } => {
            validate_name(name)?;
            link::check_display(name)?;
            let id = txn.insert_folder(name, caller, *private, parent.share_count)?;
            VertexRef::Folder(id)
        }
        NewVertex::File(file) => {
            if file.name.is_empty() {
                return Err(Error::EmptyName);
            }
            VertexRef::File(txn.insert_file(file)?)
        }
    };

    parent.children.push(child);
    txn.set_children(parent.id, &parent.children)?;

    debug!(%child, "Created vertex");
    Ok(child)
}

/// Attach an existing folder under the path tip, sharing it.
///
/// Rejected with `Cycle` when the folder can reach any folder on the path.
/// On success every folder in the attached subtree gains one share.
#[instrument(skip(txn), fields(parent = %path.tip()))]
pub fn attach(
    txn: &Txn<'_>,
    caller: ChatId,
    path: &PathStack,
    existing: VertexRef,
    limit: usize,
) -> Result<()> {
    let VertexRef::Folder(folder_id) = existing else {
        return Err(Error::not_shareable(existing.to_string()));
    };

    let mut parent = editable_tip(txn, caller, path)?;

    let target = txn.require_folder(folder_id)?;
    if target.private && target.author != caller {
        return Err(Error::PrivateFolder { folder: folder_id.0 });
    }

    if would_create_cycle(txn, &[folder_id], &path.ancestor_ids(), limit)? {
        return Err(Error::cycle(folder_id.0));
    }

    parent.children.push(existing);
    txn.set_children(parent.id, &parent.children)?;
    let updated = change_count(txn, existing, 1, limit)?;

    debug!(folder = %folder_id, updated, "Attached folder");
    Ok(())
}

/// Add `delta` to the share count of every folder under `root`, root included.
///
/// A folder reached along several edges is adjusted once per edge. Files and
/// folders that no longer exist are skipped. Returns the number of updates.
pub fn change_count(txn: &Txn<'_>, root: VertexRef, delta: i64, limit: usize) -> Result<usize> {
    let mut stack = vec![root];
    let mut visits = 0;

    while let Some(vertex) = stack.pop() {
        let VertexRef::Folder(id) = vertex else {
            continue;
        };
        let Some(folder) = txn.folder(id)? else {
            continue;
        };
        tick(&mut visits, limit)?;

        txn.set_share_count(id, folder.share_count + delta)?;
        stack.extend(folder.children.iter().rev());
    }

    Ok(visits)
}

/// Decide what removing the edge to `root` destroys.
///
/// Files are always deleted. A folder shared more than once is only
/// decremented, and its subtree is left for [`change_count`]. Any other folder
/// is deleted and its children are classified in turn.
pub fn classify(txn: &Txn<'_>, root: VertexRef, limit: usize) -> Result<Classification> {
    let mut classes = Classification::default();
    let mut stack = vec![root];
    let mut visits = 0;

    while let Some(vertex) = stack.pop() {
        tick(&mut visits, limit)?;

        let id = match vertex {
            VertexRef::File(id) => {
                classes.delete_files.push(id);
                continue;
            }
            VertexRef::Folder(id) => id,
        };
        let Some(folder) = txn.folder(id)? else {
            continue;
        };

        if folder.share_count > 1 {
            classes.decrement.push(id);
            continue;
        }

        classes.delete_folders.push(id);
        stack.extend(folder.children.iter().rev());
    }

    Ok(classes)
}

/// Remove folders that nothing reaches any more, starting from the
/// decremented folders of a delete.
///
/// A folder goes when its count is spent, or when no folder lists it as a
/// child and it is not a user's root. The second case covers folders whose
/// count was inherited from a shared parent: removing their only edge takes
/// away a single share. Children of a removed folder are checked in turn.
fn sweep_unreachable(
    txn: &Txn<'_>,
    candidates: &[FolderId],
    limit: usize,
    report: &mut DeleteReport,
) -> Result<()> {
    let mut stack: Vec<FolderId> = candidates.to_vec();
    let mut visits = 0;

    while let Some(id) = stack.pop() {
        let Some(folder) = txn.folder(id)? else {
            continue;
        };
        tick(&mut visits, limit)?;

        if txn.is_user_root(id)? {
            continue;
        }
        if folder.share_count > 0 && txn.is_referenced(id)? {
            continue;
        }

        debug!(folder = %id, count = folder.share_count, "Sweeping unreachable folder");
        txn.delete_folders(&[id])?;
        report.deleted_folders.push(id);

        for child in folder.children.iter().rev() {
            match child {
                VertexRef::File(file) => {
                    txn.delete_files(&[*file])?;
                    report.deleted_files.push(*file);
                }
                VertexRef::Folder(sub) => stack.push(*sub),
            }
        }
    }

    Ok(())
}

/// Remove `child` from the path tip and destroy whatever becomes unreachable.
///
/// Order of effects: the edge is removed, exclusively owned folders and
/// files are deleted, each still-shared folder found on the way has its
/// subtree decremented by one share, then folders left unreachable are swept.
#[instrument(skip(txn), fields(parent = %path.tip()))]
pub fn delete(
    txn: &Txn<'_>,
    caller: ChatId,
    path: &PathStack,
    child: VertexRef,
    limit: usize,
) -> Result<DeleteReport> {
    let mut parent = editable_tip(txn, caller, path)?;

    let position = parent
        .children
        .iter()
        .position(|c| *c == child)
        .ok_or_else(|| Error::child_not_found(child.to_string(), parent.id.0))?;
    parent.children.remove(position);

    let classes = classify(txn, child, limit)?;

    txn.set_children(parent.id, &parent.children)?;
    txn.delete_folders(&classes.delete_folders)?;
    txn.delete_files(&classes.delete_files)?;

    for root in &classes.decrement {
        change_count(txn, VertexRef::Folder(*root), -1, limit)?;
    }

    let mut report = DeleteReport {
        deleted_folders: classes.delete_folders,
        deleted_files: classes.delete_files,
        decremented: Vec::new(),
    };
    sweep_unreachable(txn, &classes.decrement, limit, &mut report)?;
    report.decremented = classes.decrement;

    debug!(
        folders = report.deleted_folders.len(),
        files = report.deleted_files.len(),
        decremented = report.decremented.len(),
        "Deleted vertex"
    );
    Ok(report)
}
