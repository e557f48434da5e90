//! Recursive deletion.
//!
//! The provider only deletes single nodes, so a folder's contents are
//! removed depth-first before the folder itself. There is no rollback: a
//! failure part-way leaves everything deleted up to that point deleted.

use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::list::list_children;
use crate::path::VirtualPath;
use crate::resolve::walk;
use drivepath_storage::query::ChildQuery;
use drivepath_storage::{ClientHandle, Node, NodeId};

/// The kind of node a caller expects to delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Files and virtual documents.
    File,
    Folder,
}

/// Delete the node at `path`. Returns the number of nodes deleted.
pub async fn delete(client: &ClientHandle, ctx: &Context, path: &str, recursive: bool) -> Result<u64> {
    delete_checked(client, ctx, path, recursive, None).await
}

/// Delete the node at `path`, refusing if it isn't of the `expect`ed kind.
pub async fn delete_checked(
    client: &ClientHandle,
    ctx: &Context,
    path: &str,
    recursive: bool,
    expect: Option<Expect>,
) -> Result<u64> {
    let path = VirtualPath::parse(path);
    let Some(node) = walk(client, ctx, &path).await? else {
        exn::bail!(ErrorKind::InvalidPath(path.to_string()));
    };
    match expect {
        Some(Expect::Folder) if !node.is_folder() => exn::bail!(ErrorKind::NotAFolder(path.to_string())),
        Some(Expect::File) if node.is_folder() => exn::bail!(ErrorKind::NotAFile(path.to_string())),
        _ => {},
    }
    let deleted = remove(client, ctx, node, recursive, 0).await?;
    tracing::info!(path = %path, deleted, "Deleted");
    Ok(deleted)
}

/// Delete a node by id. Folders with children are only deleted when
/// `recursive` is set.
pub async fn delete_node(client: &ClientHandle, ctx: &Context, id: &NodeId, recursive: bool) -> Result<u64> {
    if id.is_root() {
        exn::bail!(ErrorKind::InvalidPath("/".to_string()));
    }
    let node = client.get_node(id).await.map_err(ErrorKind::remote)?;
    remove(client, ctx, node, recursive, 0).await
}

async fn remove(client: &ClientHandle, ctx: &Context, node: Node, recursive: bool, depth: usize) -> Result<u64> {
    if !node.is_folder() {
        return remove_one(client, &node).await;
    }

    if !recursive {
        let probe = ChildQuery::children_of(node.id.clone()).page_size(1);
        let page = client.list_children(&probe, None).await.map_err(ErrorKind::remote)?;
        if !page.nodes.is_empty() {
            exn::bail!(ErrorKind::NotEmpty(node.id));
        }
        return remove_one(client, &node).await;
    }

    if depth >= ctx.max_depth {
        exn::bail!(ErrorKind::TooDeep(node.id));
    }
    // Collect the full listing first: deleting while paging would shift the
    // provider's offsets underneath us.
    let children = list_children(client, ctx, &node.id, None).await?;
    let mut deleted = 0;
    for child in children {
        deleted += Box::pin(remove(client, ctx, child, true, depth + 1)).await?;
    }
    Ok(deleted + remove_one(client, &node).await?)
}

async fn remove_one(client: &ClientHandle, node: &Node) -> Result<u64> {
    client.delete_node(&node.id).await.map_err(ErrorKind::remote)?;
    tracing::debug!(id = %node.id, node_name = %node.name, kind = %node.kind, "Deleted node");
    Ok(1)
}
