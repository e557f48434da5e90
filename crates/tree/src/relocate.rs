//! Moving nodes between folders.
//!
//! A move is a change to the node's parent set. When the client can't add
//! and remove parents in one request, the new parent is always added first:
//! a failed second step leaves the node in *both* places, never in neither.

use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::list::folder_id;
use crate::path::VirtualPath;
use crate::resolve::walk;
use drivepath_storage::{ClientHandle, Node, NodeId};

/// Move the node with `id` into `new_parent`, detaching it from every
/// previous parent.
pub async fn move_node(client: &ClientHandle, id: &NodeId, new_parent: &NodeId) -> Result<Node> {
    if id == new_parent {
        exn::bail!(ErrorKind::InvalidMove(id.clone()));
    }
    let node = client.get_node(id).await.map_err(ErrorKind::remote)?;
    reparent(client, node, new_parent).await
}

/// Move the node at `source` into the folder at `destination`.
pub async fn move_to(client: &ClientHandle, ctx: &Context, source: &str, destination: &str) -> Result<Node> {
    let source = VirtualPath::parse(source);
    let Some(node) = walk(client, ctx, &source).await? else {
        exn::bail!(ErrorKind::InvalidPath(source.to_string()));
    };
    let destination = folder_id(client, ctx, &VirtualPath::parse(destination)).await?;
    if node.id == destination {
        exn::bail!(ErrorKind::InvalidMove(node.id));
    }
    reparent(client, node, &destination).await
}

async fn reparent(client: &ClientHandle, node: Node, new_parent: &NodeId) -> Result<Node> {
    let previous: Vec<NodeId> = node.parents.iter().filter(|parent| *parent != new_parent).cloned().collect();
    let attached = node.parents.contains(new_parent);
    if attached && previous.is_empty() {
        tracing::debug!(id = %node.id, parent = %new_parent, "Already in place");
        return Ok(node);
    }

    let moved = if client.atomic_reparent() {
        let add = if attached { Vec::new() } else { vec![new_parent.clone()] };
        client.update_parents(&node.id, &add, &previous).await.map_err(ErrorKind::remote)?
    } else {
        if !attached {
            client.update_parents(&node.id, std::slice::from_ref(new_parent), &[]).await.map_err(ErrorKind::remote)?;
        }
        match client.update_parents(&node.id, &[], &previous).await {
            Ok(moved) => moved,
            Err(e) => {
                let partial = ErrorKind::PartialMove {
                    node: node.id.clone(),
                    added: new_parent.clone(),
                };
                tracing::error!(id = %node.id, parent = %new_parent, "Move left node with both old and new parents");
                return Err(e.raise(partial));
            },
        }
    };
    tracing::info!(id = %moved.id, from = ?previous, to = %new_parent, "Moved");
    Ok(moved)
}
