//! Path resolution.
//!
//! Walks a [`VirtualPath`] from the root, one exact-name child lookup per
//! segment. Under `first` and `strict` only the first page of each lookup is
//! considered, since telling "unique" from "ambiguous" needs two matches at
//! most. `newest` has to see every match, so its lookups follow page tokens.

use crate::error::{ErrorKind, Result};
use crate::list::query_stream;
use crate::path::VirtualPath;
use crate::{Context, SiblingPolicy};
use drivepath_storage::query::ChildQuery;
use drivepath_storage::{ClientHandle, Node, NodeId};
use futures::TryStreamExt;

/// Enough to tell "unique" apart from "ambiguous".
const LOOKUP_PAGE_SIZE: u32 = 2;

/// Resolve a path to the id of the node it names.
///
/// The root path (`""`, `"/"`, `"///"`) resolves to the root alias without
/// any remote call. Otherwise one lookup is issued per segment (a `newest`
/// lookup may span several pages), and resolution stops at the first segment
/// with no match.
pub async fn resolve(client: &ClientHandle, ctx: &Context, path: &str) -> Result<NodeId> {
    let path = VirtualPath::parse(path);
    Ok(walk(client, ctx, &path).await?.map(|node| node.id).unwrap_or_else(NodeId::root))
}

/// Resolve a path to the full metadata of the node it names.
pub async fn stat(client: &ClientHandle, ctx: &Context, path: &str) -> Result<Node> {
    let path = VirtualPath::parse(path);
    match walk(client, ctx, &path).await? {
        Some(node) => Ok(node),
        None => client.get_node(&NodeId::root()).await.map_err(ErrorKind::remote),
    }
}

/// Walk the path segment by segment. Returns `None` for the root path, which
/// has no lookup to take metadata from.
pub(crate) async fn walk(client: &ClientHandle, ctx: &Context, path: &VirtualPath) -> Result<Option<Node>> {
    let mut current: Option<Node> = None;
    for segment in path.segments() {
        let parent = current.as_ref().map(|node| node.id.clone()).unwrap_or_else(NodeId::root);
        let candidates = lookup(client, ctx, parent, segment).await?;
        let node = choose(ctx.siblings, candidates, segment, path)?;
        tracing::trace!(segment = %segment, id = %node.id, "Resolved path segment");
        current = Some(node);
    }
    Ok(current)
}

async fn lookup(client: &ClientHandle, ctx: &Context, parent: NodeId, segment: &str) -> Result<Vec<Node>> {
    let query = ChildQuery::children_of(parent).named(segment);
    match ctx.siblings {
        SiblingPolicy::Newest => query_stream(client, query.page_size(ctx.page_size)).try_collect().await,
        SiblingPolicy::First | SiblingPolicy::Strict => {
            let query = query.page_size(LOOKUP_PAGE_SIZE);
            let page = client.list_children(&query, None).await.map_err(ErrorKind::remote)?;
            Ok(page.nodes)
        },
    }
}

fn choose(policy: SiblingPolicy, candidates: Vec<Node>, segment: &str, path: &VirtualPath) -> Result<Node> {
    let count = candidates.len();
    if count > 1 {
        if policy == SiblingPolicy::Strict {
            exn::bail!(ErrorKind::Ambiguous {
                segment: segment.to_string(),
                path: path.to_string(),
                count,
            });
        }
        tracing::warn!(segment, path = %path, count, policy = %policy, "Path segment matches several siblings");
    }
    let chosen = match policy {
        // Later candidates only win with a strictly newer timestamp, so ties
        // fall back to provider order.
        SiblingPolicy::Newest => candidates.into_iter().reduce(|best, node| if node.modified > best.modified { node } else { best }),
        SiblingPolicy::First | SiblingPolicy::Strict => candidates.into_iter().next(),
    };
    match chosen {
        Some(node) => Ok(node),
        None => exn::bail!(ErrorKind::NotFound {
            segment: segment.to_string(),
            path: path.to_string(),
        }),
    }
}
