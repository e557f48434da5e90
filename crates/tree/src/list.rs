//! Listing and folder creation.

use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::path::VirtualPath;
use crate::resolve::walk;
use async_stream::stream;
use drivepath_storage::query::ChildQuery;
use drivepath_storage::{ClientHandle, Node, NodeId, NodeKind};
use futures::{Stream, TryStreamExt};

/// Stream every non-trashed child of `parent`, following page tokens as
/// pages arrive. The first failing page ends the stream with its error.
pub fn list_stream<'a>(
    client: &'a ClientHandle,
    ctx: &Context,
    parent: &NodeId,
    filter: Option<&str>,
) -> impl Stream<Item = Result<Node>> + Send + 'a {
    let query = ChildQuery::children_of(parent.clone()).filtered(filter).page_size(ctx.page_size);
    query_stream(client, query)
}

/// Every node matching `query`, following page tokens until the provider
/// runs out.
pub(crate) fn query_stream(client: &ClientHandle, query: ChildQuery) -> impl Stream<Item = Result<Node>> + Send + '_ {
    stream! {
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let page = match client.list_children(&query, page_token.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    yield Err(ErrorKind::remote(e));
                    break;
                },
            };
            pages += 1;
            tracing::debug!(parent = %query.parent, page = pages, count = page.nodes.len(), "Listed children");
            for node in page.nodes {
                yield Ok(node);
            }
            match page.next_page_token {
                // A provider handing back the token it was given would loop forever.
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    yield Err(exn::Exn::from(ErrorKind::Remote {
                        message: format!("page token {token} did not advance"),
                        retryable: false,
                    }));
                    break;
                },
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
    }
}

/// Collect every child of `parent` in provider order. Never returns a
/// partial listing.
pub async fn list_children(client: &ClientHandle, ctx: &Context, parent: &NodeId, filter: Option<&str>) -> Result<Vec<Node>> {
    list_stream(client, ctx, parent, filter).try_collect().await
}

/// List the children of the folder at `path`.
pub async fn list(client: &ClientHandle, ctx: &Context, path: &str, filter: Option<&str>) -> Result<Vec<Node>> {
    let path = VirtualPath::parse(path);
    let parent = folder_id(client, ctx, &path).await?;
    list_children(client, ctx, &parent, filter).await
}

/// Create a folder named `name` inside the folder at `parent` (the root when
/// absent), returning the new node.
pub async fn create_folder(client: &ClientHandle, ctx: &Context, name: &str, parent: Option<&str>) -> Result<Node> {
    if name.trim().is_empty() || name.contains('/') {
        exn::bail!(ErrorKind::InvalidPath(name.to_string()));
    }
    let parent = match parent {
        Some(path) => Some(folder_id(client, ctx, &VirtualPath::parse(path)).await?),
        None => None,
    };
    let node = client.create_node(name, &NodeKind::Folder, parent.as_ref()).await.map_err(ErrorKind::remote)?;
    tracing::info!(id = %node.id, folder = name, "Created folder");
    Ok(node)
}

/// Resolve a path that must name a folder.
pub(crate) async fn folder_id(client: &ClientHandle, ctx: &Context, path: &VirtualPath) -> Result<NodeId> {
    match walk(client, ctx, path).await? {
        None => Ok(NodeId::root()),
        Some(node) if node.is_folder() => Ok(node.id),
        Some(_) => exn::bail!(ErrorKind::NotAFolder(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::handle;
    use drivepath_storage::backend::{Call, MockClient};
    use futures::StreamExt;

    fn six_files() -> MockClient {
        let mut mock = MockClient::default().with_folder("dir", "dir", "root").with_page_size(2);
        for i in 0..6 {
            mock = mock.with_file(&format!("f{i}"), &format!("file-{i}.txt"), "dir", b"x");
        }
        mock
    }

    #[tokio::test]
    async fn test_follows_page_tokens() {
        let (mock, client) = handle(six_files());
        let nodes = list_children(&client, &Context::default(), &NodeId::from("dir"), None).await.unwrap();
        let ids: Vec<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(ids, ["f0", "f1", "f2", "f3", "f4", "f5"]);

        let tokens: Vec<Option<String>> = mock
            .calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                Call::List { page_token, .. } => Some(page_token),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, [None, Some("2".to_string()), Some("4".to_string())]);
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let (mock, client) = handle(six_files());
        let ctx = Context::default();
        let parent = NodeId::from("dir");
        let first: Vec<Node> = list_stream(&client, &ctx, &parent, None).take(2).map(|r| r.unwrap()).collect().await;
        assert_eq!(first.len(), 2);
        assert_eq!(mock.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_page_failure_is_not_partial() {
        let mock = six_files().with_fault(|call| matches!(call, Call::List { page_token: Some(t), .. } if t == "4"));
        let (_, client) = handle(mock);
        let err = list_children(&client, &Context::default(), &NodeId::from("dir"), None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Remote { .. }));
    }

    #[tokio::test]
    async fn test_filter_is_applied() {
        let mock = MockClient::default()
            .with_file("a", "notes.txt", "root", b"x")
            .with_folder("b", "notes", "root")
            .with_file("c", "other.bin", "root", b"x");
        let (_, client) = handle(mock);
        let nodes = list(&client, &Context::default(), "/", Some("name contains 'notes'")).await.unwrap();
        assert_eq!(nodes.len(), 2);

        let nodes = list(&client, &Context::default(), "/", Some("   ")).await.unwrap();
        assert_eq!(nodes.len(), 3);
    }

    #[tokio::test]
    async fn test_list_of_file_is_refused() {
        let (_, client) = handle(MockClient::default().with_file("a", "notes.txt", "root", b"x"));
        let err = list(&client, &Context::default(), "/notes.txt", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAFolder(p) if p == "/notes.txt"));
    }

    #[tokio::test]
    async fn test_create_folder() {
        let (mock, client) = handle(MockClient::default().with_folder("p", "Projects", "root"));
        let node = create_folder(&client, &Context::default(), "2024", Some("/Projects")).await.unwrap();
        assert!(node.is_folder());
        assert_eq!(node.parents, vec![NodeId::from("p")]);
        assert_eq!(mock.peek(node.id.as_str()).await.map(|n| n.name), Some("2024".to_string()));

        let top = create_folder(&client, &Context::default(), "Top", None).await.unwrap();
        assert_eq!(top.parents, vec![NodeId::root()]);
    }

    #[tokio::test]
    async fn test_create_folder_requires_folder_parent() {
        let (mock, client) = handle(MockClient::default().with_file("f", "a.txt", "root", b"x"));
        let err = create_folder(&client, &Context::default(), "sub", Some("a.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAFolder(_)));
        assert!(!mock.calls().await.iter().any(|call| matches!(call, Call::Create { .. })));

        let err = create_folder(&client, &Context::default(), "a/b", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
