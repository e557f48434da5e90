//! In-memory storage client for testing.

use super::ByteStream;
use crate::StorageClient;
use crate::error::{ErrorKind, Result};
use crate::node::{FOLDER_MIME, Node, NodeId, NodeKind, VirtualKind};
use crate::query::{ChildQuery, Page};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;
const DEFAULT_PROVIDER_PAGE_SIZE: u32 = 1000;

/// A single request received by a [`MockClient`], in the order received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { name: String, parent: Option<NodeId> },
    Get(NodeId),
    List { parent: NodeId, name: Option<String>, page_token: Option<String> },
    UpdateParents { id: NodeId, add: Vec<NodeId>, remove: Vec<NodeId> },
    Delete(NodeId),
    Export { id: NodeId, mime_type: String },
    Download(NodeId),
}
impl Call {
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete(_))
    }
}

struct Entry {
    node: Node,
    content: Vec<u8>,
    exports: HashMap<String, Vec<u8>>,
}

struct Fault {
    matches: Box<dyn Fn(&Call) -> bool + Send + Sync>,
    /// `None` fails forever.
    remaining: Option<AtomicUsize>,
    retryable: bool,
}

/// In-memory storage client for testing.
///
/// Nodes are kept in insertion order behind a [`RwLock`], which doubles as
/// "provider order" for listings. Every request is appended to a call log
/// *before* it is served (so failed requests show up too), which lets tests
/// assert exactly which remote calls an operation made.
///
/// # Examples
///
/// ```ignore
/// use drivepath_storage::backend::{Call, MockClient, StorageClient};
/// use drivepath_storage::node::NodeId;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = MockClient::default()
///     .with_folder("docs", "Documents", "root")
///     .with_file("f1", "notes.txt", "docs", b"hello");
///
/// let node = client.get_node(&NodeId::from("f1")).await?;
/// assert_eq!(node.name, "notes.txt");
/// assert_eq!(client.calls().await, vec![Call::Get(NodeId::from("f1"))]);
/// # Ok(())
/// # }
/// ```
pub struct MockClient {
    name: String,
    storage: RwLock<Vec<Entry>>,
    calls: Mutex<Vec<Call>>,
    faults: Vec<Fault>,
    page_size: u32,
    chunk_size: usize,
    atomic_reparent: bool,
    next_id: AtomicU64,
}

impl MockClient {
    /// Change the name of the mock client.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add an arbitrary node with raw content.
    ///
    /// Panics if a node with the same id already exists. If test setup is
    /// wrong, then test should not pass.
    pub fn with_node(mut self, node: Node, content: impl Into<Vec<u8>>) -> Self {
        let storage = self.storage.get_mut();
        if storage.iter().any(|entry| entry.node.id == node.id) {
            panic!("MockClient::with_node: duplicate node id {}", node.id);
        }
        storage.push(Entry {
            node,
            content: content.into(),
            exports: HashMap::new(),
        });
        self
    }

    pub fn with_folder(self, id: &str, name: &str, parent: &str) -> Self {
        self.with_node(Node::new(id, name, FOLDER_MIME).with_parent(parent), Vec::new())
    }

    pub fn with_file(self, id: &str, name: &str, parent: &str, content: &[u8]) -> Self {
        let node = Node::new(id, name, "text/plain").with_parent(parent).with_size(content.len() as u64);
        self.with_node(node, content)
    }

    /// Add a virtual document along with the formats it can be exported to.
    pub fn with_virtual<'a>(
        mut self,
        id: &str,
        name: &str,
        parent: &str,
        kind: VirtualKind,
        exports: impl IntoIterator<Item = (&'a str, &'a [u8])>,
    ) -> Self {
        let mime = NodeKind::Virtual(kind).default_mime().to_string();
        self = self.with_node(Node::new(id, name, mime).with_parent(parent), Vec::new());
        if let Some(entry) = self.storage.get_mut().last_mut() {
            entry.exports = exports.into_iter().map(|(mime, data)| (mime.to_string(), data.to_vec())).collect();
        }
        self
    }

    /// Mark an existing node as trashed.
    pub fn with_trashed(mut self, id: &str) -> Self {
        match self.storage.get_mut().iter_mut().find(|entry| entry.node.id.as_str() == id) {
            Some(entry) => entry.node.trashed = true,
            None => panic!("MockClient::with_trashed: unknown node id {id}"),
        }
        self
    }

    /// Largest page the "provider" returns, regardless of what was asked for.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Behave like a provider that needs separate add/remove requests.
    pub fn with_split_reparent(mut self) -> Self {
        self.atomic_reparent = false;
        self
    }

    /// Fail every matching call with a non-retryable error.
    pub fn with_fault(mut self, matches: impl Fn(&Call) -> bool + Send + Sync + 'static) -> Self {
        self.faults.push(Fault {
            matches: Box::new(matches),
            remaining: None,
            retryable: false,
        });
        self
    }

    /// Fail the first `times` matching calls with a retryable error.
    pub fn with_transient_fault(mut self, times: usize, matches: impl Fn(&Call) -> bool + Send + Sync + 'static) -> Self {
        self.faults.push(Fault {
            matches: Box::new(matches),
            remaining: Some(AtomicUsize::new(times)),
            retryable: true,
        });
        self
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    /// Current state of a node, without it being logged as a call.
    pub async fn peek(&self, id: &str) -> Option<Node> {
        self.storage.read().await.iter().find(|entry| entry.node.id.as_str() == id).map(|entry| entry.node.clone())
    }

    async fn record(&self, call: Call) -> Result<()> {
        let failure = self.faults.iter().find_map(|fault| {
            if !(fault.matches)(&call) {
                return None;
            }
            match &fault.remaining {
                None => Some(fault.retryable),
                Some(remaining) => remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .ok()
                    .map(|_| fault.retryable),
            }
        });
        let description = format!("{call:?}");
        self.calls.lock().await.push(call);
        match failure {
            Some(true) => exn::bail!(ErrorKind::Network(description)),
            Some(false) => exn::bail!(ErrorKind::Injected(description)),
            None => Ok(()),
        }
    }

    fn mint_id(&self) -> NodeId {
        NodeId::new(format!("node-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }
}
impl Default for MockClient {
    fn default() -> Self {
        let root = Entry {
            node: Node::new(NodeId::root(), "My Drive", FOLDER_MIME),
            content: Vec::new(),
            exports: HashMap::new(),
        };
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(vec![root]),
            calls: Mutex::new(Vec::new()),
            faults: Vec::new(),
            page_size: DEFAULT_PROVIDER_PAGE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            atomic_reparent: true,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl StorageClient for MockClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn atomic_reparent(&self) -> bool {
        self.atomic_reparent
    }

    async fn create_node(&self, name: &str, kind: &NodeKind, parent: Option<&NodeId>) -> Result<Node> {
        self.record(Call::Create { name: name.to_string(), parent: parent.cloned() }).await?;
        let parent = parent.cloned().unwrap_or_else(NodeId::root);
        let mut guard = self.storage.write().await;
        if !guard.iter().any(|entry| entry.node.id == parent) {
            exn::bail!(ErrorKind::NotFound(parent));
        }
        let node = Node::new(self.mint_id(), name, kind.default_mime()).with_parent(parent);
        guard.push(Entry {
            node: node.clone(),
            content: Vec::new(),
            exports: HashMap::new(),
        });
        Ok(node)
    }

    async fn get_node(&self, id: &NodeId) -> Result<Node> {
        self.record(Call::Get(id.clone())).await?;
        self.peek(id.as_str()).await.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id.clone())))
    }

    async fn list_children(&self, query: &ChildQuery, page_token: Option<&str>) -> Result<Page> {
        self.record(Call::List {
            parent: query.parent.clone(),
            name: query.name.clone(),
            page_token: page_token.map(str::to_string),
        })
        .await?;
        let filter = query.filter.as_deref().map(Filter::parse).transpose()?;
        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| exn::Exn::from(ErrorKind::Backend(format!("invalid page token: {token}"))))?,
            None => 0,
        };
        let page_size = query.page_size.min(self.page_size) as usize;

        let guard = self.storage.read().await;
        let matching: Vec<&Node> = guard
            .iter()
            .map(|entry| &entry.node)
            .filter(|node| !node.trashed && node.parents.contains(&query.parent))
            .filter(|node| query.name.as_ref().is_none_or(|name| &node.name == name))
            .filter(|node| filter.as_ref().is_none_or(|f| f.matches(node)))
            .collect();
        let nodes: Vec<Node> = matching.iter().skip(offset).take(page_size).map(|node| (*node).clone()).collect();
        let consumed = offset + nodes.len();
        Ok(Page {
            nodes,
            next_page_token: (consumed < matching.len()).then(|| consumed.to_string()),
        })
    }

    async fn update_parents(&self, id: &NodeId, add: &[NodeId], remove: &[NodeId]) -> Result<Node> {
        self.record(Call::UpdateParents {
            id: id.clone(),
            add: add.to_vec(),
            remove: remove.to_vec(),
        })
        .await?;
        if !self.atomic_reparent && !add.is_empty() && !remove.is_empty() {
            exn::bail!(ErrorKind::Backend("cannot add and remove parents in a single request".to_string()));
        }
        let mut guard = self.storage.write().await;
        if let Some(missing) = add.iter().find(|parent| !guard.iter().any(|entry| &entry.node.id == *parent)) {
            exn::bail!(ErrorKind::NotFound(missing.clone()));
        }
        let entry =
            guard.iter_mut().find(|entry| &entry.node.id == id).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id.clone())))?;
        for parent in add {
            if !entry.node.parents.contains(parent) {
                entry.node.parents.push(parent.clone());
            }
        }
        entry.node.parents.retain(|parent| !remove.contains(parent));
        Ok(entry.node.clone())
    }

    async fn delete_node(&self, id: &NodeId) -> Result<()> {
        self.record(Call::Delete(id.clone())).await?;
        let mut guard = self.storage.write().await;
        let position = guard
            .iter()
            .position(|entry| &entry.node.id == id)
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id.clone())))?;
        guard.remove(position);
        Ok(())
    }

    async fn export_node(&self, id: &NodeId, mime_type: &str) -> Result<Vec<u8>> {
        self.record(Call::Export { id: id.clone(), mime_type: mime_type.to_string() }).await?;
        let guard = self.storage.read().await;
        let entry =
            guard.iter().find(|entry| &entry.node.id == id).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id.clone())))?;
        if !matches!(entry.node.kind, NodeKind::Virtual(_)) {
            exn::bail!(ErrorKind::Backend(format!("{id} is not a virtual document")));
        }
        entry
            .exports
            .get(mime_type)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::Backend(format!("{id} cannot be exported as {mime_type}"))))
    }

    async fn download_node<'a>(&'a self, id: &NodeId) -> Result<ByteStream<'a>> {
        self.record(Call::Download(id.clone())).await?;
        let data = {
            let guard = self.storage.read().await;
            let entry = guard
                .iter()
                .find(|entry| &entry.node.id == id)
                .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id.clone())))?;
            if entry.node.kind != NodeKind::File {
                exn::bail!(ErrorKind::Backend(format!("{id} has no binary content")));
            }
            entry.content.clone()
        };
        let chunk_size = self.chunk_size;
        Ok(Box::pin(stream! {
            for chunk in data.chunks(chunk_size) {
                yield Ok(chunk.to_vec());
            }
        }))
    }
}

/// The tiny subset of the provider's filter language the mock understands:
/// `<name|mimeType> <=|!=|contains> '<literal>'`.
enum Filter {
    Equals(Field, String),
    NotEquals(Field, String),
    Contains(Field, String),
}

enum Field {
    Name,
    MimeType,
}

impl Filter {
    fn parse(expr: &str) -> Result<Self> {
        let unsupported = || exn::Exn::from(ErrorKind::Backend(format!("unsupported filter: {expr}")));
        let (field, op, literal) = [" contains ", " != ", " = "]
            .into_iter()
            .find_map(|op| expr.trim().split_once(op).map(|(field, literal)| (field.trim(), op.trim(), literal.trim())))
            .ok_or_else(unsupported)?;
        let field = match field {
            "name" => Field::Name,
            "mimeType" => Field::MimeType,
            _ => return Err(unsupported()),
        };
        let value = literal
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .map(|s| s.replace("\\'", "'").replace("\\\\", "\\"))
            .ok_or_else(unsupported)?;
        Ok(match op {
            "contains" => Self::Contains(field, value),
            "!=" => Self::NotEquals(field, value),
            _ => Self::Equals(field, value),
        })
    }

    fn matches(&self, node: &Node) -> bool {
        let pick = |field: &Field| match field {
            Field::Name => node.name.as_str(),
            Field::MimeType => node.mime_type.as_str(),
        };
        match self {
            Self::Equals(field, value) => pick(field) == value,
            Self::NotEquals(field, value) => pick(field) != value,
            Self::Contains(field, value) => pick(field).contains(value.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn tree() -> MockClient {
        MockClient::default()
            .with_folder("a", "A", "root")
            .with_file("f1", "one.txt", "a", b"1")
            .with_file("f2", "two.txt", "a", b"2")
            .with_file("f3", "three.pdf", "a", b"3")
    }

    #[tokio::test]
    async fn test_get_node() {
        let client = tree();
        let node = client.get_node(&NodeId::from("f1")).await.unwrap();
        assert_eq!(node.name, "one.txt");
        assert_eq!(node.parents, vec![NodeId::from("a")]);
    }

    #[tokio::test]
    async fn test_get_node_not_found() {
        let client = tree();
        let err = client.get_node(&NodeId::from("nope")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(id) if id.as_str() == "nope"));
    }

    #[tokio::test]
    async fn test_root_exists() {
        let client = MockClient::default();
        assert!(client.get_node(&NodeId::root()).await.unwrap().is_folder());
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let client = tree().with_page_size(2);
        let query = ChildQuery::children_of("a");
        let first = client.list_children(&query, None).await.unwrap();
        assert_eq!(first.nodes.len(), 2);
        let token = first.next_page_token.unwrap();
        let second = client.list_children(&query, Some(&token)).await.unwrap();
        assert_eq!(second.nodes.len(), 1);
        assert_eq!(second.nodes[0].id.as_str(), "f3");
        assert_eq!(second.next_page_token, None);
    }

    #[tokio::test]
    async fn test_list_excludes_trashed() {
        let client = tree().with_trashed("f2");
        let page = client.list_children(&ChildQuery::children_of("a"), None).await.unwrap();
        let ids: Vec<_> = page.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f3"]);
    }

    #[tokio::test]
    async fn test_list_by_name() {
        let client = tree();
        let page = client.list_children(&ChildQuery::children_of("a").named("two.txt"), None).await.unwrap();
        assert_eq!(page.nodes.len(), 1);
        assert_eq!(page.nodes[0].id.as_str(), "f2");
    }

    #[tokio::test]
    async fn test_list_with_filter() {
        let client = tree();
        let query = ChildQuery::children_of("a").filtered(Some("name contains '.txt'"));
        let page = client.list_children(&query, None).await.unwrap();
        assert_eq!(page.nodes.len(), 2);

        let query = ChildQuery::children_of("a").filtered(Some("modifiedTime > '2024-01-01'"));
        let err = client.list_children(&query, None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Backend(_)));
    }

    #[tokio::test]
    async fn test_create_node() {
        let client = tree();
        let created = client.create_node("New", &NodeKind::Folder, Some(&NodeId::from("a"))).await.unwrap();
        assert!(created.is_folder());
        assert_eq!(client.peek(created.id.as_str()).await.unwrap().parents, vec![NodeId::from("a")]);
        let at_root = client.create_node("Top", &NodeKind::Folder, None).await.unwrap();
        assert_eq!(at_root.parents, vec![NodeId::root()]);
    }

    #[tokio::test]
    async fn test_split_reparent_rejects_combined_update() {
        let client = tree().with_split_reparent();
        let err = client.update_parents(&NodeId::from("f1"), &[NodeId::root()], &[NodeId::from("a")]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Backend(_)));
        client.update_parents(&NodeId::from("f1"), &[NodeId::root()], &[]).await.unwrap();
        let node = client.update_parents(&NodeId::from("f1"), &[], &[NodeId::from("a")]).await.unwrap();
        assert_eq!(node.parents, vec![NodeId::root()]);
    }

    #[tokio::test]
    async fn test_download_in_chunks() {
        let client = MockClient::default().with_file("big", "big.bin", "root", b"0123456789").with_chunk_size(4);
        let chunks: Vec<Vec<u8>> = client.download_node(&NodeId::from("big")).await.unwrap().try_collect().await.unwrap();
        assert_eq!(chunks, vec![b"0123".to_vec(), b"4567".to_vec(), b"89".to_vec()]);
    }

    #[tokio::test]
    async fn test_export() {
        let client = MockClient::default().with_virtual(
            "doc",
            "Notes",
            "root",
            VirtualKind::Document,
            [("text/plain", b"plain".as_slice())],
        );
        assert_eq!(client.export_node(&NodeId::from("doc"), "text/plain").await.unwrap(), b"plain");
        assert!(client.export_node(&NodeId::from("doc"), "application/pdf").await.is_err());
        assert!(client.download_node(&NodeId::from("doc")).await.is_err());
    }

    #[tokio::test]
    async fn test_faults_are_logged() {
        let client = tree().with_fault(|call| matches!(call, Call::Delete(id) if id.as_str() == "f1"));
        let err = client.delete_node(&NodeId::from("f1")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Injected(_)));
        assert!(client.peek("f1").await.is_some());
        client.delete_node(&NodeId::from("f2")).await.unwrap();
        assert_eq!(client.calls().await, vec![Call::Delete(NodeId::from("f1")), Call::Delete(NodeId::from("f2"))]);
    }

    #[tokio::test]
    async fn test_transient_fault_clears() {
        let client = tree().with_transient_fault(1, |call| matches!(call, Call::Get(_)));
        let err = client.get_node(&NodeId::from("f1")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(client.get_node(&NodeId::from("f1")).await.is_ok());
    }

    #[test]
    #[should_panic(expected = "duplicate node id")]
    fn test_duplicate_ids_panic() {
        let _ = MockClient::default().with_folder("a", "A", "root").with_folder("a", "B", "root");
    }
}
