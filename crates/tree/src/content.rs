//! Content retrieval.
//!
//! Regular files are downloaded chunk by chunk. Virtual documents have no
//! bytes of their own and are exported to a fixed concrete format instead.

use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::path::VirtualPath;
use crate::resolve::walk;
use drivepath_storage::{ClientHandle, Node, NodeId, NodeKind, VirtualKind};
use exn::{OptionExt, ResultExt};
use futures::TryStreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Concrete export format of a virtual document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    pub mime_type: &'static str,
    /// File extension, including the dot.
    pub extension: &'static str,
}

/// Document to plain text, spreadsheet to CSV, presentation to PDF. Nothing
/// else can be exported.
pub fn export_format(kind: &VirtualKind) -> Option<ExportFormat> {
    let (mime_type, extension) = match kind {
        VirtualKind::Document => ("text/plain", ".txt"),
        VirtualKind::Spreadsheet => ("text/csv", ".csv"),
        VirtualKind::Presentation => ("application/pdf", ".pdf"),
        VirtualKind::Other(_) => return None,
    };
    Some(ExportFormat { mime_type, extension })
}

/// Read the full content of the file or virtual document at `path`.
pub async fn read_content(client: &ClientHandle, ctx: &Context, path: &str) -> Result<Vec<u8>> {
    let node = content_node(client, ctx, path).await?;
    read(client, &node).await
}

/// Read the full content of a node by id.
pub async fn read_node(client: &ClientHandle, id: &NodeId) -> Result<Vec<u8>> {
    let node = client.get_node(id).await.map_err(ErrorKind::remote)?;
    read(client, &node).await
}

/// Stream the content at `path` into `writer`, returning the number of bytes
/// written. The content is never held in memory as a whole.
pub async fn copy_content<W>(client: &ClientHandle, ctx: &Context, path: &str, writer: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let node = content_node(client, ctx, path).await?;
    copy(client, &node, writer).await
}

async fn content_node(client: &ClientHandle, ctx: &Context, path: &str) -> Result<Node> {
    let path = VirtualPath::parse(path);
    walk(client, ctx, &path).await?.ok_or_raise(|| ErrorKind::NotAFile(path.to_string()))
}

async fn read(client: &ClientHandle, node: &Node) -> Result<Vec<u8>> {
    match &node.kind {
        NodeKind::File => {
            let mut buffer = Vec::with_capacity(node.size.unwrap_or_default().min(64 * 1024 * 1024) as usize);
            let mut chunks = client.download_node(&node.id).await.map_err(ErrorKind::remote)?;
            while let Some(chunk) = chunks.try_next().await.map_err(ErrorKind::remote)? {
                buffer.extend_from_slice(&chunk);
            }
            tracing::debug!(id = %node.id, bytes = buffer.len(), "Downloaded content");
            Ok(buffer)
        },
        NodeKind::Virtual(kind) => export(client, node, kind).await,
        NodeKind::Folder => exn::bail!(ErrorKind::NotAFile(node.id.to_string())),
    }
}

/// Write a node's content into `writer`, chunk by chunk for regular files.
pub(crate) async fn copy<W>(client: &ClientHandle, node: &Node, writer: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let target = || ErrorKind::Io(format!("writing content of {}", node.id));
    let written = match &node.kind {
        NodeKind::File => {
            let mut written = 0u64;
            let mut chunks = client.download_node(&node.id).await.map_err(ErrorKind::remote)?;
            while let Some(chunk) = chunks.try_next().await.map_err(ErrorKind::remote)? {
                writer.write_all(&chunk).await.or_raise(target)?;
                written += chunk.len() as u64;
            }
            written
        },
        NodeKind::Virtual(kind) => {
            let data = export(client, node, kind).await?;
            writer.write_all(&data).await.or_raise(target)?;
            data.len() as u64
        },
        NodeKind::Folder => exn::bail!(ErrorKind::NotAFile(node.id.to_string())),
    };
    writer.flush().await.or_raise(target)?;
    Ok(written)
}

async fn export(client: &ClientHandle, node: &Node, kind: &VirtualKind) -> Result<Vec<u8>> {
    let format = export_format(kind).ok_or_raise(|| ErrorKind::Unsupported(node.mime_type.clone()))?;
    let data = client.export_node(&node.id, format.mime_type).await.map_err(ErrorKind::remote)?;
    tracing::debug!(id = %node.id, mime_type = format.mime_type, bytes = data.len(), "Exported document");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::handle;
    use drivepath_storage::backend::{Call, MockClient};

    fn drive() -> MockClient {
        MockClient::default()
            .with_chunk_size(3)
            .with_file("f", "data.bin", "root", b"0123456789")
            .with_folder("dir", "dir", "root")
            .with_virtual("doc", "Notes", "root", VirtualKind::Document, [("text/plain", &b"hello"[..])])
            .with_virtual("sheet", "Budget", "root", VirtualKind::Spreadsheet, [
                ("text/csv", &b"a,b\n1,2\n"[..]),
                ("application/pdf", &b"%PDF"[..]),
            ])
            .with_virtual("slides", "Deck", "root", VirtualKind::Presentation, [("application/pdf", &b"%PDF-1.7"[..])])
            .with_virtual(
                "form",
                "Survey",
                "root",
                VirtualKind::Other("application/vnd.google-apps.form".to_string()),
                [],
            )
    }

    #[tokio::test]
    async fn test_file_chunks_are_joined() {
        let (mock, client) = handle(drive());
        let data = read_content(&client, &Context::default(), "/data.bin").await.unwrap();
        assert_eq!(data, b"0123456789");
        assert_eq!(mock.calls().await.last(), Some(&Call::Download(NodeId::from("f"))));
    }

    #[tokio::test]
    async fn test_spreadsheet_exports_csv() {
        let (mock, client) = handle(drive());
        let data = read_content(&client, &Context::default(), "/Budget").await.unwrap();
        assert_eq!(data, b"a,b\n1,2\n");
        let calls = mock.calls().await;
        assert!(calls.contains(&Call::Export {
            id: NodeId::from("sheet"),
            mime_type: "text/csv".to_string(),
        }));
        assert!(!calls.iter().any(|call| matches!(call, Call::Download(_))));
    }

    #[tokio::test]
    async fn test_read_node_by_id() {
        let (mock, client) = handle(drive());
        assert_eq!(read_node(&client, &NodeId::from("doc")).await.unwrap(), b"hello");
        assert_eq!(read_node(&client, &NodeId::from("slides")).await.unwrap(), b"%PDF-1.7");
        assert_eq!(mock.calls().await[0], Call::Get(NodeId::from("doc")));
    }

    #[tokio::test]
    async fn test_unsupported_virtual_kind() {
        let (mock, client) = handle(drive());
        let err = read_content(&client, &Context::default(), "/Survey").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unsupported(mime) if mime == "application/vnd.google-apps.form"));
        assert!(!mock.calls().await.iter().any(|call| matches!(call, Call::Export { .. } | Call::Download(_))));
    }

    #[tokio::test]
    async fn test_folder_is_not_a_file() {
        let (_, client) = handle(drive());
        let err = read_content(&client, &Context::default(), "/dir").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAFile(_)));
        let err = read_content(&client, &Context::default(), "/").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAFile(p) if p == "/"));
    }

    #[tokio::test]
    async fn test_copy_into_writer() {
        let (_, client) = handle(drive());
        let mut out = Vec::new();
        let written = copy_content(&client, &Context::default(), "/data.bin", &mut out).await.unwrap();
        assert_eq!(written, 10);
        assert_eq!(out, b"0123456789");

        let mut out = Vec::new();
        copy_content(&client, &Context::default(), "/Notes", &mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }
}
