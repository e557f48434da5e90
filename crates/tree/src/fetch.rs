//! Downloading remote content into a local directory.
//!
//! A single file (or exportable document) lands as `dir/<name>`. A folder
//! contributes each of its direct non-folder children; subfolders are not
//! descended into. Existing local files are never overwritten: when a name
//! is taken (by an earlier run, or by a same-named sibling) the file lands
//! as `name (2).ext`, `name (3).ext`, and so on.

use crate::Context;
use crate::content::{copy, export_format};
use crate::error::{ErrorKind, Result};
use crate::list::list_children;
use crate::path::VirtualPath;
use crate::resolve::walk;
use drivepath_storage::{ClientHandle, Node, NodeId, NodeKind};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::BufWriter;

/// Suffixed names tried before giving up on a taken local name.
const MAX_LOCAL_NAMES: usize = 1000;

/// Fetch the file, document, or folder at `path` into `dir`, creating `dir`
/// if needed. Returns the local paths written, in provider order.
pub async fn fetch(client: &ClientHandle, ctx: &Context, path: &str, dir: &Path) -> Result<Vec<PathBuf>> {
    let path = VirtualPath::parse(path);
    let node = match walk(client, ctx, &path).await? {
        Some(node) => node,
        None => client.get_node(&NodeId::root()).await.map_err(ErrorKind::remote)?,
    };
    tokio::fs::create_dir_all(dir).await.or_raise(|| ErrorKind::Io(dir.display().to_string()))?;

    if !node.is_folder() {
        return Ok(vec![fetch_one(client, &node, dir).await?]);
    }

    let mut written = Vec::new();
    for child in list_children(client, ctx, &node.id, None).await? {
        if child.is_folder() {
            continue;
        }
        match fetch_one(client, &child, dir).await {
            Ok(local) => written.push(local),
            Err(e) if matches!(&*e, ErrorKind::Unsupported(_)) => {
                tracing::warn!(id = %child.id, node_name = %child.name, mime_type = %child.mime_type, "Skipping unsupported document");
            },
            Err(e) => return Err(e),
        }
    }
    tracing::info!(path = %path, dir = %dir.display(), count = written.len(), "Fetched folder");
    Ok(written)
}

async fn fetch_one(client: &ClientHandle, node: &Node, dir: &Path) -> Result<PathBuf> {
    // Work out the name first so unsupported documents never leave an empty file behind.
    let (local, file) = create_unique(dir, &local_name(node)?).await?;
    let mut writer = BufWriter::new(file);
    match copy(client, node, &mut writer).await {
        Ok(bytes) => {
            tracing::debug!(id = %node.id, local = %local.display(), bytes, "Fetched");
            Ok(local)
        },
        Err(e) => {
            drop(writer);
            if let Err(cleanup) = tokio::fs::remove_file(&local).await {
                tracing::warn!(local = %local.display(), error = %cleanup, "Failed to remove partial download");
            }
            Err(e)
        },
    }
}

/// Create a new file in `dir` named `name`, or the first free suffixed
/// variant of it.
async fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, File)> {
    let (stem, extension) = match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name, ""),
    };
    for n in 1..=MAX_LOCAL_NAMES {
        let local = match n {
            1 => dir.join(name),
            _ => dir.join(format!("{stem} ({n}){extension}")),
        };
        match OpenOptions::new().write(true).create_new(true).open(&local).await {
            Ok(file) => {
                if n > 1 {
                    tracing::warn!(wanted = name, local = %local.display(), "Local name taken, writing under another");
                }
                return Ok((local, file));
            },
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io(local.display().to_string())),
        }
    }
    exn::bail!(ErrorKind::Io(format!("no free local name for {name} in {}", dir.display())))
}

/// Local file name for a node: separators neutralised, and the export
/// extension appended for virtual documents that don't already carry it.
fn local_name(node: &Node) -> Result<String> {
    let mut name: String = node
        .name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    if name.is_empty() || name == "." || name == ".." {
        exn::bail!(ErrorKind::InvalidPath(node.name.clone()));
    }
    if let NodeKind::Virtual(kind) = &node.kind {
        let format = export_format(kind).ok_or_raise(|| ErrorKind::Unsupported(node.mime_type.clone()))?;
        if !name.to_ascii_lowercase().ends_with(format.extension) {
            name.push_str(format.extension);
        }
    }
    Ok(name)
}
