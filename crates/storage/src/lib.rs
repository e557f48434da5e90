pub mod backend;
pub mod error;
pub mod node;
pub mod query;

pub use crate::backend::StorageClient;
pub use crate::node::{Node, NodeId, NodeKind, VirtualKind};
use std::sync::Arc;

pub type ClientHandle = Arc<dyn StorageClient + Send + Sync>;
