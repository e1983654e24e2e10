pub mod error;
pub mod config;
pub mod path;
pub mod permission;
pub mod identity;
pub mod status;
pub mod storage;
pub mod retry;
pub mod trash;
pub mod client;

pub use error::{FsError, ReportError, Result};
pub use config::{ClientConfig, RetryPolicy, StorageConfig};
pub use identity::Identity;
pub use path::PathResolver;
pub use permission::{FsAction, FsPermission, PermissionLevel};
pub use status::{byte_to_size, BlockLocation, FileEntry, FileStatus, FsStatus, StatusMapper};
pub use storage::{InputStream, LocalStorage, MemoryStorage, OutputStream, StorageService};
pub use retry::{Interrupter, RetryExecutor, Session};
pub use trash::TrashManager;
pub use client::DfsClient;
