use std::sync::Arc;
use tracing::info;
use crate::client::transfer;
use crate::error::{FsError, Result};
use crate::path::{self, PathResolver};
use crate::retry::RetryExecutor;

#[derive(Debug)]
pub struct TrashManager {
    executor: Arc<RetryExecutor>,
    resolver: PathResolver,
}

impl TrashManager {
    pub fn new(executor: Arc<RetryExecutor>, resolver: PathResolver) -> Self {
        Self { executor, resolver }
    }

    pub fn is_enabled(&self) -> Result<bool> {
        let enabled = self.executor.execute(|s| Ok(s.trash_enabled()))?;
        info!("Whether the recycle bin is enabled: {}", enabled);
        Ok(enabled)
    }

    pub fn trash_dir(&self) -> Result<String> {
        let current = self.executor.execute(|s| Ok(s.current_trash_dir()))?;
        path::parent(&current).ok_or(FsError::InvalidPath(current))
    }

    pub fn trash_dir_path(&self) -> Result<String> {
        let dir = self.trash_dir()?;
        self.resolver.resolve(&dir)
    }

    /// `path` 被移入回收站后所在的位置
    pub fn trash_path_for(&self, target: &str) -> Result<String> {
        let logical = path::normalize(&self.resolver.resolve(target)?)?;
        let current = self.executor.execute(|s| Ok(s.current_trash_dir()))?;
        Ok(format!("{}{}", current, logical))
    }

    pub fn move_to_trash(&self, target: &str) -> Result<bool> {
        let resolved = self.resolver.resolve(target)?;
        // 在此处重新取得会话，确保以客户端身份而不是调用链上的句柄执行
        self.executor.execute(|s| s.move_to_trash(&resolved))
    }

    pub fn restore(&self, trashed: &str, dest: &str) -> Result<bool> {
        if !transfer::move_path(&self.executor, &self.resolver, trashed, dest)? {
            return Err(FsError::CopyFailed {
                src: trashed.to_string(),
                dest: dest.to_string(),
            });
        }
        info!("{} restored to {}", trashed, dest);
        Ok(true)
    }

    /// 删除超过保留时间的检查点，并为 Current 创建新检查点
    pub fn expunge(&self) -> Result<bool> {
        self.executor.execute(|s| s.expunge(false))?;
        info!("垃圾清理完成！");
        Ok(true)
    }

    pub fn expunge_immediately(&self) -> Result<bool> {
        self.executor.execute(|s| s.expunge(true))?;
        info!("回收站已清空");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use crate::config::{RetryPolicy, StorageConfig};
    use crate::identity::Identity;
    use crate::storage::{MemoryStorage, StorageService};

    fn setup(trash_minutes: u64) -> (Arc<MemoryStorage>, TrashManager) {
        let storage = Arc::new(
            MemoryStorage::new("hdfs")
                .with_config(StorageConfig::default().with_trash_interval_minutes(trash_minutes)),
        );
        let executor = Arc::new(RetryExecutor::new(
            storage.clone(),
            Identity::new("alice", vec![]),
            RetryPolicy::default(),
        ));
        let trash = TrashManager::new(executor, PathResolver::new(storage.uri()));
        (storage, trash)
    }

    fn put(storage: &MemoryStorage, path: &str, data: &[u8]) {
        let mut out = storage.create(&Identity::new("alice", vec![]), path, true).unwrap();
        std::io::Write::write_all(&mut out, data).unwrap();
        out.close().unwrap();
    }

    fn read(storage: &MemoryStorage, path: &str) -> String {
        let mut s = String::new();
        storage
            .open(&Identity::new("alice", vec![]), path)
            .unwrap()
            .read_to_string(&mut s)
            .unwrap();
        s
    }

    #[test]
    fn test_round_trip_then_expunge() {
        let (storage, trash) = setup(60);
        let id = Identity::new("alice", vec![]);
        put(&storage, "/a/f.txt", b"original");

        assert!(trash.is_enabled().unwrap());
        assert_eq!(trash.trash_dir().unwrap(), "/user/alice/.Trash");
        assert_eq!(trash.trash_dir_path().unwrap(), "memory://localhost/user/alice/.Trash");
        let trashed = trash.trash_path_for("/a/f.txt").unwrap();
        assert_eq!(trashed, "/user/alice/.Trash/Current/a/f.txt");

        assert!(trash.move_to_trash("/a/f.txt").unwrap());
        assert!(!storage.exists(&id, "/a/f.txt").unwrap());
        assert!(storage.exists(&id, &trashed).unwrap());

        assert!(trash.restore(&trashed, "/a/f.txt").unwrap());
        assert_eq!(read(&storage, "/a/f.txt"), "original");
        assert!(!storage.exists(&id, &trashed).unwrap());

        assert!(trash.move_to_trash("/a/f.txt").unwrap());
        assert!(trash.expunge().unwrap());
        assert!(!storage.exists(&id, &trashed).unwrap());
        assert!(matches!(trash.restore(&trashed, "/a/f.txt"), Err(FsError::CopyFailed { .. })));
        assert!(!storage.exists(&id, "/a/f.txt").unwrap());
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let (storage, trash) = setup(60);
        let id = Identity::new("alice", vec![]);
        put(&storage, "/f", b"1");
        assert!(trash.move_to_trash("/f").unwrap());
        put(&storage, "/f", b"2");
        assert!(trash.move_to_trash("/f").unwrap());

        let listed = storage.list_status(&id, "/user/alice/.Trash/Current").unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn test_file_ancestor_in_trash_gets_suffix() {
        let (storage, trash) = setup(60);
        let id = Identity::new("alice", vec![]);
        put(&storage, "/a", b"file");
        assert!(trash.move_to_trash("/a").unwrap());
        put(&storage, "/a/f.txt", b"nested");
        assert!(trash.move_to_trash("/a/f.txt").unwrap());
        assert!(!storage.exists(&id, "/a/f.txt").unwrap());

        assert_eq!(read(&storage, "/user/alice/.Trash/Current/a"), "file");
        let listed = storage.list_status(&id, "/user/alice/.Trash/Current").unwrap();
        assert_eq!(listed.len(), 2);
        let moved = listed.iter().find(|s| s.is_dir).unwrap();
        assert!(moved.name().starts_with('a'));
        assert_ne!(moved.name(), "a");
        assert_eq!(read(&storage, &format!("/user/alice/.Trash/Current/{}/f.txt", moved.name())), "nested");
    }

    #[test]
    fn test_refuses_trash_and_ancestors() {
        let (storage, trash) = setup(60);
        put(&storage, "/f", b"1");
        trash.move_to_trash("/f").unwrap();

        assert!(!trash.move_to_trash("/user/alice/.Trash/Current/f").unwrap());
        assert!(matches!(trash.move_to_trash("/user/alice"), Err(FsError::InvalidOperation(_))));
        assert!(matches!(trash.move_to_trash("/"), Err(FsError::InvalidOperation(_))));
        assert!(matches!(trash.move_to_trash("/missing"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_disabled_trash() {
        let (storage, trash) = setup(0);
        put(&storage, "/f", b"1");
        assert!(!trash.is_enabled().unwrap());
        assert!(!trash.move_to_trash("/f").unwrap());
        assert!(storage.exists(&Identity::new("alice", vec![]), "/f").unwrap());
    }

    #[test]
    fn test_expunge_with_huge_interval_keeps_checkpoints() {
        let (storage, trash) = setup(u64::MAX);
        let id = Identity::new("alice", vec![]);
        put(&storage, "/f", b"1");
        assert!(trash.move_to_trash("/f").unwrap());
        assert!(trash.expunge().unwrap());
        assert!(trash.expunge().unwrap());
        assert_eq!(storage.list_status(&id, "/user/alice/.Trash").unwrap().len(), 1);
    }

    #[test]
    fn test_expunge_immediately_removes_checkpoints() {
        let (storage, trash) = setup(60);
        let id = Identity::new("alice", vec![]);
        put(&storage, "/f", b"1");
        trash.move_to_trash("/f").unwrap();
        assert!(trash.expunge().unwrap());
        assert_eq!(storage.list_status(&id, "/user/alice/.Trash").unwrap().len(), 1);

        assert!(trash.expunge_immediately().unwrap());
        assert!(storage.list_status(&id, "/user/alice/.Trash").unwrap().is_empty());
    }
}
