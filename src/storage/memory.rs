use std::collections::{BTreeMap, HashMap};
use std::io::{self, Cursor, Write};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use chrono::Utc;
use tracing::{debug, info};
use crate::config::StorageConfig;
use crate::error::{FsError, Result};
use crate::identity::Identity;
use crate::path;
use crate::permission::{self, FsAction, FsPermission};
use crate::status::{BlockLocation, FileStatus, FsStatus};
use super::{InputStream, OutputStream, StorageService};

const SCHEME: &str = "memory";

#[derive(Debug, Clone)]
enum InodeKind {
    Directory,
    File(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Inode {
    kind: InodeKind,
    owner: String,
    group: String,
    permission: FsPermission,
    replication: u16,
    block_size: u64,
    modification_time: i64,
    access_time: i64,
}

impl Inode {
    fn is_dir(&self) -> bool {
        matches!(self.kind, InodeKind::Directory)
    }

    fn len(&self) -> u64 {
        match &self.kind {
            InodeKind::Directory => 0,
            InodeKind::File(data) => data.len() as u64,
        }
    }
}

#[derive(Debug, Default)]
struct Namespace {
    inodes: BTreeMap<String, Inode>,
    /// 路径 -> 剩余需要注入的块长度错误次数
    pending_failures: HashMap<String, u32>,
}

impl Namespace {
    fn subtree(&self, path: &str) -> Vec<String> {
        self.inodes
            .range(path.to_string()..)
            .take_while(|(k, _)| k.starts_with(path))
            .filter(|(k, _)| path::is_within(k, path))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn children(&self, path: &str) -> Vec<String> {
        self.subtree(path)
            .into_iter()
            .filter(|k| path::parent(k).as_deref() == Some(path))
            .collect()
    }

    fn nearest_ancestor(&self, path: &str) -> String {
        let mut current = path.to_string();
        while !self.inodes.contains_key(&current) {
            match path::parent(&current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }
}

fn now() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct MemoryStorage {
    authority: String,
    config: StorageConfig,
    superuser: String,
    supergroup: String,
    user_groups: HashMap<String, Vec<String>>,
    datanodes: Vec<String>,
    namespace: Arc<RwLock<Namespace>>,
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("authority", &self.authority)
            .field("superuser", &self.superuser)
            .field("inodes", &self.read().inodes.len())
            .finish()
    }
}

impl MemoryStorage {
    /// 根目录与 /user 对所有用户可写，便于各用户创建自己的 home 目录
    pub fn new(superuser: impl Into<String>) -> Self {
        let superuser = superuser.into();
        let supergroup = "supergroup".to_string();
        let config = StorageConfig::default();
        let mut namespace = Namespace::default();
        let timestamp = now();
        for dir in ["/", "/user"] {
            namespace.inodes.insert(
                dir.to_string(),
                Inode {
                    kind: InodeKind::Directory,
                    owner: superuser.clone(),
                    group: supergroup.clone(),
                    permission: FsPermission::from_mode(0o777),
                    replication: 0,
                    block_size: 0,
                    modification_time: timestamp,
                    access_time: timestamp,
                },
            );
        }

        Self {
            authority: "localhost".to_string(),
            config,
            superuser,
            supergroup,
            user_groups: HashMap::new(),
            datanodes: vec!["dn1".to_string(), "dn2".to_string(), "dn3".to_string()],
            namespace: Arc::new(RwLock::new(namespace)),
        }
    }

    pub fn with_config(mut self, config: StorageConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_user_groups(mut self, user: &str, groups: &[&str]) -> Self {
        self.user_groups
            .insert(user.to_string(), groups.iter().map(|g| g.to_string()).collect());
        self
    }

    pub fn uri(&self) -> String {
        format!("{}://{}", SCHEME, self.authority)
    }

    /// 让接下来 `count` 次打开 `path` 时返回块长度竞争错误
    pub fn inject_block_length_failures(&self, path: &str, count: u32) {
        let logical = path::normalize(path).unwrap_or_else(|_| path.to_string());
        debug!("inject_block_length_failures: {} x{}", logical, count);
        self.write().pending_failures.insert(logical, count);
    }

    fn read(&self) -> RwLockReadGuard<'_, Namespace> {
        self.namespace.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Namespace> {
        self.namespace.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_superuser(&self, caller: &Identity) -> bool {
        caller.short_name() == self.superuser || caller.is_member_of(&self.supergroup)
    }

    fn check(&self, caller: &Identity, inode: &Inode, action: FsAction, path: &str) -> Result<()> {
        if self.is_superuser(caller)
            || permission::check_access(&inode.owner, &inode.group, Some(&inode.permission), action, caller)
        {
            return Ok(());
        }
        Err(FsError::PermissionDenied(format!(
            "user={}, access={}, inode=\"{}\":{}:{}:{}",
            caller.short_name(),
            action.symbol(),
            path,
            inode.owner,
            inode.group,
            permission::permission_to_string(Some(&inode.permission)),
        )))
    }

    fn status_of(&self, path: &str, inode: &Inode) -> FileStatus {
        FileStatus {
            path: format!("{}{}", self.uri(), path),
            length: inode.len(),
            is_dir: inode.is_dir(),
            replication: inode.replication,
            block_size: inode.block_size,
            modification_time: inode.modification_time,
            access_time: inode.access_time,
            owner: inode.owner.clone(),
            group: inode.group.clone(),
            permission: Some(inode.permission),
        }
    }

    fn mkdirs_locked(
        &self,
        ns: &mut Namespace,
        caller: &Identity,
        path: &str,
        permission: Option<FsPermission>,
    ) -> Result<bool> {
        if let Some(inode) = ns.inodes.get(path) {
            if inode.is_dir() {
                return Ok(true);
            }
            return Err(FsError::AlreadyExists(format!("{} is not a directory", path)));
        }

        let ancestor_path = ns.nearest_ancestor(path);
        let ancestor = ns
            .inodes
            .get(&ancestor_path)
            .ok_or_else(|| FsError::NotFound(ancestor_path.clone()))?;
        if !ancestor.is_dir() {
            return Err(FsError::InvalidOperation(format!(
                "Parent path is not a directory: {}",
                ancestor_path
            )));
        }
        self.check(caller, ancestor, FsAction::WRITE, &ancestor_path)?;

        let group = ancestor.group.clone();
        let permission = permission.unwrap_or_else(|| FsPermission::from_mode(0o755));
        let timestamp = now();
        let mut current = ancestor_path.clone();
        for component in path[ancestor_path.len()..].split('/').filter(|c| !c.is_empty()) {
            current = path::join(&current, component);
            ns.inodes.insert(
                current.clone(),
                Inode {
                    kind: InodeKind::Directory,
                    owner: caller.short_name().to_string(),
                    group: group.clone(),
                    permission,
                    replication: 0,
                    block_size: 0,
                    modification_time: timestamp,
                    access_time: timestamp,
                },
            );
        }
        debug!("mkdirs: created {}", path);
        Ok(true)
    }
}

impl StorageService for MemoryStorage {
    fn scheme(&self) -> &str {
        SCHEME
    }

    fn exists(&self, _caller: &Identity, path: &str) -> Result<bool> {
        let path = self.logical_path(path)?;
        Ok(self.read().inodes.contains_key(&path))
    }

    fn mkdirs(&self, caller: &Identity, path: &str, permission: Option<FsPermission>) -> Result<bool> {
        let path = self.logical_path(path)?;
        let mut ns = self.write();
        self.mkdirs_locked(&mut ns, caller, &path, permission)
    }

    fn create(&self, caller: &Identity, path: &str, overwrite: bool) -> Result<Box<dyn OutputStream>> {
        let path = self.logical_path(path)?;
        let parent = path::parent(&path).ok_or_else(|| FsError::InvalidPath(path.clone()))?;
        let mut ns = self.write();

        match ns.inodes.get(&path) {
            Some(inode) if inode.is_dir() => {
                return Err(FsError::AlreadyExists(format!("{} already exists as a directory", path)));
            }
            Some(_) if !overwrite => {
                return Err(FsError::AlreadyExists(format!("{} for client already exists", path)));
            }
            Some(inode) => self.check(caller, inode, FsAction::WRITE, &path)?,
            None => {}
        }

        self.mkdirs_locked(&mut ns, caller, &parent, None)?;
        let parent_inode = ns
            .inodes
            .get(&parent)
            .ok_or_else(|| FsError::NotFound(parent.clone()))?;
        self.check(caller, parent_inode, FsAction::WRITE, &parent)?;
        let group = parent_inode.group.clone();

        let timestamp = now();
        ns.inodes.insert(
            path.clone(),
            Inode {
                kind: InodeKind::File(Vec::new()),
                owner: caller.short_name().to_string(),
                group,
                permission: FsPermission::from_mode(0o644),
                replication: self.config.replication,
                block_size: self.config.block_size,
                modification_time: timestamp,
                access_time: timestamp,
            },
        );
        debug!("create: {} (overwrite={})", path, overwrite);

        Ok(Box::new(MemoryWriter::new(self.namespace.clone(), path, Vec::new())))
    }

    fn append(&self, caller: &Identity, path: &str) -> Result<Box<dyn OutputStream>> {
        let path = self.logical_path(path)?;
        let ns = self.read();
        let inode = ns.inodes.get(&path).ok_or_else(|| FsError::NotFound(path.clone()))?;
        self.check(caller, inode, FsAction::WRITE, &path)?;
        let existing = match &inode.kind {
            InodeKind::Directory => {
                return Err(FsError::InvalidOperation(format!("{} is a directory", path)));
            }
            InodeKind::File(data) => data.clone(),
        };
        drop(ns);

        Ok(Box::new(MemoryWriter::new(self.namespace.clone(), path, existing)))
    }

    fn open(&self, caller: &Identity, path: &str) -> Result<Box<dyn InputStream>> {
        let path = self.logical_path(path)?;
        let mut ns = self.write();

        if let Some(remaining) = ns.pending_failures.get_mut(&path) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FsError::BlockLengthUnavailable(path));
            }
        }

        let inode = ns.inodes.get_mut(&path).ok_or_else(|| FsError::NotFound(path.clone()))?;
        self.check(caller, inode, FsAction::READ, &path)?;
        let data = match &inode.kind {
            InodeKind::Directory => {
                return Err(FsError::InvalidOperation(format!("{} is a directory", path)));
            }
            InodeKind::File(data) => data.clone(),
        };
        inode.access_time = now();

        Ok(Box::new(Cursor::new(data)))
    }

    fn delete(&self, caller: &Identity, path: &str, recursive: bool) -> Result<bool> {
        let path = self.logical_path(path)?;
        let mut ns = self.write();

        let Some(inode) = ns.inodes.get(&path) else {
            return Ok(false);
        };
        let Some(parent) = path::parent(&path) else {
            return Err(FsError::InvalidOperation("Cannot delete the root directory".into()));
        };
        if inode.is_dir() && !recursive && !ns.children(&path).is_empty() {
            return Err(FsError::InvalidOperation(format!("{} is non empty': Directory is not empty", path)));
        }
        if let Some(parent_inode) = ns.inodes.get(&parent) {
            self.check(caller, parent_inode, FsAction::WRITE, &parent)?;
        }

        for key in ns.subtree(&path) {
            ns.inodes.remove(&key);
        }
        debug!("delete: removed {} (recursive={})", path, recursive);
        Ok(true)
    }

    fn rename(&self, caller: &Identity, src: &str, dst: &str) -> Result<bool> {
        let src = self.logical_path(src)?;
        let mut dst = self.logical_path(dst)?;
        let mut ns = self.write();

        if src == "/" || !ns.inodes.contains_key(&src) {
            return Ok(false);
        }
        if ns.inodes.get(&dst).map_or(false, Inode::is_dir) {
            dst = path::join(&dst, path::name(&src));
        }
        if ns.inodes.contains_key(&dst) || path::is_within(&dst, &src) {
            return Ok(false);
        }

        let Some(dst_parent) = path::parent(&dst) else {
            return Ok(false);
        };
        match ns.inodes.get(&dst_parent) {
            Some(inode) if inode.is_dir() => self.check(caller, inode, FsAction::WRITE, &dst_parent)?,
            _ => return Ok(false),
        }
        if let Some(src_parent) = path::parent(&src) {
            if let Some(inode) = ns.inodes.get(&src_parent) {
                self.check(caller, inode, FsAction::WRITE, &src_parent)?;
            }
        }

        for key in ns.subtree(&src) {
            if let Some(inode) = ns.inodes.remove(&key) {
                let moved = format!("{}{}", dst, &key[src.len()..]);
                ns.inodes.insert(moved, inode);
            }
        }
        debug!("rename: {} -> {}", src, dst);
        Ok(true)
    }

    fn list_status(&self, caller: &Identity, path: &str) -> Result<Vec<FileStatus>> {
        let path = self.logical_path(path)?;
        let ns = self.read();
        let inode = ns
            .inodes
            .get(&path)
            .ok_or_else(|| FsError::NotFound(format!("File {} does not exist.", path)))?;
        if !inode.is_dir() {
            return Ok(vec![self.status_of(&path, inode)]);
        }
        self.check(caller, inode, FsAction::READ, &path)?;

        Ok(ns
            .children(&path)
            .iter()
            .filter_map(|child| ns.inodes.get(child).map(|inode| self.status_of(child, inode)))
            .collect())
    }

    fn file_status(&self, _caller: &Identity, path: &str) -> Result<FileStatus> {
        let path = self.logical_path(path)?;
        let ns = self.read();
        ns.inodes
            .get(&path)
            .map(|inode| self.status_of(&path, inode))
            .ok_or_else(|| FsError::NotFound(format!("File does not exist: {}", path)))
    }

    fn block_locations(&self, caller: &Identity, status: &FileStatus, start: u64, len: u64) -> Result<Vec<BlockLocation>> {
        let path = self.logical_path(&status.path)?;
        let ns = self.read();
        let inode = ns.inodes.get(&path).ok_or_else(|| FsError::NotFound(path.clone()))?;
        if inode.is_dir() {
            return Ok(Vec::new());
        }
        self.check(caller, inode, FsAction::READ, &path)?;

        let file_len = inode.len();
        if start >= file_len || len == 0 {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(len).min(file_len);
        let block_size = inode.block_size.max(1);
        let replicas = usize::from(inode.replication).min(self.datanodes.len());

        Ok(((start / block_size)..=((end - 1) / block_size))
            .map(|index| {
                let offset = index * block_size;
                BlockLocation {
                    offset,
                    length: block_size.min(file_len - offset),
                    hosts: (0..replicas)
                        .map(|k| self.datanodes[(index as usize + k) % self.datanodes.len()].clone())
                        .collect(),
                }
            })
            .collect())
    }

    fn set_permission(&self, caller: &Identity, path: &str, permission: FsPermission) -> Result<()> {
        let path = self.logical_path(path)?;
        let mut ns = self.write();
        let inode = ns.inodes.get_mut(&path).ok_or_else(|| FsError::NotFound(path.clone()))?;
        if !self.is_superuser(caller) && inode.owner != caller.short_name() {
            return Err(FsError::PermissionDenied(format!(
                "{} is not the owner of {}",
                caller.short_name(),
                path
            )));
        }
        inode.permission = permission;
        Ok(())
    }

    fn set_owner(&self, caller: &Identity, path: &str, user: Option<&str>, group: Option<&str>) -> Result<()> {
        let path = self.logical_path(path)?;
        let superuser = self.is_superuser(caller);
        let mut ns = self.write();
        let inode = ns.inodes.get_mut(&path).ok_or_else(|| FsError::NotFound(path.clone()))?;

        if user.is_some() && !superuser {
            return Err(FsError::PermissionDenied("Non-super user cannot change owner".into()));
        }
        if let Some(group) = group {
            if !superuser && (inode.owner != caller.short_name() || !caller.is_member_of(group)) {
                return Err(FsError::PermissionDenied(format!(
                    "User {} does not belong to {}",
                    caller.short_name(),
                    group
                )));
            }
        }

        if let Some(user) = user {
            inode.owner = user.to_string();
        }
        if let Some(group) = group {
            inode.group = group.to_string();
        }
        Ok(())
    }

    fn status(&self, _caller: &Identity) -> Result<FsStatus> {
        let ns = self.read();
        let used = ns
            .inodes
            .values()
            .map(|inode| inode.len() * u64::from(inode.replication))
            .sum::<u64>();
        Ok(FsStatus {
            capacity: self.config.capacity,
            used,
            remaining: self.config.capacity.saturating_sub(used),
        })
    }

    fn group_memberships(&self, user: &str) -> Vec<String> {
        let mut groups = self.user_groups.get(user).cloned().unwrap_or_default();
        if user == self.superuser && !groups.contains(&self.supergroup) {
            groups.push(self.supergroup.clone());
        }
        groups
    }

    fn trash_interval(&self) -> Duration {
        self.config.trash_interval()
    }

    fn close(&self) -> Result<()> {
        info!("MemoryStorage {} closed", self.uri());
        Ok(())
    }
}

struct MemoryWriter {
    namespace: Arc<RwLock<Namespace>>,
    path: String,
    buffer: Vec<u8>,
    closed: bool,
}

impl MemoryWriter {
    fn new(namespace: Arc<RwLock<Namespace>>, path: String, buffer: Vec<u8>) -> Self {
        Self {
            namespace,
            path,
            buffer,
            closed: false,
        }
    }

    fn commit(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut ns = self.namespace.write().unwrap_or_else(PoisonError::into_inner);
        match ns.inodes.get_mut(&self.path) {
            Some(Inode {
                kind: InodeKind::File(data),
                modification_time,
                ..
            }) => {
                *data = std::mem::take(&mut self.buffer);
                *modification_time = now();
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} was removed while open", self.path),
            )),
        }
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::Other, "stream closed"));
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputStream for MemoryWriter {
    fn close(mut self: Box<Self>) -> io::Result<()> {
        self.commit()
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.commit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn storage() -> MemoryStorage {
        MemoryStorage::new("hdfs")
            .with_config(StorageConfig::default().with_block_size(4))
            .with_user_groups("alice", &["staff"])
    }

    fn alice() -> Identity {
        Identity::new("alice", vec!["staff".into()])
    }

    fn write_file(fs: &MemoryStorage, id: &Identity, path: &str, data: &[u8]) {
        let mut out = fs.create(id, path, true).unwrap();
        out.write_all(data).unwrap();
        out.close().unwrap();
    }

    fn read_file(fs: &MemoryStorage, id: &Identity, path: &str) -> String {
        let mut s = String::new();
        fs.open(id, path).unwrap().read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn test_create_and_read() {
        let fs = storage();
        let id = alice();
        write_file(&fs, &id, "/a/b/f.txt", b"hello");
        assert!(fs.is_directory(&id, "/a/b").unwrap());
        assert_eq!(read_file(&fs, &id, "memory://localhost/a/b/f.txt"), "hello");

        let status = fs.file_status(&id, "/a/b/f.txt").unwrap();
        assert_eq!(status.owner, "alice");
        assert_eq!(status.length, 5);
        assert_eq!(status.path, "memory://localhost/a/b/f.txt");
        assert!(matches!(fs.create(&id, "/a/b/f.txt", false), Err(FsError::AlreadyExists(_))));
    }

    #[test]
    fn test_wrong_scheme_rejected() {
        let fs = storage();
        assert!(matches!(fs.exists(&alice(), "file:///tmp"), Err(FsError::InvalidPath(_))));
    }

    #[test]
    fn test_append() {
        let fs = storage();
        let id = alice();
        write_file(&fs, &id, "/f", b"ab");
        let mut out = fs.append(&id, "/f").unwrap();
        out.write_all(b"cd").unwrap();
        out.close().unwrap();
        assert_eq!(read_file(&fs, &id, "/f"), "abcd");
    }

    #[test]
    fn test_permission_enforced() {
        let fs = storage();
        let id = alice();
        fs.mkdirs(&id, "/private", Some(FsPermission::from_mode(0o700))).unwrap();
        write_file(&fs, &id, "/private/secret", b"x");

        let bob = Identity::new("bob", vec![]);
        assert!(matches!(fs.list_status(&bob, "/private"), Err(FsError::PermissionDenied(_))));
        assert!(matches!(fs.create(&bob, "/private/mine", true), Err(FsError::PermissionDenied(_))));
        assert!(matches!(fs.set_permission(&bob, "/private", FsPermission::default()), Err(FsError::PermissionDenied(_))));

        let admin = Identity::new("hdfs", vec![]);
        assert_eq!(fs.list_status(&admin, "/private").unwrap().len(), 1);
    }

    #[test]
    fn test_set_owner_rules() {
        let fs = storage();
        let id = alice();
        write_file(&fs, &id, "/f", b"x");
        assert!(fs.set_owner(&id, "/f", Some("bob"), None).is_err());
        fs.set_owner(&id, "/f", None, Some("staff")).unwrap();
        assert!(fs.set_owner(&id, "/f", None, Some("wheel")).is_err());
        fs.set_owner(&Identity::new("hdfs", vec![]), "/f", Some("bob"), Some("wheel")).unwrap();
        let status = fs.file_status(&id, "/f").unwrap();
        assert_eq!((status.owner.as_str(), status.group.as_str()), ("bob", "wheel"));
    }

    #[test]
    fn test_delete_and_rename() {
        let fs = storage();
        let id = alice();
        write_file(&fs, &id, "/d/x", b"1");
        write_file(&fs, &id, "/d/sub/y", b"2");

        assert!(fs.delete(&id, "/d", false).is_err());
        assert!(!fs.delete(&id, "/missing", true).unwrap());

        fs.mkdirs(&id, "/e", None).unwrap();
        assert!(fs.rename(&id, "/d", "/e").unwrap());
        assert!(fs.exists(&id, "/e/d/sub/y").unwrap());
        assert!(!fs.exists(&id, "/d").unwrap());
        assert!(!fs.rename(&id, "/e", "/e/d/inner").unwrap());

        assert!(fs.delete(&id, "/e", true).unwrap());
        assert!(!fs.exists(&id, "/e/d/x").unwrap());
    }

    #[test]
    fn test_list_children_only() {
        let fs = storage();
        let id = alice();
        write_file(&fs, &id, "/data/f", b"1");
        write_file(&fs, &id, "/data/sub/g", b"2");
        write_file(&fs, &id, "/data-other/h", b"3");

        let names: Vec<String> = fs
            .list_status(&id, "/data")
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["f", "sub"]);
    }

    #[test]
    fn test_block_locations() {
        let fs = storage();
        let id = alice();
        write_file(&fs, &id, "/blocks", b"0123456789");
        let status = fs.file_status(&id, "/blocks").unwrap();
        let blocks = fs.block_locations(&id, &status, 0, status.length).unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!((blocks[0].offset, blocks[0].length), (0, 4));
        assert_eq!((blocks[2].offset, blocks[2].length), (8, 2));
        assert_eq!(blocks[0].hosts, vec!["dn1", "dn2", "dn3"]);
        assert_eq!(blocks[1].hosts, vec!["dn2", "dn3", "dn1"]);
    }

    #[test]
    fn test_injected_failures() {
        let fs = storage();
        let id = alice();
        write_file(&fs, &id, "/f", b"x");
        fs.inject_block_length_failures("/f", 2);

        assert!(fs.open(&id, "/f").err().unwrap().is_transient());
        assert!(fs.open(&id, "/f").err().unwrap().is_transient());
        assert_eq!(read_file(&fs, &id, "/f"), "x");
    }

    #[test]
    fn test_status_counts_replicas() {
        let fs = storage();
        write_file(&fs, &alice(), "/f", b"abc");
        let status = fs.status(&alice()).unwrap();
        assert_eq!(status.used, 9);
        assert_eq!(status.remaining, status.capacity - 9);
    }
}
