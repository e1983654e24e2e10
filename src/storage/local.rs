use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use rustix::process::{getgid, getuid, Gid, Uid};
use tracing::{debug, error, info};
use crate::config::StorageConfig;
use crate::error::{FsError, Result};
use crate::identity::Identity;
use crate::path;
use crate::permission::FsPermission;
use crate::status::{BlockLocation, FileStatus, FsStatus};
use super::{InputStream, OutputStream, StorageService};

const SCHEME: &str = "file";

/// 以本地目录作为存储根的实现
///
/// 文件系统权限由本进程的操作系统身份决定，调用者身份只用于
/// home 目录与组信息；uid/gid 不是当前用户时以数字形式展示。
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    config: StorageConfig,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self {
            base_path: root,
            config: StorageConfig::default(),
        }
    }

    pub fn with_config(mut self, config: StorageConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn full_path(&self, path: &str) -> Result<(String, PathBuf)> {
        let logical = self.logical_path(path)?;
        let full = self.base_path.join(logical.trim_start_matches('/'));
        Ok((logical, full))
    }

    fn owner_name(uid: u32) -> String {
        if uid == getuid().as_raw() {
            whoami::username()
        } else {
            uid.to_string()
        }
    }

    fn resolve_uid(user: &str) -> Result<Uid> {
        if user == whoami::username() {
            return Ok(getuid());
        }
        let raw: u32 = user
            .parse()
            .map_err(|_| FsError::InvalidOperation(format!("unknown user: {}", user)))?;
        Ok(unsafe { Uid::from_raw(raw) })
    }

    fn resolve_gid(group: &str) -> Result<Gid> {
        let raw: u32 = group
            .parse()
            .map_err(|_| FsError::InvalidOperation(format!("unknown group: {}", group)))?;
        Ok(unsafe { Gid::from_raw(raw) })
    }

    fn millis(time: io::Result<SystemTime>) -> i64 {
        time.ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn status_of(&self, logical: &str, full: &Path) -> Result<FileStatus> {
        let metadata = fs::metadata(full).map_err(|e| FsError::from_io(e, logical))?;
        Ok(FileStatus {
            path: format!("{}://{}", SCHEME, logical),
            length: if metadata.is_dir() { 0 } else { metadata.len() },
            is_dir: metadata.is_dir(),
            replication: 1,
            block_size: self.config.block_size,
            modification_time: Self::millis(metadata.modified()),
            access_time: Self::millis(metadata.accessed()),
            owner: Self::owner_name(metadata.uid()),
            group: metadata.gid().to_string(),
            permission: Some(FsPermission::from_mode(metadata.mode() & 0o7777)),
        })
    }
}

impl StorageService for LocalStorage {
    fn scheme(&self) -> &str {
        SCHEME
    }

    fn exists(&self, _caller: &Identity, path: &str) -> Result<bool> {
        let (_, full) = self.full_path(path)?;
        Ok(full.exists())
    }

    fn mkdirs(&self, _caller: &Identity, path: &str, permission: Option<FsPermission>) -> Result<bool> {
        let (logical, full) = self.full_path(path)?;
        if full.is_file() {
            return Err(FsError::AlreadyExists(format!("{} is not a directory", logical)));
        }
        if full.is_dir() {
            return Ok(true);
        }
        debug!("mkdirs: creating directory at {:?}", full);
        fs::create_dir_all(&full).map_err(|e| {
            error!("mkdirs error for path={:?}: {:?}", full, e);
            FsError::from_io(e, &logical)
        })?;
        if let Some(permission) = permission {
            fs::set_permissions(&full, fs::Permissions::from_mode(permission.to_mode()))
                .map_err(|e| FsError::from_io(e, &logical))?;
        }
        Ok(true)
    }

    fn create(&self, _caller: &Identity, path: &str, overwrite: bool) -> Result<Box<dyn OutputStream>> {
        let (logical, full) = self.full_path(path)?;
        if full.is_dir() {
            return Err(FsError::AlreadyExists(format!("{} already exists as a directory", logical)));
        }
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| FsError::from_io(e, &logical))?;
        }

        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        debug!("create: {:?} (overwrite={})", full, overwrite);
        let file = options.open(&full).map_err(|e| FsError::from_io(e, &logical))?;
        Ok(Box::new(LocalWriter { file }))
    }

    fn append(&self, _caller: &Identity, path: &str) -> Result<Box<dyn OutputStream>> {
        let (logical, full) = self.full_path(path)?;
        if full.is_dir() {
            return Err(FsError::InvalidOperation(format!("{} is a directory", logical)));
        }
        let file = OpenOptions::new()
            .append(true)
            .open(&full)
            .map_err(|e| FsError::from_io(e, &logical))?;
        Ok(Box::new(LocalWriter { file }))
    }

    fn open(&self, _caller: &Identity, path: &str) -> Result<Box<dyn InputStream>> {
        let (logical, full) = self.full_path(path)?;
        if full.is_dir() {
            return Err(FsError::InvalidOperation(format!("{} is a directory", logical)));
        }
        let file = File::open(&full).map_err(|e| FsError::from_io(e, &logical))?;
        Ok(Box::new(file))
    }

    fn delete(&self, _caller: &Identity, path: &str, recursive: bool) -> Result<bool> {
        let (logical, full) = self.full_path(path)?;
        if logical == "/" {
            return Err(FsError::InvalidOperation("Cannot delete the root directory".into()));
        }
        if !full.exists() {
            return Ok(false);
        }

        let result = if full.is_dir() {
            if recursive {
                fs::remove_dir_all(&full)
            } else {
                fs::remove_dir(&full)
            }
        } else {
            fs::remove_file(&full)
        };
        result.map_err(|e| FsError::from_io(e, &logical))?;
        Ok(true)
    }

    fn rename(&self, _caller: &Identity, src: &str, dst: &str) -> Result<bool> {
        let (src_logical, src_full) = self.full_path(src)?;
        let (mut dst_logical, mut dst_full) = self.full_path(dst)?;
        if src_logical == "/" || !src_full.exists() {
            return Ok(false);
        }
        if dst_full.is_dir() {
            dst_logical = path::join(&dst_logical, path::name(&src_logical));
            dst_full = dst_full.join(path::name(&src_logical));
        }
        if dst_full.exists() || path::is_within(&dst_logical, &src_logical) {
            return Ok(false);
        }
        if !dst_full.parent().map_or(false, Path::is_dir) {
            return Ok(false);
        }

        fs::rename(&src_full, &dst_full).map_err(|e| FsError::from_io(e, &src_logical))?;
        debug!("rename: {} -> {}", src_logical, dst_logical);
        Ok(true)
    }

    fn list_status(&self, _caller: &Identity, path: &str) -> Result<Vec<FileStatus>> {
        let (logical, full) = self.full_path(path)?;
        if !full.exists() {
            return Err(FsError::NotFound(format!("File {} does not exist.", logical)));
        }
        if !full.is_dir() {
            return Ok(vec![self.status_of(&logical, &full)?]);
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&full).map_err(|e| FsError::from_io(e, &logical))? {
            let entry = entry.map_err(|e| FsError::from_io(e, &logical))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            } else {
                debug!("list_status: skipping non UTF-8 entry {:?}", entry.file_name());
            }
        }
        names.sort();

        names
            .iter()
            .map(|name| self.status_of(&path::join(&logical, name), &full.join(name)))
            .collect()
    }

    fn file_status(&self, _caller: &Identity, path: &str) -> Result<FileStatus> {
        let (logical, full) = self.full_path(path)?;
        self.status_of(&logical, &full)
    }

    fn block_locations(&self, _caller: &Identity, status: &FileStatus, start: u64, len: u64) -> Result<Vec<BlockLocation>> {
        if status.is_dir || start >= status.length || len == 0 {
            return Ok(Vec::new());
        }
        let host = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
        let block_size = self.config.block_size.max(1);
        let end = start.saturating_add(len).min(status.length);

        Ok(((start / block_size)..=((end - 1) / block_size))
            .map(|index| {
                let offset = index * block_size;
                BlockLocation {
                    offset,
                    length: block_size.min(status.length - offset),
                    hosts: vec![host.clone()],
                }
            })
            .collect())
    }

    fn set_permission(&self, _caller: &Identity, path: &str, permission: FsPermission) -> Result<()> {
        let (logical, full) = self.full_path(path)?;
        fs::set_permissions(&full, fs::Permissions::from_mode(permission.to_mode()))
            .map_err(|e| FsError::from_io(e, &logical))
    }

    fn set_owner(&self, _caller: &Identity, path: &str, user: Option<&str>, group: Option<&str>) -> Result<()> {
        let (logical, full) = self.full_path(path)?;
        let uid = user.map(Self::resolve_uid).transpose()?;
        let gid = group.map(Self::resolve_gid).transpose()?;
        rustix::fs::chown(&full, uid, gid).map_err(|e| FsError::from_io(e.into(), &logical))
    }

    fn status(&self, _caller: &Identity) -> Result<FsStatus> {
        let stat = rustix::fs::statvfs(&self.base_path)
            .map_err(|e| FsError::from_io(e.into(), &self.base_path.to_string_lossy()))?;
        let fragment = stat.f_frsize;
        Ok(FsStatus {
            capacity: stat.f_blocks * fragment,
            used: stat.f_blocks.saturating_sub(stat.f_bfree) * fragment,
            remaining: stat.f_bavail * fragment,
        })
    }

    fn group_memberships(&self, user: &str) -> Vec<String> {
        if user == whoami::username() {
            vec![getgid().as_raw().to_string()]
        } else {
            Vec::new()
        }
    }

    fn trash_interval(&self) -> Duration {
        self.config.trash_interval()
    }

    fn close(&self) -> Result<()> {
        info!("LocalStorage {:?} closed", self.base_path);
        Ok(())
    }
}

struct LocalWriter {
    file: File,
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl OutputStream for LocalWriter {
    fn close(self: Box<Self>) -> io::Result<()> {
        self.file.sync_all()
    }
}
