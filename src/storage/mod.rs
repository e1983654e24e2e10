pub mod local;
pub mod memory;
pub mod trash_policy;

use std::fmt;
use std::io::{self, Read, Seek, Write};
use std::time::Duration;
use tracing::debug;
use crate::error::{FsError, Result};
use crate::identity::Identity;
use crate::path;
use crate::permission::FsPermission;
use crate::status::{BlockLocation, FileStatus, FsStatus};

pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use trash_policy::TrashPolicy;

pub trait InputStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> InputStream for T {}

/// 输出流，写入的数据在 `close` 后对其他读者可见
pub trait OutputStream: Write + Send {
    fn close(self: Box<Self>) -> io::Result<()>;
}

pub trait StorageService: Send + Sync + fmt::Debug {
    fn scheme(&self) -> &str;

    fn exists(&self, caller: &Identity, path: &str) -> Result<bool>;
    /// 递归创建目录；目录已存在时返回 true
    fn mkdirs(&self, caller: &Identity, path: &str, permission: Option<FsPermission>) -> Result<bool>;
    fn create(&self, caller: &Identity, path: &str, overwrite: bool) -> Result<Box<dyn OutputStream>>;
    fn append(&self, caller: &Identity, path: &str) -> Result<Box<dyn OutputStream>>;
    fn open(&self, caller: &Identity, path: &str) -> Result<Box<dyn InputStream>>;
    fn delete(&self, caller: &Identity, path: &str, recursive: bool) -> Result<bool>;
    fn rename(&self, caller: &Identity, src: &str, dst: &str) -> Result<bool>;
    fn list_status(&self, caller: &Identity, path: &str) -> Result<Vec<FileStatus>>;
    fn file_status(&self, caller: &Identity, path: &str) -> Result<FileStatus>;
    fn block_locations(&self, caller: &Identity, status: &FileStatus, start: u64, len: u64) -> Result<Vec<BlockLocation>>;
    fn set_permission(&self, caller: &Identity, path: &str, permission: FsPermission) -> Result<()>;
    fn set_owner(&self, caller: &Identity, path: &str, user: Option<&str>, group: Option<&str>) -> Result<()>;
    fn status(&self, caller: &Identity) -> Result<FsStatus>;
    fn group_memberships(&self, user: &str) -> Vec<String>;
    /// 回收站检查点保留时间，为零表示未启用回收站
    fn trash_interval(&self) -> Duration;
    fn close(&self) -> Result<()>;

    /// 把传入路径转为本存储的逻辑路径，scheme 不匹配时报错
    fn logical_path(&self, path: &str) -> Result<String> {
        if let Some(scheme) = path::scheme(path) {
            if scheme != self.scheme() {
                return Err(FsError::InvalidPath(format!(
                    "Wrong FS: {}, expected: {}://",
                    path,
                    self.scheme()
                )));
            }
        }
        path::normalize(path)
    }

    fn is_directory(&self, caller: &Identity, path: &str) -> Result<bool> {
        match self.file_status(caller, path) {
            Ok(status) => Ok(status.is_dir),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn home_directory(&self, caller: &Identity) -> String {
        format!("/user/{}", caller.short_name())
    }

    fn copy(&self, caller: &Identity, src: &str, dst: &str, delete_source: bool) -> Result<bool> {
        copy_tree(self, caller, src, dst, delete_source)
    }

    fn trash_enabled(&self) -> bool {
        !self.trash_interval().is_zero()
    }

    fn current_trash_dir(&self, caller: &Identity) -> String {
        TrashPolicy::new(self, caller).current_dir()
    }

    fn move_to_trash(&self, caller: &Identity, path: &str) -> Result<bool> {
        TrashPolicy::new(self, caller).move_to_trash(path)
    }

    fn expunge(&self, caller: &Identity, immediate: bool) -> Result<()> {
        let policy = TrashPolicy::new(self, caller);
        if immediate {
            policy.expunge_immediately()
        } else {
            policy.expunge()
        }
    }
}

/// 复制文件或目录树；`dst` 是已存在目录时复制到其下同名位置
pub fn copy_tree<S: StorageService + ?Sized>(
    fs: &S,
    caller: &Identity,
    src: &str,
    dst: &str,
    delete_source: bool,
) -> Result<bool> {
    let src = fs.logical_path(src)?;
    let mut target = fs.logical_path(dst)?;
    let status = fs.file_status(caller, &src)?;

    if fs.is_directory(caller, &target)? {
        target = path::join(&target, status.name());
    }
    if target == src {
        debug!("copy: {} onto itself, nothing to do", src);
        return Ok(true);
    }
    if status.is_dir && path::is_within(&target, &src) {
        return Err(FsError::InvalidOperation(format!(
            "cannot copy {} to its own subdirectory {}",
            src, target
        )));
    }

    copy_entry(fs, caller, &status, &src, &target)?;

    if delete_source {
        return fs.delete(caller, &src, true);
    }
    Ok(true)
}

fn copy_entry<S: StorageService + ?Sized>(
    fs: &S,
    caller: &Identity,
    status: &FileStatus,
    src: &str,
    target: &str,
) -> Result<()> {
    if status.is_dir {
        fs.mkdirs(caller, target, None)?;
        for child in fs.list_status(caller, src)? {
            let name = child.name().to_string();
            copy_entry(fs, caller, &child, &path::join(src, &name), &path::join(target, &name))?;
        }
        return Ok(());
    }

    debug!("copy: {} -> {}", src, target);
    let mut input = fs.open(caller, src)?;
    let mut output = fs.create(caller, target, true)?;
    if let Err(e) = io::copy(&mut input, &mut output) {
        let _ = output.close();
        return Err(FsError::from_io(e, src));
    }
    output.close().map_err(|e| FsError::from_io(e, target))
}
