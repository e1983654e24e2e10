pub(crate) mod transfer;

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};
use crate::config::ClientConfig;
use crate::error::{FsError, ReportError, Result};
use crate::identity::Identity;
use crate::path::{self, PathResolver};
use crate::permission::{FsPermission, PermissionLevel};
use crate::retry::{Interrupter, RetryExecutor};
use crate::status::{byte_to_size, BlockLocation, FileEntry, FileStatus, FsStatus, StatusMapper};
use crate::storage::{InputStream, OutputStream, StorageService};
use crate::trash::TrashManager;

pub type StatusFilter<'a> = &'a dyn Fn(&FileStatus) -> bool;

#[derive(Debug)]
pub struct DfsClient {
    config: ClientConfig,
    resolver: PathResolver,
    executor: Arc<RetryExecutor>,
    trash: TrashManager,
    status_lock: Mutex<()>,
}

impl DfsClient {
    /// 创建客户端；`config.user` 为空时使用当前进程用户
    pub fn new(config: ClientConfig, storage: Arc<dyn StorageService>) -> Result<Self> {
        config.validate()?;

        let identity = match config.user.as_deref().filter(|u| !path::is_blank(u)) {
            Some(user) => Identity::new(user.trim(), Vec::new()),
            None => Identity::current(),
        };
        let groups = storage.group_memberships(identity.short_name());
        let identity = identity.with_groups(groups);
        info!(
            "DfsClient: user={} groups={:?} root={}",
            identity,
            identity.groups(),
            config.root_uri
        );

        let resolver = PathResolver::new(config.root_uri.as_str());
        let executor = Arc::new(RetryExecutor::new(storage, identity, config.retry));
        let trash = TrashManager::new(executor.clone(), resolver.clone());

        Ok(Self {
            config,
            resolver,
            executor,
            trash,
            status_lock: Mutex::new(()),
        })
    }

    pub fn identity(&self) -> &Identity {
        self.executor.identity()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn trash(&self) -> &TrashManager {
        &self.trash
    }

    /// 打断本客户端上正在进行的退避等待，空闲时调用不影响后续操作
    pub fn interrupter(&self) -> &Interrupter {
        self.executor.interrupter()
    }

    fn resolve(&self, target: &str) -> Result<String> {
        self.resolver.resolve(target)
    }

    fn entry_for(&self, resolved: &str) -> Result<FileEntry> {
        let status = self.executor.execute(|s| s.file_status(resolved))?;
        StatusMapper::map(&status, self.identity())
    }

    pub fn status(&self) -> Result<FsStatus> {
        let _guard = self.status_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let status = self.executor.execute(|s| s.status())?;
        info!("容量：{}", byte_to_size(status.capacity));
        info!("已使用：{}", byte_to_size(status.used));
        info!("剩余：{}", byte_to_size(status.remaining));
        Ok(status)
    }

    pub fn mkdir(&self, target: &str) -> Result<bool> {
        let resolved = self.resolve(target)?;
        let created = self.executor.execute(|s| s.mkdirs(&resolved, None))?;
        debug!("mkdir {}: {}", resolved, created);
        Ok(created)
    }

    pub fn create_shared_dir(&self, target: &str) -> Result<bool> {
        let resolved = self.resolve(target)?;
        self.executor
            .execute(|s| s.mkdirs(&resolved, Some(FsPermission::from_mode(0o777))))
    }

    /// 不存在则创建，返回路径是否为目录；空路径返回 false
    pub fn ensure_dir(&self, target: &str) -> Result<bool> {
        if path::is_blank(target) {
            return Ok(false);
        }
        let resolved = self.resolve(target)?;
        self.executor.execute(|s| {
            if !s.exists(&resolved)? {
                s.mkdirs(&resolved, None)?;
            }
            s.is_directory(&resolved)
        })
    }

    pub fn create_file(&self, target: &str, overwrite: bool) -> Result<Box<dyn OutputStream>> {
        let resolved = self.resolve(target)?;
        self.executor.execute(|s| s.create(&resolved, overwrite))
    }

    pub fn append_file(&self, target: &str) -> Result<Box<dyn OutputStream>> {
        let resolved = self.resolve(target)?;
        self.executor.execute(|s| s.append(&resolved))
    }

    pub fn open(&self, target: &str) -> Result<Box<dyn InputStream>> {
        let resolved = self.resolve(target)?;
        self.executor.execute(|s| s.open(&resolved))
    }

    /// 删除路径：默认移入回收站，`skip_trash` 时直接删除。失败只记录日志并返回 false
    pub fn rmdir(&self, target: &str, recursive: bool, skip_trash: bool) -> bool {
        let result = if skip_trash {
            self.resolve(target).and_then(|resolved| {
                let deleted = self.executor.execute(|s| s.delete(&resolved, recursive))?;
                if deleted {
                    info!("{} 删除成功！", resolved);
                }
                Ok(deleted)
            })
        } else {
            self.trash.move_to_trash(target).map(|moved| {
                if moved {
                    info!("{} 已移入回收站", target);
                }
                moved
            })
        };

        match result {
            Ok(done) => done,
            Err(e) => {
                error!("删除 {} 失败：{}", target, e);
                false
            }
        }
    }

    pub fn list(&self, target: &str, filter: Option<StatusFilter<'_>>) -> Result<Vec<FileEntry>> {
        let statuses = self.list_status(target)?;
        let identity = self.identity();

        let entries = statuses
            .iter()
            .filter(|status| filter.map_or(true, |f| f(*status)))
            .filter_map(|status| match StatusMapper::map(status, identity) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("skip {}: {}", status.path, e);
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    pub fn list_status(&self, target: &str) -> Result<Vec<FileStatus>> {
        let resolved = self.resolve(target)?;
        self.executor.execute(|s| s.list_status(&resolved))
    }

    pub fn file_entry(&self, target: &str) -> Result<FileEntry> {
        let resolved = self.resolve(target)?;
        self.entry_for(&resolved)
    }

    pub fn upload_stream<R: Read>(&self, mut source: R, dest: &str) -> Result<FileEntry> {
        let resolved = self.resolve(dest)?;
        let mut output = self.executor.execute(|s| s.create(&resolved, true))?;

        let copied = transfer::copy_chunked(&mut source, &mut output, self.config.upload_buffer_size);
        drop(source);
        let closed = output.close();
        let bytes = copied.map_err(|e| FsError::from_io(e, &resolved))?;
        closed.map_err(|e| FsError::from_io(e, &resolved))?;

        info!("{} 写入成功！({})", resolved, byte_to_size(bytes));
        self.entry_for(&resolved)
    }

    pub fn upload_local(&self, src: &Path, dest_dir: &str, delete_src: bool, overwrite: bool) -> Result<FileEntry> {
        if src.is_dir() {
            return Err(FsError::InvalidOperation(format!("{} is a directory", src.display())));
        }
        let file_name = src
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FsError::InvalidPath(src.display().to_string()))?;

        self.mkdir(dest_dir)?;
        let resolved = self.resolve(&path::join(dest_dir, file_name))?;
        let mut input = File::open(src).map_err(|e| FsError::from_io(e, &src.display().to_string()))?;
        let mut output = self.executor.execute(|s| s.create(&resolved, overwrite))?;

        let copied = transfer::copy_chunked(&mut input, &mut output, self.config.upload_buffer_size);
        let closed = output.close();
        copied.map_err(|e| FsError::from_io(e, &resolved))?;
        closed.map_err(|e| FsError::from_io(e, &resolved))?;

        if delete_src {
            fs::remove_file(src)?;
        }
        info!("上传 {} -> {}", src.display(), resolved);
        self.entry_for(&resolved)
    }

    pub fn download_to_local(&self, src: &str, local_dest: &Path) -> Result<PathBuf> {
        let resolved = self.resolve(src)?;
        let dest = if local_dest.is_dir() {
            local_dest.join(path::name(&resolved))
        } else {
            local_dest.to_path_buf()
        };
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut input = self.executor.execute(|s| s.open(&resolved))?;
        let mut output = File::create(&dest)?;
        let bytes = transfer::copy_chunked(&mut input, &mut output, self.config.download_chunk_size)
            .map_err(|e| FsError::from_io(e, &resolved))?;
        output.sync_all()?;

        info!("下载 {} -> {} ({})", resolved, dest.display(), byte_to_size(bytes));
        Ok(dest)
    }

    pub fn download_to_response<W: Write>(&self, src: &str, mut sink: W) -> Result<u64> {
        let resolved = self.resolve(src)?;
        debug!("download: {}", path::name(&resolved));
        let mut input = self.executor.execute(|s| s.open(&resolved))?;

        let streamed = transfer::stream_chunks(&mut input, &mut sink, self.config.download_chunk_size);
        let flushed = sink.flush();
        drop(input);
        drop(sink);

        let bytes = streamed.map_err(|e| FsError::from_io(e, &resolved))?;
        flushed?;
        Ok(bytes)
    }

    pub fn block_locations(&self, target: &str) -> Vec<BlockLocation> {
        let result = self.resolve(target).and_then(|resolved| {
            self.executor.execute(|s| {
                let status = s.file_status(&resolved)?;
                s.block_locations(&status)
            })
        });

        match result {
            Ok(blocks) => {
                for block in &blocks {
                    info!(
                        "block offset={} length={} ({:.2}kb) hosts={:?}",
                        block.offset,
                        block.length,
                        block.length as f64 / 1024.0,
                        block.hosts
                    );
                }
                blocks
            }
            Err(e) => {
                error!("获取 {} 块信息失败：{}", target, e);
                Vec::new()
            }
        }
    }

    /// 重命名；源与目标最后一级名字相同时视为成功且不做任何操作
    pub fn rename(&self, src: &str, dest: &str) -> Result<bool> {
        let source = self.resolve(src)?;
        let target = self.resolve(dest)?;
        if path::name(&source) == path::name(&target) {
            debug!("rename: {} and {} share the same name, skipped", source, target);
            return Ok(true);
        }

        match self.executor.execute(|s| s.rename(&source, &target)) {
            Ok(true) => {
                info!("{} 重命名为 {} 成功！", src, dest);
                Ok(true)
            }
            Ok(false) => {
                warn!("{} 重命名为 {} 失败", src, dest);
                Ok(false)
            }
            Err(e) if e.is_interrupted() => Err(e),
            Err(e) => {
                error!("{} 重命名为 {} 失败：{}", src, dest, e);
                Ok(false)
            }
        }
    }

    pub fn copy(&self, src: &str, dest: &str) -> Result<()> {
        let source = self.resolve(src)?;
        let target = self.resolve(dest)?;
        if !self.executor.execute(|s| s.copy(&source, &target, false))? {
            return Err(FsError::CopyFailed {
                src: src.to_string(),
                dest: dest.to_string(),
            });
        }
        info!("{} 复制到 {} 成功！", src, dest);
        Ok(())
    }

    /// 移动：复制后删除源。源不存在或失败时返回 false
    pub fn move_path(&self, src: &str, dest: &str) -> Result<bool> {
        match transfer::move_path(&self.executor, &self.resolver, src, dest) {
            Ok(moved) => Ok(moved),
            Err(e) if e.is_interrupted() => Err(e),
            Err(e) => {
                error!("{} 移动到 {} 失败：{}", src, dest, e);
                Ok(false)
            }
        }
    }

    pub fn exists(&self, target: &str) -> Result<bool> {
        if path::is_blank(target) {
            return Ok(false);
        }
        let resolved = self.resolve(target)?;
        self.executor.execute(|s| s.exists(&resolved))
    }

    pub fn is_directory(&self, target: &str) -> Result<bool> {
        if path::is_blank(target) {
            return Ok(false);
        }
        let resolved = self.resolve(target)?;
        self.executor.execute(|s| s.is_directory(&resolved))
    }

    /// 修改权限，`spec` 为符号形式（-rwxr-x---）或八进制；失败返回 false
    pub fn chmod(&self, target: &str, spec: &str) -> bool {
        let result = FsPermission::parse(spec).and_then(|permission| {
            let resolved = self.resolve(target)?;
            self.executor.execute(|s| s.set_permission(&resolved, permission))
        });

        match result {
            Ok(()) => {
                info!("{} 权限修改为 {}", target, spec);
                true
            }
            Err(e) => {
                error!("修改 {} 权限失败：{}", target, e);
                false
            }
        }
    }

    pub fn update_permission(
        &self,
        target: &str,
        owner: PermissionLevel,
        group: PermissionLevel,
        other: PermissionLevel,
        sticky: bool,
    ) -> Result<FsPermission> {
        let resolved = self.resolve(target)?;
        let permission = FsPermission::from_levels(owner, group, other, sticky);
        self.executor.execute(|s| {
            s.set_permission(&resolved, permission)?;
            Ok(s.file_status(&resolved)?.permission.unwrap_or_default())
        })
    }

    pub fn update_owner(&self, target: &str, user: Option<&str>, group: Option<&str>) -> Result<FsPermission> {
        let resolved = self.resolve(target)?;
        self.executor.execute(|s| {
            s.set_owner(&resolved, user, group)?;
            Ok(s.file_status(&resolved)?.permission.unwrap_or_default())
        })
    }

    pub fn home_dir(&self) -> Result<String> {
        self.executor.execute(|s| Ok(s.home_directory()))
    }

    pub fn trash_enabled(&self) -> Result<bool> {
        self.trash.is_enabled()
    }

    pub fn trash_dir(&self) -> Result<String> {
        self.trash.trash_dir()
    }

    pub fn trash_dir_path(&self) -> Result<String> {
        self.trash.trash_dir_path()
    }

    pub fn trash_path_for(&self, target: &str) -> Result<String> {
        self.trash.trash_path_for(target)
    }

    pub fn restore_from_trash(&self, trashed: &str, dest: &str) -> Result<bool> {
        self.trash.restore(trashed, dest)
    }

    pub fn empty_trash(&self, immediately: bool) -> Result<bool> {
        if immediately {
            self.trash.expunge_immediately()
        } else {
            self.trash.expunge()
        }
    }

    pub fn put_string(&self, target: &str, content: &str) -> std::result::Result<(), ReportError> {
        self.write_string(target, content, false)
            .map_err(|e| ReportError::write("write", target, e))
    }

    pub fn append_string(&self, target: &str, content: &str) -> std::result::Result<(), ReportError> {
        self.write_string(target, content, true)
            .map_err(|e| ReportError::write("append", target, e))
    }

    pub fn read_to_string(&self, target: &str) -> std::result::Result<String, ReportError> {
        self.read_string(target).map_err(|e| ReportError::read(target, e))
    }

    fn write_string(&self, target: &str, content: &str, append: bool) -> Result<()> {
        let mut stream = if append {
            self.append_file(target)?
        } else {
            self.create_file(target, true)?
        };
        let written = stream.write_all(content.as_bytes());
        let closed = stream.close();
        written.and(closed).map_err(|e| FsError::from_io(e, target))
    }

    fn read_string(&self, target: &str) -> Result<String> {
        let mut input = self.open(target)?;
        let mut content = String::new();
        input
            .read_to_string(&mut content)
            .map_err(|e| FsError::from_io(e, target))?;
        Ok(content)
    }

    /// 关闭底层存储，之后客户端不可再用
    pub fn close(self) -> Result<()> {
        info!("DfsClient: closing storage for {}", self.identity());
        self.executor.storage().close()
    }
}
