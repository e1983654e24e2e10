use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, info, warn};
use crate::error::{FsError, Result};
use crate::identity::Identity;
use crate::path;
use crate::permission::FsPermission;
use super::StorageService;

pub const TRASH_DIR: &str = ".Trash";
pub const CURRENT: &str = "Current";
const CHECKPOINT_FORMAT: &str = "%y%m%d%H%M%S";

pub struct TrashPolicy<'a, S: StorageService + ?Sized> {
    fs: &'a S,
    caller: &'a Identity,
}

impl<'a, S: StorageService + ?Sized> TrashPolicy<'a, S> {
    pub fn new(fs: &'a S, caller: &'a Identity) -> Self {
        Self { fs, caller }
    }

    pub fn is_enabled(&self) -> bool {
        self.fs.trash_enabled()
    }

    pub fn root(&self) -> String {
        path::join(&self.fs.home_directory(self.caller), TRASH_DIR)
    }

    pub fn current_dir(&self) -> String {
        path::join(&self.root(), CURRENT)
    }

    /// 将路径移入回收站，保留其完整路径结构；回收站未启用或路径已在回收站中时返回 false
    pub fn move_to_trash(&self, target: &str) -> Result<bool> {
        if !self.is_enabled() {
            debug!("move_to_trash: trash disabled, {} left in place", target);
            return Ok(false);
        }

        let logical = self.fs.logical_path(target)?;
        if !self.fs.exists(self.caller, &logical)? {
            return Err(FsError::NotFound(logical));
        }

        let root = self.root();
        if path::is_within(&logical, &root) {
            debug!("move_to_trash: {} is already in the trash", logical);
            return Ok(false);
        }
        if path::is_within(&root, &logical) {
            return Err(FsError::InvalidOperation(format!(
                "Cannot move \"{}\" to the trash, as it contains the trash",
                logical
            )));
        }

        let mut trash_path = format!("{}{}", self.current_dir(), logical);
        if let Some(mut base) = path::parent(&trash_path) {
            if let Some(blocker) = self.file_ancestor(&base)? {
                // 回收站里的祖先是文件，给这一级加时间戳另建目录
                base = format!(
                    "{}{}{}",
                    blocker,
                    Utc::now().timestamp_millis(),
                    &base[blocker.len()..]
                );
                trash_path = path::join(&base, path::name(&logical));
            }
            self.fs.mkdirs(self.caller, &base, Some(FsPermission::from_mode(0o700)))?;
        }
        if self.fs.exists(self.caller, &trash_path)? {
            // 同名对象已在回收站中，追加时间戳
            trash_path = format!("{}{}", trash_path, Utc::now().timestamp_millis());
        }

        let moved = self.fs.rename(self.caller, &logical, &trash_path)?;
        if moved {
            info!("Moved: '{}' to trash at: {}", logical, trash_path);
        } else {
            warn!("move_to_trash: rename {} -> {} failed", logical, trash_path);
        }
        Ok(moved)
    }

    // 从 dir 向上找到第一个已存在的路径，它不是目录时返回它
    fn file_ancestor(&self, dir: &str) -> Result<Option<String>> {
        let mut cursor = Some(dir.to_string());
        while let Some(candidate) = cursor {
            if self.fs.exists(self.caller, &candidate)? {
                if self.fs.is_directory(self.caller, &candidate)? {
                    return Ok(None);
                }
                return Ok(Some(candidate));
            }
            cursor = path::parent(&candidate);
        }
        Ok(None)
    }

    /// 把 Current 目录整体改名为以当前时间命名的检查点
    pub fn create_checkpoint(&self) -> Result<Option<String>> {
        let current = self.current_dir();
        if !self.fs.exists(self.caller, &current)? {
            return Ok(None);
        }

        let stamp = Local::now().format(CHECKPOINT_FORMAT).to_string();
        let mut checkpoint = path::join(&self.root(), &stamp);
        let mut attempt = 0;
        while self.fs.exists(self.caller, &checkpoint)? {
            attempt += 1;
            checkpoint = path::join(&self.root(), &format!("{}-{}", stamp, attempt));
        }

        if self.fs.rename(self.caller, &current, &checkpoint)? {
            info!("Created trash checkpoint: {}", checkpoint);
            Ok(Some(checkpoint))
        } else {
            Err(FsError::Storage(format!("Failed to checkpoint trash: {}", checkpoint)))
        }
    }

    /// 删除检查点；`all` 为 false 时只删除超过保留时间的
    pub fn delete_checkpoints(&self, all: bool) -> Result<usize> {
        let root = self.root();
        if !self.fs.exists(self.caller, &root)? {
            return Ok(0);
        }

        // 超出 chrono 表示范围的保留时间视为永不过期
        let interval = chrono::Duration::from_std(self.fs.trash_interval()).ok();
        let now = Local::now();
        let mut deleted = 0;

        for entry in self.fs.list_status(self.caller, &root)? {
            if !entry.is_dir {
                continue;
            }
            let name = entry.name();
            if name == CURRENT {
                continue;
            }
            let Some(time) = checkpoint_time(name) else {
                warn!("Unexpected item in trash: {}. Ignoring.", entry.path);
                continue;
            };

            if all || interval.is_some_and(|i| now - time > i) {
                let dir = path::join(&root, name);
                if self.fs.delete(self.caller, &dir, true)? {
                    info!("Deleted trash checkpoint: {}", dir);
                    deleted += 1;
                } else {
                    warn!("Couldn't delete checkpoint: {}", dir);
                }
            }
        }
        Ok(deleted)
    }

    /// 删除过期检查点，再把 Current 做成新的检查点
    pub fn expunge(&self) -> Result<()> {
        self.delete_checkpoints(false)?;
        self.create_checkpoint()?;
        Ok(())
    }

    /// 立即清空：先做检查点，再删除全部检查点
    pub fn expunge_immediately(&self) -> Result<()> {
        self.create_checkpoint()?;
        self.delete_checkpoints(true)?;
        Ok(())
    }
}

fn checkpoint_time(name: &str) -> Option<chrono::DateTime<Local>> {
    let stamp = name.split('-').next()?;
    let naive = NaiveDateTime::parse_from_str(stamp, CHECKPOINT_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_time() {
        let t = checkpoint_time("240131235959").unwrap();
        assert_eq!(t.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-31 23:59:59");
        assert!(checkpoint_time("240131235959-2").is_some());
        assert!(checkpoint_time("Current").is_none());
        assert!(checkpoint_time("garbage").is_none());
    }
}
