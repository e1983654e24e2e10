use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use crate::error::{FsError, Result};
use crate::identity::Identity;
use crate::path;
use crate::permission::{self, FsAction, FsPermission};

pub const NO_SIZE: &str = "--";

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    pub path: String,
    pub length: u64,
    pub is_dir: bool,
    pub replication: u16,
    pub block_size: u64,
    pub modification_time: i64,
    pub access_time: i64,
    pub owner: String,
    pub group: String,
    pub permission: Option<FsPermission>,
}

impl FileStatus {
    pub fn name(&self) -> &str {
        path::name(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocation {
    pub offset: u64,
    pub length: u64,
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsStatus {
    pub capacity: u64,
    pub used: u64,
    pub remaining: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    pub is_directory: bool,
    pub len: u64,
    pub size: String,
    pub replication: u16,
    pub block_size: u64,
    pub owner: String,
    pub group: String,
    pub permission: String,
    pub read_access: bool,
    pub write_access: bool,
    pub execute_access: bool,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

/// 字节数转可读大小：B / KiB / MiB / GiB，保留两位小数
pub fn byte_to_size(size: u64) -> String {
    if size >= GIB {
        format!("{:.2}GiB", size as f64 / GIB as f64)
    } else if size >= MIB {
        format!("{:.2}MiB", size as f64 / MIB as f64)
    } else if size >= KIB {
        format!("{:.2}KiB", size as f64 / KIB as f64)
    } else if size == 0 {
        NO_SIZE.to_string()
    } else {
        format!("{}B", size)
    }
}

fn local_time(millis: i64, path: &str) -> Result<DateTime<Local>> {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&Local))
        .ok_or_else(|| FsError::Metadata(format!("timestamp {} out of range for {}", millis, path)))
}

/// 将原始状态转换为 [`FileEntry`]，访问标志按给定身份计算
pub struct StatusMapper;

impl StatusMapper {
    pub fn map(status: &FileStatus, identity: &Identity) -> Result<FileEntry> {
        let size = if status.is_dir {
            NO_SIZE.to_string()
        } else {
            byte_to_size(status.length)
        };
        let access = |action| {
            permission::check_access(&status.owner, &status.group, status.permission.as_ref(), action, identity)
        };

        Ok(FileEntry {
            path: path::strip_scheme_and_authority(&status.path).to_string(),
            is_directory: status.is_dir,
            len: status.length,
            size,
            replication: status.replication,
            block_size: status.block_size,
            owner: status.owner.clone(),
            group: status.group.clone(),
            permission: permission::permission_to_string(status.permission.as_ref()),
            read_access: access(FsAction::READ),
            write_access: access(FsAction::WRITE),
            execute_access: access(FsAction::EXECUTE),
            created_at: local_time(status.access_time, &status.path)?,
            updated_at: local_time(status.modification_time, &status.path)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(path: &str, length: u64, is_dir: bool, perm: &str) -> FileStatus {
        FileStatus {
            path: path.to_string(),
            length,
            is_dir,
            replication: 3,
            block_size: 128 * MIB,
            modification_time: 1_700_000_000_000,
            access_time: 1_699_000_000_000,
            owner: "u1".to_string(),
            group: "staff".to_string(),
            permission: Some(FsPermission::parse(perm).unwrap()),
        }
    }

    #[test]
    fn test_byte_to_size() {
        assert_eq!(byte_to_size(0), NO_SIZE);
        assert_eq!(byte_to_size(512), "512B");
        assert_eq!(byte_to_size(1023), "1023B");
        assert_eq!(byte_to_size(2048), "2.00KiB");
        assert_eq!(byte_to_size(1536), "1.50KiB");
        assert_eq!(byte_to_size(5 * MIB), "5.00MiB");
        assert_eq!(byte_to_size(3 * GIB + GIB / 2), "3.50GiB");
    }

    #[test]
    fn test_map_file() {
        let owner = Identity::new("u1", vec![]);
        let entry = StatusMapper::map(&status("hdfs://nn:8020/data/f.txt", 100, false, "-rw-r-----"), &owner).unwrap();
        assert_eq!(entry.path, "/data/f.txt");
        assert_eq!(entry.size, "100B");
        assert_eq!(entry.permission, "-rw-r-----");
        assert!(entry.read_access);
        assert!(entry.write_access);
        assert!(!entry.execute_access);
        assert_eq!(entry.updated_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(entry.created_at.timestamp_millis(), 1_699_000_000_000);

        let stranger = Identity::new("u2", vec![]);
        let entry = StatusMapper::map(&status("/data/f.txt", 100, false, "-rw-r-----"), &stranger).unwrap();
        assert!(!entry.read_access && !entry.write_access && !entry.execute_access);
    }

    #[test]
    fn test_map_directory_uses_sentinel() {
        let id = Identity::new("u2", vec!["staff".into()]);
        let entry = StatusMapper::map(&status("/data/sub", 4096, true, "-rwxr-x---"), &id).unwrap();
        assert!(entry.is_directory);
        assert_eq!(entry.size, NO_SIZE);
        assert!(entry.read_access && !entry.write_access && entry.execute_access);
    }

    #[test]
    fn test_map_bad_timestamp() {
        let mut s = status("/data/f.txt", 1, false, "-rw-r-----");
        s.modification_time = i64::MAX;
        assert!(matches!(StatusMapper::map(&s, &Identity::new("u1", vec![])), Err(FsError::Metadata(_))));
    }
}
