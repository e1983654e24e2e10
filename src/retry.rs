use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use crate::config::RetryPolicy;
use crate::error::{FsError, Result};
use crate::identity::Identity;
use crate::permission::FsPermission;
use crate::status::{BlockLocation, FileStatus, FsStatus};
use crate::storage::{InputStream, OutputStream, StorageService};

/// 打断正在进行的退避等待
///
/// 中断只作用于调用 `interrupt` 时已在 `sleep` 中的等待者；没有等待者时
/// 调用不留下任何状态。
#[derive(Debug, Clone, Default)]
pub struct Interrupter {
    // 中断代数，每次 interrupt 加一
    state: Arc<(Mutex<u64>, Condvar)>,
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        let (generation, condvar) = &*self.state;
        let mut generation = generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation = generation.wrapping_add(1);
        condvar.notify_all();
    }

    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let (generation, condvar) = &*self.state;
        let deadline = Instant::now() + duration;
        let mut current = generation.lock().unwrap_or_else(PoisonError::into_inner);
        let started = *current;
        loop {
            if *current != started {
                return Err(FsError::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            current = condvar
                .wait_timeout(current, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

pub struct Session<'a> {
    storage: &'a dyn StorageService,
    identity: &'a Identity,
}

impl<'a> Session<'a> {
    pub fn new(storage: &'a dyn StorageService, identity: &'a Identity) -> Self {
        Self { storage, identity }
    }

    pub fn identity(&self) -> &Identity {
        self.identity
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        self.storage.exists(self.identity, path)
    }

    pub fn mkdirs(&self, path: &str, permission: Option<FsPermission>) -> Result<bool> {
        self.storage.mkdirs(self.identity, path, permission)
    }

    pub fn create(&self, path: &str, overwrite: bool) -> Result<Box<dyn OutputStream>> {
        self.storage.create(self.identity, path, overwrite)
    }

    pub fn append(&self, path: &str) -> Result<Box<dyn OutputStream>> {
        self.storage.append(self.identity, path)
    }

    pub fn open(&self, path: &str) -> Result<Box<dyn InputStream>> {
        self.storage.open(self.identity, path)
    }

    pub fn delete(&self, path: &str, recursive: bool) -> Result<bool> {
        self.storage.delete(self.identity, path, recursive)
    }

    pub fn rename(&self, src: &str, dst: &str) -> Result<bool> {
        self.storage.rename(self.identity, src, dst)
    }

    pub fn copy(&self, src: &str, dst: &str, delete_source: bool) -> Result<bool> {
        self.storage.copy(self.identity, src, dst, delete_source)
    }

    pub fn list_status(&self, path: &str) -> Result<Vec<FileStatus>> {
        self.storage.list_status(self.identity, path)
    }

    pub fn file_status(&self, path: &str) -> Result<FileStatus> {
        self.storage.file_status(self.identity, path)
    }

    pub fn is_directory(&self, path: &str) -> Result<bool> {
        self.storage.is_directory(self.identity, path)
    }

    pub fn block_locations(&self, status: &FileStatus) -> Result<Vec<BlockLocation>> {
        self.storage.block_locations(self.identity, status, 0, status.length)
    }

    pub fn set_permission(&self, path: &str, permission: FsPermission) -> Result<()> {
        self.storage.set_permission(self.identity, path, permission)
    }

    pub fn set_owner(&self, path: &str, user: Option<&str>, group: Option<&str>) -> Result<()> {
        self.storage.set_owner(self.identity, path, user, group)
    }

    pub fn status(&self) -> Result<FsStatus> {
        self.storage.status(self.identity)
    }

    pub fn home_directory(&self) -> String {
        self.storage.home_directory(self.identity)
    }

    pub fn trash_enabled(&self) -> bool {
        self.storage.trash_enabled()
    }

    pub fn current_trash_dir(&self) -> String {
        self.storage.current_trash_dir(self.identity)
    }

    pub fn move_to_trash(&self, path: &str) -> Result<bool> {
        self.storage.move_to_trash(self.identity, path)
    }

    pub fn expunge(&self, immediate: bool) -> Result<()> {
        self.storage.expunge(self.identity, immediate)
    }
}

pub struct RetryExecutor {
    storage: Arc<dyn StorageService>,
    identity: Identity,
    policy: RetryPolicy,
    interrupter: Interrupter,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("identity", &self.identity)
            .field("policy", &self.policy)
            .finish()
    }
}

impl RetryExecutor {
    pub fn new(storage: Arc<dyn StorageService>, identity: Identity, policy: RetryPolicy) -> Self {
        Self {
            storage,
            identity,
            policy,
            interrupter: Interrupter::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn storage(&self) -> &dyn StorageService {
        self.storage.as_ref()
    }

    pub fn interrupter(&self) -> &Interrupter {
        &self.interrupter
    }

    pub fn execute<T, F>(&self, action: F) -> Result<T>
    where
        F: FnMut(&Session<'_>) -> Result<T>,
    {
        self.execute_with(&self.interrupter, action)
    }

    /// 同 `execute`，退避等待只响应调用方自己的 `interrupter`
    pub fn execute_with<T, F>(&self, interrupter: &Interrupter, mut action: F) -> Result<T>
    where
        F: FnMut(&Session<'_>) -> Result<T>,
    {
        let session = Session::new(self.storage.as_ref(), &self.identity);
        run_with_retry(&self.policy, interrupter, |_| action(&session))
    }
}

/// `action` 的参数是尝试序号，从 1 开始
pub fn run_with_retry<T, F>(policy: &RetryPolicy, interrupter: &Interrupter, mut action: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match action(attempt) {
            Ok(value) => {
                if attempt > 1 {
                    debug!("succeeded on attempt #{}", attempt);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !err.is_transient() {
            return Err(err);
        }
        if attempt >= policy.max_attempts {
            error!("giving up after {} attempts: {}", attempt, err);
            return Err(err);
        }

        warn!(
            "storage threw 'Cannot obtain block length', retrying... attempt #{}: {}",
            attempt + 1,
            err
        );
        interrupter.sleep(policy.backoff())?;
    }
}
