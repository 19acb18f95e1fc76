//! 文件写入工具
//!
//! - `atomic_write`：先写临时文件再 rename，失败时不破坏原文件
//! - `LockFile`：用 `create_new` 创建的排他锁文件，drop 时删除

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

use crate::error::PersistenceError;

/// 超过这个时间的锁文件视为上一个进程遗留
const STALE_LOCK_AGE: Duration = Duration::from_secs(300);

/// 原子替换文件内容
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = sibling(path, "tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

/// 排他锁文件
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// 为 `target` 获取锁，最多尝试 `attempts` 次
    pub fn acquire(target: &Path, attempts: u32, delay: Duration) -> Result<Self, PersistenceError> {
        let path = sibling(target, "lock");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PersistenceError::write(parent, e))?;
            }
        }

        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            match OpenOptions::new().create_new(true).write(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!("已获得文件锁: {}", path.display());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        warn!("⚠️ 清理遗留的锁文件: {}", path.display());
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    debug!("锁文件被占用 (尝试 {}/{})", attempt, attempts);
                    if attempt < attempts {
                        pause(delay);
                    }
                }
                Err(e) => return Err(PersistenceError::write(&path, e)),
            }
        }

        Err(PersistenceError::Lock { path, attempts })
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("⚠️ 无法删除锁文件 {}: {}", self.path.display(), e);
        }
    }
}

/// 等待锁释放
///
/// 在多线程 tokio 运行时中通过 `block_in_place` 让出工作线程，其余情况直接睡眠
fn pause(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| std::thread::sleep(delay))
        }
        _ => std::thread::sleep(delay),
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map_or(false, |age| age > STALE_LOCK_AGE)
}

/// `data/ledger.txt` → `data/ledger.txt.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
