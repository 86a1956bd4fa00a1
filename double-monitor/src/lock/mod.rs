//! モニターデーモンの排他制御
//!
//! 同一ポートでのデーモン重複起動を防止するファイルロックと、
//! `stop` コマンドが停止対象のPIDを知るためのロック情報を提供する。
//!
//! ロックファイルには PID・起動時刻・ポート・データベースURL を JSON で記録する。
//! 記録されたPIDのプロセスが存在しない場合は残留ロックとみなして削除する。

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

/// ロックディレクトリを上書きする環境変数
pub const LOCK_DIR_ENV: &str = "DOUBLE_MONITOR_LOCK_DIR";

/// ロックファイルに保存されるデーモン情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockInfo {
    /// デーモンプロセスのPID
    pub pid: u32,
    /// 起動時刻（UTC）
    pub started_at: DateTime<Utc>,
    /// リッスンポート番号
    pub port: u16,
    /// 使用しているデータベースURL
    #[serde(default)]
    pub database_url: String,
}

/// ロック操作に関するエラー型
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// 同一ポートで既にモニターが起動中
    #[error("Monitor already running on port {port} (PID: {pid}, started: {started_at})\n\nTo stop: double-monitor stop --port {port}")]
    AlreadyRunning {
        /// ポート番号
        port: u16,
        /// 既存プロセスのPID
        pid: u32,
        /// 起動時刻
        started_at: DateTime<Utc>,
    },

    /// ロック取得に失敗
    #[error("Failed to acquire lock: {0}")]
    AcquireFailed(#[source] std::io::Error),

    /// ロック解除に失敗
    #[error("Failed to release lock: {0}")]
    ReleaseFailed(#[source] std::io::Error),

    /// ロックファイルが破損
    #[error("Lock file corrupted: {0}")]
    Corrupted(String),

    /// ロックディレクトリの作成に失敗
    #[error("Failed to create lock directory: {0}")]
    DirectoryCreationFailed(#[source] std::io::Error),
}

/// ロックディレクトリのパスを取得
///
/// `DOUBLE_MONITOR_LOCK_DIR` が設定されていればそれを、未設定なら
/// OS標準の一時ディレクトリ配下の `double-monitor` を使う。
pub fn lock_dir() -> PathBuf {
    std::env::var_os(LOCK_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("double-monitor"))
}

/// 指定ポートのロックファイルパス（例: `/tmp/double-monitor/monitor_9545.lock`）
pub fn lock_path(port: u16) -> PathBuf {
    lock_dir().join(format!("monitor_{}.lock", port))
}

/// 指定PIDのプロセスが存在するか確認
///
/// 終了済みで回収待ちのゾンビプロセスは停止済みとみなす。
pub fn is_process_running(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system
        .process(pid)
        .is_some_and(|process| process.status() != ProcessStatus::Zombie)
}

/// ロックファイルからロック情報を読み取る
///
/// ロックファイルが存在しなければ `Ok(None)`。
pub fn read_lock_info(port: u16) -> Result<Option<LockInfo>, LockError> {
    let path = lock_path(port);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| LockError::Corrupted(format!("Failed to read lock file: {}", e)))?;

    let info: LockInfo = serde_json::from_str(&content)
        .map_err(|e| LockError::Corrupted(format!("Invalid JSON in lock file: {}", e)))?;

    Ok(Some(info))
}

/// 生存中のモニターのロック情報をポート順に列挙する
pub fn list_running_monitors() -> Vec<LockInfo> {
    let Ok(entries) = std::fs::read_dir(lock_dir()) else {
        return Vec::new();
    };

    let mut locks: Vec<LockInfo> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let port = name
                .to_str()?
                .strip_prefix("monitor_")?
                .strip_suffix(".lock")?
                .parse::<u16>()
                .ok()?;
            read_lock_info(port).ok().flatten()
        })
        .filter(|info| is_process_running(info.pid))
        .collect();

    locks.sort_by_key(|info| info.port);
    locks
}

/// 指定PIDのプロセスに SIGTERM を送る
#[cfg(unix)]
pub fn stop_process(pid: u32) -> Result<(), std::io::Error> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .map_err(|e| std::io::Error::other(e.to_string()))
}

/// 指定PIDのプロセスを停止する（Windows版）
#[cfg(windows)]
pub fn stop_process(pid: u32) -> Result<(), std::io::Error> {
    let output = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .output()?;

    if output.status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ))
    }
}

/// モニターデーモンのファイルロック
///
/// スコープを抜けるか `release()` を呼ぶとロックを解除し、ファイルを削除する。
pub struct MonitorLock {
    lock_file: Option<File>,
    lock_path: PathBuf,
    info: LockInfo,
}

impl std::fmt::Debug for MonitorLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorLock")
            .field("lock_path", &self.lock_path)
            .field("info", &self.info)
            .finish()
    }
}

impl MonitorLock {
    /// ロックを取得する
    ///
    /// 生存中のプロセスが同じポートのロックを持っていれば `AlreadyRunning`。
    pub fn acquire(port: u16, database_url: &str) -> Result<Self, LockError> {
        let dir = lock_dir();
        let path = lock_path(port);

        std::fs::create_dir_all(&dir).map_err(LockError::DirectoryCreationFailed)?;

        match read_lock_info(port) {
            Ok(Some(existing)) if is_process_running(existing.pid) => {
                return Err(LockError::AlreadyRunning {
                    port: existing.port,
                    pid: existing.pid,
                    started_at: existing.started_at,
                });
            }
            Ok(Some(existing)) => {
                warn!(
                    "Stale lock file detected (PID {} not running), cleaning up",
                    existing.pid
                );
                std::fs::remove_file(&path).map_err(LockError::AcquireFailed)?;
            }
            Ok(None) => {}
            Err(LockError::Corrupted(reason)) => {
                warn!("Replacing corrupted lock file: {}", reason);
                std::fs::remove_file(&path).map_err(LockError::AcquireFailed)?;
            }
            Err(e) => return Err(e),
        }

        let mut file = File::create(&path).map_err(LockError::AcquireFailed)?;
        file.try_lock_exclusive().map_err(LockError::AcquireFailed)?;

        let info = LockInfo {
            pid: std::process::id(),
            started_at: Utc::now(),
            port,
            database_url: database_url.to_string(),
        };

        let json = serde_json::to_string_pretty(&info)
            .map_err(|e| LockError::AcquireFailed(std::io::Error::other(e)))?;
        file.write_all(json.as_bytes())
            .map_err(LockError::AcquireFailed)?;
        file.flush().map_err(LockError::AcquireFailed)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .map_err(LockError::AcquireFailed)?;
        }

        debug!("Lock acquired for port {} (PID: {})", port, info.pid);

        Ok(Self {
            lock_file: Some(file),
            lock_path: path,
            info,
        })
    }

    /// ロック情報
    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    /// ロックを明示的に解除する
    pub fn release(mut self) -> Result<(), LockError> {
        self.release_internal()
    }

    fn release_internal(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.lock_file.take() {
            FileExt::unlock(&file).map_err(LockError::ReleaseFailed)?;
            drop(file);

            if self.lock_path.exists() {
                std::fs::remove_file(&self.lock_path).map_err(LockError::ReleaseFailed)?;
            }

            debug!("Lock released for port {}", self.info.port);
        }
        Ok(())
    }
}

impl Drop for MonitorLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_internal() {
            tracing::error!("Failed to release lock on drop: {}", e);
        }
    }
}
