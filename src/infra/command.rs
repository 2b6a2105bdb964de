//! 命令执行器
//!
//! 提供统一的命令执行接口，支持：
//! - 捕获 stdout/stderr
//! - 超时控制（超时后强制终止子进程）

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// 命令执行器
pub struct CommandRunner;

/// 命令执行错误
#[derive(Debug)]
pub enum CommandError {
    /// 命令启动失败
    SpawnFailed(std::io::Error),
    /// 命令超时
    Timeout(Duration),
    /// 等待命令完成失败
    WaitFailed(std::io::Error),
}

impl CommandError {
    /// 是否为"可执行文件不存在"类启动失败
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CommandError::SpawnFailed(e) if e.kind() == std::io::ErrorKind::NotFound
        )
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::SpawnFailed(e) => write!(f, "Failed to spawn command: {}", e),
            CommandError::Timeout(d) => write!(f, "Command timed out after {:?}", d),
            CommandError::WaitFailed(e) => write!(f, "Failed to wait for command: {}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::SpawnFailed(e) | CommandError::WaitFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// 命令执行结果（捕获的输出）
#[derive(Debug)]
pub struct CapturedOutput {
    /// 退出状态
    pub status: ExitStatus,
    /// 标准输出
    pub stdout: String,
    /// 标准错误
    pub stderr: String,
}

impl CapturedOutput {
    /// stdout 与 stderr 合并后的完整日志
    pub fn combined_log(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

impl CommandRunner {
    /// 执行命令并捕获全部输出
    ///
    /// # Arguments
    /// * `program` - 要执行的程序
    /// * `args` - 命令行参数
    /// * `work_dir` - 工作目录
    /// * `timeout` - 超时时间，超时后子进程被终止
    ///
    /// # Returns
    /// 捕获的执行结果或错误
    pub async fn run_captured(
        program: &str,
        args: &[&str],
        work_dir: &Path,
        timeout: Duration,
    ) -> Result<CapturedOutput, CommandError> {
        let child = Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // 超时分支 drop 掉 wait future 时顺带杀掉子进程
            .kill_on_drop(true)
            .spawn()
            .map_err(CommandError::SpawnFailed)?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => {
                let output = result.map_err(CommandError::WaitFailed)?;
                Ok(CapturedOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            Err(_) => Err(CommandError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_run_captured_success() {
        let result = CommandRunner::run_captured(
            "echo",
            &["hello"],
            &PathBuf::from("/tmp"),
            Duration::from_secs(5),
        )
        .await;

        let output = result.unwrap();
        assert!(output.status.success());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_captured_nonzero_exit() {
        let result = CommandRunner::run_captured(
            "sh",
            &["-c", "echo oops >&2; exit 3"],
            &PathBuf::from("/tmp"),
            Duration::from_secs(5),
        )
        .await;

        let output = result.unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert!(output.stderr.contains("oops"));
        assert!(output.combined_log().contains("oops"));
    }

    #[tokio::test]
    async fn test_run_captured_not_found() {
        let result = CommandRunner::run_captured(
            "nonexistent_command_12345",
            &[],
            &PathBuf::from("/tmp"),
            Duration::from_secs(5),
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_run_captured_timeout() {
        let result = CommandRunner::run_captured(
            "sleep",
            &["30"],
            &PathBuf::from("/tmp"),
            Duration::from_millis(100),
        )
        .await;

        assert!(matches!(result, Err(CommandError::Timeout(_))));
    }
}
