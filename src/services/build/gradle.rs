//! Gradle 构建调用
//!
//! 在工作区内执行 `gradlew clean assembleRelease` 并捕获输出

use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::infra::command::CommandError;
use crate::infra::CommandRunner;

use super::BuildFailure;

/// 失败日志写入 tracing 时保留的尾部长度
const LOG_TAIL_CHARS: usize = 4000;

/// 在工作区内构建 release APK
pub async fn assemble_release(workspace_root: &Path, timeout_secs: u64) -> Result<(), BuildFailure> {
    let gradlew = workspace_root.join("gradlew");
    let gradlew_str = gradlew.to_string_lossy();

    info!(workspace = %workspace_root.display(), "Running gradlew clean assembleRelease");

    let output = CommandRunner::run_captured(
        &gradlew_str,
        &["clean", "assembleRelease"],
        workspace_root,
        Duration::from_secs(timeout_secs),
    )
    .await
    .map_err(|e| match e {
        CommandError::Timeout(_) => BuildFailure::Timeout {
            stage: "gradle build",
            secs: timeout_secs,
        },
        CommandError::SpawnFailed(_) => BuildFailure::ToolchainMissing(format!(
            "gradlew not found or not executable at {}",
            gradlew.display()
        )),
        CommandError::WaitFailed(e) => BuildFailure::Io(e),
    })?;

    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(-1);
        let log = output.combined_log();
        error!(
            exit_code,
            log_tail = %log_tail(&log),
            "Gradle build failed"
        );
        return Err(BuildFailure::Build { exit_code, log });
    }

    info!("Gradle build completed successfully");
    Ok(())
}

/// 截取日志尾部，避免超长构建日志刷爆服务端日志
pub(super) fn log_tail(log: &str) -> &str {
    let start = log
        .char_indices()
        .rev()
        .nth(LOG_TAIL_CHARS.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    &log[start..]
}
