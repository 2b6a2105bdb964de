//! APK 签名调用
//!
//! 调用 apksigner 把未签名 APK 签名后直接写入最终输出路径。
//! 签名失败时输出目录不会出现任何文件

use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::config::SigningConfig;
use crate::infra::command::CommandError;
use crate::infra::CommandRunner;

use super::gradle::log_tail;
use super::BuildFailure;

/// 对未签名 APK 执行签名，产物写入 `dest`
///
/// 凭据通过命令行参数传递，日志中只出现路径和别名，不出现密码
pub async fn sign_apk(
    signing: &SigningConfig,
    unsigned_apk: &Path,
    dest: &Path,
    timeout_secs: u64,
) -> Result<(), BuildFailure> {
    let unsigned_str = unsigned_apk.to_string_lossy();
    let dest_str = dest.to_string_lossy();
    let ks_pass = format!("pass:{}", signing.keystore_password);
    let key_pass = format!("pass:{}", signing.key_password);

    info!(
        apksigner = %signing.apksigner_path,
        keystore = %signing.keystore_path,
        alias = %signing.keystore_alias,
        out = %dest.display(),
        "Signing APK"
    );

    let args: [&str; 12] = [
        "sign",
        "--ks",
        signing.keystore_path.as_str(),
        "--ks-key-alias",
        signing.keystore_alias.as_str(),
        "--ks-pass",
        ks_pass.as_str(),
        "--key-pass",
        key_pass.as_str(),
        "--out",
        dest_str.as_ref(),
        unsigned_str.as_ref(),
    ];

    let output = CommandRunner::run_captured(
        &signing.apksigner_path,
        &args,
        Path::new("."),
        Duration::from_secs(timeout_secs),
    )
    .await
    .map_err(|e| match e {
        CommandError::Timeout(_) => BuildFailure::Timeout {
            stage: "apk signing",
            secs: timeout_secs,
        },
        CommandError::SpawnFailed(_) => BuildFailure::ToolchainMissing(format!(
            "apksigner not found or not executable at {}",
            signing.apksigner_path
        )),
        CommandError::WaitFailed(e) => BuildFailure::Io(e),
    })?;

    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(-1);
        let log = output.combined_log();
        error!(
            exit_code,
            log_tail = %log_tail(&log),
            "APK signing failed"
        );
        return Err(BuildFailure::Signing { exit_code, log });
    }

    info!(out = %dest.display(), "APK signed successfully");
    Ok(())
}
