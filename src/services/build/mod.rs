//! 构建编排服务
//!
//! APK 生成的主流程：建工作区 → 注入 URL → Gradle 构建 → 定位产物 →
//! 命名 → 签名 → 清理工作区。任何一步失败都跳过剩余步骤直达清理

pub mod gradle;
pub mod signer;
pub mod workspace;

use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

use crate::config::EnvConfig;
use crate::domain::compose_apk_filename;

pub use workspace::BuildWorkspace;

/// 构建流水线失败分类
///
/// 细分类仅用于服务端日志，对外契约统一折叠为"生成失败"
#[derive(Debug, Error)]
pub enum BuildFailure {
    /// 工作区创建失败（模板缺失、磁盘、权限）
    #[error("workspace setup failed: {0}")]
    Workspace(String),
    /// 模板内待替换的源文件缺失
    #[error("template source missing: {0}")]
    Template(String),
    /// 读写失败
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// 外部工具无法调用
    #[error("toolchain not available: {0}")]
    ToolchainMissing(String),
    /// Gradle 构建非零退出
    #[error("gradle build failed with exit code {exit_code}")]
    Build { exit_code: i32, log: String },
    /// 构建报告成功但约定位置没有产物
    #[error("build reported success but no artifact at {}", .0.display())]
    ArtifactMissing(PathBuf),
    /// 签名非零退出
    #[error("apk signing failed with exit code {exit_code}")]
    Signing { exit_code: i32, log: String },
    /// 子进程超时（超时后子进程已被终止）
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },
}

/// 为目标 URL 生成已签名 APK，返回最终文件名
///
/// 每次调用独占一个全新工作区；无论成败，返回前工作区都会被删除。
/// 失败不重试，调用方重新发起请求即是全新独立的一次构建
pub async fn produce_artifact(config: &EnvConfig, url: &str) -> Result<String, BuildFailure> {
    let workspace = BuildWorkspace::create(&config.paths).await?;
    let workspace_id = workspace.id.clone();

    let result = run_pipeline(config, &workspace, url).await;

    // 成功、各类失败都走到这里；panic 展开由 workspace 的 Drop 兜底
    workspace.cleanup().await;

    match &result {
        Ok(filename) => {
            info!(workspace_id = %workspace_id, apk_filename = %filename, "APK generated");
        }
        Err(e) => {
            error!(workspace_id = %workspace_id, url, error = %e, "APK generation failed");
        }
    }

    result
}

async fn run_pipeline(
    config: &EnvConfig,
    workspace: &BuildWorkspace,
    url: &str,
) -> Result<String, BuildFailure> {
    workspace.inject_url(url).await?;

    gradle::assemble_release(&workspace.root, config.build_timeout_secs).await?;

    let unsigned_apk = workspace.unsigned_apk_path();
    if !unsigned_apk.is_file() {
        // 构建零退出但产物缺失，与构建失败区分开
        return Err(BuildFailure::ArtifactMissing(unsigned_apk));
    }

    let filename = compose_apk_filename(url);
    let dest = config.paths.output_dir.join(&filename);

    signer::sign_apk(&config.signing, &unsigned_apk, &dest, config.sign_timeout_secs).await?;

    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::constants::{MAIN_ACTIVITY_REL_PATH, URL_PLACEHOLDER};
    use crate::config::env::defaults;
    use crate::config::{PathsConfig, SigningConfig};
    use std::path::Path;

    const GRADLEW_OK: &str = "#!/bin/sh\n\
        mkdir -p app/build/outputs/apk/release\n\
        echo unsigned > app/build/outputs/apk/release/app-release-unsigned.apk\n";

    const GRADLEW_FAIL: &str = "#!/bin/sh\necho 'compile error' >&2\nexit 1\n";

    const GRADLEW_NO_OUTPUT: &str = "#!/bin/sh\nexit 0\n";

    /// 伪 apksigner：把最后一个参数（未签名 APK）复制到 --out 指定的路径
    const APKSIGNER_OK: &str = "#!/bin/sh\n\
        out=\"\"\n\
        expect=0\n\
        for a in \"$@\"; do\n\
        \tif [ \"$expect\" = \"1\" ]; then out=\"$a\"; expect=0; continue; fi\n\
        \t[ \"$a\" = \"--out\" ] && expect=1\n\
        \tsrc=\"$a\"\n\
        done\n\
        cp \"$src\" \"$out\"\n";

    const APKSIGNER_FAIL: &str = "#!/bin/sh\necho 'signer exploded' >&2\nexit 1\n";

    fn write_script(path: &Path, body: &str) {
        std::fs::write(path, body).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    /// 搭建完整测试环境：模板（含 gradlew 与 MainActivity）、输出目录、伪 apksigner
    fn fixture(tmp: &tempfile::TempDir, gradlew: &str, apksigner: &str) -> EnvConfig {
        let template_dir = tmp.path().join("template");
        let main_activity = template_dir.join(MAIN_ACTIVITY_REL_PATH);
        std::fs::create_dir_all(main_activity.parent().unwrap()).unwrap();
        std::fs::write(
            &main_activity,
            format!("val url = \"{}\"\n", URL_PLACEHOLDER),
        )
        .unwrap();
        write_script(&template_dir.join("gradlew"), gradlew);

        let apksigner_path = tmp.path().join("apksigner");
        write_script(&apksigner_path, apksigner);

        let output_dir = tmp.path().join("generated_apks");
        std::fs::create_dir_all(&output_dir).unwrap();
        let build_root = tmp.path().join("build_temp");
        std::fs::create_dir_all(&build_root).unwrap();

        EnvConfig {
            api_key: None,
            port: 0,
            paths: PathsConfig {
                output_dir,
                template_dir,
                build_root,
            },
            signing: SigningConfig {
                keystore_path: defaults::KEYSTORE_PATH.to_string(),
                keystore_alias: defaults::KEYSTORE_ALIAS.to_string(),
                keystore_password: defaults::KEYSTORE_PASSWORD.to_string(),
                key_password: defaults::KEY_PASSWORD.to_string(),
                apksigner_path: apksigner_path.to_string_lossy().into_owned(),
            },
            max_concurrent_builds: 2,
            build_timeout_secs: 30,
            sign_timeout_secs: 30,
            allow_insecure_keystore: true,
        }
    }

    fn entry_count(build_root: &Path) -> usize {
        std::fs::read_dir(build_root).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_full_pipeline_success() {
        let tmp = tempfile::tempdir().unwrap();
        let config = fixture(&tmp, GRADLEW_OK, APKSIGNER_OK);

        let filename = produce_artifact(&config, "https://example.com")
            .await
            .unwrap();

        assert!(filename.starts_with("example_com_"));
        assert!(filename.ends_with(".apk"));
        assert!(config.paths.output_dir.join(&filename).is_file());
        // 工作区已清理
        assert_eq!(entry_count(&config.paths.build_root), 0);
    }

    #[tokio::test]
    async fn test_gradle_failure_skips_signing() {
        let tmp = tempfile::tempdir().unwrap();
        let config = fixture(&tmp, GRADLEW_FAIL, APKSIGNER_OK);

        let result = produce_artifact(&config, "https://example.com").await;

        match result {
            Err(BuildFailure::Build { exit_code, log }) => {
                assert_eq!(exit_code, 1);
                assert!(log.contains("compile error"));
            }
            other => panic!("expected Build failure, got {:?}", other),
        }
        // 未进入签名，输出目录无任何文件
        assert_eq!(entry_count(&config.paths.output_dir), 0);
        assert_eq!(entry_count(&config.paths.build_root), 0);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_distinct_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let config = fixture(&tmp, GRADLEW_NO_OUTPUT, APKSIGNER_OK);

        let result = produce_artifact(&config, "https://example.com").await;
        assert!(matches!(result, Err(BuildFailure::ArtifactMissing(_))));
        assert_eq!(entry_count(&config.paths.output_dir), 0);
        assert_eq!(entry_count(&config.paths.build_root), 0);
    }

    #[tokio::test]
    async fn test_signing_failure_leaves_no_output() {
        let tmp = tempfile::tempdir().unwrap();
        let config = fixture(&tmp, GRADLEW_OK, APKSIGNER_FAIL);

        let result = produce_artifact(&config, "https://example.com").await;
        assert!(matches!(result, Err(BuildFailure::Signing { .. })));
        assert_eq!(entry_count(&config.paths.output_dir), 0);
        assert_eq!(entry_count(&config.paths.build_root), 0);
    }

    #[tokio::test]
    async fn test_gradle_timeout_kills_build() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = fixture(&tmp, "#!/bin/sh\nsleep 30\n", APKSIGNER_OK);
        config.build_timeout_secs = 1;

        let result = produce_artifact(&config, "https://example.com").await;
        assert!(matches!(
            result,
            Err(BuildFailure::Timeout { stage: "gradle build", .. })
        ));
        assert_eq!(entry_count(&config.paths.build_root), 0);
    }

    #[tokio::test]
    async fn test_concurrent_builds_do_not_interfere() {
        let tmp = tempfile::tempdir().unwrap();
        let config = fixture(&tmp, GRADLEW_OK, APKSIGNER_OK);

        let (a, b) = tokio::join!(
            produce_artifact(&config, "https://example.com"),
            produce_artifact(&config, "https://example.com"),
        );

        let a = a.unwrap();
        let b = b.unwrap();
        assert_ne!(a, b);
        assert!(config.paths.output_dir.join(&a).is_file());
        assert!(config.paths.output_dir.join(&b).is_file());
        assert_eq!(entry_count(&config.paths.build_root), 0);
    }
}
