//! 构建工作区
//!
//! 每次构建在独立的临时工作区内进行：以随机标识命名、从模板整树复制、
//! 构建结束后整树删除。工作区绝不跨构建共享

use std::path::{Path, PathBuf};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::env::constants::{MAIN_ACTIVITY_REL_PATH, UNSIGNED_APK_REL_PATH, URL_PLACEHOLDER};
use crate::config::PathsConfig;

use super::BuildFailure;

/// 构建工作区
///
/// 持有本次构建独占的模板副本目录。`cleanup` 负责正常路径的删除，
/// `Drop` 兜底 future 被丢弃（如 panic 展开）的场景
pub struct BuildWorkspace {
    /// 本次构建的唯一标识
    pub id: String,
    /// 工作区根目录
    pub root: PathBuf,
    cleaned: bool,
}

impl BuildWorkspace {
    /// 创建工作区：把模板工程整树复制到新命名的临时目录
    pub async fn create(paths: &PathsConfig) -> Result<Self, BuildFailure> {
        let template = &paths.template_dir;
        if !template.is_dir() {
            return Err(BuildFailure::Workspace(format!(
                "template directory not found: {}",
                template.display()
            )));
        }

        let id = Uuid::new_v4().simple().to_string();
        let root = paths.build_root.join(format!("project_{}", id));

        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            BuildFailure::Workspace(format!("cannot create {}: {}", root.display(), e))
        })?;

        if let Err(e) = copy_dir_recursive(template, &root).await {
            // 复制一半失败时不能留下残缺目录
            let _ = tokio::fs::remove_dir_all(&root).await;
            return Err(BuildFailure::Workspace(format!(
                "failed to copy template into {}: {}",
                root.display(),
                e
            )));
        }

        info!(workspace = %root.display(), "Build workspace created");
        Ok(Self {
            id,
            root,
            cleaned: false,
        })
    }

    /// 把模板源码中的占位符替换为目标 URL
    ///
    /// 字面整串替换，不做任何转义。URL 若包含对 Kotlin 源码有意义的
    /// 字符（引号、换行），生成的工程可能无法编译——与原服务行为一致
    pub async fn inject_url(&self, url: &str) -> Result<(), BuildFailure> {
        let main_activity = self.root.join(MAIN_ACTIVITY_REL_PATH);
        if !main_activity.is_file() {
            return Err(BuildFailure::Template(format!(
                "MainActivity.kt not found at {}",
                main_activity.display()
            )));
        }

        let content = tokio::fs::read_to_string(&main_activity).await?;
        let modified = content.replace(URL_PLACEHOLDER, url);
        tokio::fs::write(&main_activity, modified).await?;

        info!(workspace_id = %self.id, url, "Injected target URL into template");
        Ok(())
    }

    /// 未签名 APK 的约定路径（Gradle release 输出位置）
    pub fn unsigned_apk_path(&self) -> PathBuf {
        self.root.join(UNSIGNED_APK_REL_PATH)
    }

    /// 删除整个工作区
    ///
    /// 构建成功与否都必须调用，且每次构建恰好一次
    pub async fn cleanup(mut self) {
        self.cleaned = true;
        if let Err(e) = tokio::fs::remove_dir_all(&self.root).await {
            error!(
                workspace = %self.root.display(),
                error = %e,
                "Failed to remove build workspace"
            );
        }
    }
}

impl Drop for BuildWorkspace {
    fn drop(&mut self) {
        if !self.cleaned {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }
}

/// 递归复制目录树
async fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    let mut entries = tokio::fs::read_dir(src).await?;

    while let Some(entry) = entries.next_entry().await? {
        let entry_src = entry.path();
        let entry_dst = dst.join(entry.file_name());

        if entry.file_type().await?.is_dir() {
            tokio::fs::create_dir_all(&entry_dst).await?;
            copy_dir_recursive_boxed(entry_src, entry_dst).await?;
        } else {
            // tokio::fs::copy 保留权限位，gradlew 的可执行位得以保留
            tokio::fs::copy(&entry_src, &entry_dst).await?;
        }
    }
    Ok(())
}

/// `copy_dir_recursive` 的 boxed 包装，规避递归 async fn 的编译限制
fn copy_dir_recursive_boxed(
    src: PathBuf,
    dst: PathBuf,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send>> {
    Box::pin(async move { copy_dir_recursive(&src, &dst).await })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_paths(tmp: &tempfile::TempDir) -> PathsConfig {
        let template_dir = tmp.path().join("template");
        let main_activity = template_dir.join(MAIN_ACTIVITY_REL_PATH);
        std::fs::create_dir_all(main_activity.parent().unwrap()).unwrap();
        std::fs::write(
            &main_activity,
            format!("val url = \"{}\"\n", URL_PLACEHOLDER),
        )
        .unwrap();

        PathsConfig {
            output_dir: tmp.path().join("out"),
            template_dir,
            build_root: tmp.path().join("build_temp"),
        }
    }

    #[tokio::test]
    async fn test_create_copies_template_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = fixture_paths(&tmp);

        let ws = BuildWorkspace::create(&paths).await.unwrap();
        assert!(ws.root.starts_with(&paths.build_root));
        assert!(ws.root.join(MAIN_ACTIVITY_REL_PATH).is_file());

        ws.cleanup().await;
    }

    #[tokio::test]
    async fn test_create_fails_without_template() {
        let tmp = tempfile::tempdir().unwrap();
        let mut paths = fixture_paths(&tmp);
        paths.template_dir = tmp.path().join("no_such_template");

        let result = BuildWorkspace::create(&paths).await;
        assert!(matches!(result, Err(BuildFailure::Workspace(_))));
    }

    #[tokio::test]
    async fn test_inject_url_replaces_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = fixture_paths(&tmp);

        let ws = BuildWorkspace::create(&paths).await.unwrap();
        ws.inject_url("https://example.com/app").await.unwrap();

        let content = std::fs::read_to_string(ws.root.join(MAIN_ACTIVITY_REL_PATH)).unwrap();
        assert!(content.contains("https://example.com/app"));
        assert!(!content.contains(URL_PLACEHOLDER));

        ws.cleanup().await;
    }

    #[tokio::test]
    async fn test_inject_url_fails_without_main_activity() {
        let tmp = tempfile::tempdir().unwrap();
        let mut paths = fixture_paths(&tmp);
        // 模板存在但不含 MainActivity.kt
        paths.template_dir = tmp.path().join("empty_template");
        std::fs::create_dir_all(&paths.template_dir).unwrap();
        std::fs::write(paths.template_dir.join("build.gradle"), "").unwrap();

        let ws = BuildWorkspace::create(&paths).await.unwrap();
        let result = ws.inject_url("https://example.com").await;
        assert!(matches!(result, Err(BuildFailure::Template(_))));

        ws.cleanup().await;
    }

    #[tokio::test]
    async fn test_cleanup_removes_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = fixture_paths(&tmp);

        let ws = BuildWorkspace::create(&paths).await.unwrap();
        let root = ws.root.clone();
        assert!(root.is_dir());

        ws.cleanup().await;
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_drop_backstop_removes_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = fixture_paths(&tmp);

        let root = {
            let ws = BuildWorkspace::create(&paths).await.unwrap();
            ws.root.clone()
            // cleanup 未调用，Drop 兜底
        };
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_workspaces_are_distinct() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = fixture_paths(&tmp);

        let a = BuildWorkspace::create(&paths).await.unwrap();
        let b = BuildWorkspace::create(&paths).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.root, b.root);

        a.cleanup().await;
        b.cleanup().await;
    }
}
