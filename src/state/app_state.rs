//! 应用状态

use chrono::{DateTime, Utc};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::EnvConfig;

/// 应用状态
///
/// 配置为启动时构造的不可变快照，运行期间不再读取环境变量
pub struct AppState {
    /// 环境配置
    pub config: EnvConfig,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,
    /// 并发构建许可，限制同时存在的工作区数量
    pub build_permits: Arc<Semaphore>,
    /// 累计成功构建数
    pub builds_succeeded: AtomicU64,
    /// 累计失败构建数
    pub builds_failed: AtomicU64,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(config: EnvConfig) -> Self {
        tracing::info!(
            port = config.port,
            output_dir = %config.paths.output_dir.display(),
            template_dir = %config.paths.template_dir.display(),
            build_root = %config.paths.build_root.display(),
            max_concurrent_builds = config.max_concurrent_builds,
            build_timeout_secs = config.build_timeout_secs,
            sign_timeout_secs = config.sign_timeout_secs,
            api_key_configured = config.api_key.is_some(),
            "Loaded configuration"
        );

        let build_permits = Arc::new(Semaphore::new(config.max_concurrent_builds.max(1)));

        Self {
            config,
            started_at: Utc::now(),
            build_permits,
            builds_succeeded: AtomicU64::new(0),
            builds_failed: AtomicU64::new(0),
        }
    }

    /// 当前活跃的构建数
    pub fn active_builds(&self) -> usize {
        self.config
            .max_concurrent_builds
            .max(1)
            .saturating_sub(self.build_permits.available_permits())
    }
}
