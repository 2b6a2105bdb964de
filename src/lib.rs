//! XJP APK Agent - URL 转 WebView APK 构建代理
//!
//! 接收目标 URL，把预置的 Android WebView 模板工程复制到独立工作区、
//! 注入 URL、调用 Gradle 构建并用 apksigner 签名，产出可下载的 APK

pub mod error;
pub mod middleware;
pub mod infra;
pub mod domain;
pub mod config;
pub mod state;
pub mod api;
pub mod services;

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::EnvConfig;
use crate::state::AppState;

/// 命令行运行时配置
#[derive(Debug, Default)]
pub struct RuntimeConfig {
    /// 覆盖监听端口
    pub port_override: Option<u16>,
}

/// 初始化并运行 agent
pub async fn init_and_run_agent_with_config(runtime: RuntimeConfig) {
    init_tracing();

    let mut config = EnvConfig::from_env();
    if let Some(port) = runtime.port_override {
        config.port = port;
    }

    // 拒绝带着默认签名凭据启动，除非显式声明这是本地调试
    let insecure = config.signing.insecure_defaults();
    if !insecure.is_empty() && !config.allow_insecure_keystore {
        error!(
            vars = ?insecure,
            "Refusing to start with default signing credentials; configure them \
             or set APK_AGENT_ALLOW_INSECURE_KEYSTORE=true for local debugging"
        );
        std::process::exit(1);
    }

    if let Err(e) = prepare_directories(&config).await {
        error!(error = %e, "Failed to prepare working directories");
        std::process::exit(1);
    }

    let state = Arc::new(AppState::new(config));
    let app = api::router(state.clone());

    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind listener");
            std::process::exit(1);
        }
    };

    info!(addr = %addr, "APK agent listening");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
    }
}

/// 创建输出目录与构建根目录，检查模板目录是否就绪
async fn prepare_directories(config: &EnvConfig) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&config.paths.output_dir).await?;
    tokio::fs::create_dir_all(&config.paths.build_root).await?;

    if !config.paths.template_dir.is_dir() {
        warn!(
            template_dir = %config.paths.template_dir.display(),
            "Template directory does not exist; generation requests will fail until it is provided"
        );
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
