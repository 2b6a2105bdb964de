//! 环境变量配置加载

use std::env;
use std::path::PathBuf;
use tracing::warn;

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// API 密钥（可选，未配置时接口开放访问）
    pub api_key: Option<String>,
    /// 服务监听端口
    pub port: u16,
    /// 目录布局
    pub paths: PathsConfig,
    /// 签名配置
    pub signing: SigningConfig,
    /// 最大并发构建数
    pub max_concurrent_builds: usize,
    /// Gradle 构建超时（秒）
    pub build_timeout_secs: u64,
    /// 签名超时（秒）
    pub sign_timeout_secs: u64,
    /// 允许使用不安全的默认签名配置（仅限本地调试）
    pub allow_insecure_keystore: bool,
}

/// 目录布局配置
#[derive(Clone, Debug)]
pub struct PathsConfig {
    /// 已签名 APK 输出目录（持久，供下载）
    pub output_dir: PathBuf,
    /// WebView 模板工程目录（只读输入）
    pub template_dir: PathBuf,
    /// 临时构建工作区根目录（每次构建创建/销毁子目录）
    pub build_root: PathBuf,
}

/// 签名配置
///
/// 进程级只读，启动时加载一次。密码不得完整输出到日志。
#[derive(Clone)]
pub struct SigningConfig {
    /// keystore 文件路径
    pub keystore_path: String,
    /// keystore 别名
    pub keystore_alias: String,
    /// keystore 密码
    pub keystore_password: String,
    /// key 密码
    pub key_password: String,
    /// apksigner 可执行文件路径
    pub apksigner_path: String,
}

// 手写 Debug：密码字段脱敏，杜绝 `?config` 日志把凭据带出去
impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("keystore_path", &self.keystore_path)
            .field("keystore_alias", &self.keystore_alias)
            .field("keystore_password", &"<redacted>")
            .field("key_password", &"<redacted>")
            .field("apksigner_path", &self.apksigner_path)
            .finish()
    }
}

impl SigningConfig {
    /// 返回仍在使用不安全默认值的环境变量名
    pub fn insecure_defaults(&self) -> Vec<&'static str> {
        let mut vars = Vec::new();
        if self.keystore_path == defaults::KEYSTORE_PATH {
            vars.push("KEYSTORE_PATH");
        }
        if self.keystore_alias == defaults::KEYSTORE_ALIAS {
            vars.push("KEYSTORE_ALIAS");
        }
        if self.keystore_password == defaults::KEYSTORE_PASSWORD {
            vars.push("KEYSTORE_PASSWORD");
        }
        if self.key_password == defaults::KEY_PASSWORD {
            vars.push("KEY_PASSWORD");
        }
        vars
    }
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let api_key = env::var("APK_AGENT_API_KEY").ok().filter(|s| !s.is_empty());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);

        let paths = PathsConfig {
            output_dir: env::var("GENERATED_APKS_DIR")
                .unwrap_or_else(|_| "generated_apks".to_string())
                .into(),
            template_dir: env::var("TEMPLATE_DIR")
                .unwrap_or_else(|_| "WebViewTemplate01".to_string())
                .into(),
            build_root: env::var("BUILD_TEMP_DIR")
                .unwrap_or_else(|_| "build_temp".to_string())
                .into(),
        };

        let signing = SigningConfig {
            keystore_path: env::var("KEYSTORE_PATH")
                .unwrap_or_else(|_| defaults::KEYSTORE_PATH.to_string()),
            keystore_alias: env::var("KEYSTORE_ALIAS")
                .unwrap_or_else(|_| defaults::KEYSTORE_ALIAS.to_string()),
            keystore_password: env::var("KEYSTORE_PASSWORD")
                .unwrap_or_else(|_| defaults::KEYSTORE_PASSWORD.to_string()),
            key_password: env::var("KEY_PASSWORD")
                .unwrap_or_else(|_| defaults::KEY_PASSWORD.to_string()),
            apksigner_path: env::var("APKSIGNER_PATH").unwrap_or_else(|_| "apksigner".to_string()),
        };

        let max_concurrent_builds = env::var("APK_AGENT_MAX_CONCURRENT_BUILDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);

        let build_timeout_secs = env::var("APK_AGENT_BUILD_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(constants::BUILD_TIMEOUT_SECS);

        let sign_timeout_secs = env::var("APK_AGENT_SIGN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(constants::SIGN_TIMEOUT_SECS);

        let allow_insecure_keystore = env::var("APK_AGENT_ALLOW_INSECURE_KEYSTORE")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let config = Self {
            api_key,
            port,
            paths,
            signing,
            max_concurrent_builds,
            build_timeout_secs,
            sign_timeout_secs,
            allow_insecure_keystore,
        };

        for var in config.signing.insecure_defaults() {
            warn!(
                var = var,
                "Signing credential is using its insecure built-in default"
            );
        }

        config
    }
}

/// 不安全的内置默认值，仅用于本地调试，生产环境必须显式配置
pub mod defaults {
    pub const KEYSTORE_PATH: &str = "/path/to/your/my-release-key.jks";
    pub const KEYSTORE_ALIAS: &str = "myalias";
    pub const KEYSTORE_PASSWORD: &str = "your_keystore_password";
    pub const KEY_PASSWORD: &str = "your_key_password";
}

/// 常量
pub mod constants {
    /// 模板源码中的 URL 占位符
    pub const URL_PLACEHOLDER: &str = "___YOUR_DYNAMIC_WEBVIEW_URL_PLACEHOLDER___";

    /// 工作区内 MainActivity.kt 的相对路径
    pub const MAIN_ACTIVITY_REL_PATH: &str =
        "app/src/main/java/com/template/webviewtemplate01/MainActivity.kt";

    /// 工作区内未签名 APK 的相对路径（Gradle release 输出约定位置）
    pub const UNSIGNED_APK_REL_PATH: &str =
        "app/build/outputs/apk/release/app-release-unsigned.apk";

    /// 无法从 URL 提取 host 时的回退基础名
    pub const FALLBACK_BASE_NAME: &str = "webview_app";

    /// APK MIME 类型
    pub const APK_MIME_TYPE: &str = "application/vnd.android.package-archive";

    /// Gradle 构建超时（秒）
    pub const BUILD_TIMEOUT_SECS: u64 = 1800; // 30 分钟

    /// 签名超时（秒）
    pub const SIGN_TIMEOUT_SECS: u64 = 300; // 5 分钟

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
