//! APK 命名与 URL 校验

use crate::config::env::constants::FALLBACK_BASE_NAME;

/// 校验目标 URL 是否可接受
///
/// 与对外契约一致：仅做字面 scheme 前缀检查，不验证 URL 语义
pub fn is_acceptable_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// 从 URL 的 host 推导 APK 基础名
///
/// host 转小写后，`[a-z0-9]` 以外的字符（包括 `.` 和 `-`）一律替换为 `_`；
/// 无 host 或推导结果为空时回退到固定基础名
pub fn derive_base_name(url: &str) -> String {
    let base = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(sanitize_host))
        .unwrap_or_default();

    if base.is_empty() {
        FALLBACK_BASE_NAME.to_string()
    } else {
        base
    }
}

fn sanitize_host(host: &str) -> String {
    host.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// 组合最终 APK 文件名：`<base>_<8位随机hex>.apk`
///
/// 随机后缀保证同一 host 的多次构建互不覆盖
pub fn compose_apk_filename(url: &str) -> String {
    let base = derive_base_name(url);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}.apk", base, &suffix[..8])
}
