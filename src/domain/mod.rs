//! 领域模型模块
//!
//! 纯数据结构与命名逻辑，不依赖 axum/tokio

pub mod apk;

pub use apk::{compose_apk_filename, derive_base_name, is_acceptable_url};
