//! API 模块
//!
//! 对下游工具提供的类路径服务。
//!
//! # 模块概览
//!
//! - `service`: [`ClasspathService`]，拉取查询与变更通知

pub mod service;

pub use service::ClasspathService;
