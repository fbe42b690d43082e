//! 类路径解析器错误类型定义
//!
//! 本模块定义了外层接口（配置加载、平台定义加载、服务查询、调度器）使用的错误类型。
//! 解析器本身从不返回错误，所有解析问题都以诊断信息的形式附加在解析结果上。

use thiserror::Error;

/// 类路径解析器核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 注册表与查询错误 ====================

    /// 模块未找到
    #[error("模块未找到: '{0}'")]
    ModuleNotFound(String),

    /// 模块已存在
    #[error("模块已存在: '{0}'")]
    ModuleAlreadyExists(String),

    /// 无效的模块描述
    #[error("无效的模块描述: {0}")]
    InvalidMetadata(String),

    /// 无效的版本范围
    #[error("无效的版本范围: '{range}' - {reason}")]
    InvalidVersionRange {
        range: String,
        reason: String,
    },

    /// 未知的执行环境
    #[error("未知的执行环境: '{0}'")]
    UnknownEnvironment(String),

    // ==================== 调度器错误 ====================

    /// 队列已满
    #[error("队列已满: {message}")]
    QueueFull {
        max_size: usize,
        message: String,
    },

    /// 调度器已关闭
    #[error("调度器已关闭")]
    SchedulerShutdown,

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        key: String,
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 版本解析错误
    #[error("版本解析错误: {0}")]
    VersionParse(String),

    /// semver 版本要求解析错误
    #[error("semver 解析错误: {0}")]
    Semver(#[from] semver::Error),

    // ==================== 通用错误 ====================

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 操作被取消
    #[error("操作被取消")]
    Cancelled,

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 错误码常量
pub mod error_code {
    // 注册表错误 (REGISTRY-xxx)
    /// 模块不存在
    pub const REGISTRY_MODULE_NOT_FOUND: &str = "REGISTRY-001";
    /// 模块已存在
    pub const REGISTRY_MODULE_EXISTS: &str = "REGISTRY-002";
    /// 模块描述无效
    pub const REGISTRY_INVALID_METADATA: &str = "REGISTRY-003";

    // 版本错误 (VERSION-xxx)
    /// 版本解析失败
    pub const VERSION_PARSE_FAILED: &str = "VERSION-001";
    /// 版本范围无效
    pub const VERSION_INVALID_RANGE: &str = "VERSION-002";

    // 执行环境错误 (PROFILE-xxx)
    /// 未知的执行环境
    pub const PROFILE_UNKNOWN_ENVIRONMENT: &str = "PROFILE-001";

    // 调度器错误 (SCHEDULER-xxx)
    /// 队列已满
    pub const SCHEDULER_QUEUE_FULL: &str = "SCHEDULER-001";
    /// 调度器已关闭
    pub const SCHEDULER_SHUTDOWN: &str = "SCHEDULER-002";
    /// 请求已取消
    pub const SCHEDULER_CANCELLED: &str = "SCHEDULER-003";

    // 配置错误 (CONFIG-xxx)
    /// 配置加载失败
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    /// 配置值无效
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";

    // IO 错误 (IO-xxx)
    /// IO 失败
    pub const IO_FAILED: &str = "IO-001";
    /// 数据格式错误
    pub const IO_FORMAT_ERROR: &str = "IO-002";

    // 核心错误 (CORE-xxx)
    /// 初始化失败
    pub const CORE_INIT_FAILED: &str = "CORE-001";
    /// 内部错误
    pub const CORE_INTERNAL: &str = "CORE-002";
}

impl CoreError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::ModuleNotFound(_) => error_code::REGISTRY_MODULE_NOT_FOUND,
            CoreError::ModuleAlreadyExists(_) => error_code::REGISTRY_MODULE_EXISTS,
            CoreError::InvalidMetadata(_) => error_code::REGISTRY_INVALID_METADATA,
            CoreError::VersionParse(_) | CoreError::Semver(_) => error_code::VERSION_PARSE_FAILED,
            CoreError::InvalidVersionRange { .. } => error_code::VERSION_INVALID_RANGE,
            CoreError::UnknownEnvironment(_) => error_code::PROFILE_UNKNOWN_ENVIRONMENT,
            CoreError::QueueFull { .. } => error_code::SCHEDULER_QUEUE_FULL,
            CoreError::SchedulerShutdown => error_code::SCHEDULER_SHUTDOWN,
            CoreError::Cancelled => error_code::SCHEDULER_CANCELLED,
            CoreError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            CoreError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            CoreError::Io(_) => error_code::IO_FAILED,
            CoreError::Json(_) | CoreError::Yaml(_) => error_code::IO_FORMAT_ERROR,
            CoreError::InitFailed(_) => error_code::CORE_INIT_FAILED,
            _ => error_code::CORE_INTERNAL,
        }
    }

    /// 是否为可重试的错误
    ///
    /// 调度器关闭、取消和队列满属于瞬时状态，调用方可以稍后重试。
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::QueueFull { .. } | CoreError::Cancelled | CoreError::SchedulerShutdown
        )
    }
}
