//! 配置键与默认值
//!
//! 定义分析器读取的所有配置键名称

// ==================== 响应联合 ====================

/// 响应联合允许的最大结果类型数
pub const MAX_RESULT_TYPES: &str = "chimera.contract.max-result-types";

/// 默认最大结果类型数
pub const DEFAULT_MAX_RESULT_TYPES: usize = 6;

// ==================== 已知类型 ====================

/// 可失败结果包装类型名
pub const RESULT_TYPE: &str = "chimera.contract.result-type";

/// 错误工厂类型名
pub const ERROR_TYPE: &str = "chimera.contract.error-type";

/// 事件信封类型名
pub const EVENT_ENVELOPE: &str = "chimera.contract.event-envelope";

/// 视为服务的类型名后缀（追加到内置列表）
pub const SERVICE_SUFFIXES: &str = "chimera.contract.service-suffixes";

// ==================== 日志 ====================

/// 日志级别
pub const LOGGING_LEVEL: &str = "chimera.contract.logging.level";

/// 日志格式
pub const LOGGING_FORMAT: &str = "chimera.contract.logging.format";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "CHIMERA_CONTRACT_";
