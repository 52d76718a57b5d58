use thiserror::Error;

/// 宿主与配置层的错误类型
///
/// 推断引擎本身不返回错误，作者可见的问题都以诊断形式报告；
/// 这里只覆盖读取源码、加载配置和初始化日志时的失败。
#[derive(Error, Debug)]
pub enum ContractError {
    /// 源码解析失败
    #[error("Failed to parse '{}': {source}", .file.as_deref().unwrap_or("<source>"))]
    Parse {
        file: Option<String>,
        #[source]
        source: syn::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件格式错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 配置值不合法
    #[error("Invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),
}

pub type ContractResult<T> = Result<T, ContractError>;
