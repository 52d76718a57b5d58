//! 响应变体与中间件事实

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::TypeRef;

/// 物化后的结果类型标识
///
/// 与状态码一起构成响应联合的去重键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultType {
    Ok(TypeRef),
    Stream(TypeRef),
    ServerSentEvents(TypeRef),
    Created,
    NoContent,
    /// 绑定失败
    BadRequest,
    ValidationProblem,
    UnsupportedMediaType,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    TooManyRequests,
    InternalServerError,
    /// 自定义错误码
    Problem(String),
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultType::Ok(ty) => write!(f, "Ok<{}>", ty),
            ResultType::Stream(ty) => write!(f, "Stream<{}>", ty),
            ResultType::ServerSentEvents(ty) => write!(f, "ServerSentEvents<{}>", ty),
            ResultType::Problem(code) => write!(f, "Problem({})", code),
            other => write!(f, "{:?}", other),
        }
    }
}

/// 响应联合中的一个变体
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseVariant {
    pub status: u16,
    pub result_type: ResultType,
    pub has_body: bool,
}

impl ResponseVariant {
    pub fn new(status: u16, result_type: ResultType, has_body: bool) -> Self {
        Self {
            status,
            result_type,
            has_body,
        }
    }
}

impl fmt::Display for ResponseVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.result_type)
    }
}

/// 宿主提供的中间件注解事实
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiddlewareFacts {
    /// `#[authorize]`
    pub requires_authorization: bool,
    /// `#[allow_anonymous]`
    pub allow_anonymous: bool,
    /// `#[rate_limit]`
    pub rate_limited: bool,
    /// `#[disable_rate_limit]`
    pub rate_limit_disabled: bool,
    /// `#[output_cache]`，不影响响应联合
    pub output_cached: bool,
}

impl MiddlewareFacts {
    pub fn authorization_active(&self) -> bool {
        self.requires_authorization && !self.allow_anonymous
    }

    pub fn rate_limit_active(&self) -> bool {
        self.rate_limited && !self.rate_limit_disabled
    }
}
