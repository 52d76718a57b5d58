//! 错误结果集合

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// 已知错误种类（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Failure,
    Unexpected,
    Validation,
    Conflict,
    NotFound,
    Unauthorized,
    Forbidden,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Failure,
        ErrorKind::Unexpected,
        ErrorKind::Validation,
        ErrorKind::Conflict,
        ErrorKind::NotFound,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
    ];

    /// 规范名称，也是排序键
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Failure => "Failure",
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Validation => "Validation",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
        }
    }

    /// 工厂函数名（`ApiError::not_found`）
    pub fn factory_name(&self) -> &'static str {
        match self {
            ErrorKind::Failure => "failure",
            ErrorKind::Unexpected => "unexpected",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
        }
    }

    /// 工厂函数名或变体名均可匹配
    pub fn from_member(member: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.factory_name() == member || kind.name() == member)
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Failure | ErrorKind::Unexpected => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 自定义错误码（`ApiError::custom(status, code)`）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomErrorCode {
    pub code: String,
    pub status: u16,
}

impl CustomErrorCode {
    pub fn new(code: impl Into<String>, status: u16) -> Self {
        Self {
            code: code.into(),
            status,
        }
    }
}

/// 通过注解声明的错误契约（trait 方法或处理器本身）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredErrors {
    pub kinds: Vec<ErrorKind>,
    pub custom: Vec<CustomErrorCode>,
}

/// 处理器可能产生的全部错误种类与自定义错误码
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorOutcomeSet {
    /// 去重后按名称序号排序
    pub kinds: Vec<ErrorKind>,
    /// 按错误码去重，保持首次出现顺序
    pub custom_codes: Vec<CustomErrorCode>,
}

impl ErrorOutcomeSet {
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty() && self.custom_codes.is_empty()
    }

    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn kind_names(&self) -> Vec<&'static str> {
        self.kinds.iter().map(ErrorKind::name).collect()
    }
}

/// 遍历期间增量收集错误结果
#[derive(Debug, Default)]
pub struct OutcomeCollector {
    kinds: HashSet<ErrorKind>,
    codes: Vec<CustomErrorCode>,
}

impl OutcomeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_kind(&mut self, kind: ErrorKind) -> bool {
        self.kinds.insert(kind)
    }

    /// 同一错误码只保留第一次出现
    pub fn record_custom(&mut self, code: CustomErrorCode) -> bool {
        if self.codes.iter().any(|existing| existing.code == code.code) {
            return false;
        }
        self.codes.push(code);
        true
    }

    pub fn record_declared(&mut self, declared: &DeclaredErrors) {
        for kind in &declared.kinds {
            self.record_kind(*kind);
        }
        for code in &declared.custom {
            self.record_custom(code.clone());
        }
    }

    pub fn finish(self) -> ErrorOutcomeSet {
        let mut kinds: Vec<ErrorKind> = self.kinds.into_iter().collect();
        kinds.sort_by(|a, b| a.name().cmp(b.name()));
        ErrorOutcomeSet {
            kinds,
            custom_codes: self.codes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_member_accepts_factory_and_variant_names() {
        assert_eq!(ErrorKind::from_member("not_found"), Some(ErrorKind::NotFound));
        assert_eq!(ErrorKind::from_member("NotFound"), Some(ErrorKind::NotFound));
        assert_eq!(ErrorKind::from_member("notfound"), None);
        assert_eq!(ErrorKind::from_member("custom"), None);
    }

    #[test]
    fn test_collector_sorts_kinds_ordinally() {
        let mut collector = OutcomeCollector::new();
        for kind in [
            ErrorKind::Validation,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::Unexpected,
            ErrorKind::NotFound,
            ErrorKind::Failure,
        ] {
            collector.record_kind(kind);
        }

        let set = collector.finish();
        assert_eq!(
            set.kind_names(),
            vec!["Conflict", "Failure", "NotFound", "Unexpected", "Validation"]
        );
    }

    #[test]
    fn test_custom_codes_keep_first_seen() {
        let mut collector = OutcomeCollector::new();
        assert!(collector.record_custom(CustomErrorCode::new("USER_LOCKED", 423)));
        assert!(collector.record_custom(CustomErrorCode::new("QUOTA", 429)));
        assert!(!collector.record_custom(CustomErrorCode::new("USER_LOCKED", 409)));

        let set = collector.finish();
        assert_eq!(
            set.custom_codes,
            vec![
                CustomErrorCode::new("USER_LOCKED", 423),
                CustomErrorCode::new("QUOTA", 429)
            ]
        );
    }
}
