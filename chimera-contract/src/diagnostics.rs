//! 诊断信息
//!
//! 引擎内部从不抛出错误：每个决策要么静默成功，要么向调用方提供的
//! `DiagnosticSink` 报告一条带稳定编码的诊断。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 诊断严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// 稳定的诊断编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    MultipleBodySources,
    InvalidHeaderType,
    InvalidRouteType,
    InvalidQueryType,
    InvalidFormType,
    NullableParameterGroup,
    NestedParameterGroup,
    NoUsableConstructor,
    AmbiguousBodylessBinding,
    UndocumentedInterfaceCall,
    UnknownErrorFactory,
    TooManyResultTypes,
}

impl DiagnosticCode {
    pub fn id(&self) -> &'static str {
        match self {
            DiagnosticCode::MultipleBodySources => "CC0001",
            DiagnosticCode::InvalidHeaderType => "CC0002",
            DiagnosticCode::InvalidRouteType => "CC0003",
            DiagnosticCode::InvalidQueryType => "CC0004",
            DiagnosticCode::InvalidFormType => "CC0005",
            DiagnosticCode::NullableParameterGroup => "CC0006",
            DiagnosticCode::NestedParameterGroup => "CC0007",
            DiagnosticCode::NoUsableConstructor => "CC0008",
            DiagnosticCode::AmbiguousBodylessBinding => "CC0009",
            DiagnosticCode::UndocumentedInterfaceCall => "CC0010",
            DiagnosticCode::UnknownErrorFactory => "CC0011",
            DiagnosticCode::TooManyResultTypes => "CC0012",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticCode::AmbiguousBodylessBinding
            | DiagnosticCode::UndocumentedInterfaceCall
            | DiagnosticCode::UnknownErrorFactory => Severity::Warning,
            DiagnosticCode::TooManyResultTypes => Severity::Info,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// 源码位置
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(file: Option<String>, line: usize, column: usize) -> Self {
        Self { file, line, column }
    }

    /// 从 span 起点构造（需要 proc-macro2 的 `span-locations`）
    pub fn from_span(file: Option<&str>, span: proc_macro2::Span) -> Self {
        let start = span.start();
        Self {
            file: file.map(String::from),
            line: start.line,
            column: start.column + 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.file.as_deref().unwrap_or("<unknown>"),
            self.line,
            self.column
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    /// 严重级别取编码的默认级别
    pub fn new(code: DiagnosticCode, location: Location, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            location,
            message: message.into(),
        }
    }

    pub fn multiple_body_sources(handler: &str, params: &[&str], location: Location) -> Self {
        Self::new(
            DiagnosticCode::MultipleBodySources,
            location,
            format!(
                "Handler '{}' reads the request body from more than one source ({}); \
                 only one body, form, stream or pipe parameter is allowed",
                handler,
                params.join(", ")
            ),
        )
    }

    pub fn invalid_binding_type(
        code: DiagnosticCode,
        param: &str,
        ty: &impl fmt::Display,
        location: Location,
    ) -> Self {
        let what = match code {
            DiagnosticCode::InvalidHeaderType => "header",
            DiagnosticCode::InvalidRouteType => "route",
            DiagnosticCode::InvalidQueryType => "query",
            _ => "form",
        };
        Self::new(
            code,
            location,
            format!(
                "Parameter '{}' of type '{}' cannot be bound from the {}; \
                 use a primitive type or a type implementing FromStr",
                param, ty, what
            ),
        )
    }

    pub fn ambiguous_bodyless_binding(
        param: &str,
        ty: &impl fmt::Display,
        verb: &impl fmt::Display,
        location: Location,
    ) -> Self {
        Self::new(
            DiagnosticCode::AmbiguousBodylessBinding,
            location,
            format!(
                "Parameter '{}' of complex type '{}' on a {} handler is resolved as a service; \
                 annotate it with #[autowired], #[request_body] or #[as_parameters] to make the intent explicit",
                param, ty, verb
            ),
        )
    }

    pub fn undocumented_interface_call(handler: &str, target: &str, location: Location) -> Self {
        Self::new(
            DiagnosticCode::UndocumentedInterfaceCall,
            location,
            format!(
                "Handler '{}' calls '{}' which has no scannable body and no #[produces_errors]; \
                 errors it returns are not part of the response contract",
                handler, target
            ),
        )
    }

    pub fn unknown_error_factory(call: &str, location: Location) -> Self {
        Self::new(
            DiagnosticCode::UnknownErrorFactory,
            location,
            format!("'{}' is not a known error factory; its error kind cannot be inferred", call),
        )
    }

    pub fn too_many_result_types(handler: &str, count: usize, max: usize, location: Location) -> Self {
        Self::new(
            DiagnosticCode::TooManyResultTypes,
            location,
            format!(
                "Handler '{}' produces {} result types (configured maximum {}); \
                 the response union falls back to an untyped result",
                handler, count, max
            ),
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}[{}]: {}",
            self.location, self.severity, self.code, self.message
        )
    }
}

/// 调用方提供的诊断收集器
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// 默认收集器
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.items.iter().filter(|d| d.code == code).count()
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(code = %diagnostic.code, severity = %diagnostic.severity, "{}", diagnostic.message);
        self.items.push(diagnostic);
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::unknown_error_factory(
            "ApiError::teapot",
            Location::new(Some("src/user.rs".to_string()), 12, 9),
        );
        assert_eq!(
            diagnostic.to_string(),
            "src/user.rs:12:9: warning[CC0011]: 'ApiError::teapot' is not a known error factory; \
             its error kind cannot be inferred"
        );
    }

    #[test]
    fn test_code_severity() {
        assert_eq!(DiagnosticCode::MultipleBodySources.severity(), Severity::Error);
        assert_eq!(DiagnosticCode::AmbiguousBodylessBinding.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::TooManyResultTypes.severity(), Severity::Info);
    }

    #[test]
    fn test_collector_counts() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report(Diagnostic::too_many_result_types("list", 8, 6, Location::default()));
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.count(DiagnosticCode::TooManyResultTypes), 1);
        assert_eq!(diagnostics.len(), 1);
    }
}
