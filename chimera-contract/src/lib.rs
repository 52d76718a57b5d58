// chimera-contract: 构建期端点契约推断
//
// 对 chimera-web 处理器做静态分析，推断：
// - 每个参数的绑定来源（路由、查询、请求头、请求体、表单、服务……）
// - 成功响应的形状，以及调用图中可能产生的错误种类
// - 完整的响应联合（状态码 + 结果类型），供文档与客户端生成使用

pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod inference;
pub mod logging;
pub mod model;
pub mod options;
pub mod response;
pub mod source;
pub mod symbols;

#[cfg(test)]
mod testing;

// 重新导出常用类型
pub use analyzer::{analyze_all_with, EndpointAnalyzer, HandlerAnalysis};
pub use classifier::{BindingRule, Classification, ParameterClassifier};
pub use config::{
    ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource,
    TomlPropertySource,
};
pub use diagnostics::{
    Diagnostic, DiagnosticCode, DiagnosticSink, Diagnostics, Location, Severity,
};
pub use error::{ContractError, ContractResult};
pub use inference::ShapeInferencer;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use model::{
    BindingSource, EndpointContract, EndpointParameter, ErrorKind, HandlerDescriptor, HttpVerb,
    ResponseVariant, ResultType, SuccessShape, TypeRef,
};
pub use options::{ContractOptions, WellKnownTypes};
pub use response::ResponseUnionBuilder;
pub use source::{SourceFile, SourceIndex};
pub use symbols::SymbolResolver;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::analyzer::{analyze_all_with, EndpointAnalyzer, HandlerAnalysis};
    pub use crate::diagnostics::{Diagnostic, DiagnosticSink, Diagnostics};
    pub use crate::model::{EndpointContract, HandlerDescriptor};
    pub use crate::options::ContractOptions;
    pub use crate::source::SourceIndex;
    pub use crate::symbols::SymbolResolver;
}
