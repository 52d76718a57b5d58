//! 处理器描述与端点契约

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::outcome::{DeclaredErrors, ErrorOutcomeSet};
use super::parameter::{EndpointParameter, ParameterDescriptor};
use super::response::{MiddlewareFacts, ResponseVariant};
use super::shape::SuccessShape;
use super::types::{ElementId, TypeRef};
use crate::diagnostics::Location;

/// HTTP 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpVerb {
    /// 按惯例不携带请求体的方法
    pub fn is_bodyless(&self) -> bool {
        matches!(
            self,
            HttpVerb::Get | HttpVerb::Head | HttpVerb::Delete | HttpVerb::Options | HttpVerb::Trace
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Trace => "TRACE",
        }
    }
}

impl FromStr for HttpVerb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "PATCH" => Ok(HttpVerb::Patch),
            "DELETE" => Ok(HttpVerb::Delete),
            "HEAD" => Ok(HttpVerb::Head),
            "OPTIONS" => Ok(HttpVerb::Options),
            "TRACE" => Ok(HttpVerb::Trace),
            _ => Err(format!("Invalid HTTP verb: {}", s)),
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个待分析的处理器
///
/// 由宿主从注解声明中提取；函数体通过 `SymbolResolver::body(&id)` 获取
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerDescriptor {
    pub id: ElementId,
    pub name: String,
    pub verb: HttpVerb,
    pub route: String,
    pub route_variables: Vec<String>,
    pub parameters: Vec<ParameterDescriptor>,
    pub return_type: TypeRef,
    pub is_async: bool,
    pub middleware: MiddlewareFacts,
    /// 处理器自身声明的错误列表
    pub declared_errors: Option<DeclaredErrors>,
    pub location: Location,
}

impl HandlerDescriptor {
    pub fn new(name: impl Into<String>, verb: HttpVerb, return_type: TypeRef) -> Self {
        let name = name.into();
        Self {
            id: ElementId::function(&name),
            name,
            verb,
            route: String::from("/"),
            route_variables: Vec::new(),
            parameters: Vec::new(),
            return_type,
            is_async: false,
            middleware: MiddlewareFacts::default(),
            declared_errors: None,
            location: Location::default(),
        }
    }
}

/// 分析结果：一个处理器的完整端点契约
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointContract {
    pub handler: String,
    pub verb: HttpVerb,
    pub route: String,
    pub parameters: Vec<EndpointParameter>,
    pub success: SuccessShape,
    pub errors: ErrorOutcomeSet,
    pub responses: Vec<ResponseVariant>,
}

impl EndpointContract {
    pub fn status_codes(&self) -> Vec<u16> {
        self.responses.iter().map(|v| v.status).collect()
    }
}
