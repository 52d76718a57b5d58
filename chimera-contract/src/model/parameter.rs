//! 处理器参数描述与绑定结果

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::TypeRef;
use crate::diagnostics::Location;

/// 参数上的显式绑定注解
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingAnnotation {
    /// `#[as_parameters]` 参数组
    AsParameters,
    /// `#[request_body]`，`allow_empty` 放宽空请求体的失败策略
    Body { allow_empty: bool },
    /// `#[form]` / `#[form("name")]`
    Form { name: Option<String> },
    /// `#[autowired]`
    Service,
    /// `#[keyed_service(key)]`，key 原样保留（字面量带引号）
    KeyedService { key: String },
    /// `#[request_header("X-Name")]`
    Header { name: Option<String> },
    /// `#[path_variable]` / `#[path_variable("name")]`
    Route { name: Option<String> },
    /// `#[request_param]` / `#[request_param("name")]`
    Query { name: Option<String> },
}

/// 识别出的特殊参数角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialRole {
    /// 请求上下文对象
    Context,
    /// 取消信号
    Cancellation,
    FormFile,
    FormFileCollection,
    /// 通用表单集合
    FormCollection,
    /// 原始字节流
    Stream,
    PipeReader,
}

/// 参数类型上检测到的自定义解析 / 绑定能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomBinding {
    /// 静态文本解析（`FromStr`）
    TryParse,
    /// 从请求上下文异步绑定（`BindFromRequest`）
    BindAsync,
    /// 实现了可绑定能力（`Bindable`）
    Bindable,
}

/// 处理器参数描述
///
/// 由宿主从声明中提取，`ty` 已剥离 `Option` 层（见 `nullable`）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub nullable: bool,
    /// 集合类型的元素类型
    pub element: Option<TypeRef>,
    pub annotation: Option<BindingAnnotation>,
    pub special: Option<SpecialRole>,
    pub custom_binding: Option<CustomBinding>,
    pub location: Location,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            element: None,
            annotation: None,
            special: None,
            custom_binding: None,
            location: Location::default(),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn collection_of(mut self, element: TypeRef) -> Self {
        self.element = Some(element);
        self
    }

    pub fn annotated(mut self, annotation: BindingAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn special(mut self, role: SpecialRole) -> Self {
        self.special = Some(role);
        self
    }

    pub fn custom_binding(mut self, binding: CustomBinding) -> Self {
        self.custom_binding = Some(binding);
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn is_collection(&self) -> bool {
        self.element.is_some()
    }

    pub fn has_try_parse(&self) -> bool {
        self.custom_binding == Some(CustomBinding::TryParse)
    }
}

/// 参数的绑定来源
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingSource {
    Route,
    Query,
    Header,
    Body,
    Form,
    FormFile,
    FormFileCollection,
    FormCollection,
    Service,
    KeyedService(String),
    Context,
    Cancellation,
    Stream,
    PipeReader,
    /// 参数组，子参数见 `EndpointParameter::children`
    AsParameters,
    /// 自定义绑定
    Custom,
}

impl BindingSource {
    pub fn is_form_like(&self) -> bool {
        matches!(
            self,
            Self::Form | Self::FormFile | Self::FormFileCollection | Self::FormCollection
        )
    }

    /// 是否会触发 415 媒体类型检查
    pub fn reads_typed_body(&self) -> bool {
        matches!(self, Self::Body) || self.is_form_like()
    }

    pub fn from_special(role: SpecialRole) -> Self {
        match role {
            SpecialRole::Context => Self::Context,
            SpecialRole::Cancellation => Self::Cancellation,
            SpecialRole::FormFile => Self::FormFile,
            SpecialRole::FormFileCollection => Self::FormFileCollection,
            SpecialRole::FormCollection => Self::FormCollection,
            SpecialRole::Stream => Self::Stream,
            SpecialRole::PipeReader => Self::PipeReader,
        }
    }
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyedService(key) => write!(f, "KeyedService({})", key),
            other => write!(f, "{:?}", other),
        }
    }
}

/// 分类器输出：一个已确定绑定来源的端点参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointParameter {
    pub name: String,
    pub ty: TypeRef,
    pub source: BindingSource,
    /// 路由 / 查询 / 头 / 表单的查找键
    pub key: Option<String>,
    pub nullable: bool,
    pub allow_empty_body: bool,
    /// 参数组或复合表单的子参数，保持构造参数声明顺序
    pub children: Vec<EndpointParameter>,
}

impl EndpointParameter {
    pub fn new(descriptor: &ParameterDescriptor, source: BindingSource) -> Self {
        Self {
            name: descriptor.name.clone(),
            ty: descriptor.ty.clone(),
            source,
            key: None,
            nullable: descriptor.nullable,
            allow_empty_body: false,
            children: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_children(mut self, children: Vec<EndpointParameter>) -> Self {
        self.children = children;
        self
    }

    /// 自身及所有子孙参数（先序）
    pub fn flatten(&self) -> Vec<&EndpointParameter> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}
