//! 宿主符号解析接口
//!
//! 引擎只通过这个只读接口查看类型、调用目标和注解。所有查询都是只读的：
//! 实现了 `Sync` 的解析器可以被多个处理器同时使用；持有 `syn` 语法树的解析器
//! 不能跨线程共享，可以为每个工作线程各建一份（见 `analyze_all_with`）。
//! 任何查询返回 `None` 都视为“能力缺失”，而不是引擎故障。

use proc_macro2::Span;
use syn::spanned::Spanned;

use crate::diagnostics::Location;
use crate::model::{DeclaredErrors, ElementId, TypeInfo, TypeRef};

/// 一个可遍历的函数体或初始化表达式
#[derive(Debug, Clone, Copy)]
pub enum Body<'a> {
    Block(&'a syn::Block),
    Expr(&'a syn::Expr),
}

/// 调用点
#[derive(Debug, Clone, Copy)]
pub enum CallSite<'a> {
    Call(&'a syn::ExprCall),
    Method(&'a syn::ExprMethodCall),
}

impl CallSite<'_> {
    pub fn span(&self) -> Span {
        match self {
            CallSite::Call(call) => call.span(),
            CallSite::Method(call) => call.method.span(),
        }
    }
}

/// 调用目标的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Function,
    Method,
    /// 没有可扫描函数体的 trait 方法
    Interface,
    /// 抽象 / 虚方法
    Abstract,
    /// 编译单元之外的目标
    External,
}

/// 解析后的调用目标
#[derive(Debug, Clone, PartialEq)]
pub struct CallTarget {
    /// 在本编译单元内声明时的元素标识
    pub element: Option<ElementId>,
    pub declaring_type: Option<String>,
    pub name: String,
    pub kind: TargetKind,
    pub returns: Option<TypeRef>,
    /// 目标上的 `#[produces_errors]`
    pub declared_errors: Option<DeclaredErrors>,
}

impl CallTarget {
    pub fn new(name: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            element: None,
            declaring_type: None,
            name: name.into(),
            kind,
            returns: None,
            declared_errors: None,
        }
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self.kind, TargetKind::Interface | TargetKind::Abstract)
    }

    pub fn display_name(&self) -> String {
        match &self.declaring_type {
            Some(owner) => format!("{}::{}", owner, self.name),
            None => self.name.clone(),
        }
    }
}

/// 常量折叠结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstValue {
    Str(String),
    Int(i128),
    Bool(bool),
}

pub trait SymbolResolver {
    /// 类型元数据；未知类型返回 `None`
    fn type_info(&self, ty: &TypeRef) -> Option<TypeInfo>;

    /// 在 `scope` 的函数体内解析一个调用点
    fn resolve_call(&self, scope: &ElementId, call: CallSite<'_>) -> Option<CallTarget>;

    /// 解析路径表达式引用的已声明元素（常量、静态项、作为值传递的函数）
    fn resolve_reference(&self, scope: &ElementId, path: &syn::ExprPath) -> Option<ElementId>;

    /// 元素的函数体或初始化表达式
    fn body(&self, element: &ElementId) -> Option<Body<'_>>;

    /// 折叠简单常量表达式
    fn fold_constant(&self, scope: &ElementId, expr: &syn::Expr) -> Option<ConstValue>;

    fn locate(&self, span: Span) -> Location {
        Location::from_span(None, span)
    }
}
