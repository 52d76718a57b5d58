//! 单元测试用的内存解析器

use std::collections::HashMap;

use crate::model::{ConstructorInfo, ElementId, ParameterDescriptor, TypeInfo, TypeKind, TypeRef};
use crate::symbols::{Body, CallSite, CallTarget, ConstValue, SymbolResolver};

/// 只提供类型元数据的解析器
#[derive(Debug, Default)]
pub(crate) struct StubResolver {
    types: HashMap<TypeRef, TypeInfo>,
}

impl StubResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_type(mut self, info: TypeInfo) -> Self {
        self.types.insert(info.ty.clone(), info);
        self
    }

    /// 带一个公共构造器的结构体
    pub(crate) fn with_struct(self, name: &str, params: Vec<ParameterDescriptor>) -> Self {
        let mut info = TypeInfo::new(TypeRef::named(name), TypeKind::Struct);
        info.constructors.push(ConstructorInfo {
            params,
            public: true,
        });
        self.with_type(info)
    }

    pub(crate) fn with_kind(self, name: &str, kind: TypeKind) -> Self {
        self.with_type(TypeInfo::new(TypeRef::named(name), kind))
    }
}

impl SymbolResolver for StubResolver {
    fn type_info(&self, ty: &TypeRef) -> Option<TypeInfo> {
        self.types.get(ty).cloned()
    }

    fn resolve_call(&self, _scope: &ElementId, _call: CallSite<'_>) -> Option<CallTarget> {
        None
    }

    fn resolve_reference(&self, _scope: &ElementId, _path: &syn::ExprPath) -> Option<ElementId> {
        None
    }

    fn body(&self, _element: &ElementId) -> Option<Body<'_>> {
        None
    }

    fn fold_constant(&self, _scope: &ElementId, _expr: &syn::Expr) -> Option<ConstValue> {
        None
    }
}
