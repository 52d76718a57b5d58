//! 参数类型有效性判断

use crate::model::{ParameterDescriptor, TypeKind, TypeRef};
use crate::symbols::SymbolResolver;

use super::ParameterClassifier;

impl<'a, R: SymbolResolver + ?Sized> ParameterClassifier<'a, R> {
    /// 已知基本类型，或本编译单元声明的枚举
    pub(crate) fn is_primitive(&self, ty: &TypeRef) -> bool {
        if self.well_known().is_primitive(ty) {
            return true;
        }
        self.resolver
            .type_info(ty)
            .is_some_and(|info| info.kind == TypeKind::Enum)
    }

    pub(crate) fn is_collection_of_primitives(&self, param: &ParameterDescriptor) -> bool {
        param
            .element
            .as_ref()
            .is_some_and(|element| self.is_primitive(element))
    }

    /// 路由 / 查询参数：标量基本类型或可从文本解析的类型
    pub(crate) fn is_route_bindable(&self, param: &ParameterDescriptor) -> bool {
        !param.is_collection() && (self.is_primitive(&param.ty) || param.has_try_parse())
    }

    /// 请求头额外接受基本类型集合
    pub(crate) fn is_header_bindable(&self, param: &ParameterDescriptor) -> bool {
        self.is_route_bindable(param) || self.is_collection_of_primitives(param)
    }

    pub(crate) fn looks_like_service(&self, param: &ParameterDescriptor) -> bool {
        let abstract_type = self
            .resolver
            .type_info(&param.ty)
            .is_some_and(|info| info.is_interface_or_abstract());
        abstract_type || self.well_known().has_service_name(&param.ty)
    }

    pub(crate) fn is_complex(&self, param: &ParameterDescriptor) -> bool {
        param.special.is_none()
            && !self.is_primitive(&param.ty)
            && !self.is_route_bindable(param)
            && !self.is_collection_of_primitives(param)
    }
}
