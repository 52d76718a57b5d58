//! 成功形状推断

use crate::model::{Delivery, PropertyInfo, SuccessKind, SuccessShape, TypeRef};
use crate::options::WellKnownTypes;
use crate::symbols::SymbolResolver;

/// 返回类型不是 `[async] ApiResult<T>` 时返回 `None`
pub(crate) fn infer_success<R: SymbolResolver + ?Sized>(
    resolver: &R,
    well_known: &WellKnownTypes,
    return_type: &TypeRef,
    declared_async: bool,
) -> Option<SuccessShape> {
    let wrapped = well_known.is_async_wrapper(return_type);
    let is_async = declared_async || wrapped;
    let payload = well_known.fallible_payload(return_type)?;

    if payload.is_unit() {
        return Some(SuccessShape::marker(SuccessKind::Success, is_async));
    }
    if let Some(kind) = well_known.marker_kind(payload) {
        return Some(SuccessShape::marker(kind, is_async));
    }

    if well_known.is_stream(payload) {
        if let Some(element) = payload.first_arg() {
            let event_data = if well_known.is_event_envelope(element) {
                element.first_arg().cloned()
            } else {
                None
            };
            let mut shape = SuccessShape::payload(payload.clone(), is_async);
            shape.delivery = Delivery::Stream {
                element: element.clone(),
                event_data,
            };
            return Some(shape);
        }
    }

    let mut shape = SuccessShape::payload(payload.clone(), is_async);
    shape.id_property = resolver
        .type_info(payload)
        .and_then(|info| id_property(&info.properties));
    Some(shape)
}

/// 标识属性：先找精确的 `Id`，再不区分大小写；同级取先声明者
fn id_property(properties: &[PropertyInfo]) -> Option<String> {
    let visible = || properties.iter().filter(|p| p.readable && p.public);
    visible()
        .find(|p| p.name == "Id")
        .or_else(|| visible().find(|p| p.name.eq_ignore_ascii_case("id")))
        .map(|p| p.name.clone())
}
