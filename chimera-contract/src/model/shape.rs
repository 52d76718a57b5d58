//! 成功结果形状

use serde::{Deserialize, Serialize};

use super::types::TypeRef;

/// 成功结果的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuccessKind {
    /// 携带数据
    Payload,
    /// 无数据的成功标记（也覆盖 `()`）
    Success,
    Created,
    Updated,
    Deleted,
}

/// 成功数据的交付方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    Single,
    /// 无界异步序列
    Stream {
        /// 序列元素类型（可能是事件信封）
        element: TypeRef,
        /// 元素为事件信封时，信封承载的数据类型
        event_data: Option<TypeRef>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessShape {
    /// 无数据结果时为 `None`
    pub payload: Option<TypeRef>,
    pub kind: SuccessKind,
    pub is_async: bool,
    pub delivery: Delivery,
    /// 负载类型上的标识属性名，用于下游生成 Location 头
    pub id_property: Option<String>,
}

impl SuccessShape {
    pub fn marker(kind: SuccessKind, is_async: bool) -> Self {
        Self {
            payload: None,
            kind,
            is_async,
            delivery: Delivery::Single,
            id_property: None,
        }
    }

    pub fn payload(ty: TypeRef, is_async: bool) -> Self {
        Self {
            payload: Some(ty),
            kind: SuccessKind::Payload,
            is_async,
            delivery: Delivery::Single,
            id_property: None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.delivery, Delivery::Stream { .. })
    }
}
