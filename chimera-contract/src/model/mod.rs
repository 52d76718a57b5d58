//! 端点契约的值类型
//!
//! 所有描述符都是纯数据：相同输入产生结构相等的输出，可被上游增量缓存持久化。

pub mod handler;
pub mod outcome;
pub mod parameter;
pub mod response;
pub mod shape;
pub mod types;

pub use handler::{EndpointContract, HandlerDescriptor, HttpVerb};
pub use outcome::{CustomErrorCode, DeclaredErrors, ErrorKind, ErrorOutcomeSet, OutcomeCollector};
pub use parameter::{
    BindingAnnotation, BindingSource, CustomBinding, EndpointParameter, ParameterDescriptor,
    SpecialRole,
};
pub use response::{MiddlewareFacts, ResponseVariant, ResultType};
pub use shape::{Delivery, SuccessKind, SuccessShape};
pub use types::{ConstructorInfo, ElementId, PropertyInfo, TypeInfo, TypeKind, TypeRef};
