//! 分析选项与已知类型表

use serde::{Deserialize, Serialize};

use crate::config::Environment;
use crate::constants::*;
use crate::error::{ContractError, ContractResult};
use crate::model::{SuccessKind, TypeRef};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// 引擎识别的已知类型名称
///
/// 所有比较都基于路径最后一段（`TypeRef::name`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellKnownTypes {
    /// 可失败结果包装类型
    pub result_type: String,
    /// 错误工厂类型
    pub error_type: String,
    pub async_wrappers: Vec<String>,
    pub stream_wrappers: Vec<String>,
    pub event_envelope: String,
    pub success_marker: String,
    pub created_marker: String,
    pub updated_marker: String,
    pub deleted_marker: String,
    pub primitives: Vec<String>,
    pub service_suffixes: Vec<String>,
}

impl Default for WellKnownTypes {
    fn default() -> Self {
        Self {
            result_type: "ApiResult".to_string(),
            error_type: "ApiError".to_string(),
            async_wrappers: names(&["Future", "BoxFuture", "LocalBoxFuture"]),
            stream_wrappers: names(&["Stream", "BoxStream", "LocalBoxStream"]),
            event_envelope: "SseEvent".to_string(),
            success_marker: "Success".to_string(),
            created_marker: "Created".to_string(),
            updated_marker: "Updated".to_string(),
            deleted_marker: "Deleted".to_string(),
            primitives: names(&[
                "bool", "char", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32",
                "u64", "u128", "usize", "f32", "f64", "String", "str", "Uuid", "DateTime",
                "NaiveDate", "NaiveDateTime", "NaiveTime", "Duration", "Decimal", "IpAddr",
                "Ipv4Addr", "Ipv6Addr", "Url",
            ]),
            service_suffixes: names(&[
                "Service",
                "Repository",
                "Handler",
                "Manager",
                "Provider",
                "Factory",
                "Client",
            ]),
        }
    }
}

impl WellKnownTypes {
    pub fn is_async_wrapper(&self, ty: &TypeRef) -> bool {
        self.async_wrappers.iter().any(|w| ty.is(w))
    }

    pub fn is_result(&self, ty: &TypeRef) -> bool {
        ty.is(&self.result_type)
    }

    pub fn is_stream(&self, ty: &TypeRef) -> bool {
        self.stream_wrappers.iter().any(|w| ty.is(w))
    }

    pub fn is_event_envelope(&self, ty: &TypeRef) -> bool {
        ty.is(&self.event_envelope)
    }

    pub fn is_primitive(&self, ty: &TypeRef) -> bool {
        self.primitives.iter().any(|p| ty.is(p))
    }

    pub fn is_error_type(&self, name: &str) -> bool {
        name == self.error_type
    }

    pub fn marker_kind(&self, ty: &TypeRef) -> Option<SuccessKind> {
        if !ty.args.is_empty() {
            return None;
        }
        let name = ty.name();
        if name == self.success_marker {
            Some(SuccessKind::Success)
        } else if name == self.created_marker {
            Some(SuccessKind::Created)
        } else if name == self.updated_marker {
            Some(SuccessKind::Updated)
        } else if name == self.deleted_marker {
            Some(SuccessKind::Deleted)
        } else {
            None
        }
    }

    /// 剥离一层异步包装后判断是否为可失败结果，返回其负载类型
    pub fn fallible_payload<'t>(&self, ty: &'t TypeRef) -> Option<&'t TypeRef> {
        let inner = if self.is_async_wrapper(ty) {
            ty.first_arg()?
        } else {
            ty
        };
        if self.is_result(inner) && inner.args.len() == 1 {
            inner.first_arg()
        } else {
            None
        }
    }

    /// 服务风格的类型名：已知后缀，或包含 `Db` 的 `…Context`
    pub fn has_service_name(&self, ty: &TypeRef) -> bool {
        let name = ty.name();
        if self
            .service_suffixes
            .iter()
            .any(|suffix| name.len() > suffix.len() && name.ends_with(suffix.as_str()))
        {
            return true;
        }
        name.ends_with("Context") && name.contains("Db")
    }
}

/// 引擎选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractOptions {
    /// 超过此数量的响应联合会得到提示性诊断
    pub max_result_types: usize,
    pub well_known: WellKnownTypes,
}

impl Default for ContractOptions {
    fn default() -> Self {
        Self {
            max_result_types: DEFAULT_MAX_RESULT_TYPES,
            well_known: WellKnownTypes::default(),
        }
    }
}

impl ContractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_result_types(mut self, max: usize) -> Self {
        self.max_result_types = max;
        self
    }

    pub fn result_type(mut self, name: impl Into<String>) -> Self {
        self.well_known.result_type = name.into();
        self
    }

    pub fn error_type(mut self, name: impl Into<String>) -> Self {
        self.well_known.error_type = name.into();
        self
    }

    /// 从配置源加载，缺失的键保持默认值
    pub fn from_environment(env: &Environment) -> ContractResult<Self> {
        let mut options = Self::default();

        if let Some(value) = env.get(MAX_RESULT_TYPES) {
            let max = value.as_i64().ok_or_else(|| ContractError::InvalidOption {
                key: MAX_RESULT_TYPES.to_string(),
                message: format!("expected an integer, got {:?}", value),
            })?;
            if max <= 0 {
                return Err(ContractError::InvalidOption {
                    key: MAX_RESULT_TYPES.to_string(),
                    message: format!("must be at least 1, got {}", max),
                });
            }
            options.max_result_types = max as usize;
        }

        if let Some(name) = env.get_string(RESULT_TYPE) {
            options.well_known.result_type = name;
        }
        if let Some(name) = env.get_string(ERROR_TYPE) {
            options.well_known.error_type = name;
        }
        if let Some(name) = env.get_string(EVENT_ENVELOPE) {
            options.well_known.event_envelope = name;
        }
        if let Some(suffixes) = env.get_string_array(SERVICE_SUFFIXES) {
            for suffix in suffixes {
                if !options.well_known.service_suffixes.contains(&suffix) {
                    options.well_known.service_suffixes.push(suffix);
                }
            }
        }

        tracing::debug!(
            max_result_types = options.max_result_types,
            result_type = %options.well_known.result_type,
            error_type = %options.well_known.error_type,
            "Loaded contract options"
        );
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigValue, MapPropertySource};

    #[test]
    fn test_service_name_heuristics() {
        let wk = WellKnownTypes::default();
        assert!(wk.has_service_name(&TypeRef::named("UserRepository")));
        assert!(wk.has_service_name(&TypeRef::named("AppDbContext")));
        assert!(!wk.has_service_name(&TypeRef::named("RequestContext")));
        assert!(!wk.has_service_name(&TypeRef::named("Service")));
        assert!(!wk.has_service_name(&TypeRef::named("CreateUser")));
    }

    #[test]
    fn test_fallible_payload_strips_one_async_layer() {
        let wk = WellKnownTypes::default();
        let user = TypeRef::named("User");
        let result = TypeRef::generic("ApiResult", vec![user.clone()]);
        let future = TypeRef::generic("BoxFuture", vec![result.clone()]);
        let nested = TypeRef::generic("Future", vec![future.clone()]);

        assert_eq!(wk.fallible_payload(&result), Some(&user));
        assert_eq!(wk.fallible_payload(&future), Some(&user));
        assert_eq!(wk.fallible_payload(&nested), None);
        assert_eq!(wk.fallible_payload(&user), None);
    }

    #[test]
    fn test_from_environment() {
        let env = Environment::new().with_source(
            MapPropertySource::new("inline")
                .with_property(MAX_RESULT_TYPES, ConfigValue::Int(9))
                .with_property(ERROR_TYPE, ConfigValue::String("AppError".to_string()))
                .with_property(
                    SERVICE_SUFFIXES,
                    ConfigValue::Array(vec![ConfigValue::String("Gateway".to_string())]),
                ),
        );

        let options = ContractOptions::from_environment(&env).unwrap();
        assert_eq!(options.max_result_types, 9);
        assert_eq!(options.well_known.error_type, "AppError");
        assert!(options.well_known.has_service_name(&TypeRef::named("PaymentGateway")));
    }

    #[test]
    fn test_zero_max_is_rejected() {
        let env = Environment::new().with_source(
            MapPropertySource::new("inline").with_property(MAX_RESULT_TYPES, ConfigValue::Int(0)),
        );
        let err = ContractOptions::from_environment(&env).unwrap_err();
        assert!(matches!(err, ContractError::InvalidOption { .. }));
    }
}
