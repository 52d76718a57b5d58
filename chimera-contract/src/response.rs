//! 响应联合构建
//!
//! 变体按固定顺序贡献：成功、400 绑定失败、415、401/403、429、错误种类、500 兜底、
//! 自定义错误码。以 `(状态码, 结果类型)` 去重，再按状态码稳定排序。

use crate::classifier::Classification;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::model::{
    Delivery, EndpointParameter, ErrorKind, ErrorOutcomeSet, HandlerDescriptor, ResponseVariant,
    ResultType, SuccessKind, SuccessShape,
};
use crate::options::ContractOptions;

fn success_variant(success: &SuccessShape) -> ResponseVariant {
    match (success.kind, &success.delivery, &success.payload) {
        (SuccessKind::Payload, Delivery::Stream { element, event_data }, _) => {
            let result_type = match event_data {
                Some(data) => ResultType::ServerSentEvents(data.clone()),
                None => ResultType::Stream(element.clone()),
            };
            ResponseVariant::new(200, result_type, true)
        }
        (SuccessKind::Payload, Delivery::Single, Some(payload)) => {
            ResponseVariant::new(200, ResultType::Ok(payload.clone()), true)
        }
        (SuccessKind::Created, _, _) => ResponseVariant::new(201, ResultType::Created, false),
        _ => ResponseVariant::new(204, ResultType::NoContent, false),
    }
}

/// Failure / Unexpected 由 500 兜底变体承担
fn error_variant(kind: ErrorKind) -> Option<ResponseVariant> {
    let status = kind.status_code();
    let variant = match kind {
        ErrorKind::Validation => ResponseVariant::new(status, ResultType::ValidationProblem, true),
        ErrorKind::Unauthorized => ResponseVariant::new(status, ResultType::Unauthorized, false),
        ErrorKind::Forbidden => ResponseVariant::new(status, ResultType::Forbidden, false),
        ErrorKind::NotFound => ResponseVariant::new(status, ResultType::NotFound, true),
        ErrorKind::Conflict => ResponseVariant::new(status, ResultType::Conflict, true),
        ErrorKind::Failure | ErrorKind::Unexpected => return None,
    };
    Some(variant)
}

#[derive(Debug, Default)]
struct Union {
    variants: Vec<ResponseVariant>,
}

impl Union {
    fn push(&mut self, variant: ResponseVariant) {
        let duplicate = self
            .variants
            .iter()
            .any(|v| v.status == variant.status && v.result_type == variant.result_type);
        if !duplicate {
            self.variants.push(variant);
        }
    }

    fn finish(mut self) -> Vec<ResponseVariant> {
        self.variants.sort_by_key(|v| v.status);
        self.variants
    }
}

pub struct ResponseUnionBuilder<'a> {
    options: &'a ContractOptions,
}

impl<'a> ResponseUnionBuilder<'a> {
    pub fn new(options: &'a ContractOptions) -> Self {
        Self { options }
    }

    pub fn build(
        &self,
        handler: &HandlerDescriptor,
        success: &SuccessShape,
        parameters: &[EndpointParameter],
        errors: &ErrorOutcomeSet,
        sink: &mut dyn DiagnosticSink,
    ) -> Vec<ResponseVariant> {
        let middleware = &handler.middleware;
        let mut union = Union::default();

        union.push(success_variant(success));
        union.push(ResponseVariant::new(400, ResultType::BadRequest, true));
        if Classification::reads_typed_body(parameters) {
            union.push(ResponseVariant::new(415, ResultType::UnsupportedMediaType, false));
        }
        if middleware.authorization_active() {
            union.push(ResponseVariant::new(401, ResultType::Unauthorized, false));
            union.push(ResponseVariant::new(403, ResultType::Forbidden, false));
        }
        if middleware.rate_limit_active() {
            union.push(ResponseVariant::new(429, ResultType::TooManyRequests, false));
        }
        for kind in &errors.kinds {
            if let Some(variant) = error_variant(*kind) {
                union.push(variant);
            }
        }
        union.push(ResponseVariant::new(500, ResultType::InternalServerError, true));
        for custom in &errors.custom_codes {
            union.push(ResponseVariant::new(
                custom.status,
                ResultType::Problem(custom.code.clone()),
                true,
            ));
        }

        let variants = union.finish();
        let max = self.options.max_result_types;
        if variants.len() > max || !errors.custom_codes.is_empty() {
            sink.report(Diagnostic::too_many_result_types(
                &handler.name,
                variants.len(),
                max,
                handler.location.clone(),
            ));
        }

        tracing::debug!(
            handler = %handler.name,
            responses = ?variants.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Response union built"
        );
        variants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticCode, Diagnostics, Severity};
    use crate::model::{
        BindingSource, CustomErrorCode, HttpVerb, MiddlewareFacts, OutcomeCollector,
        ParameterDescriptor, TypeRef,
    };
    use pretty_assertions::assert_eq;

    fn handler(middleware: MiddlewareFacts) -> HandlerDescriptor {
        let mut handler = HandlerDescriptor::new("handler", HttpVerb::Get, TypeRef::named("ApiResult"));
        handler.middleware = middleware;
        handler
    }

    fn errors(kinds: &[ErrorKind], custom: &[CustomErrorCode]) -> ErrorOutcomeSet {
        let mut collector = OutcomeCollector::new();
        for kind in kinds {
            collector.record_kind(*kind);
        }
        for code in custom {
            collector.record_custom(code.clone());
        }
        collector.finish()
    }

    fn build(
        handler: &HandlerDescriptor,
        success: &SuccessShape,
        parameters: &[EndpointParameter],
        errors: &ErrorOutcomeSet,
    ) -> (Vec<ResponseVariant>, Diagnostics) {
        let options = ContractOptions::default();
        let mut diagnostics = Diagnostics::new();
        let variants =
            ResponseUnionBuilder::new(&options).build(handler, success, parameters, errors, &mut diagnostics);
        (variants, diagnostics)
    }

    fn statuses(variants: &[ResponseVariant]) -> Vec<u16> {
        variants.iter().map(|v| v.status).collect()
    }

    fn payload() -> SuccessShape {
        SuccessShape::payload(TypeRef::named("User"), false)
    }

    #[test]
    fn test_payload_without_extras() {
        let (variants, diagnostics) = build(
            &handler(MiddlewareFacts::default()),
            &payload(),
            &[],
            &ErrorOutcomeSet::default(),
        );
        assert_eq!(statuses(&variants), vec![200, 400, 500]);
        assert_eq!(variants[0].result_type, ResultType::Ok(TypeRef::named("User")));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_created_with_body_parameter() {
        let body = EndpointParameter::new(
            &ParameterDescriptor::new("user", TypeRef::named("CreateUser")),
            BindingSource::Body,
        );
        let (variants, _) = build(
            &handler(MiddlewareFacts::default()),
            &SuccessShape::marker(SuccessKind::Created, true),
            &[body],
            &ErrorOutcomeSet::default(),
        );
        assert_eq!(statuses(&variants), vec![201, 400, 415, 500]);
        assert!(!variants[0].has_body);
    }

    #[test]
    fn test_failure_and_unexpected_share_safety_net() {
        let (variants, _) = build(
            &handler(MiddlewareFacts::default()),
            &payload(),
            &[],
            &errors(&[ErrorKind::Failure, ErrorKind::Unexpected], &[]),
        );
        assert_eq!(variants.iter().filter(|v| v.status == 500).count(), 1);
    }

    #[test]
    fn test_authorization_with_not_found() {
        let middleware = MiddlewareFacts {
            requires_authorization: true,
            ..MiddlewareFacts::default()
        };
        let (variants, _) = build(
            &handler(middleware),
            &payload(),
            &[],
            &errors(&[ErrorKind::NotFound, ErrorKind::Unauthorized], &[]),
        );
        assert_eq!(statuses(&variants), vec![200, 400, 401, 403, 404, 500]);
    }

    #[test]
    fn test_overrides_disable_middleware_variants() {
        let middleware = MiddlewareFacts {
            requires_authorization: true,
            allow_anonymous: true,
            rate_limited: true,
            rate_limit_disabled: true,
            output_cached: true,
        };
        let (variants, _) = build(&handler(middleware), &payload(), &[], &ErrorOutcomeSet::default());
        assert_eq!(statuses(&variants), vec![200, 400, 500]);

        let limited = MiddlewareFacts {
            rate_limited: true,
            ..MiddlewareFacts::default()
        };
        let (variants, _) = build(&handler(limited), &payload(), &[], &ErrorOutcomeSet::default());
        assert_eq!(statuses(&variants), vec![200, 400, 429, 500]);
    }

    #[test]
    fn test_validation_is_distinct_from_binding_failure() {
        let (variants, _) = build(
            &handler(MiddlewareFacts::default()),
            &SuccessShape::marker(SuccessKind::Deleted, false),
            &[],
            &errors(&[ErrorKind::Validation], &[]),
        );
        let types: Vec<_> = variants.iter().map(|v| v.to_string()).collect();
        assert_eq!(
            types,
            vec!["204 NoContent", "400 BadRequest", "400 ValidationProblem", "500 InternalServerError"]
        );
    }

    #[test]
    fn test_custom_codes_report_arity_info() {
        let (variants, diagnostics) = build(
            &handler(MiddlewareFacts::default()),
            &payload(),
            &[],
            &errors(&[], &[CustomErrorCode::new("USER_LOCKED", 423)]),
        );
        assert_eq!(statuses(&variants), vec![200, 400, 423, 500]);
        let info = diagnostics
            .with_code(DiagnosticCode::TooManyResultTypes)
            .next()
            .unwrap();
        assert_eq!(info.severity, Severity::Info);
        assert!(info.message.contains("4 result types"));
    }

    #[test]
    fn test_arity_over_maximum_still_returns_all_variants() {
        let middleware = MiddlewareFacts {
            requires_authorization: true,
            rate_limited: true,
            ..MiddlewareFacts::default()
        };
        let (variants, diagnostics) = build(
            &handler(middleware),
            &payload(),
            &[],
            &errors(&[ErrorKind::Conflict, ErrorKind::NotFound], &[]),
        );
        assert_eq!(statuses(&variants), vec![200, 400, 401, 403, 404, 409, 429, 500]);
        assert_eq!(diagnostics.count(DiagnosticCode::TooManyResultTypes), 1);
    }

    #[test]
    fn test_event_stream_success() {
        let mut shape = payload();
        shape.delivery = Delivery::Stream {
            element: TypeRef::generic("SseEvent", vec![TypeRef::named("Tick")]),
            event_data: Some(TypeRef::named("Tick")),
        };
        assert_eq!(
            success_variant(&shape).result_type,
            ResultType::ServerSentEvents(TypeRef::named("Tick"))
        );
    }
}
