//! 有序绑定规则

use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::model::{
    BindingAnnotation, BindingSource, CustomBinding, EndpointParameter, ParameterDescriptor,
    SpecialRole, TypeRef,
};
use crate::symbols::SymbolResolver;

use super::{BindingContext, Outcome, ParameterClassifier};

/// 绑定规则，按优先级排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingRule {
    /// `#[as_parameters]`：递归分类构造参数
    ParameterGroup,
    /// `#[request_body]`
    ExplicitBody,
    /// `#[form]`
    ExplicitForm,
    /// `#[autowired]` / `#[keyed_service]`
    ExplicitService,
    /// `#[request_header]`
    ExplicitHeader,
    /// `#[path_variable]`
    ExplicitRoute,
    /// `#[request_param]`
    ExplicitQuery,
    /// 上下文、取消信号、文件、字节流等特殊类型
    SpecialRole,
    /// 参数名与路由变量同名
    ImplicitRoute,
    /// 基本类型或基本类型集合
    ImplicitQuery,
    /// 检测到自定义解析 / 绑定能力
    CustomParsing,
    /// 服务启发式与复杂类型推断
    Fallback,
}

impl BindingRule {
    pub const ORDER: [BindingRule; 12] = [
        BindingRule::ParameterGroup,
        BindingRule::ExplicitBody,
        BindingRule::ExplicitForm,
        BindingRule::ExplicitService,
        BindingRule::ExplicitHeader,
        BindingRule::ExplicitRoute,
        BindingRule::ExplicitQuery,
        BindingRule::SpecialRole,
        BindingRule::ImplicitRoute,
        BindingRule::ImplicitQuery,
        BindingRule::CustomParsing,
        BindingRule::Fallback,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BindingRule::ParameterGroup => "parameter-group",
            BindingRule::ExplicitBody => "explicit-body",
            BindingRule::ExplicitForm => "explicit-form",
            BindingRule::ExplicitService => "explicit-service",
            BindingRule::ExplicitHeader => "explicit-header",
            BindingRule::ExplicitRoute => "explicit-route",
            BindingRule::ExplicitQuery => "explicit-query",
            BindingRule::SpecialRole => "special-role",
            BindingRule::ImplicitRoute => "implicit-route",
            BindingRule::ImplicitQuery => "implicit-query",
            BindingRule::CustomParsing => "custom-parsing",
            BindingRule::Fallback => "fallback",
        }
    }
}

fn keyed(param: &ParameterDescriptor, source: BindingSource, name: &Option<String>) -> Outcome {
    let key = name.clone().unwrap_or_else(|| param.name.clone());
    Outcome::Bound(EndpointParameter::new(param, source).with_key(key))
}

fn reject(
    sink: &mut dyn DiagnosticSink,
    code: DiagnosticCode,
    param: &ParameterDescriptor,
    ty: &TypeRef,
) -> Outcome {
    sink.report(Diagnostic::invalid_binding_type(
        code,
        &param.name,
        ty,
        param.location.clone(),
    ));
    Outcome::Failed
}

impl<'a, R: SymbolResolver + ?Sized> ParameterClassifier<'a, R> {
    /// 规则不适用时返回 `None`
    pub(crate) fn apply_rule(
        &self,
        rule: BindingRule,
        param: &ParameterDescriptor,
        cx: &BindingContext<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<Outcome> {
        let annotation = param.annotation.as_ref();
        match rule {
            BindingRule::ParameterGroup => match annotation {
                Some(BindingAnnotation::AsParameters) => Some(self.expand_group(param, cx, sink)),
                _ => None,
            },
            BindingRule::ExplicitBody => match annotation {
                Some(BindingAnnotation::Body { allow_empty }) => {
                    let mut bound = EndpointParameter::new(param, BindingSource::Body);
                    bound.allow_empty_body = *allow_empty;
                    Some(Outcome::Bound(bound))
                }
                _ => None,
            },
            BindingRule::ExplicitForm => match annotation {
                Some(BindingAnnotation::Form { name }) => {
                    let mut path = Vec::new();
                    Some(self.bind_form(param, name, &mut path, sink))
                }
                _ => None,
            },
            BindingRule::ExplicitService => match annotation {
                Some(BindingAnnotation::Service) => Some(Outcome::Bound(EndpointParameter::new(
                    param,
                    BindingSource::Service,
                ))),
                Some(BindingAnnotation::KeyedService { key }) => Some(Outcome::Bound(
                    EndpointParameter::new(param, BindingSource::KeyedService(key.clone())),
                )),
                _ => None,
            },
            BindingRule::ExplicitHeader => match annotation {
                Some(BindingAnnotation::Header { name }) => Some(if self.is_header_bindable(param) {
                    keyed(param, BindingSource::Header, name)
                } else {
                    reject(sink, DiagnosticCode::InvalidHeaderType, param, &param.ty)
                }),
                _ => None,
            },
            BindingRule::ExplicitRoute => match annotation {
                Some(BindingAnnotation::Route { name }) => Some(if self.is_route_bindable(param) {
                    keyed(param, BindingSource::Route, name)
                } else {
                    reject(sink, DiagnosticCode::InvalidRouteType, param, &param.ty)
                }),
                _ => None,
            },
            BindingRule::ExplicitQuery => match annotation {
                Some(BindingAnnotation::Query { name }) => Some(if self.is_route_bindable(param) {
                    keyed(param, BindingSource::Query, name)
                } else {
                    reject(sink, DiagnosticCode::InvalidQueryType, param, &param.ty)
                }),
                _ => None,
            },
            BindingRule::SpecialRole => param.special.map(|role| {
                Outcome::Bound(EndpointParameter::new(param, BindingSource::from_special(role)))
            }),
            BindingRule::ImplicitRoute => {
                if !cx.is_route_variable(&param.name) {
                    return None;
                }
                Some(if self.is_route_bindable(param) {
                    keyed(param, BindingSource::Route, &None)
                } else {
                    reject(sink, DiagnosticCode::InvalidRouteType, param, &param.ty)
                })
            }
            BindingRule::ImplicitQuery => {
                let scalar = !param.is_collection() && self.is_primitive(&param.ty);
                if scalar || self.is_collection_of_primitives(param) {
                    Some(keyed(param, BindingSource::Query, &None))
                } else {
                    None
                }
            }
            BindingRule::CustomParsing => match param.custom_binding? {
                CustomBinding::TryParse => Some(if cx.is_route_variable(&param.name) {
                    keyed(param, BindingSource::Route, &None)
                } else {
                    keyed(param, BindingSource::Query, &None)
                }),
                CustomBinding::BindAsync | CustomBinding::Bindable => Some(Outcome::Bound(
                    EndpointParameter::new(param, BindingSource::Custom),
                )),
            },
            BindingRule::Fallback => Some(self.fallback(param, cx, sink)),
        }
    }

    fn fallback(
        &self,
        param: &ParameterDescriptor,
        cx: &BindingContext<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> Outcome {
        if self.looks_like_service(param) {
            return Outcome::Bound(EndpointParameter::new(param, BindingSource::Service));
        }
        if self.is_complex(param) {
            if !cx.bodyless {
                return Outcome::Bound(EndpointParameter::new(param, BindingSource::Body));
            }
            sink.report(Diagnostic::ambiguous_bodyless_binding(
                &param.name,
                &param.ty,
                &cx.verb,
                param.location.clone(),
            ));
        }
        Outcome::Bound(EndpointParameter::new(param, BindingSource::Service))
    }

    /// 参数组：不可为空、必须有可访问构造器、不可嵌套
    fn expand_group(
        &self,
        param: &ParameterDescriptor,
        cx: &BindingContext<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> Outcome {
        if param.nullable {
            sink.report(Diagnostic::new(
                DiagnosticCode::NullableParameterGroup,
                param.location.clone(),
                format!(
                    "Parameter group '{}' of type '{}' must not be optional",
                    param.name, param.ty
                ),
            ));
            return Outcome::Failed;
        }

        let Some(ctor) = self
            .resolver
            .type_info(&param.ty)
            .and_then(|info| info.best_public_constructor().cloned())
        else {
            sink.report(self.no_constructor(param));
            return Outcome::Failed;
        };

        let mut children = Vec::with_capacity(ctor.params.len());
        let mut failed = false;
        for child in &ctor.params {
            if child.annotation == Some(BindingAnnotation::AsParameters) {
                sink.report(Diagnostic::new(
                    DiagnosticCode::NestedParameterGroup,
                    child.location.clone(),
                    format!(
                        "Parameter group '{}' cannot contain the nested group '{}' of type '{}'",
                        param.name, child.name, child.ty
                    ),
                ));
                failed = true;
                continue;
            }
            match self.classify(child, cx, sink) {
                Some(bound) => children.push(bound),
                None => failed = true,
            }
        }

        if failed {
            Outcome::Failed
        } else {
            Outcome::Bound(
                EndpointParameter::new(param, BindingSource::AsParameters).with_children(children),
            )
        }
    }

    /// 表单绑定；复合类型按最佳公共构造器展开为表单子参数
    fn bind_form(
        &self,
        param: &ParameterDescriptor,
        name: &Option<String>,
        path: &mut Vec<TypeRef>,
        sink: &mut dyn DiagnosticSink,
    ) -> Outcome {
        if let Some(
            role @ (SpecialRole::FormFile | SpecialRole::FormFileCollection | SpecialRole::FormCollection),
        ) = param.special
        {
            return Outcome::Bound(EndpointParameter::new(param, BindingSource::from_special(role)));
        }

        let scalar = !param.is_collection() && self.is_primitive(&param.ty);
        if scalar || self.is_collection_of_primitives(param) {
            return keyed(param, BindingSource::Form, name);
        }

        let ctor = self
            .resolver
            .type_info(&param.ty)
            .and_then(|info| info.best_public_constructor().cloned());
        let (Some(ctor), false) = (ctor, param.is_collection() || path.contains(&param.ty)) else {
            return reject(sink, DiagnosticCode::InvalidFormType, param, &param.ty);
        };

        path.push(param.ty.clone());
        let mut children = Vec::with_capacity(ctor.params.len());
        let mut failed = false;
        for child in &ctor.params {
            let child_name = match &child.annotation {
                Some(BindingAnnotation::Form { name }) => name.clone(),
                _ => None,
            };
            match self.bind_form(child, &child_name, path, sink) {
                Outcome::Bound(bound) => children.push(bound),
                Outcome::Failed => failed = true,
            }
        }
        path.pop();

        if failed {
            return Outcome::Failed;
        }
        let key = name.clone().unwrap_or_else(|| param.name.clone());
        Outcome::Bound(
            EndpointParameter::new(param, BindingSource::Form)
                .with_key(key)
                .with_children(children),
        )
    }

    fn no_constructor(&self, param: &ParameterDescriptor) -> Diagnostic {
        Diagnostic::new(
            DiagnosticCode::NoUsableConstructor,
            param.location.clone(),
            format!(
                "Type '{}' of parameter group '{}' has no public constructor",
                param.ty, param.name
            ),
        )
    }
}
