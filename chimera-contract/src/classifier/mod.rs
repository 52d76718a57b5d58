//! 参数绑定分类器
//!
//! 为处理器的每个参数确定唯一的绑定来源。规则按 [`BindingRule::ORDER`] 依次尝试，
//! 第一个适用的规则决定结果；这个顺序就是优先级，不能调整。
//!
//! ## 跨参数校验
//!
//! 在逐个分类之前，先检查请求体类来源（请求体、表单 / 文件、字节流、PipeReader）：
//! 最多一个请求体参数，且最多出现一种请求体类来源。违反时报告一条
//! `MultipleBodySources` 并放弃整个处理器。

mod rules;
mod validity;

pub use rules::BindingRule;

use std::collections::HashSet;

use crate::diagnostics::{Diagnostic, DiagnosticSink, Location};
use crate::model::{
    BindingAnnotation, BindingSource, EndpointParameter, HandlerDescriptor, HttpVerb,
    ParameterDescriptor, SpecialRole,
};
use crate::options::{ContractOptions, WellKnownTypes};
use crate::symbols::SymbolResolver;

/// 分类时与单个参数无关的处理器上下文
#[derive(Debug, Clone, Copy)]
pub struct BindingContext<'h> {
    pub handler: &'h str,
    pub route_variables: &'h [String],
    pub verb: HttpVerb,
    pub bodyless: bool,
    pub location: &'h Location,
}

impl<'h> BindingContext<'h> {
    pub fn for_handler(handler: &'h HandlerDescriptor) -> Self {
        Self {
            handler: &handler.name,
            route_variables: &handler.route_variables,
            verb: handler.verb,
            bodyless: handler.verb.is_bodyless(),
            location: &handler.location,
        }
    }

    pub fn is_route_variable(&self, name: &str) -> bool {
        self.route_variables.iter().any(|v| v == name)
    }
}

/// 一个处理器的分类结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub parameters: Vec<EndpointParameter>,
    /// 分类失败的参数个数
    pub failed: usize,
    /// 因多请求体来源而放弃
    pub aborted: bool,
}

impl Classification {
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && !self.aborted
    }

    pub fn into_complete(self) -> Option<Vec<EndpointParameter>> {
        if self.is_complete() {
            Some(self.parameters)
        } else {
            None
        }
    }

    /// 是否有参数读取请求体或表单（决定 415 变体）
    pub fn reads_typed_body(parameters: &[EndpointParameter]) -> bool {
        parameters
            .iter()
            .flat_map(EndpointParameter::flatten)
            .any(|p| p.source.reads_typed_body())
    }
}

/// 规则的执行结果
pub(crate) enum Outcome {
    Bound(EndpointParameter),
    /// 诊断已报告
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BodyCategory {
    Body,
    Form,
    Stream,
    PipeReader,
}

fn descriptor_category(param: &ParameterDescriptor) -> Option<BodyCategory> {
    match &param.annotation {
        Some(BindingAnnotation::Body { .. }) => Some(BodyCategory::Body),
        Some(BindingAnnotation::Form { .. }) => Some(BodyCategory::Form),
        Some(_) => None,
        None => match param.special? {
            SpecialRole::FormFile | SpecialRole::FormFileCollection | SpecialRole::FormCollection => {
                Some(BodyCategory::Form)
            }
            SpecialRole::Stream => Some(BodyCategory::Stream),
            SpecialRole::PipeReader => Some(BodyCategory::PipeReader),
            SpecialRole::Context | SpecialRole::Cancellation => None,
        },
    }
}

fn source_category(source: &BindingSource) -> Option<BodyCategory> {
    match source {
        BindingSource::Body => Some(BodyCategory::Body),
        s if s.is_form_like() => Some(BodyCategory::Form),
        BindingSource::Stream => Some(BodyCategory::Stream),
        BindingSource::PipeReader => Some(BodyCategory::PipeReader),
        _ => None,
    }
}

/// 存在冲突时返回涉及的参数名
fn body_conflict<'p>(entries: impl IntoIterator<Item = (&'p str, BodyCategory)>) -> Option<Vec<&'p str>> {
    let entries: Vec<_> = entries.into_iter().collect();
    let bodies = entries
        .iter()
        .filter(|(_, category)| *category == BodyCategory::Body)
        .count();
    let categories: HashSet<BodyCategory> = entries.iter().map(|(_, c)| *c).collect();

    if bodies > 1 || categories.len() > 1 {
        Some(entries.into_iter().map(|(name, _)| name).collect())
    } else {
        None
    }
}

pub struct ParameterClassifier<'a, R: SymbolResolver + ?Sized> {
    resolver: &'a R,
    options: &'a ContractOptions,
}

impl<'a, R: SymbolResolver + ?Sized> ParameterClassifier<'a, R> {
    pub fn new(resolver: &'a R, options: &'a ContractOptions) -> Self {
        Self { resolver, options }
    }

    pub(crate) fn well_known(&self) -> &WellKnownTypes {
        &self.options.well_known
    }

    /// 分类处理器的全部参数
    pub fn classify_handler(
        &self,
        handler: &HandlerDescriptor,
        sink: &mut dyn DiagnosticSink,
    ) -> Classification {
        let cx = BindingContext::for_handler(handler);

        let declared = handler
            .parameters
            .iter()
            .filter_map(|p| descriptor_category(p).map(|c| (p.name.as_str(), c)));
        if let Some(names) = body_conflict(declared) {
            tracing::debug!(handler = %handler.name, ?names, "Multiple body sources");
            sink.report(Diagnostic::multiple_body_sources(
                &handler.name,
                &names,
                handler.location.clone(),
            ));
            return Classification {
                aborted: true,
                ..Classification::default()
            };
        }

        let mut classification = Classification::default();
        for param in &handler.parameters {
            match self.classify(param, &cx, sink) {
                Some(bound) => classification.parameters.push(bound),
                None => classification.failed += 1,
            }
        }

        if classification.failed == 0 {
            // 隐式推断和参数组展开后的请求体来源
            let inferred = classification
                .parameters
                .iter()
                .flat_map(EndpointParameter::flatten)
                .filter_map(|p| source_category(&p.source).map(|c| (p.name.as_str(), c)));
            if let Some(names) = body_conflict(inferred) {
                sink.report(Diagnostic::multiple_body_sources(
                    &handler.name,
                    &names,
                    handler.location.clone(),
                ));
                return Classification {
                    aborted: true,
                    ..Classification::default()
                };
            }
        }

        classification
    }

    /// 分类单个参数；失败时诊断已报告并返回 `None`
    pub fn classify(
        &self,
        param: &ParameterDescriptor,
        cx: &BindingContext<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<EndpointParameter> {
        for rule in BindingRule::ORDER {
            if let Some(outcome) = self.apply_rule(rule, param, cx, sink) {
                return match outcome {
                    Outcome::Bound(bound) => {
                        tracing::debug!(
                            handler = cx.handler,
                            parameter = %param.name,
                            rule = rule.name(),
                            source = %bound.source,
                            "Parameter bound"
                        );
                        Some(bound)
                    }
                    Outcome::Failed => {
                        tracing::debug!(
                            handler = cx.handler,
                            parameter = %param.name,
                            rule = rule.name(),
                            "Parameter rejected"
                        );
                        None
                    }
                };
            }
        }
        None
    }
}
