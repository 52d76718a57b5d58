//! 分析流水线：分类器 → 推断器 → 响应联合

use rayon::prelude::*;

use crate::classifier::ParameterClassifier;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::inference::ShapeInferencer;
use crate::model::{EndpointContract, HandlerDescriptor};
use crate::options::ContractOptions;
use crate::response::ResponseUnionBuilder;
use crate::symbols::SymbolResolver;

/// 单个处理器的分析结果及其诊断
#[derive(Debug, Clone)]
pub struct HandlerAnalysis {
    pub handler: String,
    pub contract: Option<EndpointContract>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct EndpointAnalyzer<'a, R: SymbolResolver + ?Sized> {
    resolver: &'a R,
    options: &'a ContractOptions,
}

impl<'a, R: SymbolResolver + ?Sized> EndpointAnalyzer<'a, R> {
    pub fn new(resolver: &'a R, options: &'a ContractOptions) -> Self {
        Self { resolver, options }
    }

    /// 分析一个处理器
    ///
    /// 参数分类失败或返回类型不是可失败结果时返回 `None`；前者的诊断已报告，
    /// 后者表示该函数不是端点候选
    pub fn analyze(
        &self,
        handler: &HandlerDescriptor,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<EndpointContract> {
        let _span = tracing::debug_span!("analyze", handler = %handler.name).entered();

        // 非端点候选不分类，也不报告诊断
        let inferencer = ShapeInferencer::new(self.resolver, self.options);
        let Some(success) = inferencer.infer_success(handler) else {
            tracing::debug!(
                handler = %handler.name,
                return_type = %handler.return_type,
                "Not a fallible result, skipping"
            );
            return None;
        };

        let classification =
            ParameterClassifier::new(self.resolver, self.options).classify_handler(handler, sink);
        let Some(parameters) = classification.into_complete() else {
            tracing::debug!(handler = %handler.name, "Classification failed");
            return None;
        };

        let errors = inferencer.collect_errors(handler, sink);
        let responses = ResponseUnionBuilder::new(self.options).build(
            handler,
            &success,
            &parameters,
            &errors,
            sink,
        );

        Some(EndpointContract {
            handler: handler.name.clone(),
            verb: handler.verb,
            route: handler.route.clone(),
            parameters,
            success,
            errors,
            responses,
        })
    }

    /// 顺序分析
    pub fn analyze_each(&self, handlers: &[HandlerDescriptor]) -> Vec<HandlerAnalysis> {
        handlers.iter().map(|h| self.analyze_isolated(h)).collect()
    }

    /// 并行分析；每个处理器使用独立的诊断缓冲，结果保持输入顺序
    pub fn analyze_all(&self, handlers: &[HandlerDescriptor]) -> Vec<HandlerAnalysis>
    where
        R: Sync,
    {
        tracing::debug!(handlers = handlers.len(), "Analyzing handlers in parallel");
        handlers.par_iter().map(|h| self.analyze_isolated(h)).collect()
    }

    fn analyze_isolated(&self, handler: &HandlerDescriptor) -> HandlerAnalysis {
        let mut diagnostics = Vec::new();
        let contract = self.analyze(handler, &mut diagnostics);
        HandlerAnalysis {
            handler: handler.name.clone(),
            contract,
            diagnostics,
        }
    }
}

/// 并行分析，每个工作线程用 `init` 构造自己的解析器
///
/// 用于不能跨线程共享的解析器，例如持有语法树的 [`SourceIndex`](crate::source::SourceIndex)
pub fn analyze_all_with<R, F>(
    options: &ContractOptions,
    handlers: &[HandlerDescriptor],
    init: F,
) -> Vec<HandlerAnalysis>
where
    R: SymbolResolver,
    F: Fn() -> R + Sync + Send,
{
    tracing::debug!(handlers = handlers.len(), "Analyzing handlers with per-thread resolvers");
    handlers
        .par_iter()
        .map_init(init, |resolver, handler| {
            EndpointAnalyzer::new(&*resolver, options).analyze_isolated(handler)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCode;
    use crate::model::{BindingSource, ResultType};
    use crate::source::SourceIndex;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"
        pub struct CreateOrder {
            pub sku: String,
            pub quantity: u32,
        }

        pub struct Order {
            pub id: i64,
            pub sku: String,
        }

        pub struct OrderService;

        impl OrderService {
            pub fn find(&self, id: i64) -> ApiResult<Order> {
                if id == 0 {
                    return Err(ApiError::not_found());
                }
                Ok(Order { id, sku: String::new() })
            }
        }

        #[get_mapping("/orders/{id}")]
        #[authorize]
        pub async fn get_order(id: i64, orders: Arc<OrderService>) -> ApiResult<Order> {
            orders.find(id)
        }

        #[post_mapping("/orders")]
        pub async fn create_order(order: CreateOrder) -> ApiResult<Created> {
            Ok(Created)
        }

        #[post_mapping("/orders/import")]
        pub async fn import(#[request_body] a: CreateOrder, #[request_body] b: CreateOrder) -> ApiResult<()> {
            Ok(())
        }

        #[get_mapping("/health")]
        pub fn health(#[request_body] a: CreateOrder, #[request_body] b: CreateOrder) -> String {
            String::from("ok")
        }
    "#;

    fn index() -> SourceIndex {
        SourceIndex::parse(SOURCE, Some("orders.rs")).unwrap()
    }

    fn analyze_all() -> Vec<HandlerAnalysis> {
        let handlers = index().handlers();
        analyze_all_with(&ContractOptions::default(), &handlers, index)
    }

    #[test]
    fn test_pipeline() {
        let results = analyze_all();
        let names: Vec<_> = results.iter().map(|r| r.handler.as_str()).collect();
        assert_eq!(names, vec!["get_order", "create_order", "import", "health"]);

        let get = results[0].contract.as_ref().unwrap();
        assert_eq!(get.status_codes(), vec![200, 400, 401, 403, 404, 500]);
        assert_eq!(get.parameters[0].source, BindingSource::Route);
        assert_eq!(get.parameters[1].source, BindingSource::Service);
        assert_eq!(get.success.id_property.as_deref(), Some("id"));

        let create = results[1].contract.as_ref().unwrap();
        assert_eq!(create.status_codes(), vec![201, 400, 415, 500]);
        assert_eq!(create.responses[0].result_type, ResultType::Created);

        assert!(results[2].contract.is_none());
        assert_eq!(results[2].diagnostics.len(), 1);
        assert_eq!(results[2].diagnostics[0].code, DiagnosticCode::MultipleBodySources);

        assert!(results[3].contract.is_none());
        assert!(results[3].diagnostics.is_empty());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let index = index();
        let handlers = index.handlers();
        let options = ContractOptions::default();

        let parallel: Vec<_> = analyze_all()
            .into_iter()
            .map(|r| r.contract)
            .collect();
        let sequential: Vec<_> = EndpointAnalyzer::new(&index, &options)
            .analyze_each(&handlers)
            .into_iter()
            .map(|r| r.contract)
            .collect();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_contract_serializes() {
        let results = analyze_all();
        let contract = results[0].contract.as_ref().unwrap();
        let json = serde_json::to_value(contract).unwrap();
        assert_eq!(json["route"], "/orders/{id}");
        assert_eq!(json["verb"], "Get");
    }
}
