//! 成功形状与错误结果推断
//!
//! - 成功形状：剥离一层异步包装，要求 `ApiResult<T>`，再识别标记类型、流和事件信封
//! - 错误结果：从处理器函数体开始做有界、防环的调用图遍历

mod factory;
mod success;
mod traversal;

use crate::diagnostics::DiagnosticSink;
use crate::model::{ErrorOutcomeSet, HandlerDescriptor, SuccessShape};
use crate::options::ContractOptions;
use crate::symbols::SymbolResolver;

use traversal::{ErrorScanner, TraversalContext};

pub struct ShapeInferencer<'a, R: SymbolResolver + ?Sized> {
    resolver: &'a R,
    options: &'a ContractOptions,
}

impl<'a, R: SymbolResolver + ?Sized> ShapeInferencer<'a, R> {
    pub fn new(resolver: &'a R, options: &'a ContractOptions) -> Self {
        Self { resolver, options }
    }

    /// 返回类型不是可失败结果时返回 `None`，由调用方决定如何报告
    pub fn infer_success(&self, handler: &HandlerDescriptor) -> Option<SuccessShape> {
        success::infer_success(
            self.resolver,
            &self.options.well_known,
            &handler.return_type,
            handler.is_async,
        )
    }

    /// 收集处理器可能产生的错误种类与自定义错误码
    pub fn collect_errors(
        &self,
        handler: &HandlerDescriptor,
        sink: &mut dyn DiagnosticSink,
    ) -> ErrorOutcomeSet {
        let mut cx = TraversalContext::new(handler.name.clone());
        if let Some(declared) = &handler.declared_errors {
            cx.endpoint_declares_errors = true;
            cx.outcomes.record_declared(declared);
        }

        ErrorScanner::new(
            self.resolver,
            &self.options.well_known,
            &mut cx,
            handler.id.clone(),
        )
        .scan_root();

        tracing::debug!(
            handler = %handler.name,
            visited = cx.visited.len(),
            "Call graph traversal finished"
        );
        for diagnostic in cx.diagnostics.drain(..) {
            sink.report(diagnostic);
        }
        cx.outcomes.finish()
    }

    pub fn infer(
        &self,
        handler: &HandlerDescriptor,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<(SuccessShape, ErrorOutcomeSet)> {
        let Some(success) = self.infer_success(handler) else {
            tracing::debug!(
                handler = %handler.name,
                return_type = %handler.return_type,
                "Not a fallible result, skipping"
            );
            return None;
        };
        let errors = self.collect_errors(handler, sink);
        Some((success, errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticCode, Diagnostics};
    use crate::model::{CustomErrorCode, ErrorKind, SuccessKind};
    use crate::source::SourceIndex;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"
        const LOCKED: &str = "USER_LOCKED";
        const LOCKED_STATUS: u16 = 423;

        pub trait UserStore {
            fn find(&self, id: i64) -> ApiResult<User>;
            fn audit(&self, id: i64) -> ApiResult<()>;
            #[produces_errors(conflict, custom(409, "DUPLICATE"))]
            fn save(&self, user: User) -> ApiResult<User>;
            fn count(&self) -> usize;
        }

        fn check_locked(user: &User) -> ApiResult<()> {
            if user.locked {
                return Err(ApiError::custom(LOCKED_STATUS, LOCKED));
            }
            Ok(())
        }

        fn load(store: &dyn UserStore, id: i64) -> ApiResult<User> {
            let user = store.find(id)?;
            let again = store.find(id)?;
            check_locked(&user)?;
            Ok(again)
        }

        #[get_mapping("/users/{id}")]
        pub async fn get_user(id: i64, store: Arc<dyn UserStore>) -> ApiResult<User> {
            if id < 0 {
                return Err(ApiError::validation("negative id"));
            }
            let _ = store.count();
            let user = load(store.as_ref(), id)?;
            check_locked(&user)?;
            Ok(user)
        }

        #[post_mapping("/users")]
        #[produces_errors(not_found)]
        pub async fn save_user(#[request_body] user: User, store: Arc<dyn UserStore>) -> ApiResult<Created> {
            store.audit(1)?;
            store.save(user)?;
            Ok(Created)
        }
    "#;

    fn run(name: &str) -> (Option<(SuccessShape, ErrorOutcomeSet)>, Diagnostics) {
        let index = SourceIndex::parse(SOURCE, Some("users.rs")).unwrap();
        let handler = index
            .handlers()
            .into_iter()
            .find(|h| h.name == name)
            .unwrap();
        let options = ContractOptions::default();
        let inferencer = ShapeInferencer::new(&index, &options);
        let mut diagnostics = Diagnostics::new();
        let result = inferencer.infer(&handler, &mut diagnostics);
        (result, diagnostics)
    }

    #[test]
    fn test_transitive_errors_and_single_boundary_warning() {
        let (result, diagnostics) = run("get_user");
        let (success, errors) = result.unwrap();

        assert_eq!(success.kind, SuccessKind::Payload);
        assert!(success.is_async);
        assert_eq!(errors.kinds, vec![ErrorKind::Validation]);
        assert_eq!(errors.custom_codes, vec![CustomErrorCode::new("USER_LOCKED", 423)]);
        assert_eq!(diagnostics.count(DiagnosticCode::UndocumentedInterfaceCall), 1);
        assert!(diagnostics
            .with_code(DiagnosticCode::UndocumentedInterfaceCall)
            .all(|d| d.message.contains("UserStore::find")));
    }

    #[test]
    fn test_declared_errors_suppress_boundary_warning() {
        let (result, diagnostics) = run("save_user");
        let (success, errors) = result.unwrap();

        assert_eq!(success.kind, SuccessKind::Created);
        assert_eq!(errors.kind_names(), vec!["Conflict", "NotFound"]);
        assert_eq!(errors.custom_codes, vec![CustomErrorCode::new("DUPLICATE", 409)]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let first = run("get_user").0;
        let second = run("get_user").0;
        assert_eq!(first, second);
    }
}
