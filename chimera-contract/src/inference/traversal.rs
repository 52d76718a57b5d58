//! 错误结果的调用图遍历
//!
//! 从处理器函数体开始深度优先扫描。每个已声明元素最多扫描一次（visited-set 以
//! `ElementId` 为键），递归和互相递归的辅助函数因此总能终止。错误工厂调用的实参不会
//! 继续扫描。

use proc_macro2::{Span, TokenStream};
use std::collections::HashSet;
use syn::parse::ParseStream;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{Expr, Token};

use super::factory::{self, FactoryMember};
use crate::diagnostics::Diagnostic;
use crate::model::{ElementId, OutcomeCollector};
use crate::options::WellKnownTypes;
use crate::symbols::{Body, CallSite, CallTarget, SymbolResolver};

/// 单次推断独占的遍历状态
#[derive(Debug)]
pub(crate) struct TraversalContext {
    pub handler: String,
    pub visited: HashSet<ElementId>,
    pub outcomes: OutcomeCollector,
    /// 处理器自身带有 `#[produces_errors]`
    pub endpoint_declares_errors: bool,
    /// 已报告过的信息丢失边界
    pub reported_boundaries: HashSet<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TraversalContext {
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            visited: HashSet::new(),
            outcomes: OutcomeCollector::new(),
            endpoint_declares_errors: false,
            reported_boundaries: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }
}

pub(crate) struct ErrorScanner<'r, 'c, R: SymbolResolver + ?Sized> {
    resolver: &'r R,
    well_known: &'r WellKnownTypes,
    cx: &'c mut TraversalContext,
    scope: ElementId,
}

impl<'r, 'c, R: SymbolResolver + ?Sized> ErrorScanner<'r, 'c, R> {
    pub fn new(
        resolver: &'r R,
        well_known: &'r WellKnownTypes,
        cx: &'c mut TraversalContext,
        scope: ElementId,
    ) -> Self {
        Self {
            resolver,
            well_known,
            cx,
            scope,
        }
    }

    /// 扫描 `scope` 自身的函数体
    pub fn scan_root(&mut self) {
        self.cx.visited.insert(self.scope.clone());
        if let Some(body) = self.resolver.body(&self.scope) {
            self.scan_body(body);
        }
    }

    fn scan_body(&mut self, body: Body<'r>) {
        match body {
            Body::Block(block) => self.visit_block(block),
            Body::Expr(expr) => self.visit_expr(expr),
        }
    }

    /// 递归扫描一个已声明元素，已访问过的直接跳过
    fn descend(&mut self, element: ElementId) {
        if !self.cx.visited.insert(element.clone()) {
            tracing::trace!(handler = %self.cx.handler, %element, "Already visited");
            return;
        }
        let Some(body) = self.resolver.body(&element) else {
            return;
        };
        tracing::trace!(handler = %self.cx.handler, %element, "Scanning");

        let mut nested = ErrorScanner::new(self.resolver, self.well_known, &mut *self.cx, element);
        nested.scan_body(body);
    }

    fn record_factory(
        &mut self,
        member: FactoryMember,
        args: Option<&Punctuated<Expr, Token![,]>>,
        span: Span,
    ) {
        match member {
            FactoryMember::Known(kind) => {
                if self.cx.outcomes.record_kind(kind) {
                    tracing::trace!(handler = %self.cx.handler, %kind, "Error kind recorded");
                }
            }
            FactoryMember::Custom => {
                let code = args.and_then(|args| factory::custom_code(self.resolver, &self.scope, args));
                match code {
                    Some(code) => {
                        self.cx.outcomes.record_custom(code);
                    }
                    None => {
                        tracing::trace!(handler = %self.cx.handler, "Custom error without constant code");
                    }
                }
            }
            FactoryMember::Unknown(call) => {
                let location = self.resolver.locate(span);
                self.cx
                    .diagnostics
                    .push(Diagnostic::unknown_error_factory(&call, location));
            }
        }
    }

    fn follow(&mut self, target: CallTarget, span: Span) {
        if target.is_boundary() {
            let fallible = target
                .returns
                .as_ref()
                .is_some_and(|ty| self.well_known.fallible_payload(ty).is_some());
            if !fallible {
                return;
            }
            if let Some(declared) = &target.declared_errors {
                self.cx.outcomes.record_declared(declared);
                return;
            }
            let name = target.display_name();
            if !self.cx.endpoint_declares_errors && self.cx.reported_boundaries.insert(name.clone()) {
                let location = self.resolver.locate(span);
                let diagnostic =
                    Diagnostic::undocumented_interface_call(&self.cx.handler, &name, location);
                self.cx.diagnostics.push(diagnostic);
            }
            return;
        }

        if let Some(element) = target.element {
            self.descend(element);
        }
    }
}

impl<'ast, 'r, 'c, R: SymbolResolver + ?Sized> Visit<'ast> for ErrorScanner<'r, 'c, R> {
    fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
        if let Expr::Path(func) = &*call.func {
            if let Some(member) = factory::match_factory(self.well_known, &func.path) {
                self.record_factory(member, Some(&call.args), call.span());
                return;
            }
        }

        if let Some(target) = self.resolver.resolve_call(&self.scope, CallSite::Call(call)) {
            self.follow(target, call.span());
        }

        // 被调用的路径已经解析过
        if !matches!(&*call.func, Expr::Path(_)) {
            self.visit_expr(&call.func);
        }
        for arg in &call.args {
            self.visit_expr(arg);
        }
    }

    fn visit_expr_method_call(&mut self, call: &'ast syn::ExprMethodCall) {
        if let Some(target) = self.resolver.resolve_call(&self.scope, CallSite::Method(call)) {
            self.follow(target, call.method.span());
        }
        visit::visit_expr_method_call(self, call);
    }

    fn visit_expr_path(&mut self, path: &'ast syn::ExprPath) {
        // `ApiError::NotFound` 或作为值传递的 `ApiError::not_found`
        if let Some(member) = factory::match_factory(self.well_known, &path.path) {
            if let FactoryMember::Known(_) = member {
                self.record_factory(member, None, path.span());
            }
            return;
        }
        if let Some(element) = self.resolver.resolve_reference(&self.scope, path) {
            self.descend(element);
        }
    }

    fn visit_macro(&mut self, mac: &'ast syn::Macro) {
        // `matches!(value, Pattern)` 只扫描被匹配的值
        if is_pattern_macro(&mac.path) {
            let scrutinee = mac.parse_body_with(|input: ParseStream<'_>| {
                let value: Expr = input.parse()?;
                input.parse::<TokenStream>()?;
                Ok(value)
            });
            if let Ok(value) = scrutinee {
                self.visit_expr(&value);
            }
            return;
        }

        // 类表达式宏（`vec!`、`format!`、`ensure!` 等）的实参按表达式列表扫描
        if let Ok(args) = mac.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
            for arg in &args {
                self.visit_expr(arg);
            }
        }
    }

    // 模式只检查错误值，不产生错误
    fn visit_pat(&mut self, _pat: &'ast syn::Pat) {}

    // 嵌套的函数项不会随外层执行
    fn visit_item(&mut self, _item: &'ast syn::Item) {}
}

fn is_pattern_macro(path: &syn::Path) -> bool {
    path.segments
        .last()
        .is_some_and(|s| s.ident == "matches" || s.ident == "assert_matches")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceIndex;

    fn scan(src: &str, handler: &str) -> TraversalContext {
        let index = SourceIndex::parse(src, Some("handlers.rs")).unwrap();
        let well_known = WellKnownTypes::default();
        let mut cx = TraversalContext::new(handler);
        ErrorScanner::new(&index, &well_known, &mut cx, ElementId::function(handler)).scan_root();
        cx
    }

    #[test]
    fn test_direct_recursion_terminates() {
        let cx = scan(
            r#"
            fn walk(depth: u32) -> u32 {
                if depth == 0 { 0 } else { walk(depth - 1) }
            }
            fn handler() -> ApiResult<u32> {
                Ok(walk(3))
            }
            "#,
            "handler",
        );
        assert!(cx.outcomes.finish().is_empty());
        assert!(cx.visited.contains(&ElementId::function("walk")));
    }

    #[test]
    fn test_mutual_recursion_collects_once() {
        let cx = scan(
            r#"
            fn ping(n: u32) -> ApiResult<()> {
                if n == 0 { return Err(ApiError::not_found()); }
                pong(n - 1)
            }
            fn pong(n: u32) -> ApiResult<()> {
                if n == 1 { return Err(ApiError::not_found()); }
                ping(n - 1)
            }
            fn handler() -> ApiResult<()> {
                ping(4)?;
                pong(4)
            }
            "#,
            "handler",
        );
        assert_eq!(cx.outcomes.finish().kind_names(), vec!["NotFound"]);
    }

    #[test]
    fn test_factory_arguments_are_not_scanned() {
        let cx = scan(
            r#"
            fn describe() -> String {
                let _ = ApiError::conflict();
                String::from("nope")
            }
            fn handler() -> ApiResult<()> {
                Err(ApiError::validation(describe()))
            }
            "#,
            "handler",
        );
        assert_eq!(cx.outcomes.finish().kind_names(), vec!["Validation"]);
    }

    #[test]
    fn test_unknown_factory_is_reported() {
        let cx = scan(
            r#"
            fn handler() -> ApiResult<()> {
                Err(ApiError::teapot())
            }
            "#,
            "handler",
        );
        assert_eq!(cx.diagnostics.len(), 1);
        assert!(cx.diagnostics[0].message.contains("ApiError::teapot"));
    }

    #[test]
    fn test_builder_methods_on_factory_are_not_unknown() {
        let cx = scan(
            r#"
            fn handler() -> ApiResult<()> {
                Err(ApiError::forbidden().with_message("no"))
            }
            "#,
            "handler",
        );
        assert!(cx.diagnostics.is_empty());
        assert_eq!(cx.outcomes.finish().kind_names(), vec!["Forbidden"]);
    }

    #[test]
    fn test_macro_arguments_are_scanned() {
        let cx = scan(
            r#"
            fn handler(ok: bool) -> ApiResult<()> {
                ensure!(ok, ApiError::Unexpected);
                Ok(())
            }
            "#,
            "handler",
        );
        assert_eq!(cx.outcomes.finish().kind_names(), vec!["Unexpected"]);
    }

    #[test]
    fn test_inspected_errors_are_not_produced() {
        let cx = scan(
            r#"
            fn status_of(e: &ApiError) -> u16 {
                match e {
                    ApiError::NotFound => 404,
                    _ => 500,
                }
            }
            fn handler(e: ApiError) -> ApiResult<bool> {
                if let ApiError::Forbidden = e {
                    return Ok(false);
                }
                let _ = status_of(&e);
                Ok(matches!(e, ApiError::Conflict))
            }
            "#,
            "handler",
        );
        assert!(cx.visited.contains(&ElementId::function("status_of")));
        assert!(cx.outcomes.finish().is_empty());
        assert!(cx.diagnostics.is_empty());
    }
}
