//! 注解读取
//!
//! 与 chimera-web 宏识别同一套注解：`#[get_mapping("/path")]` 等路由映射、
//! 控制器上的 `#[request_mapping("/base")]`，以及参数与中间件注解。

use proc_macro2::TokenStream;
use syn::parse::{ParseStream, Parser};
use syn::{Attribute, LitInt, LitStr, Meta, Token};

use crate::model::{
    BindingAnnotation, CustomErrorCode, DeclaredErrors, ErrorKind, HttpVerb, MiddlewareFacts,
};

/// 路由映射注解对应的 HTTP 方法
pub(crate) fn mapping_verb(name: &str) -> Option<HttpVerb> {
    let verb = match name {
        "get_mapping" => HttpVerb::Get,
        "post_mapping" => HttpVerb::Post,
        "put_mapping" => HttpVerb::Put,
        "delete_mapping" => HttpVerb::Delete,
        "patch_mapping" => HttpVerb::Patch,
        "head_mapping" => HttpVerb::Head,
        "options_mapping" => HttpVerb::Options,
        "trace_mapping" => HttpVerb::Trace,
        _ => return None,
    };
    Some(verb)
}

/// 从方法属性中提取路由信息
pub(crate) fn extract_route_info(attrs: &[Attribute]) -> Option<(HttpVerb, String)> {
    attrs.iter().find_map(|attr| {
        let ident = attr.path().get_ident()?;
        let verb = mapping_verb(&ident.to_string())?;
        let path = extract_string_arg(attr).unwrap_or_else(|| "/".to_string());
        Some((verb, path))
    })
}

/// 控制器上的基础路径，缺省为空
pub(crate) fn extract_request_mapping(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .find(|attr| attr.path().is_ident("request_mapping"))
        .and_then(extract_string_arg)
        .unwrap_or_default()
}

/// `#[attr("value")]` 或 `#[attr(name = "value")]`
pub(crate) fn extract_string_arg(attr: &Attribute) -> Option<String> {
    let Meta::List(_) = &attr.meta else {
        return None;
    };
    if let Ok(lit) = attr.parse_args::<LitStr>() {
        return Some(lit.value());
    }

    let mut value = None;
    let _ = attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("name") || meta.path.is_ident("path") || meta.path.is_ident("value") {
            let lit: LitStr = meta.value()?.parse()?;
            value = Some(lit.value());
        }
        Ok(())
    });
    value
}

pub(crate) fn join_route(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return if path.is_empty() { "/".to_string() } else { path.to_string() };
    }
    if path.is_empty() || path == "/" {
        return base.to_string();
    }
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// 路由模板中的变量名，支持 `{name}`、`{name:int}`、`{*rest}`、`{name?}` 和 `:name`
pub(crate) fn route_variables(route: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim_start_matches('*').trim_end_matches('?');
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    for segment in route.split('/') {
        if let Some(name) = segment.strip_prefix(':') {
            push(name);
            continue;
        }
        let mut rest = segment;
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            let inner = &rest[start + 1..start + len];
            push(inner.split([':', '=']).next().unwrap_or_default());
            rest = &rest[start + len + 1..];
        }
    }
    names
}

/// 中间件注解事实
pub(crate) fn middleware_facts(attrs: &[Attribute]) -> MiddlewareFacts {
    let mut facts = MiddlewareFacts::default();
    for attr in attrs {
        let Some(ident) = attr.path().get_ident() else {
            continue;
        };
        match ident.to_string().as_str() {
            "authorize" | "pre_authorize" => facts.requires_authorization = true,
            "allow_anonymous" => facts.allow_anonymous = true,
            "rate_limit" => facts.rate_limited = true,
            "disable_rate_limit" => facts.rate_limit_disabled = true,
            "output_cache" => facts.output_cached = true,
            _ => {}
        }
    }
    facts
}

/// 控制器级事实与方法级事实合并
pub(crate) fn merge_middleware(outer: MiddlewareFacts, inner: MiddlewareFacts) -> MiddlewareFacts {
    MiddlewareFacts {
        requires_authorization: outer.requires_authorization || inner.requires_authorization,
        allow_anonymous: outer.allow_anonymous || inner.allow_anonymous,
        rate_limited: outer.rate_limited || inner.rate_limited,
        rate_limit_disabled: outer.rate_limit_disabled || inner.rate_limit_disabled,
        output_cached: outer.output_cached || inner.output_cached,
    }
}

/// `#[produces_errors(not_found, conflict, custom(423, "USER_LOCKED"))]`
///
/// 格式错误的部分被忽略，其余部分仍然有效，处理器依旧视为已声明
pub(crate) fn declared_errors(attrs: &[Attribute]) -> Option<DeclaredErrors> {
    let attr = attrs.iter().find(|a| a.path().is_ident("produces_errors"))?;
    let mut declared = DeclaredErrors::default();

    let parsed = attr.parse_nested_meta(|meta| {
        let Some(ident) = meta.path.get_ident() else {
            return Ok(());
        };
        let member = ident.to_string();
        if member == "custom" {
            let content;
            syn::parenthesized!(content in meta.input);
            let args: TokenStream = content.parse()?;
            match custom_code.parse2(args) {
                Ok(code) => declared.custom.push(code),
                Err(err) => tracing::debug!("Ignoring malformed custom error code: {}", err),
            }
        } else if let Some(kind) = ErrorKind::from_member(&member) {
            if !declared.kinds.contains(&kind) {
                declared.kinds.push(kind);
            }
        }
        Ok(())
    });

    if let Err(err) = parsed {
        tracing::debug!("Ignoring malformed #[produces_errors] arguments: {}", err);
    }
    Some(declared)
}

/// `custom(423, "USER_LOCKED")` 的括号内部
fn custom_code(input: ParseStream<'_>) -> syn::Result<CustomErrorCode> {
    let status: LitInt = input.parse()?;
    input.parse::<Token![,]>()?;
    let code: LitStr = input.parse()?;
    Ok(CustomErrorCode::new(code.value(), status.base10_parse()?))
}

/// 参数上的第一个绑定注解
pub(crate) fn binding_annotation(attrs: &[Attribute]) -> Option<BindingAnnotation> {
    attrs.iter().find_map(|attr| {
        let ident = attr.path().get_ident()?.to_string();
        let annotation = match ident.as_str() {
            "as_parameters" => BindingAnnotation::AsParameters,
            "request_body" => BindingAnnotation::Body {
                allow_empty: has_flag(attr, "allow_empty"),
            },
            "form" => BindingAnnotation::Form {
                name: extract_string_arg(attr),
            },
            "autowired" => BindingAnnotation::Service,
            "keyed_service" => BindingAnnotation::KeyedService {
                key: verbatim_args(attr)?,
            },
            "request_header" => BindingAnnotation::Header {
                name: extract_string_arg(attr),
            },
            "path_variable" | "path_param" => BindingAnnotation::Route {
                name: extract_string_arg(attr),
            },
            "request_param" | "query_param" => BindingAnnotation::Query {
                name: extract_string_arg(attr),
            },
            _ => return None,
        };
        Some(annotation)
    })
}

pub(crate) fn has_flag(attr: &Attribute, flag: &str) -> bool {
    match &attr.meta {
        Meta::List(list) => list
            .tokens
            .clone()
            .into_iter()
            .any(|token| matches!(token, proc_macro2::TokenTree::Ident(ident) if ident == flag)),
        _ => false,
    }
}

/// 注解实参的原始文本，字符串字面量保留引号
fn verbatim_args(attr: &Attribute) -> Option<String> {
    match &attr.meta {
        Meta::List(list) if !list.tokens.is_empty() => Some(list.tokens.to_string()),
        _ => None,
    }
}
