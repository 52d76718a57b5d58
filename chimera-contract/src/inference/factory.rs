//! 错误工厂调用识别
//!
//! 仅做语法识别：路径倒数第二段是错误工厂类型（`ApiError::not_found()`、
//! `ApiError::NotFound`、`crate::error::ApiError::custom(423, "LOCKED")`）。

use syn::punctuated::Punctuated;
use syn::{Expr, Lit, Token};

use crate::model::{CustomErrorCode, ElementId, ErrorKind};
use crate::options::WellKnownTypes;
use crate::symbols::{ConstValue, SymbolResolver};

/// 自定义错误码的状态码无法确定为常量时使用
pub(crate) const FALLBACK_CUSTOM_STATUS: u16 = 500;

const CUSTOM_MEMBERS: &[&str] = &["custom", "Custom"];

/// 识别出的工厂成员
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FactoryMember {
    Known(ErrorKind),
    Custom,
    /// 错误工厂类型上的其他成员，保存完整路径文本
    Unknown(String),
}

pub(crate) fn match_factory(well_known: &WellKnownTypes, path: &syn::Path) -> Option<FactoryMember> {
    let count = path.segments.len();
    if count < 2 {
        return None;
    }
    let owner = &path.segments[count - 2];
    if !well_known.is_error_type(&owner.ident.to_string()) {
        return None;
    }
    let member = path.segments[count - 1].ident.to_string();

    if let Some(kind) = ErrorKind::from_member(&member) {
        return Some(FactoryMember::Known(kind));
    }
    if CUSTOM_MEMBERS.contains(&member.as_str()) {
        return Some(FactoryMember::Custom);
    }
    Some(FactoryMember::Unknown(format!("{}::{}", owner.ident, member)))
}

/// 提取 `custom(status, code, ..)` 的错误码；没有常量错误码时返回 `None`
pub(crate) fn custom_code<R: SymbolResolver + ?Sized>(
    resolver: &R,
    scope: &ElementId,
    args: &Punctuated<Expr, Token![,]>,
) -> Option<CustomErrorCode> {
    let code_expr = args.iter().nth(1)?;
    let code = match resolver.fold_constant(scope, code_expr) {
        Some(ConstValue::Str(code)) => code,
        _ => literal_str(code_expr)?,
    };

    let status = args
        .first()
        .and_then(|expr| match resolver.fold_constant(scope, expr) {
            Some(ConstValue::Int(value)) => u16::try_from(value).ok(),
            _ => literal_int(expr),
        })
        .unwrap_or(FALLBACK_CUSTOM_STATUS);

    Some(CustomErrorCode::new(code, status))
}

/// 字符串字面量，允许 `.to_string()` / `.into()` / `.to_owned()` / `String::from` 包装
fn literal_str(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Str(s) => Some(s.value()),
            _ => None,
        },
        Expr::MethodCall(call)
            if call.args.is_empty()
                && matches!(
                    call.method.to_string().as_str(),
                    "to_string" | "into" | "to_owned"
                ) =>
        {
            literal_str(&call.receiver)
        }
        Expr::Call(call) if call.args.len() == 1 => match &*call.func {
            Expr::Path(path) if is_string_from(&path.path) => call.args.first().and_then(literal_str),
            _ => None,
        },
        Expr::Paren(paren) => literal_str(&paren.expr),
        Expr::Reference(reference) => literal_str(&reference.expr),
        Expr::Group(group) => literal_str(&group.expr),
        _ => None,
    }
}

fn is_string_from(path: &syn::Path) -> bool {
    let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
    segments == ["String", "from"]
}

/// 整数字面量，允许 `423u16` 与 `423 as u16`
fn literal_int(expr: &Expr) -> Option<u16> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Int(i) => i.base10_parse().ok(),
            _ => None,
        },
        Expr::Cast(cast) => literal_int(&cast.expr),
        Expr::Paren(paren) => literal_int(&paren.expr),
        Expr::Group(group) => literal_int(&group.expr),
        _ => None,
    }
}
