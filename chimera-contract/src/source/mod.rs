//! 基于 `syn` 的符号解析器
//!
//! `SourceIndex` 解析一组 Rust 源文件，索引其中的函数、方法、类型、常量和 trait 实现，
//! 并从 chimera 风格的路由注解中提取 `HandlerDescriptor`。
//!
//! ```ignore
//! let index = SourceIndex::parse(source, Some("src/users.rs"))?;
//! let options = ContractOptions::default();
//! let analyzer = EndpointAnalyzer::new(&index, &options);
//! for handler in index.handlers() {
//!     let contract = analyzer.analyze(&handler, &mut diagnostics);
//! }
//! ```
//!
//! 语法树不能跨线程共享，需要并行时每个线程各建一份索引。

mod attrs;
mod lower;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use proc_macro2::Span;
use quote::ToTokens;
use syn::spanned::Spanned;
use syn::{Attribute, Expr, Fields, FnArg, ImplItem, Item, Lit, Pat, TraitItem, UnOp, Visibility};

use crate::diagnostics::Location;
use crate::error::{ContractError, ContractResult};
use crate::model::{
    BindingAnnotation, ConstructorInfo, CustomBinding, ElementId, HandlerDescriptor, HttpVerb,
    MiddlewareFacts, ParameterDescriptor, PropertyInfo, SpecialRole, TypeInfo, TypeKind, TypeRef,
};
use crate::options::WellKnownTypes;
use crate::symbols::{Body, CallSite, CallTarget, ConstValue, SymbolResolver, TargetKind};

use lower::{ParamShape, TypeLowering};

/// 按类型名识别的特殊参数
const SPECIAL_TYPES: &[(&str, SpecialRole)] = &[
    ("RequestContext", SpecialRole::Context),
    ("RequestHeaders", SpecialRole::Context),
    ("Cookies", SpecialRole::Context),
    ("Session", SpecialRole::Context),
    ("CancellationToken", SpecialRole::Cancellation),
    ("UploadedFile", SpecialRole::FormFile),
    ("MultipartFile", SpecialRole::FormFile),
    ("UploadedFiles", SpecialRole::FormFileCollection),
    ("Multipart", SpecialRole::FormCollection),
    ("BodyStream", SpecialRole::Stream),
    ("PipeReader", SpecialRole::PipeReader),
];

/// 求接收者类型时可以穿透的方法
const TRANSPARENT_METHODS: &[&str] = &[
    "clone", "as_ref", "as_deref", "borrow", "deref", "lock", "read", "write", "unwrap",
];

/// 一个待解析的源文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn read(path: impl AsRef<Path>) -> ContractResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ContractError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(path.display().to_string(), content))
    }
}

struct FnEntry {
    id: ElementId,
    name: String,
    owner: Option<String>,
    /// 声明所在的模块路径，crate 根为空
    module: Vec<String>,
    kind: TargetKind,
    sig: syn::Signature,
    attrs: Vec<Attribute>,
    body: Option<syn::Block>,
    file: Option<String>,
    mapping: Option<(HttpVerb, String)>,
    /// impl 块上的中间件注解
    impl_middleware: MiddlewareFacts,
}

enum TypeItem {
    Struct(syn::ItemStruct),
    Enum,
    Trait,
}

struct TypeEntry {
    item: TypeItem,
    file: Option<String>,
}

/// `pub fn new(..) -> Self` 形式的关联构造函数
struct CtorEntry {
    sig: syn::Signature,
    public: bool,
    file: Option<String>,
}

struct ConstEntry {
    owner: Option<String>,
    module: Vec<String>,
    expr: Expr,
}

#[derive(Debug, Clone, Default)]
struct ControllerInfo {
    base_path: String,
    middleware: MiddlewareFacts,
}

#[derive(Default)]
pub struct SourceIndex {
    well_known: WellKnownTypes,
    files: Vec<String>,
    functions: HashMap<ElementId, FnEntry>,
    types: HashMap<String, TypeEntry>,
    constructors: HashMap<String, Vec<CtorEntry>>,
    constants: HashMap<ElementId, ConstEntry>,
    /// 类型名 -> 它实现（或派生）的 trait
    impls: HashMap<String, Vec<String>>,
    controllers: HashMap<String, ControllerInfo>,
    handler_order: Vec<ElementId>,
}

impl std::fmt::Debug for SourceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceIndex")
            .field("files", &self.files)
            .field("functions", &self.functions.len())
            .field("types", &self.types.len())
            .field("handlers", &self.handler_order.len())
            .finish()
    }
}

impl SourceIndex {
    pub fn new(well_known: WellKnownTypes) -> Self {
        Self {
            well_known,
            ..Self::default()
        }
    }

    /// 解析单个源文件
    pub fn parse(source: &str, file: Option<&str>) -> ContractResult<Self> {
        let mut index = Self::default();
        index.add_source(source, file)?;
        Ok(index)
    }

    pub fn from_files(files: &[SourceFile], well_known: &WellKnownTypes) -> ContractResult<Self> {
        let mut index = Self::new(well_known.clone());
        for file in files {
            index.add_source(&file.content, Some(&file.name))?;
        }
        Ok(index)
    }

    /// 从磁盘读取并解析
    pub fn load<P: AsRef<Path>>(paths: &[P], well_known: &WellKnownTypes) -> ContractResult<Self> {
        let files = paths
            .iter()
            .map(SourceFile::read)
            .collect::<ContractResult<Vec<_>>>()?;
        Self::from_files(&files, well_known)
    }

    pub fn add_source(&mut self, source: &str, file: Option<&str>) -> ContractResult<()> {
        let parsed = syn::parse_file(source).map_err(|source| ContractError::Parse {
            file: file.map(String::from),
            source,
        })?;

        let before = self.functions.len();
        let file = file.map(String::from);
        if let Some(name) = &file {
            self.files.push(name.clone());
        }
        self.index_items(parsed.items, &file, &[]);

        tracing::debug!(
            file = file.as_deref().unwrap_or("<source>"),
            functions = self.functions.len() - before,
            handlers = self.handler_order.len(),
            "Indexed source"
        );
        Ok(())
    }

    fn lowering(&self) -> TypeLowering<'_> {
        TypeLowering::new(&self.well_known)
    }

    // ========== 索引 ==========

    fn index_items(&mut self, items: Vec<Item>, file: &Option<String>, module: &[String]) {
        for item in items {
            match item {
                Item::Fn(f) => {
                    let name = f.sig.ident.to_string();
                    let entry = FnEntry {
                        id: ElementId::function(&qualify(module, &name)),
                        name,
                        owner: None,
                        module: module.to_vec(),
                        kind: TargetKind::Function,
                        mapping: attrs::extract_route_info(&f.attrs),
                        sig: f.sig,
                        attrs: f.attrs,
                        body: Some(*f.block),
                        file: file.clone(),
                        impl_middleware: MiddlewareFacts::default(),
                    };
                    self.insert_function(entry);
                }
                Item::Struct(s) => {
                    let name = s.ident.to_string();
                    self.index_derives(&name, &s.attrs);
                    let is_controller = s.attrs.iter().any(|a| a.path().is_ident("request_mapping"))
                        || self.impls.get(&name).is_some_and(|t| t.iter().any(|t| t == "Controller"));
                    if is_controller {
                        self.controllers.insert(
                            name.clone(),
                            ControllerInfo {
                                base_path: attrs::extract_request_mapping(&s.attrs),
                                middleware: attrs::middleware_facts(&s.attrs),
                            },
                        );
                    }
                    self.types.entry(name).or_insert(TypeEntry {
                        item: TypeItem::Struct(s),
                        file: file.clone(),
                    });
                }
                Item::Enum(e) => {
                    let name = e.ident.to_string();
                    self.index_derives(&name, &e.attrs);
                    self.types.entry(name).or_insert(TypeEntry {
                        item: TypeItem::Enum,
                        file: file.clone(),
                    });
                }
                Item::Trait(t) => self.index_trait(t, file, module),
                Item::Impl(imp) => self.index_impl(imp, file, module),
                Item::Const(c) => {
                    self.constants.insert(
                        ElementId::value(&qualify(module, &c.ident.to_string())),
                        ConstEntry {
                            owner: None,
                            module: module.to_vec(),
                            expr: *c.expr,
                        },
                    );
                }
                Item::Static(s) => {
                    self.constants.insert(
                        ElementId::value(&qualify(module, &s.ident.to_string())),
                        ConstEntry {
                            owner: None,
                            module: module.to_vec(),
                            expr: *s.expr,
                        },
                    );
                }
                Item::Mod(m) => {
                    if let Some((_, items)) = m.content {
                        let mut nested = module.to_vec();
                        nested.push(m.ident.to_string());
                        self.index_items(items, file, &nested);
                    }
                }
                _ => {}
            }
        }
    }

    fn insert_function(&mut self, entry: FnEntry) {
        if self.functions.contains_key(&entry.id) {
            tracing::trace!(id = %entry.id, "Duplicate declaration ignored");
            return;
        }
        if entry.mapping.is_some() {
            self.handler_order.push(entry.id.clone());
        }
        self.functions.insert(entry.id.clone(), entry);
    }

    fn index_derives(&mut self, name: &str, item_attrs: &[Attribute]) {
        for attr in item_attrs.iter().filter(|a| a.path().is_ident("derive")) {
            let mut derived = Vec::new();
            let _ = attr.parse_nested_meta(|meta| {
                if let Some(ident) = meta.path.segments.last() {
                    derived.push(ident.ident.to_string());
                }
                Ok(())
            });
            self.impls.entry(name.to_string()).or_default().extend(derived);
        }
    }

    fn index_trait(&mut self, t: syn::ItemTrait, file: &Option<String>, module: &[String]) {
        let owner = t.ident.to_string();
        for item in t.items {
            match item {
                TraitItem::Fn(method) => {
                    let name = method.sig.ident.to_string();
                    let kind = if method.default.is_some() {
                        TargetKind::Method
                    } else {
                        TargetKind::Interface
                    };
                    self.insert_function(FnEntry {
                        id: ElementId::method(&owner, &name),
                        name,
                        owner: Some(owner.clone()),
                        module: module.to_vec(),
                        kind,
                        sig: method.sig,
                        attrs: method.attrs,
                        body: method.default,
                        file: file.clone(),
                        mapping: None,
                        impl_middleware: MiddlewareFacts::default(),
                    });
                }
                TraitItem::Const(c) => {
                    if let Some((_, expr)) = c.default {
                        self.constants.insert(
                            ElementId::value(&format!("{}::{}", owner, c.ident)),
                            ConstEntry {
                                owner: Some(owner.clone()),
                                module: module.to_vec(),
                                expr,
                            },
                        );
                    }
                }
                _ => {}
            }
        }
        self.types.entry(owner).or_insert(TypeEntry {
            item: TypeItem::Trait,
            file: file.clone(),
        });
    }

    fn index_impl(&mut self, imp: syn::ItemImpl, file: &Option<String>, module: &[String]) {
        let owner = self.lowering().lower(&imp.self_ty).name().to_string();
        if let Some((_, path, _)) = &imp.trait_ {
            if let Some(last) = path.segments.last() {
                self.impls
                    .entry(owner.clone())
                    .or_default()
                    .push(last.ident.to_string());
            }
        }
        let inherent = imp.trait_.is_none();
        let impl_middleware = attrs::middleware_facts(&imp.attrs);

        for item in imp.items {
            match item {
                ImplItem::Fn(method) => {
                    let name = method.sig.ident.to_string();
                    if inherent && self.is_constructor(&method.sig, &owner) {
                        self.constructors.entry(owner.clone()).or_default().push(CtorEntry {
                            sig: method.sig.clone(),
                            public: matches!(method.vis, Visibility::Public(_)),
                            file: file.clone(),
                        });
                    }
                    self.insert_function(FnEntry {
                        id: ElementId::method(&owner, &name),
                        name,
                        owner: Some(owner.clone()),
                        module: module.to_vec(),
                        kind: TargetKind::Method,
                        mapping: attrs::extract_route_info(&method.attrs),
                        sig: method.sig,
                        attrs: method.attrs,
                        body: Some(method.block),
                        file: file.clone(),
                        impl_middleware,
                    });
                }
                ImplItem::Const(c) => {
                    self.constants.insert(
                        ElementId::value(&format!("{}::{}", owner, c.ident)),
                        ConstEntry {
                            owner: Some(owner.clone()),
                            module: module.to_vec(),
                            expr: c.expr,
                        },
                    );
                }
                _ => {}
            }
        }
    }

    fn is_constructor(&self, sig: &syn::Signature, owner: &str) -> bool {
        let has_receiver = sig.inputs.iter().any(|arg| matches!(arg, FnArg::Receiver(_)));
        let output = self.lowering().lower_return(&sig.output);
        !has_receiver && (output.is("Self") || output.is(owner))
    }

    // ========== 处理器 ==========

    /// 带路由映射注解的处理器，按声明顺序排列
    pub fn handlers(&self) -> Vec<HandlerDescriptor> {
        self.handler_order
            .iter()
            .filter_map(|id| self.functions.get(id))
            .filter_map(|entry| self.describe_handler(entry))
            .collect()
    }

    fn describe_handler(&self, entry: &FnEntry) -> Option<HandlerDescriptor> {
        let (verb, path) = entry.mapping.clone()?;
        let controller = entry
            .owner
            .as_ref()
            .and_then(|owner| self.controllers.get(owner))
            .cloned()
            .unwrap_or_default();
        let route = attrs::join_route(&controller.base_path, &path);
        let file = entry.file.as_deref();

        let mut handler = HandlerDescriptor::new(
            entry.name.clone(),
            verb,
            self.lowering().lower_return(&entry.sig.output),
        );
        handler.id = entry.id.clone();
        handler.route_variables = attrs::route_variables(&route);
        handler.route = route;
        handler.is_async = entry.sig.asyncness.is_some();
        handler.middleware = attrs::merge_middleware(
            attrs::merge_middleware(controller.middleware, entry.impl_middleware),
            attrs::middleware_facts(&entry.attrs),
        );
        handler.declared_errors = attrs::declared_errors(&entry.attrs);
        handler.location = Location::from_span(file, entry.sig.ident.span());
        handler.parameters = entry
            .sig
            .inputs
            .iter()
            .filter_map(|arg| match arg {
                FnArg::Typed(typed) => Some(self.describe_param(
                    pattern_name(&typed.pat),
                    &typed.attrs,
                    &typed.ty,
                    typed.pat.span(),
                    file,
                )),
                FnArg::Receiver(_) => None,
            })
            .collect();

        tracing::trace!(
            handler = %handler.name,
            verb = %handler.verb,
            route = %handler.route,
            "Handler extracted"
        );
        Some(handler)
    }

    fn describe_param(
        &self,
        name: String,
        param_attrs: &[Attribute],
        ty: &syn::Type,
        span: Span,
        file: Option<&str>,
    ) -> ParameterDescriptor {
        let mut lowered = self.lowering().lower(ty);
        let mut annotation = attrs::binding_annotation(param_attrs);

        if lowered.args.len() == 1 {
            let inner = lowered.args[0].clone();
            if let Some(implied) = self.extractor_annotation(lowered.name(), &inner) {
                annotation = annotation.or(implied);
                lowered = inner;
            }
        }

        let shape = ParamShape::of(lowered);
        let mut descriptor = ParameterDescriptor::new(name, shape.ty).at(Location::from_span(file, span));
        descriptor.nullable = shape.nullable;
        descriptor.element = shape.element;
        descriptor.annotation = annotation;
        descriptor.special = special_role(&descriptor.ty, descriptor.element.as_ref());
        if !descriptor.is_collection() {
            descriptor.custom_binding = self.custom_binding(&descriptor.ty);
        }
        descriptor
    }

    /// chimera / axum 提取器包装隐含的注解，显式注解优先
    ///
    /// `Some(None)` 表示只剥离包装：查询包装里的基本类型集合交给隐式查询规则
    fn extractor_annotation(&self, wrapper: &str, inner: &TypeRef) -> Option<Option<BindingAnnotation>> {
        let annotation = match wrapper {
            "PathVariable" | "Path" => BindingAnnotation::Route { name: None },
            "RequestBody" | "ValidatedRequestBody" | "Json" => BindingAnnotation::Body { allow_empty: false },
            "RequestParam" | "ValidatedRequestParam" | "Query" => {
                let shape = ParamShape::of(inner.clone());
                let scalar = |ty: &TypeRef| self.well_known.is_primitive(ty) || self.is_enum(ty);
                if shape.element.as_ref().is_some_and(scalar) {
                    return Some(None);
                }
                if scalar(&shape.ty) {
                    BindingAnnotation::Query { name: None }
                } else {
                    BindingAnnotation::AsParameters
                }
            }
            "FormData" | "ValidatedFormData" | "MultipartForm" | "Form" => {
                BindingAnnotation::Form { name: None }
            }
            "RequestHeader" => BindingAnnotation::Header { name: None },
            "Extension" | "State" => BindingAnnotation::Service,
            _ => return None,
        };
        Some(Some(annotation))
    }

    fn is_enum(&self, ty: &TypeRef) -> bool {
        self.types
            .get(ty.name())
            .is_some_and(|entry| matches!(entry.item, TypeItem::Enum))
    }

    fn custom_binding(&self, ty: &TypeRef) -> Option<CustomBinding> {
        let traits = self.impls.get(ty.name())?;
        let has = |name: &str| traits.iter().any(|t| t == name);
        if has("BindFromRequest") {
            Some(CustomBinding::BindAsync)
        } else if has("Bindable") {
            Some(CustomBinding::Bindable)
        } else if has("FromStr") {
            Some(CustomBinding::TryParse)
        } else {
            None
        }
    }

    // ========== 类型元数据 ==========

    fn build_type_info(&self, name: &str, seen: &mut HashSet<String>) -> Option<TypeInfo> {
        let entry = self.types.get(name)?;
        let ty = TypeRef::named(name);
        let file = entry.file.as_deref();
        seen.insert(name.to_string());

        let item = match &entry.item {
            TypeItem::Enum => return Some(TypeInfo::new(ty, TypeKind::Enum)),
            TypeItem::Trait => return Some(TypeInfo::new(ty, TypeKind::Interface)),
            TypeItem::Struct(item) => item,
        };

        let mut info = TypeInfo::new(ty, TypeKind::Struct);
        let mut params = Vec::new();
        let mut flattened = Vec::new();
        for (i, field) in item.fields.iter().enumerate() {
            let field_name = field
                .ident
                .as_ref()
                .map(|ident| ident.to_string())
                .unwrap_or_else(|| i.to_string());
            let public = matches!(field.vis, Visibility::Public(_));
            params.push(self.describe_param(
                field_name.clone(),
                &field.attrs,
                &field.ty,
                field.span(),
                file,
            ));

            let field_ty = self.lowering().lower(&field.ty);
            if is_serde_flatten(&field.attrs) && !seen.contains(field_ty.name()) {
                if let Some(inner) = self.build_type_info(field_ty.name(), seen) {
                    flattened.extend(inner.properties.into_iter().map(|mut p| {
                        p.inherited = true;
                        p
                    }));
                }
                continue;
            }
            info.properties.push(PropertyInfo {
                name: field_name,
                ty: field_ty,
                readable: true,
                public,
                inherited: false,
            });
        }
        info.properties.extend(flattened);

        let all_public = item
            .fields
            .iter()
            .all(|f| matches!(f.vis, Visibility::Public(_)));
        info.constructors.push(ConstructorInfo {
            params,
            public: all_public || matches!(item.fields, Fields::Unit),
        });

        for ctor in self.constructors.get(name).into_iter().flatten() {
            let params = ctor
                .sig
                .inputs
                .iter()
                .filter_map(|arg| match arg {
                    FnArg::Typed(typed) => Some(self.describe_param(
                        pattern_name(&typed.pat),
                        &typed.attrs,
                        &typed.ty,
                        typed.pat.span(),
                        ctor.file.as_deref(),
                    )),
                    FnArg::Receiver(_) => None,
                })
                .collect();
            info.constructors.push(ConstructorInfo {
                params,
                public: ctor.public,
            });
        }
        Some(info)
    }

    fn field_type(&self, owner: &str, field: &str) -> Option<TypeRef> {
        let TypeItem::Struct(item) = &self.types.get(owner)?.item else {
            return None;
        };
        let field = item
            .fields
            .iter()
            .enumerate()
            .find(|(i, f)| match &f.ident {
                Some(ident) => ident == field,
                None => i.to_string() == field,
            })
            .map(|(_, f)| f)?;
        Some(ParamShape::of(self.lowering().lower(&field.ty)).ty)
    }

    // ========== 调用解析 ==========

    fn owner_of(&self, scope: &ElementId) -> Option<String> {
        if let Some(entry) = self.functions.get(scope) {
            return entry.owner.clone();
        }
        self.constants.get(scope).and_then(|c| c.owner.clone())
    }

    fn module_of(&self, scope: &ElementId) -> &[String] {
        if let Some(entry) = self.functions.get(scope) {
            return &entry.module;
        }
        self.constants.get(scope).map(|c| c.module.as_slice()).unwrap_or_default()
    }

    /// 模块前缀可能指向的模块，按查找顺序排列
    ///
    /// 没有前缀时从调用方所在模块逐层向外找到 crate 根（近似 `use super::*`）；
    /// `crate::`、`self::`、`super::` 按 Rust 的规则解析，其余前缀先按相对路径再按绝对路径
    fn module_candidates(&self, scope: &ElementId, prefix: &[String]) -> Vec<Vec<String>> {
        let current = self.module_of(scope);
        let Some((first, rest)) = prefix.split_first() else {
            return (0..=current.len()).rev().map(|len| current[..len].to_vec()).collect();
        };

        match first.as_str() {
            "crate" => vec![rest.to_vec()],
            "self" => vec![[current, rest].concat()],
            "super" => {
                let supers = prefix.iter().take_while(|s| *s == "super").count();
                let Some(len) = current.len().checked_sub(supers) else {
                    return Vec::new();
                };
                vec![[&current[..len], &prefix[supers..]].concat()]
            }
            _ => {
                let relative = [current, prefix].concat();
                if current.is_empty() {
                    vec![relative]
                } else {
                    vec![relative, prefix.to_vec()]
                }
            }
        }
    }

    fn lookup_function(&self, scope: &ElementId, prefix: &[String], name: &str) -> Option<&FnEntry> {
        self.module_candidates(scope, prefix)
            .iter()
            .find_map(|module| self.functions.get(&ElementId::function(&qualify(module, name))))
    }

    /// 作用域函数的参数类型；泛型参数取第一个 trait 约束
    fn param_type(&self, scope: &ElementId, name: &str) -> Option<TypeRef> {
        let entry = self.functions.get(scope)?;
        let ty = entry.sig.inputs.iter().find_map(|arg| match arg {
            FnArg::Typed(typed) if pattern_name(&typed.pat) == name => Some(&typed.ty),
            _ => None,
        })?;
        let ty = ParamShape::of(self.lowering().lower(ty)).ty;

        if ty.args.is_empty() {
            for param in entry.sig.generics.type_params() {
                if param.ident != ty.path {
                    continue;
                }
                let bound = param.bounds.iter().find_map(|bound| match bound {
                    syn::TypeParamBound::Trait(bound) => Some(self.lowering().lower_path(&bound.path)),
                    _ => None,
                });
                if let Some(bound) = bound {
                    return Some(bound);
                }
            }
        }
        Some(ty)
    }

    fn receiver_type(&self, scope: &ElementId, expr: &Expr) -> Option<TypeRef> {
        match expr {
            Expr::Path(path) if path.path.is_ident("self") => self.owner_of(scope).map(TypeRef::named),
            Expr::Path(path) => {
                let ident = path.path.get_ident()?;
                self.param_type(scope, &ident.to_string())
            }
            Expr::Field(field) => {
                let base = self.receiver_type(scope, &field.base)?;
                let member = match &field.member {
                    syn::Member::Named(ident) => ident.to_string(),
                    syn::Member::Unnamed(index) => index.index.to_string(),
                };
                self.field_type(base.name(), &member)
            }
            Expr::Reference(reference) => self.receiver_type(scope, &reference.expr),
            Expr::Paren(paren) => self.receiver_type(scope, &paren.expr),
            Expr::Group(group) => self.receiver_type(scope, &group.expr),
            Expr::Unary(unary) if matches!(unary.op, UnOp::Deref(_)) => {
                self.receiver_type(scope, &unary.expr)
            }
            Expr::Try(try_expr) => {
                let ty = self.receiver_type(scope, &try_expr.expr)?;
                if let Some(payload) = self.well_known.fallible_payload(&ty) {
                    return Some(payload.clone());
                }
                if ty.is("Option") || ty.is("Result") {
                    ty.first_arg().cloned()
                } else {
                    Some(ty)
                }
            }
            Expr::Await(awaited) => self.receiver_type(scope, &awaited.base),
            Expr::MethodCall(call)
                if call.args.is_empty()
                    && TRANSPARENT_METHODS.contains(&call.method.to_string().as_str()) =>
            {
                self.receiver_type(scope, &call.receiver)
            }
            Expr::MethodCall(call) => {
                let receiver = self.receiver_type(scope, &call.receiver)?;
                let method = self.lookup_method(receiver.name(), &call.method.to_string())?;
                Some(self.lowering().lower_return(&method.sig.output))
            }
            _ => None,
        }
    }

    fn lookup_method(&self, owner: &str, method: &str) -> Option<&FnEntry> {
        if let Some(entry) = self.functions.get(&ElementId::method(owner, method)) {
            return Some(entry);
        }
        self.impls
            .get(owner)?
            .iter()
            .find_map(|t| self.functions.get(&ElementId::method(t, method)))
    }

    fn lookup_path(&self, scope: &ElementId, path: &syn::Path) -> Option<&FnEntry> {
        let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        let (member, prefix) = segments.split_last()?;
        match prefix.last() {
            Some(owner) if !is_module(owner) => {
                let owner = match owner.as_str() {
                    "Self" => self.owner_of(scope)?,
                    _ => owner.clone(),
                };
                self.lookup_method(&owner, member)
            }
            _ => self.lookup_function(scope, prefix, member),
        }
    }

    fn call_target(&self, entry: &FnEntry) -> CallTarget {
        let mut target = CallTarget::new(entry.name.clone(), entry.kind);
        target.element = Some(entry.id.clone());
        target.declaring_type = entry.owner.clone();
        target.returns = Some(self.lowering().lower_return(&entry.sig.output));
        target.declared_errors = attrs::declared_errors(&entry.attrs);
        target
    }

    fn is_local_param(&self, scope: &ElementId, name: &str) -> bool {
        self.functions.get(scope).is_some_and(|entry| {
            entry.sig.inputs.iter().any(|arg| match arg {
                FnArg::Typed(typed) => pattern_name(&typed.pat) == name,
                FnArg::Receiver(_) => false,
            })
        })
    }

    fn fold(&self, scope: &ElementId, expr: &Expr, seen: &mut HashSet<ElementId>) -> Option<ConstValue> {
        match expr {
            Expr::Lit(lit) => match &lit.lit {
                Lit::Str(s) => Some(ConstValue::Str(s.value())),
                Lit::Int(i) => i.base10_parse().ok().map(ConstValue::Int),
                Lit::Bool(b) => Some(ConstValue::Bool(b.value)),
                _ => None,
            },
            Expr::Path(path) => {
                let id = self.resolve_reference(scope, path)?;
                let entry = self.constants.get(&id)?;
                if !seen.insert(id.clone()) {
                    return None;
                }
                self.fold(&id, &entry.expr, seen)
            }
            Expr::Paren(paren) => self.fold(scope, &paren.expr, seen),
            Expr::Group(group) => self.fold(scope, &group.expr, seen),
            Expr::Cast(cast) => self.fold(scope, &cast.expr, seen),
            Expr::Reference(reference) => self.fold(scope, &reference.expr, seen),
            Expr::Unary(unary) if matches!(unary.op, UnOp::Neg(_)) => {
                match self.fold(scope, &unary.expr, seen)? {
                    ConstValue::Int(value) => Some(ConstValue::Int(-value)),
                    _ => None,
                }
            }
            Expr::MethodCall(call)
                if call.args.is_empty()
                    && matches!(call.method.to_string().as_str(), "to_string" | "to_owned" | "into") =>
            {
                match self.fold(scope, &call.receiver, seen)? {
                    ConstValue::Str(s) => Some(ConstValue::Str(s)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl SymbolResolver for SourceIndex {
    fn type_info(&self, ty: &TypeRef) -> Option<TypeInfo> {
        self.build_type_info(ty.name(), &mut HashSet::new())
    }

    fn resolve_call(&self, scope: &ElementId, call: CallSite<'_>) -> Option<CallTarget> {
        let entry = match call {
            CallSite::Call(call) => match &*call.func {
                Expr::Path(path) if path.qself.is_none() => self.lookup_path(scope, &path.path),
                _ => None,
            },
            CallSite::Method(call) => {
                let receiver = self.receiver_type(scope, &call.receiver)?;
                self.lookup_method(receiver.name(), &call.method.to_string())
            }
        }?;
        Some(self.call_target(entry))
    }

    fn resolve_reference(&self, scope: &ElementId, path: &syn::ExprPath) -> Option<ElementId> {
        if path.qself.is_some() {
            return None;
        }
        let segments: Vec<String> = path.path.segments.iter().map(|s| s.ident.to_string()).collect();
        let declared = |id: &ElementId| self.constants.contains_key(id) || self.functions.contains_key(id);

        let (member, prefix) = segments.split_last()?;
        if prefix.is_empty() && self.is_local_param(scope, member) {
            return None;
        }

        match prefix.last() {
            Some(owner) if !is_module(owner) => {
                let owner = match owner.as_str() {
                    "Self" => self.owner_of(scope)?,
                    _ => owner.clone(),
                };
                [
                    ElementId::value(&format!("{}::{}", owner, member)),
                    ElementId::method(&owner, member),
                ]
                .into_iter()
                .find(declared)
            }
            _ => self
                .module_candidates(scope, prefix)
                .iter()
                .flat_map(|module| {
                    let name = qualify(module, member);
                    [ElementId::value(&name), ElementId::function(&name)]
                })
                .find(declared),
        }
    }

    fn body(&self, element: &ElementId) -> Option<Body<'_>> {
        if let Some(entry) = self.functions.get(element) {
            return entry.body.as_ref().map(Body::Block);
        }
        self.constants.get(element).map(|c| Body::Expr(&c.expr))
    }

    fn fold_constant(&self, scope: &ElementId, expr: &Expr) -> Option<ConstValue> {
        self.fold(scope, expr, &mut HashSet::new())
    }

    /// 只索引了一个文件时才能确定文件名
    fn locate(&self, span: Span) -> Location {
        let file = match self.files.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        };
        Location::from_span(file, span)
    }
}

fn pattern_name(pat: &Pat) -> String {
    match pat {
        Pat::Ident(ident) => ident.ident.to_string(),
        Pat::TupleStruct(tuple) if tuple.elems.len() == 1 => pattern_name(&tuple.elems[0]),
        Pat::Type(typed) => pattern_name(&typed.pat),
        Pat::Reference(reference) => pattern_name(&reference.pat),
        Pat::Paren(paren) => pattern_name(&paren.pat),
        Pat::Wild(_) => "_".to_string(),
        other => other.to_token_stream().to_string(),
    }
}

fn special_role(ty: &TypeRef, element: Option<&TypeRef>) -> Option<SpecialRole> {
    let lookup = |ty: &TypeRef| {
        SPECIAL_TYPES
            .iter()
            .find(|(name, _)| ty.is(name))
            .map(|(_, role)| *role)
    };
    match element {
        Some(element) => match lookup(element) {
            Some(SpecialRole::FormFile) => Some(SpecialRole::FormFileCollection),
            _ => None,
        },
        None => lookup(ty),
    }
}

fn is_serde_flatten(field_attrs: &[Attribute]) -> bool {
    field_attrs
        .iter()
        .filter(|a| a.path().is_ident("serde"))
        .any(|a| attrs::has_flag(a, "flatten"))
}

/// 模块内声明的限定名，crate 根下为裸名
fn qualify(module: &[String], name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", module.join("::"), name)
    }
}

/// 小写开头的路径段视为模块（`crate`、`super`、`users::find`）
fn is_module(segment: &str) -> bool {
    segment.chars().next().is_some_and(|c| c.is_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BindingSource;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"
        use chimera_web::prelude::*;

        pub const MAX_PAGE: u32 = LIMIT;
        const LIMIT: u32 = 100;
        const LOOP_A: &str = LOOP_B;
        const LOOP_B: &str = LOOP_A;

        pub enum Status { Active, Archived }

        pub struct Slug(String);

        impl FromStr for Slug {
            type Err = ();
            fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Slug(s.to_string())) }
        }

        pub struct Audit {
            pub created_by: String,
            pub id: i64,
        }

        pub struct Article {
            pub title: String,
            #[serde(flatten)]
            pub audit: Audit,
            secret: String,
        }

        pub struct SearchQuery {
            pub q: Option<String>,
            pub page: u32,
        }

        #[derive(Controller)]
        #[request_mapping("/api/articles")]
        #[authorize]
        pub struct ArticleController {
            #[autowired]
            articles: Arc<ArticleRepository>,
        }

        pub struct ArticleRepository;

        impl ArticleRepository {
            pub fn find(&self, slug: &Slug) -> ApiResult<Article> {
                Err(ApiError::not_found())
            }
        }

        #[controller_impl]
        impl ArticleController {
            #[get_mapping("/{slug}")]
            #[allow_anonymous]
            async fn show(&self, PathVariable(slug): PathVariable<Slug>, status: Option<Status>) -> ApiResult<Article> {
                self.articles.find(&slug)
            }

            #[get_mapping("/")]
            async fn search(&self, RequestParam(query): RequestParam<SearchQuery>) -> ApiResult<Vec<Article>> {
                Ok(Vec::new())
            }

            #[post_mapping("/{slug}/attachments")]
            async fn attach(&self, slug: Slug, files: Vec<MultipartFile>, cancel: CancellationToken) -> ApiResult<Created> {
                Ok(Created)
            }
        }
    "#;

    fn index() -> SourceIndex {
        SourceIndex::parse(SOURCE, Some("articles.rs")).unwrap()
    }

    #[test]
    fn test_controller_handlers() {
        let handlers = index().handlers();
        let routes: Vec<_> = handlers
            .iter()
            .map(|h| (h.name.as_str(), h.verb, h.route.as_str()))
            .collect();
        assert_eq!(
            routes,
            vec![
                ("show", HttpVerb::Get, "/api/articles/{slug}"),
                ("search", HttpVerb::Get, "/api/articles"),
                ("attach", HttpVerb::Post, "/api/articles/{slug}/attachments"),
            ]
        );

        let show = &handlers[0];
        assert_eq!(show.id, ElementId::method("ArticleController", "show"));
        assert!(show.is_async);
        assert!(show.middleware.requires_authorization);
        assert!(!show.middleware.authorization_active());
        assert_eq!(show.route_variables, vec!["slug"]);
        assert_eq!(show.return_type.to_string(), "ApiResult<Article>");
        assert_eq!(show.location.file.as_deref(), Some("articles.rs"));

        let slug = &show.parameters[0];
        assert_eq!(slug.name, "slug");
        assert_eq!(slug.ty, TypeRef::named("Slug"));
        assert_eq!(slug.annotation, Some(BindingAnnotation::Route { name: None }));
        assert_eq!(slug.custom_binding, Some(CustomBinding::TryParse));
        assert!(show.parameters[1].nullable);
    }

    #[test]
    fn test_special_parameters() {
        let handlers = index().handlers();
        let attach = &handlers[2];
        assert_eq!(attach.parameters[1].special, Some(SpecialRole::FormFileCollection));
        assert_eq!(attach.parameters[2].special, Some(SpecialRole::Cancellation));

        let search = &handlers[1];
        assert_eq!(search.parameters[0].annotation, Some(BindingAnnotation::AsParameters));
    }

    #[test]
    fn test_query_wrapper_over_primitive_collection() {
        let index = SourceIndex::parse(
            r#"
            pub enum Sort { Asc, Desc }

            #[get_mapping("/items")]
            pub fn items(
                RequestParam(ids): RequestParam<Vec<u32>>,
                RequestParam(sort): RequestParam<Option<Sort>>,
            ) -> ApiResult<()> {
                Ok(())
            }
            "#,
            None,
        )
        .unwrap();
        let handler = &index.handlers()[0];
        assert_eq!(handler.parameters[0].annotation, None);
        assert_eq!(handler.parameters[0].element, Some(TypeRef::named("u32")));
        assert_eq!(handler.parameters[1].annotation, Some(BindingAnnotation::Query { name: None }));
        assert!(handler.parameters[1].nullable);

        let options = crate::ContractOptions::default();
        let mut diagnostics = crate::Diagnostics::new();
        let contract = crate::EndpointAnalyzer::new(&index, &options)
            .analyze(handler, &mut diagnostics)
            .unwrap();
        assert_eq!(contract.parameters[0].source, BindingSource::Query);
        assert_eq!(contract.parameters[1].source, BindingSource::Query);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_type_info() {
        let index = index();
        let article = index.type_info(&TypeRef::named("Article")).unwrap();
        let names: Vec<_> = article
            .properties
            .iter()
            .map(|p| (p.name.as_str(), p.public, p.inherited))
            .collect();
        assert_eq!(
            names,
            vec![
                ("title", true, false),
                ("secret", false, false),
                ("created_by", true, true),
                ("id", true, true),
            ]
        );
        assert!(!article.constructors[0].public);

        let status = index.type_info(&TypeRef::named("Status")).unwrap();
        assert_eq!(status.kind, TypeKind::Enum);
        assert!(index.type_info(&TypeRef::named("Missing")).is_none());
    }

    #[test]
    fn test_constant_folding() {
        let index = index();
        let scope = ElementId::method("ArticleController", "show");
        let expr: Expr = syn::parse_quote!(MAX_PAGE);
        assert_eq!(index.fold_constant(&scope, &expr), Some(ConstValue::Int(100)));

        let cycle: Expr = syn::parse_quote!(LOOP_A);
        assert_eq!(index.fold_constant(&scope, &cycle), None);

        let literal: Expr = syn::parse_quote!(("CODE").to_string());
        assert_eq!(
            index.fold_constant(&scope, &literal),
            Some(ConstValue::Str("CODE".to_string()))
        );
    }

    #[test]
    fn test_field_receiver_resolution() {
        let index = index();
        let scope = ElementId::method("ArticleController", "show");
        let call: syn::ExprMethodCall = syn::parse_quote!(self.articles.find(&slug));
        let target = index.resolve_call(&scope, CallSite::Method(&call)).unwrap();
        assert_eq!(target.element, Some(ElementId::method("ArticleRepository", "find")));
        assert_eq!(target.kind, TargetKind::Method);
        assert_eq!(target.returns.unwrap().to_string(), "ApiResult<Article>");
    }

    #[test]
    fn test_end_to_end_classification() {
        let index = index();
        let options = crate::ContractOptions::default();
        let analyzer = crate::EndpointAnalyzer::new(&index, &options);
        let mut diagnostics = crate::Diagnostics::new();

        let handlers = index.handlers();
        let show = analyzer.analyze(&handlers[0], &mut diagnostics).unwrap();
        assert_eq!(show.parameters[0].source, BindingSource::Route);
        assert_eq!(show.parameters[1].source, BindingSource::Query);
        assert_eq!(show.status_codes(), vec![200, 400, 404, 500]);

        let search = analyzer.analyze(&handlers[1], &mut diagnostics).unwrap();
        let children: Vec<_> = search.parameters[0]
            .children
            .iter()
            .map(|c| (c.name.as_str(), c.source.clone(), c.nullable))
            .collect();
        assert_eq!(
            children,
            vec![("q", BindingSource::Query, true), ("page", BindingSource::Query, false)]
        );

        let attach = analyzer.analyze(&handlers[2], &mut diagnostics).unwrap();
        assert_eq!(attach.status_codes(), vec![201, 400, 401, 403, 415, 500]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_same_names_in_different_modules() {
        let index = SourceIndex::parse(
            r#"
            fn load() -> ApiResult<()> {
                Err(ApiError::unexpected())
            }

            mod users {
                fn load(id: i64) -> ApiResult<User> {
                    Err(ApiError::not_found())
                }

                #[get_mapping("/users")]
                pub fn list() -> ApiResult<Vec<User>> {
                    load(1)?;
                    Ok(Vec::new())
                }
            }

            mod orders {
                fn load(id: i64) -> ApiResult<Order> {
                    Err(ApiError::conflict())
                }

                #[get_mapping("/orders")]
                pub fn list() -> ApiResult<Vec<Order>> {
                    load(1)?;
                    super::load()?;
                    Ok(Vec::new())
                }
            }
            "#,
            Some("modules.rs"),
        )
        .unwrap();

        let handlers = index.handlers();
        let routes: Vec<_> = handlers.iter().map(|h| h.route.as_str()).collect();
        assert_eq!(routes, vec!["/users", "/orders"]);
        assert_eq!(handlers[1].id, ElementId::function("orders::list"));

        let options = crate::ContractOptions::default();
        let inferencer = crate::ShapeInferencer::new(&index, &options);
        let mut diagnostics = crate::Diagnostics::new();
        let users = inferencer.collect_errors(&handlers[0], &mut diagnostics);
        let orders = inferencer.collect_errors(&handlers[1], &mut diagnostics);
        assert_eq!(users.kind_names(), vec!["NotFound"]);
        assert_eq!(orders.kind_names(), vec!["Conflict", "Unexpected"]);
    }
}
