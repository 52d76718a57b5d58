//! `syn::Type` 到 `TypeRef` 的降级
//!
//! 引用、`Arc` / `Rc` / `Box` 等智能指针是透明的；`dyn Trait` 与 `impl Trait` 降为
//! trait 路径，关联类型实参（`Output = T`、`Item = T`）作为普通泛型参数保留；
//! `Result<T, ApiError>` 规范化为 `ApiResult<T>`。

use quote::ToTokens;
use syn::{GenericArgument, PathArguments, ReturnType, Type, TypeParamBound};

use crate::model::TypeRef;
use crate::options::WellKnownTypes;

const TRANSPARENT: &[&str] = &["Arc", "Rc", "Box", "Cow", "Pin"];

const COLLECTIONS: &[&str] = &["Vec", "VecDeque", "HashSet", "BTreeSet", "LinkedList", "Slice", "Array"];

pub(crate) struct TypeLowering<'w> {
    well_known: &'w WellKnownTypes,
}

impl<'w> TypeLowering<'w> {
    pub fn new(well_known: &'w WellKnownTypes) -> Self {
        Self { well_known }
    }

    pub fn lower(&self, ty: &Type) -> TypeRef {
        match ty {
            Type::Reference(reference) => self.lower(&reference.elem),
            Type::Paren(paren) => self.lower(&paren.elem),
            Type::Group(group) => self.lower(&group.elem),
            Type::Tuple(tuple) if tuple.elems.is_empty() => TypeRef::unit(),
            Type::Tuple(tuple) => {
                TypeRef::generic("Tuple", tuple.elems.iter().map(|t| self.lower(t)).collect())
            }
            Type::Slice(slice) => TypeRef::generic("Slice", vec![self.lower(&slice.elem)]),
            Type::Array(array) => TypeRef::generic("Array", vec![self.lower(&array.elem)]),
            Type::TraitObject(object) => self.lower_bounds(object.bounds.iter(), ty),
            Type::ImplTrait(imp) => self.lower_bounds(imp.bounds.iter(), ty),
            Type::Path(path) if path.qself.is_none() => self.lower_path(&path.path),
            other => TypeRef::named(other.to_token_stream().to_string()),
        }
    }

    pub fn lower_return(&self, output: &ReturnType) -> TypeRef {
        match output {
            ReturnType::Default => TypeRef::unit(),
            ReturnType::Type(_, ty) => self.lower(ty),
        }
    }

    fn lower_bounds<'b>(
        &self,
        mut bounds: impl Iterator<Item = &'b TypeParamBound>,
        original: &Type,
    ) -> TypeRef {
        bounds
            .find_map(|bound| match bound {
                TypeParamBound::Trait(bound) => Some(self.lower_path(&bound.path)),
                _ => None,
            })
            .unwrap_or_else(|| TypeRef::named(original.to_token_stream().to_string()))
    }

    pub fn lower_path(&self, path: &syn::Path) -> TypeRef {
        let name = path
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect::<Vec<_>>()
            .join("::");
        let args: Vec<TypeRef> = path
            .segments
            .last()
            .map(|last| self.lower_arguments(&last.arguments))
            .unwrap_or_default();

        let ty = TypeRef::generic(name, args);
        if TRANSPARENT.contains(&ty.name()) && ty.args.len() == 1 {
            return ty.args.into_iter().next().unwrap_or_else(TypeRef::unit);
        }
        if ty.is("Result") && ty.args.len() == 2 && ty.args[1].is(&self.well_known.error_type) {
            let payload = ty.args.into_iter().next().unwrap_or_else(TypeRef::unit);
            return TypeRef::generic(self.well_known.result_type.clone(), vec![payload]);
        }
        ty
    }

    fn lower_arguments(&self, arguments: &PathArguments) -> Vec<TypeRef> {
        match arguments {
            PathArguments::AngleBracketed(args) => args
                .args
                .iter()
                .filter_map(|arg| match arg {
                    GenericArgument::Type(ty) => Some(self.lower(ty)),
                    GenericArgument::AssocType(assoc) => Some(self.lower(&assoc.ty)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// 剥离 `Option`，识别集合元素类型
pub(crate) struct ParamShape {
    pub ty: TypeRef,
    pub nullable: bool,
    pub element: Option<TypeRef>,
}

impl ParamShape {
    pub fn of(ty: TypeRef) -> Self {
        let (ty, nullable) = match ty {
            ty if ty.is("Option") && ty.args.len() == 1 => {
                (ty.args.into_iter().next().unwrap_or_else(TypeRef::unit), true)
            }
            ty => (ty, false),
        };
        let element = if COLLECTIONS.contains(&ty.name()) && ty.args.len() == 1 {
            ty.first_arg().cloned()
        } else {
            None
        };
        Self {
            ty,
            nullable,
            element,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn lower(ty: Type) -> String {
        TypeLowering::new(&WellKnownTypes::default()).lower(&ty).to_string()
    }

    #[test]
    fn test_lowering() {
        assert_eq!(lower(parse_quote!(&'a mut Arc<dyn UserStore + Send>)), "UserStore");
        assert_eq!(lower(parse_quote!(Result<Vec<User>, ApiError>)), "ApiResult<Vec<User>>");
        assert_eq!(lower(parse_quote!(Result<User, std::io::Error>)), "Result<User, std::io::Error>");
        assert_eq!(
            lower(parse_quote!(impl Future<Output = ApiResult<()>>)),
            "Future<ApiResult<()>>"
        );
        assert_eq!(
            lower(parse_quote!(BoxStream<'static, SseEvent<Tick>>)),
            "BoxStream<SseEvent<Tick>>"
        );
        assert_eq!(lower(parse_quote!(&[u8])), "Slice<u8>");
    }

    #[test]
    fn test_param_shape() {
        let well_known = WellKnownTypes::default();
        let lowering = TypeLowering::new(&well_known);
        let shape = ParamShape::of(lowering.lower(&parse_quote!(Option<Vec<String>>)));
        assert!(shape.nullable);
        assert_eq!(shape.ty.to_string(), "Vec<String>");
        assert_eq!(shape.element, Some(TypeRef::named("String")));
    }
}
