//! 类型标识与类型元数据

use serde::{Deserialize, Serialize};
use std::fmt;

use super::parameter::ParameterDescriptor;

/// 类型标识
///
/// 结构化的类型引用：路径 + 泛型参数。两个 `TypeRef` 结构相等即视为同一类型，
/// 宿主负责在构造前剥离引用、智能指针等透明包装。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef {
    pub path: String,
    pub args: Vec<TypeRef>,
}

impl TypeRef {
    /// 无泛型参数的类型
    pub fn named(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    /// 带泛型参数的类型
    pub fn generic(path: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self {
            path: path.into(),
            args,
        }
    }

    /// 单元类型 `()`
    pub fn unit() -> Self {
        Self::named("()")
    }

    pub fn is_unit(&self) -> bool {
        self.path == "()" && self.args.is_empty()
    }

    /// 路径的最后一段，例如 `crate::model::User` -> `User`
    pub fn name(&self) -> &str {
        self.path.rsplit("::").next().unwrap_or(&self.path)
    }

    /// 按最后一段名称比较
    pub fn is(&self, name: &str) -> bool {
        self.name() == name
    }

    pub fn first_arg(&self) -> Option<&TypeRef> {
        self.args.first()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// 已声明元素的标识（函数、方法、常量等）
///
/// 调用图遍历的 visited-set 以它为键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 自由函数
    pub fn function(name: &str) -> Self {
        Self(format!("fn:{}", name))
    }

    /// 类型或 trait 上的方法
    pub fn method(owner: &str, name: &str) -> Self {
        Self(format!("method:{}::{}", owner, name))
    }

    /// const / static 项
    pub fn value(name: &str) -> Self {
        Self(format!("const:{}", name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 类型的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Struct,
    Enum,
    /// trait / 接口
    Interface,
    /// 抽象类型（宿主语言支持时）
    Abstract,
}

/// 构造器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorInfo {
    /// 按声明顺序排列的构造参数
    pub params: Vec<ParameterDescriptor>,
    pub public: bool,
}

/// 可读属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub name: String,
    pub ty: TypeRef,
    pub readable: bool,
    pub public: bool,
    /// 来自基类型（或展开的字段）
    pub inherited: bool,
}

/// 宿主提供的类型元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub ty: TypeRef,
    pub kind: TypeKind,
    pub constructors: Vec<ConstructorInfo>,
    /// 自有属性在前，继承属性在后，各自保持声明顺序
    pub properties: Vec<PropertyInfo>,
}

impl TypeInfo {
    pub fn new(ty: TypeRef, kind: TypeKind) -> Self {
        Self {
            ty,
            kind,
            constructors: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn is_interface_or_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Interface | TypeKind::Abstract)
    }

    /// 参数最多的公共构造器；参数数相同时取先声明者
    pub fn best_public_constructor(&self) -> Option<&ConstructorInfo> {
        let mut best: Option<&ConstructorInfo> = None;
        for ctor in self.constructors.iter().filter(|c| c.public) {
            match best {
                Some(current) if current.params.len() >= ctor.params.len() => {}
                _ => best = Some(ctor),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_display() {
        let ty = TypeRef::generic(
            "std::collections::HashMap",
            vec![TypeRef::named("String"), TypeRef::generic("Vec", vec![TypeRef::named("u32")])],
        );
        assert_eq!(ty.to_string(), "std::collections::HashMap<String, Vec<u32>>");
        assert_eq!(ty.name(), "HashMap");
        assert!(TypeRef::unit().is_unit());
    }

    #[test]
    fn test_best_public_constructor_prefers_arity_then_order() {
        let mut info = TypeInfo::new(TypeRef::named("Filter"), TypeKind::Struct);
        let param = |name: &str| ParameterDescriptor::new(name, TypeRef::named("u32"));
        info.constructors.push(ConstructorInfo {
            params: vec![param("a")],
            public: true,
        });
        info.constructors.push(ConstructorInfo {
            params: vec![param("a"), param("b"), param("c")],
            public: false,
        });
        info.constructors.push(ConstructorInfo {
            params: vec![param("x"), param("y")],
            public: true,
        });
        info.constructors.push(ConstructorInfo {
            params: vec![param("p"), param("q")],
            public: true,
        });

        let best = info.best_public_constructor().unwrap();
        assert_eq!(best.params[0].name, "x");
    }
}
