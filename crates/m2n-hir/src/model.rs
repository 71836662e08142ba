use crate::errors::GenerationError;
use m2n_ast::PrimitiveKind;
use m2n_diags::Span;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Fully-qualified managed type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypePath {
    pub namespace: Vec<String>,
    pub name: String,
}

impl TypePath {
    pub fn new(namespace: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// Splits `First.Second.Name` into namespace and name.
    pub fn parse(dotted: &str) -> Self {
        let mut segments: Vec<String> = dotted.split('.').map(str::to_string).collect();
        let name = segments.pop().unwrap_or_default();
        Self::new(segments, name)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.namespace
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.name.as_str()))
    }

    pub fn dotted(&self) -> String {
        self.segments().collect::<Vec<_>>().join(".")
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

impl Serialize for TypePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The closed set of types that can cross the native boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ManagedType {
    Void,
    Primitive(PrimitiveKind),
    String,
    Enum(TypePath),
    Object(TypePath),
    Array(Box<ManagedType>),
}

impl ManagedType {
    pub fn is_void(&self) -> bool {
        matches!(self, ManagedType::Void)
    }

    pub fn array_element(&self) -> Option<&ManagedType> {
        match self {
            ManagedType::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Declared type this type refers to, looking through arrays.
    pub fn named_path(&self) -> Option<&TypePath> {
        match self {
            ManagedType::Enum(path) | ManagedType::Object(path) => Some(path),
            ManagedType::Array(element) => element.named_path(),
            _ => None,
        }
    }
}

impl fmt::Display for ManagedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagedType::Void => f.write_str("void"),
            ManagedType::Primitive(kind) => f.write_str(kind.keyword()),
            ManagedType::String => f.write_str("string"),
            ManagedType::Enum(path) | ManagedType::Object(path) => write!(f, "{}", path),
            ManagedType::Array(element) => write!(f, "{}[]", element),
        }
    }
}

impl Serialize for ManagedType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    Ref,
}

impl Direction {
    pub fn is_by_ref(self) -> bool {
        !matches!(self, Direction::In)
    }

    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Direction::In => None,
            Direction::Out => Some("out"),
            Direction::Ref => Some("ref"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ManagedType,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FunctionKind {
    Constructor,
    Method,
    Getter { property: String },
    Setter { property: String },
}

/// One flat native entry point standing in for a managed member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeFunction {
    pub symbol: String,
    pub owner: TypePath,
    pub member: String,
    #[serde(flatten)]
    pub kind: FunctionKind,
    pub is_static: bool,
    pub ordinal: usize,
    pub params: Vec<BoundParam>,
    pub return_type: ManagedType,
    #[serde(skip)]
    pub span: Span,
}

impl NativeFunction {
    /// Instance members receive the object handle as their first native argument.
    pub fn takes_handle(&self) -> bool {
        !self.is_static && self.kind != FunctionKind::Constructor
    }

    pub fn native_arity(&self) -> usize {
        self.params.len() + usize::from(self.takes_handle())
    }

    /// Dispatch key on the managed side, e.g. `PassRefInt(ref int)`.
    pub fn managed_signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|param| match param.direction.keyword() {
                Some(keyword) => format!("{} {}", keyword, param.ty),
                None => param.ty.to_string(),
            })
            .collect();
        format!("{}({})", self.member, params.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundClass {
    pub path: TypePath,
    pub native_name: String,
    pub base: Option<TypePath>,
    pub is_static: bool,
    #[serde(skip)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundEnumItem {
    pub name: String,
    pub symbol: String,
    #[serde(serialize_with = "serialize_display")]
    pub value: i128,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundEnum {
    pub path: TypePath,
    pub native_name: String,
    #[serde(serialize_with = "serialize_display")]
    pub underlying: PrimitiveKind,
    pub is_flags: bool,
    pub items: Vec<BoundEnumItem>,
    #[serde(skip)]
    pub span: Span,
}

fn serialize_display<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Debug, Clone, Default)]
struct ModelIndex {
    classes: HashMap<String, usize>,
    enums: HashMap<String, usize>,
    functions: HashMap<String, usize>,
}

/// Everything the generator and the runtime need to know about an assembly.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BindingModel {
    pub classes: Vec<BoundClass>,
    pub enums: Vec<BoundEnum>,
    pub functions: Vec<NativeFunction>,
    #[serde(skip)]
    pub errors: Vec<GenerationError>,
    #[serde(skip)]
    index: ModelIndex,
}

impl BindingModel {
    pub(crate) fn push_class(&mut self, class: BoundClass) {
        self.index.classes.insert(class.path.dotted(), self.classes.len());
        self.classes.push(class);
    }

    pub(crate) fn class_mut(&mut self, path: &TypePath) -> Option<&mut BoundClass> {
        let index = *self.index.classes.get(&path.dotted())?;
        self.classes.get_mut(index)
    }

    pub(crate) fn push_enum(&mut self, bound: BoundEnum) {
        self.index.enums.insert(bound.path.dotted(), self.enums.len());
        self.enums.push(bound);
    }

    pub(crate) fn push_function(&mut self, function: NativeFunction) {
        self.index.functions.insert(function.symbol.clone(), self.functions.len());
        self.functions.push(function);
    }

    pub fn function(&self, symbol: &str) -> Option<&NativeFunction> {
        self.index.functions.get(symbol).map(|&i| &self.functions[i])
    }

    pub fn class(&self, path: &TypePath) -> Option<&BoundClass> {
        self.index.classes.get(&path.dotted()).map(|&i| &self.classes[i])
    }

    pub fn enumeration(&self, path: &TypePath) -> Option<&BoundEnum> {
        self.index.enums.get(&path.dotted()).map(|&i| &self.enums[i])
    }

    pub fn functions_of<'a>(&'a self, path: &'a TypePath) -> impl Iterator<Item = &'a NativeFunction> + 'a {
        self.functions.iter().filter(move |f| &f.owner == path)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// True when `actual` is `expected` or derives from it.
    pub fn is_assignable(&self, actual: &TypePath, expected: &TypePath) -> bool {
        let mut current = Some(actual);
        let mut steps = 0;
        while let Some(path) = current {
            if path == expected {
                return true;
            }
            steps += 1;
            if steps > self.classes.len() {
                return false;
            }
            current = self.class(path).and_then(|class| class.base.as_ref());
        }
        false
    }

    /// Distinct array element types used by bound functions, in first-use order.
    pub fn array_elements(&self) -> Vec<&ManagedType> {
        let mut elements: Vec<&ManagedType> = Vec::new();
        for function in &self.functions {
            let types = function
                .params
                .iter()
                .map(|p| &p.ty)
                .chain(std::iter::once(&function.return_type));
            for ty in types {
                if let Some(element) = ty.array_element() {
                    if !elements.contains(&element) {
                        elements.push(element);
                    }
                }
            }
        }
        elements
    }

    /// Copy of the model holding only the functions of types `keep` accepts.
    /// Types those functions mention stay declared so the output is self-contained.
    /// Errors are not carried over.
    pub fn select<F>(&self, keep: F) -> BindingModel
    where
        F: Fn(&TypePath) -> bool,
    {
        let functions: Vec<&NativeFunction> = self.functions.iter().filter(|f| keep(&f.owner)).collect();
        let mut mentioned: Vec<&TypePath> = Vec::new();
        for function in functions.iter().copied() {
            mentioned.push(&function.owner);
            let types = function
                .params
                .iter()
                .map(|p| &p.ty)
                .chain(std::iter::once(&function.return_type));
            mentioned.extend(types.filter_map(ManagedType::named_path));
        }
        let wanted = |path: &TypePath| keep(path) || mentioned.contains(&path);

        let mut selected = BindingModel::default();
        for class in self.classes.iter().filter(|c| wanted(&c.path)) {
            selected.push_class(class.clone());
        }
        for bound in self.enums.iter().filter(|e| wanted(&e.path)) {
            selected.push_enum(bound.clone());
        }
        for function in functions {
            selected.push_function(function.clone());
        }
        selected
    }
}
