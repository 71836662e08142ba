
pub mod errors;
pub mod model;
pub mod naming;

pub use errors::GenerationError;
pub use m2n_ast::PrimitiveKind;
pub use model::{
    BindingModel, BoundClass, BoundEnum, BoundEnumItem, BoundParam, Direction, FunctionKind,
    ManagedType, NativeFunction, TypePath,
};

use m2n_ast::*;
use m2n_diags::Span;
use naming::{SymbolOwner, SymbolTable};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Names with a CLR meaning that has no native representation.
const UNBINDABLE_BUILTINS: &[&str] = &[
    "object", "decimal", "dynamic", "nint", "nuint", "IntPtr", "UIntPtr", "Delegate", "Action",
    "Func", "System.Object", "System.Decimal", "System.IntPtr", "System.UIntPtr",
    "System.Delegate", "System.Action", "System.Func",
];

/// Turns a parsed assembly into a [`BindingModel`].
///
/// Failures are collected in [`BindingModel::errors`] and only drop the
/// member (or type) they concern.
#[derive(Debug, Default)]
pub struct Binder;

struct DeclEntry<'a> {
    path: TypePath,
    decl: &'a TypeDecl,
}

/// Public member waiting for an ordinal and type resolution.
struct Candidate<'a> {
    native_member: String,
    member: String,
    kind: FunctionKind,
    is_static: bool,
    params: &'a [Parameter],
    setter_param: Option<&'a Type>,
    return_type: Option<&'a Type>,
    span: Span,
}

struct BindContext<'a> {
    decls: Vec<DeclEntry<'a>>,
    lookup: HashMap<String, usize>,
    model: BindingModel,
    symbols: SymbolTable,
}

impl Binder {
    pub fn new() -> Self {
        Self
    }

    pub fn bind(&self, assembly: &Assembly) -> BindingModel {
        let mut ctx = BindContext {
            decls: Vec::new(),
            lookup: HashMap::new(),
            model: BindingModel::default(),
            symbols: SymbolTable::new(),
        };

        ctx.collect(&assembly.items, &[]);

        for index in 0..ctx.decls.len() {
            let decl = ctx.decls[index].decl;
            if let TypeDeclKind::Enum(body) = &decl.kind {
                if decl.visibility == Visibility::Public {
                    ctx.bind_enum(index, body);
                }
            }
        }

        for index in 0..ctx.decls.len() {
            ctx.declare_class(index);
        }

        for index in 0..ctx.decls.len() {
            ctx.resolve_base(index);
        }

        for index in 0..ctx.decls.len() {
            ctx.bind_members(index);
        }

        debug!(
            classes = ctx.model.classes.len(),
            enums = ctx.model.enums.len(),
            functions = ctx.model.functions.len(),
            errors = ctx.model.errors.len(),
            "binding finished"
        );

        ctx.model
    }
}

impl<'a> BindContext<'a> {
    fn error(&mut self, error: GenerationError) {
        warn!(%error, "binding failed");
        self.model.errors.push(error);
    }

    fn collect(&mut self, items: &'a [Item], namespace: &[String]) {
        for item in items {
            match item {
                Item::Namespace(ns) => {
                    let mut nested = namespace.to_vec();
                    nested.extend(ns.path.iter().cloned());
                    self.collect(&ns.items, &nested);
                }
                Item::Type(decl) => {
                    let path = TypePath::new(namespace.to_vec(), decl.name.clone());
                    let dotted = path.dotted();
                    if self.lookup.contains_key(&dotted) {
                        self.error(GenerationError::DuplicateType {
                            path: dotted,
                            span: decl.span,
                        });
                        continue;
                    }
                    self.lookup.insert(dotted, self.decls.len());
                    self.decls.push(DeclEntry { path, decl });
                }
            }
        }
    }

    fn bind_enum(&mut self, index: usize, body: &EnumBody) {
        let path = self.decls[index].path.clone();
        let decl = self.decls[index].decl;

        let underlying = match &body.underlying {
            None => PrimitiveKind::Int32,
            Some(Type::Primitive(kind)) if kind.is_integral() => *kind,
            Some(other) => {
                self.error(GenerationError::InvalidEnum {
                    path: path.dotted(),
                    reason: format!("underlying type must be an integral type, found '{}'", other),
                    span: decl.span,
                });
                return;
            }
        };

        let native_name = naming::type_symbol(&path);
        if !self.claim(&native_name, &format!("type:{}", path), &format!("enum '{}'", path), decl.span) {
            return;
        }

        let (min, max) = underlying.integer_range().unwrap_or((i128::MIN, i128::MAX));
        let mut values: HashMap<&str, i128> = HashMap::new();
        let mut items = Vec::new();
        let mut next = 0i128;

        for item in &body.items {
            let value = match &item.value {
                Some(expr) => match evaluate(expr, &values) {
                    Ok(value) => value,
                    Err(reason) => {
                        self.error(GenerationError::InvalidEnum {
                            path: path.dotted(),
                            reason: format!("item '{}': {}", item.name, reason),
                            span: item.span,
                        });
                        return;
                    }
                },
                None => next,
            };

            if value < min || value > max {
                self.error(GenerationError::InvalidEnum {
                    path: path.dotted(),
                    reason: format!("item '{}' = {} does not fit in '{}'", item.name, value, underlying),
                    span: item.span,
                });
                return;
            }
            if values.insert(item.name.as_str(), value).is_some() {
                self.error(GenerationError::InvalidEnum {
                    path: path.dotted(),
                    reason: format!("item '{}' is declared twice", item.name),
                    span: item.span,
                });
                return;
            }
            next = value + 1;

            let symbol = naming::enum_item_symbol(&path, &item.name);
            let member = format!("{}.{}", path, item.name);
            if self.claim(&symbol, &format!("item:{}", member), &format!("enum item '{}'", member), item.span) {
                items.push(BoundEnumItem {
                    name: item.name.clone(),
                    symbol,
                    value,
                });
            }
        }

        debug!(path = %path, items = items.len(), "bound enum");
        self.model.push_enum(BoundEnum {
            path,
            native_name,
            underlying,
            is_flags: decl.has_attribute("Flags"),
            items,
            span: decl.span,
        });
    }

    /// Registers a class and its handle typedef name. Structs are rejected here.
    fn declare_class(&mut self, index: usize) {
        let path = self.decls[index].path.clone();
        let decl = self.decls[index].decl;

        if decl.visibility != Visibility::Public {
            trace!(path = %path, "skipping non-public type");
            return;
        }

        match &decl.kind {
            TypeDeclKind::Class(_) => {}
            TypeDeclKind::Struct(_) => {
                self.error(GenerationError::UnsupportedType {
                    member: path.dotted(),
                    ty: path.dotted(),
                    reason: "value types cannot be exposed as handles".to_string(),
                    span: decl.span,
                });
                return;
            }
            TypeDeclKind::Enum(_) => return,
        }

        let native_name = naming::type_symbol(&path);
        if !self.claim(&native_name, &format!("type:{}", path), &format!("class '{}'", path), decl.span) {
            return;
        }

        self.model.push_class(BoundClass {
            path,
            native_name,
            base: None,
            is_static: decl.is_static,
            span: decl.span,
        });
    }

    fn resolve_base(&mut self, index: usize) {
        let path = self.decls[index].path.clone();
        let decl = self.decls[index].decl;
        let TypeDeclKind::Class(body) = &decl.kind else {
            return;
        };
        let Some(base_name) = &body.base else {
            return;
        };
        if self.model.class(&path).is_none() {
            return;
        }
        if decl.is_static {
            self.error(GenerationError::InvalidBase {
                path: path.dotted(),
                base: base_name.dotted(),
                reason: "static classes cannot derive from another class".to_string(),
                span: base_name.span,
            });
            return;
        }

        let base = match self.lookup_type(base_name, &path.namespace) {
            Some(entry) if matches!(entry.decl.kind, TypeDeclKind::Class(_)) => entry.path.clone(),
            Some(entry) => {
                let base = entry.path.dotted();
                self.error(GenerationError::InvalidBase {
                    path: path.dotted(),
                    base,
                    reason: "base type must be a class".to_string(),
                    span: base_name.span,
                });
                return;
            }
            None => {
                self.error(GenerationError::InvalidBase {
                    path: path.dotted(),
                    base: base_name.dotted(),
                    reason: "base class is not declared in this assembly".to_string(),
                    span: base_name.span,
                });
                return;
            }
        };

        match self.model.class(&base) {
            None => {
                self.error(GenerationError::InvalidBase {
                    path: path.dotted(),
                    base: base.dotted(),
                    reason: "base class is not exposed".to_string(),
                    span: base_name.span,
                });
                return;
            }
            Some(class) if class.is_static => {
                self.error(GenerationError::InvalidBase {
                    path: path.dotted(),
                    base: base.dotted(),
                    reason: "static classes cannot be derived from".to_string(),
                    span: base_name.span,
                });
                return;
            }
            Some(_) => {}
        }

        if self.model.is_assignable(&base, &path) {
            self.error(GenerationError::InvalidBase {
                path: path.dotted(),
                base: base.dotted(),
                reason: "circular inheritance".to_string(),
                span: base_name.span,
            });
            return;
        }

        if let Some(class) = self.model.class_mut(&path) {
            class.base = Some(base);
        }
    }

    fn bind_members(&mut self, index: usize) {
        let path = self.decls[index].path.clone();
        let decl = self.decls[index].decl;
        let TypeDeclKind::Class(body) = &decl.kind else {
            return;
        };
        if self.model.class(&path).is_none() {
            return;
        }

        let mut candidates = Vec::new();

        let declares_constructor = body
            .members
            .iter()
            .any(|m| matches!(m.kind, MemberKind::Constructor { .. }) && !m.is_static);
        if !declares_constructor && !decl.is_static {
            candidates.push(Candidate {
                native_member: "new".to_string(),
                member: ".ctor".to_string(),
                kind: FunctionKind::Constructor,
                is_static: false,
                params: &[],
                setter_param: None,
                return_type: None,
                span: decl.span,
            });
        }

        for member in &body.members {
            if member.visibility != Visibility::Public {
                continue;
            }
            match &member.kind {
                MemberKind::Constructor { params } => {
                    if member.is_static {
                        continue;
                    }
                    candidates.push(Candidate {
                        native_member: "new".to_string(),
                        member: ".ctor".to_string(),
                        kind: FunctionKind::Constructor,
                        is_static: false,
                        params,
                        setter_param: None,
                        return_type: None,
                        span: member.span,
                    });
                }
                MemberKind::Method { params, return_type } => {
                    candidates.push(Candidate {
                        native_member: member.name.clone(),
                        member: member.name.clone(),
                        kind: FunctionKind::Method,
                        is_static: member.is_static,
                        params,
                        setter_param: None,
                        return_type: Some(return_type),
                        span: member.span,
                    });
                }
                MemberKind::Property { ty, getter, setter } => {
                    if let Some(accessor) = getter.as_ref().filter(|a| a.visibility == Visibility::Public) {
                        let name = format!("get_{}", member.name);
                        candidates.push(Candidate {
                            native_member: name.clone(),
                            member: name,
                            kind: FunctionKind::Getter {
                                property: member.name.clone(),
                            },
                            is_static: member.is_static,
                            params: &[],
                            setter_param: None,
                            return_type: Some(ty),
                            span: member.span.merge(accessor.span),
                        });
                    }
                    if let Some(accessor) = setter.as_ref().filter(|a| a.visibility == Visibility::Public) {
                        let name = format!("set_{}", member.name);
                        candidates.push(Candidate {
                            native_member: name.clone(),
                            member: name,
                            kind: FunctionKind::Setter {
                                property: member.name.clone(),
                            },
                            is_static: member.is_static,
                            params: &[],
                            setter_param: Some(ty),
                            return_type: None,
                            span: member.span.merge(accessor.span),
                        });
                    }
                }
            }
        }

        // Ordinals follow declaration order and are fixed before any type is
        // resolved, so a member that fails to bind never renames the others.
        let mut ordinals: HashMap<String, usize> = HashMap::new();
        for candidate in candidates {
            let counter = ordinals.entry(candidate.native_member.clone()).or_insert(0);
            let ordinal = *counter;
            *counter += 1;

            match self.bind_function(&path, &candidate, ordinal) {
                Ok(function) => self.export(function),
                Err(error) => self.error(error),
            }
        }
    }

    fn bind_function(
        &self,
        owner: &TypePath,
        candidate: &Candidate<'_>,
        ordinal: usize,
    ) -> Result<NativeFunction, GenerationError> {
        let label = format!("{}::{}", owner, candidate.member);
        let owner_is_static = self.model.class(owner).map_or(false, |class| class.is_static);
        if owner_is_static && !candidate.is_static {
            return Err(GenerationError::StaticClassMember {
                member: label,
                path: owner.dotted(),
                span: candidate.span,
            });
        }
        let mut params = Vec::new();

        for param in candidate.params {
            let direction = match param.modifier {
                ParamModifier::None | ParamModifier::In => Direction::In,
                ParamModifier::Out => Direction::Out,
                ParamModifier::Ref => Direction::Ref,
            };
            let ty = self.resolve_value_type(&param.ty, &owner.namespace, &label, param.span)?;
            if direction.is_by_ref() && matches!(ty, ManagedType::Array(_)) {
                return Err(GenerationError::UnsupportedType {
                    member: label,
                    ty: param.ty.to_string(),
                    reason: "out and ref arrays are not supported".to_string(),
                    span: param.span,
                });
            }
            params.push(BoundParam {
                name: param.name.clone(),
                ty,
                direction,
            });
        }

        if let Some(ty) = candidate.setter_param {
            params.push(BoundParam {
                name: "value".to_string(),
                ty: self.resolve_value_type(ty, &owner.namespace, &label, candidate.span)?,
                direction: Direction::In,
            });
        }

        let return_type = match (&candidate.kind, candidate.return_type) {
            (FunctionKind::Constructor, _) => ManagedType::Object(owner.clone()),
            (_, None) | (_, Some(Type::Void)) => ManagedType::Void,
            (_, Some(ty)) => self.resolve_value_type(ty, &owner.namespace, &label, candidate.span)?,
        };

        let symbol = naming::member_symbol(owner, &candidate.native_member, ordinal);
        if let Err(reason) = naming::check_identifier(&symbol) {
            return Err(GenerationError::InvalidIdentifier {
                identifier: symbol,
                member: label,
                reason: reason.to_string(),
                span: candidate.span,
            });
        }

        Ok(NativeFunction {
            symbol,
            owner: owner.clone(),
            member: candidate.member.clone(),
            kind: candidate.kind.clone(),
            is_static: candidate.is_static,
            ordinal,
            params,
            return_type,
            span: candidate.span,
        })
    }

    /// Claims the function symbol and every array typedef it needs, all or nothing.
    fn export(&mut self, function: NativeFunction) {
        let label = format!("{}::{}", function.owner, function.member);
        let owner = SymbolOwner::new(
            format!("fn:{}#{}", label, function.ordinal),
            format!("'{}'", label),
        );

        let mut claims = vec![(function.symbol.clone(), owner)];
        let types = function
            .params
            .iter()
            .map(|p| &p.ty)
            .chain(std::iter::once(&function.return_type));
        for ty in types {
            if let Some(element) = ty.array_element() {
                claims.push((
                    naming::array_typedef(element),
                    SymbolOwner::new(format!("array:{}", element), format!("array typedef of '{}'", element)),
                ));
            }
        }

        for (symbol, owner) in &claims {
            if let Err(existing) = self.symbols.check(symbol, owner) {
                self.error(GenerationError::NameCollision {
                    symbol: symbol.clone(),
                    member: format!("'{}'", label),
                    existing: existing.description,
                    span: function.span,
                });
                return;
            }
        }
        for (symbol, owner) in claims {
            let _ = self.symbols.register(&symbol, owner);
        }

        debug!(symbol = %function.symbol, signature = %function.managed_signature(), "bound function");
        self.model.push_function(function);
    }

    /// Validates and claims a type-level name. Returns false if it was rejected.
    fn claim(&mut self, symbol: &str, key: &str, description: &str, span: Span) -> bool {
        if let Err(reason) = naming::check_identifier(symbol) {
            self.error(GenerationError::InvalidIdentifier {
                identifier: symbol.to_string(),
                member: description.to_string(),
                reason: reason.to_string(),
                span,
            });
            return false;
        }
        match self.symbols.register(symbol, SymbolOwner::new(key, description)) {
            Ok(()) => true,
            Err(existing) => {
                self.error(GenerationError::NameCollision {
                    symbol: symbol.to_string(),
                    member: description.to_string(),
                    existing: existing.description,
                    span,
                });
                false
            }
        }
    }

    fn lookup_type(&self, name: &TypeName, scope: &[String]) -> Option<&DeclEntry<'a>> {
        for depth in (0..=scope.len()).rev() {
            let mut segments: Vec<&str> = scope[..depth].iter().map(String::as_str).collect();
            segments.extend(name.segments.iter().map(String::as_str));
            if let Some(&index) = self.lookup.get(&segments.join(".")) {
                return Some(&self.decls[index]);
            }
        }
        None
    }

    /// Resolves a parameter, property or return type. `void` is rejected here;
    /// callers handle `void` returns before calling.
    fn resolve_value_type(
        &self,
        ty: &Type,
        scope: &[String],
        member: &str,
        span: Span,
    ) -> Result<ManagedType, GenerationError> {
        let unsupported = |reason: &str| GenerationError::UnsupportedType {
            member: member.to_string(),
            ty: ty.to_string(),
            reason: reason.to_string(),
            span,
        };

        match ty {
            Type::Void => Err(unsupported("'void' is only valid as a return type")),
            Type::Primitive(kind) => Ok(ManagedType::Primitive(*kind)),
            Type::String => Ok(ManagedType::String),
            Type::Array(element) => match **element {
                Type::Array(_) => Err(unsupported("jagged arrays are not supported")),
                _ => {
                    let element = self.resolve_value_type(element, scope, member, span)?;
                    Ok(ManagedType::Array(Box::new(element)))
                }
            },
            Type::Generic(..) => Err(unsupported("generic types are not supported")),
            Type::Nullable(_) => Err(unsupported("nullable types are not supported")),
            Type::Named(name) => {
                if UNBINDABLE_BUILTINS.contains(&name.dotted().as_str()) {
                    return Err(unsupported("no native representation"));
                }

                let Some(entry) = self.lookup_type(name, scope) else {
                    let dotted = name.dotted();
                    let simple_names = self.decls.iter().map(|d| d.path.name.as_str());
                    let full_names: Vec<String> = self.decls.iter().map(|d| d.path.dotted()).collect();
                    let suggestion = m2n_diags::suggest(
                        &dotted,
                        simple_names.chain(full_names.iter().map(String::as_str)),
                    );
                    return Err(GenerationError::UnknownType {
                        member: member.to_string(),
                        name: dotted,
                        suggestion,
                        span,
                    });
                };

                if entry.decl.visibility != Visibility::Public {
                    return Err(unsupported("type is not public"));
                }

                match entry.decl.kind {
                    TypeDeclKind::Enum(_) if self.model.enumeration(&entry.path).is_some() => {
                        Ok(ManagedType::Enum(entry.path.clone()))
                    }
                    TypeDeclKind::Class(_) => match self.model.class(&entry.path) {
                        Some(class) if class.is_static => Err(unsupported("static classes cannot be used as values")),
                        Some(_) => Ok(ManagedType::Object(entry.path.clone())),
                        None => Err(unsupported("the type itself could not be bound")),
                    },
                    TypeDeclKind::Struct(_) => Err(unsupported("value types are not supported")),
                    _ => Err(unsupported("the type itself could not be bound")),
                }
            }
        }
    }
}

fn evaluate(expr: &EnumExpr, values: &HashMap<&str, i128>) -> Result<i128, String> {
    match expr {
        EnumExpr::Literal(value, _) => Ok(i128::from(*value)),
        EnumExpr::Item(name, _) => values
            .get(name.as_str())
            .copied()
            .ok_or_else(|| format!("unknown item '{}'", name)),
        EnumExpr::Negate(operand, _) => Ok(-evaluate(operand, values)?),
        EnumExpr::ShiftLeft(lhs, rhs) => {
            let value = evaluate(lhs, values)?;
            let shift = evaluate(rhs, values)?;
            if !(0..64).contains(&shift) {
                return Err(format!("shift amount {} is out of range", shift));
            }
            value
                .checked_mul(1i128 << shift)
                .ok_or_else(|| "shift overflows".to_string())
        }
        EnumExpr::BitOr(lhs, rhs) => Ok(evaluate(lhs, values)? | evaluate(rhs, values)?),
    }
}
