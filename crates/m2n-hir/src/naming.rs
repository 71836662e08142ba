//! Flat native names for managed members.
//!
//! Every name is `join("_", namespace..., Type, Member[, ordinal])`. Names are
//! registered in one [`SymbolTable`] per assembly so that two managed members
//! can never end up behind the same native identifier.

use crate::model::{ManagedType, TypePath};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

pub const SEPARATOR: &str = "_";

lazy_static! {
    static ref C_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

const C_KEYWORDS: &[&str] = &[
    "auto", "bool", "break", "case", "char", "const", "continue", "default", "do", "double",
    "else", "enum", "extern", "false", "float", "for", "goto", "if", "inline", "int", "long",
    "register", "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch",
    "true", "typedef", "union", "unsigned", "void", "volatile", "while", "_Alignas", "_Alignof",
    "_Atomic", "_Bool", "_Complex", "_Generic", "_Imaginary", "_Noreturn", "_Static_assert",
    "_Thread_local",
];

/// Reserved in C++ but not in C. Generated headers are also consumed from C++.
const CPP_KEYWORDS: &[&str] = &[
    "alignas", "alignof", "and", "and_eq", "asm", "bitand", "bitor", "catch", "char8_t",
    "char16_t", "char32_t", "class", "compl", "concept", "consteval", "constexpr", "constinit",
    "const_cast", "co_await", "co_return", "co_yield", "decltype", "delete", "dynamic_cast",
    "explicit", "export", "friend", "mutable", "namespace", "new", "noexcept", "not", "not_eq",
    "nullptr", "operator", "or", "or_eq", "private", "protected", "public", "reinterpret_cast",
    "requires", "static_assert", "static_cast", "template", "this", "thread_local", "throw",
    "try", "typeid", "typename", "using", "virtual", "wchar_t", "xor", "xor_eq",
];

/// Native name of a handle or enum typedef.
pub fn type_symbol(path: &TypePath) -> String {
    path.segments().collect::<Vec<_>>().join(SEPARATOR)
}

/// Native name of a member. Ordinal 0 carries no suffix.
pub fn member_symbol(path: &TypePath, member: &str, ordinal: usize) -> String {
    let mut symbol = format!("{}{}{}", type_symbol(path), SEPARATOR, member);
    if ordinal > 0 {
        symbol.push_str(SEPARATOR);
        symbol.push_str(&ordinal.to_string());
    }
    symbol
}

pub fn enum_item_symbol(path: &TypePath, item: &str) -> String {
    format!("{}{}{}", type_symbol(path), SEPARATOR, item)
}

/// Typedef wrapping a native array of `element`, e.g. `_Int32Array`.
pub fn array_typedef(element: &ManagedType) -> String {
    let stem = match element {
        ManagedType::Primitive(kind) => kind.clr_name().to_string(),
        ManagedType::String => "String".to_string(),
        ManagedType::Enum(path) | ManagedType::Object(path) => type_symbol(path),
        ManagedType::Void => "Void".to_string(),
        ManagedType::Array(inner) => array_typedef(inner),
    };
    format!("_{}Array", stem)
}

pub fn is_c_keyword(name: &str) -> bool {
    C_KEYWORDS.contains(&name)
}

pub fn is_cpp_keyword(name: &str) -> bool {
    CPP_KEYWORDS.contains(&name)
}

/// Checks that `name` can be emitted as a C identifier. Returns the reason if not.
pub fn check_identifier(name: &str) -> Result<(), &'static str> {
    if !C_IDENTIFIER.is_match(name) {
        return Err("not a valid C identifier");
    }
    if is_c_keyword(name) {
        return Err("reserved C keyword");
    }
    if is_cpp_keyword(name) {
        return Err("reserved C++ keyword");
    }
    if name.starts_with("__") {
        return Err("names starting with '__' are reserved for generated code");
    }
    if name.starts_with("m2n_") || name.starts_with("M2n") || name.starts_with("M2N_") {
        return Err("the m2n prefix is reserved for the runtime");
    }
    Ok(())
}

/// Who claimed a native name. Re-registering with the same key is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolOwner {
    pub key: String,
    pub description: String,
}

impl SymbolOwner {
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: HashMap<String, SymbolOwner>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current owner if `symbol` is already taken by someone else.
    pub fn check(&self, symbol: &str, owner: &SymbolOwner) -> Result<(), SymbolOwner> {
        match self.entries.get(symbol) {
            Some(existing) if existing.key != owner.key => Err(existing.clone()),
            _ => Ok(()),
        }
    }

    pub fn register(&mut self, symbol: &str, owner: SymbolOwner) -> Result<(), SymbolOwner> {
        self.check(symbol, &owner)?;
        self.entries.entry(symbol.to_string()).or_insert(owner);
        Ok(())
    }

    pub fn owner(&self, symbol: &str) -> Option<&SymbolOwner> {
        self.entries.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
