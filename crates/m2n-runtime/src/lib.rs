#[cfg(test)]
mod tests;

pub mod dispatch;
pub mod errors;
pub mod ffi;
pub mod heap;
pub mod marshal;
pub mod native;
pub mod runtime;
pub mod types;

pub use dispatch::{CallContext, Implementation};
pub use errors::{CallError, ConversionError, ManagedFailure};
pub use heap::{Handle, HandleTable};
pub use marshal::{default_value, native_kind, Marshaler};
pub use native::{ElementKind, NativeArray, NativeElement, NativeString, NativeValue};
pub use runtime::Runtime;
pub use types::{EnumValue, FromManaged, ManagedArray, ManagedObject, ManagedString, ManagedValue, ObjectRef};
