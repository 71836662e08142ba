use crate::errors::ManagedFailure;
use crate::types::{FromManaged, ManagedValue, ObjectRef};
use m2n_hir::NativeFunction;
use std::collections::HashMap;

/// Managed behaviour registered for one member signature.
pub type Implementation = Box<dyn Fn(&mut CallContext<'_>) -> Result<ManagedValue, ManagedFailure>>;

/// Static fields, keyed by dotted class path and then field name.
pub type StaticStorage = HashMap<String, HashMap<String, ManagedValue>>;

/// What a managed implementation sees of the call.
///
/// Arguments are indexed by managed parameter position; the receiver is not
/// one of them. Out and ref results are reported with [`CallContext::set_arg`].
pub struct CallContext<'a> {
    function: &'a NativeFunction,
    this: Option<ObjectRef>,
    args: Vec<ManagedValue>,
    statics: &'a mut StaticStorage,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        function: &'a NativeFunction,
        this: Option<ObjectRef>,
        args: Vec<ManagedValue>,
        statics: &'a mut StaticStorage,
    ) -> Self {
        Self {
            function,
            this,
            args,
            statics,
        }
    }

    pub fn function(&self) -> &NativeFunction {
        self.function
    }

    pub fn arg(&self, index: usize) -> Result<&ManagedValue, ManagedFailure> {
        self.args.get(index).ok_or(ManagedFailure::ArgumentIndex(index))
    }

    pub fn arg_as<T: FromManaged>(&self, index: usize) -> Result<T, ManagedFailure> {
        T::from_managed(self.arg(index)?).ok_or(ManagedFailure::ArgumentType {
            index,
            expected: T::EXPECTED,
        })
    }

    pub fn set_arg(&mut self, index: usize, value: impl Into<ManagedValue>) -> Result<(), ManagedFailure> {
        let slot = self.args.get_mut(index).ok_or(ManagedFailure::ArgumentIndex(index))?;
        *slot = value.into();
        Ok(())
    }

    pub fn this(&self) -> Result<&ObjectRef, ManagedFailure> {
        self.this.as_ref().ok_or(ManagedFailure::NoInstance)
    }

    pub fn field(&self, name: &str) -> Result<Option<ManagedValue>, ManagedFailure> {
        Ok(self.this()?.field(name))
    }

    pub fn set_field(&self, name: &str, value: impl Into<ManagedValue>) -> Result<(), ManagedFailure> {
        self.this()?.set_field(name, value.into());
        Ok(())
    }

    /// Allocates a fresh instance of the member's own class, e.g. for static factories.
    pub fn new_instance(&self) -> ObjectRef {
        ObjectRef::new(&self.function.owner)
    }

    pub fn static_field(&self, name: &str) -> Option<ManagedValue> {
        self.statics
            .get(&self.function.owner.dotted())
            .and_then(|fields| fields.get(name))
            .cloned()
    }

    pub fn set_static_field(&mut self, name: &str, value: impl Into<ManagedValue>) {
        self.statics
            .entry(self.function.owner.dotted())
            .or_default()
            .insert(name.to_string(), value.into());
    }

    pub(crate) fn into_parts(self) -> (Option<ObjectRef>, Vec<ManagedValue>) {
        (self.this, self.args)
    }
}
