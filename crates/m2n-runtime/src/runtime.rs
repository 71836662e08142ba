use crate::dispatch::{CallContext, Implementation, StaticStorage};
use crate::errors::{CallError, ConversionError, ManagedFailure};
use crate::heap::HandleTable;
use crate::marshal::{default_value, Marshaler};
use crate::native::NativeValue;
use crate::types::{ManagedValue, ObjectRef};
use m2n_hir::{BindingModel, Direction, FunctionKind, ManagedType, NativeFunction};
use std::collections::HashMap;
use tracing::{debug, warn};

/// The managed side of the bindings: object storage, handles and dispatch.
pub struct Runtime {
    model: BindingModel,
    handles: HandleTable,
    implementations: HashMap<String, Implementation>,
    statics: StaticStorage,
}

impl Runtime {
    pub fn new(model: BindingModel) -> Self {
        Self {
            model,
            handles: HandleTable::new(),
            implementations: HashMap::new(),
            statics: HashMap::new(),
        }
    }

    pub fn model(&self) -> &BindingModel {
        &self.model
    }

    /// Registers the behaviour of `type_path`'s member with the given managed
    /// signature, e.g. `("BuiltinTypes", "PassRefInt(ref int)")`.
    /// Constructors use `.ctor(...)`.
    pub fn define<F>(&mut self, type_path: &str, signature: &str, implementation: F) -> &mut Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<ManagedValue, ManagedFailure> + 'static,
    {
        let known = self
            .model
            .functions
            .iter()
            .any(|f| f.owner.dotted() == type_path && f.managed_signature() == signature);
        if !known {
            warn!(type_path, signature, "no bound function has this signature");
        }
        self.implementations
            .insert(dispatch_key(type_path, signature), Box::new(implementation));
        self
    }

    /// Sets a static field, e.g. the backing value of a static auto-property.
    pub fn set_static(&mut self, type_path: &str, name: &str, value: impl Into<ManagedValue>) -> &mut Self {
        self.statics
            .entry(type_path.to_string())
            .or_default()
            .insert(name.to_string(), value.into());
        self
    }

    /// Calls the native function `symbol`.
    ///
    /// Out and ref slots in `args` are only written once the call and every
    /// conversion succeeded; on error they keep their previous contents.
    pub fn invoke(&mut self, symbol: &str, args: &mut [NativeValue]) -> Result<NativeValue, CallError> {
        let function = self
            .model
            .function(symbol)
            .cloned()
            .ok_or_else(|| CallError::UnknownSymbol(symbol.to_string()))?;

        debug!(symbol, signature = %function.managed_signature(), "invoke");
        let result = self.invoke_function(&function, args);
        if let Err(error) = &result {
            warn!(symbol, %error, "call failed");
        }
        result
    }

    fn invoke_function(&mut self, function: &NativeFunction, args: &mut [NativeValue]) -> Result<NativeValue, CallError> {
        if args.len() != function.native_arity() {
            return Err(CallError::Arity {
                symbol: function.symbol.clone(),
                expected: function.native_arity(),
                found: args.len(),
            });
        }

        let conversion = |parameter: &str, source: ConversionError| CallError::Conversion {
            symbol: function.symbol.clone(),
            parameter: parameter.to_string(),
            source,
        };

        let (receiver, slots) = if function.takes_handle() {
            let (first, rest) = args.split_at_mut(1);
            (Some(&first[0]), rest)
        } else {
            (None, args)
        };

        let (this, managed_args) = {
            let marshaler = Marshaler::new(&self.model, &mut self.handles);

            let this = match receiver {
                None if function.kind == FunctionKind::Constructor => Some(ObjectRef::new(&function.owner)),
                None => None,
                Some(NativeValue::Handle(handle)) => Some(
                    marshaler
                        .resolve(*handle, &function.owner)
                        .map_err(|e| conversion("this", e))?,
                ),
                Some(NativeValue::Null) => {
                    return Err(conversion("this", ConversionError::NullNotAllowed(function.owner.dotted())))
                }
                Some(other) => {
                    return Err(conversion("this", ConversionError::mismatch(&function.owner, other.describe())))
                }
            };

            let mut managed_args = Vec::with_capacity(function.params.len());
            for (param, slot) in function.params.iter().zip(slots.iter()) {
                let value = match param.direction {
                    Direction::Out => default_value(&param.ty, &self.model),
                    Direction::In | Direction::Ref => marshaler
                        .to_managed(slot, &param.ty)
                        .map_err(|e| conversion(param.name.as_str(), e))?,
                };
                managed_args.push(value);
            }
            (this, managed_args)
        };

        let (result, this, final_args) = self.dispatch(function, this, managed_args)?;

        let mut marshaler = Marshaler::new(&self.model, &mut self.handles);
        let native_result = match (&function.kind, this) {
            (FunctionKind::Constructor, Some(object)) => marshaler
                .to_native(&ManagedValue::Object(object), &function.return_type)
                .map_err(|e| conversion("return", e))?,
            _ => marshaler
                .to_native(&result, &function.return_type)
                .map_err(|e| conversion("return", e))?,
        };

        let mut staged = Vec::new();
        for (index, param) in function.params.iter().enumerate() {
            if !param.direction.is_by_ref() {
                continue;
            }
            let value = final_args.get(index).cloned().unwrap_or(ManagedValue::Null);
            let native = marshaler
                .to_native(&value, &param.ty)
                .map_err(|e| conversion(param.name.as_str(), e))?;
            staged.push((index, native));
        }

        for (index, value) in staged {
            write_back(&mut slots[index], value);
        }

        Ok(native_result)
    }

    fn dispatch(
        &mut self,
        function: &NativeFunction,
        this: Option<ObjectRef>,
        args: Vec<ManagedValue>,
    ) -> Result<(ManagedValue, Option<ObjectRef>, Vec<ManagedValue>), CallError> {
        let key = dispatch_key(&function.owner.dotted(), &function.managed_signature());
        let managed = |source: ManagedFailure| CallError::Managed {
            symbol: function.symbol.clone(),
            source,
        };

        if let Some(implementation) = self.implementations.get(&key) {
            let mut ctx = CallContext::new(function, this, args, &mut self.statics);
            let result = implementation(&mut ctx).map_err(managed)?;
            let (this, args) = ctx.into_parts();
            return Ok((result, this, args));
        }

        let result = match &function.kind {
            FunctionKind::Constructor => ManagedValue::Null,
            FunctionKind::Getter { property } => {
                let stored = match &this {
                    Some(object) => object.field(property),
                    None if function.is_static => self
                        .statics
                        .get(&function.owner.dotted())
                        .and_then(|fields| fields.get(property))
                        .cloned(),
                    None => return Err(managed(ManagedFailure::NoInstance)),
                };
                stored.unwrap_or_else(|| default_value(&function.return_type, &self.model))
            }
            FunctionKind::Setter { property } => {
                let value = args.first().cloned().unwrap_or(ManagedValue::Null);
                match &this {
                    Some(object) => object.set_field(property.as_str(), value),
                    None if function.is_static => {
                        self.statics
                            .entry(function.owner.dotted())
                            .or_default()
                            .insert(property.clone(), value);
                    }
                    None => return Err(managed(ManagedFailure::NoInstance)),
                }
                ManagedValue::Null
            }
            FunctionKind::Method if is_to_string(function) => ManagedValue::from(function.owner.dotted()),
            FunctionKind::Method => {
                return Err(CallError::MissingImplementation {
                    symbol: function.symbol.clone(),
                    signature: function.managed_signature(),
                })
            }
        };
        Ok((result, this, args))
    }

    /// Bound functions with neither a registered implementation nor a fallback.
    pub fn unimplemented(&self) -> Vec<&NativeFunction> {
        self.model
            .functions
            .iter()
            .filter(|f| {
                f.kind == FunctionKind::Method
                    && !is_to_string(f)
                    && !self
                        .implementations
                        .contains_key(&dispatch_key(&f.owner.dotted(), &f.managed_signature()))
            })
            .collect()
    }

    pub fn resolve(&self, handle: crate::Handle) -> Option<&ObjectRef> {
        self.handles.resolve(handle)
    }

    pub fn live_handles(&self) -> usize {
        self.handles.len()
    }

    /// Forces a collection. Objects reachable from handles survive it.
    pub fn collect(&self) {
        gc::force_collect();
        debug!(handles = self.handles.len(), "collected managed heap");
    }
}

fn dispatch_key(type_path: &str, signature: &str) -> String {
    format!("{}::{}", type_path, signature)
}

fn is_to_string(function: &NativeFunction) -> bool {
    function.member == "ToString" && function.params.is_empty() && function.return_type == ManagedType::String
}

fn write_back(slot: &mut NativeValue, value: NativeValue) {
    match (slot, value) {
        (NativeValue::Text(buffer), NativeValue::Str(text)) => buffer.assign(text.as_bytes()),
        (NativeValue::Text(buffer), NativeValue::Null) => buffer.assign(b""),
        (slot, value) => *slot = value,
    }
}
