use crate::types::ObjectRef;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Opaque token standing in for a managed object on the native side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroUsize);

impl Handle {
    pub fn raw(self) -> usize {
        self.0.get()
    }

    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Handle)
    }
}

/// Roots every object that has been handed to native code.
///
/// Slots are never released: a handle stays valid for the lifetime of the
/// table, and the same object always maps to the same handle.
#[derive(Debug, Default)]
pub struct HandleTable {
    slots: Vec<ObjectRef>,
    by_address: HashMap<usize, Handle>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&mut self, object: &ObjectRef) -> Handle {
        let address = object.address();
        if let Some(&handle) = self.by_address.get(&address) {
            return handle;
        }

        let handle = Handle(NonZeroUsize::MIN.saturating_add(self.slots.len()));
        self.slots.push(object.clone());
        self.by_address.insert(address, handle);
        handle
    }

    pub fn resolve(&self, handle: Handle) -> Option<&ObjectRef> {
        self.slots.get(handle.raw() - 1)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
