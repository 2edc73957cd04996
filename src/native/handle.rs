use super::{AttributeKey, HandleKind, NativeStore, RawHandle};
use std::fmt;
use std::marker::PhantomData;

/// A native object this code is responsible for releasing.
///
/// Release happens exactly once, when the guard is dropped.
pub struct Owned<'s> {
    store: &'s dyn NativeStore,
    raw: RawHandle,
}

impl<'s> Owned<'s> {
    /// Takes over a +1 handle returned by a native create or copy call.
    pub fn adopt(store: &'s dyn NativeStore, raw: RawHandle) -> Self {
        tracing::trace!("Adopting native handle {:?}", raw);
        Self { store, raw }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn kind(&self) -> HandleKind {
        self.store.kind_of(self.raw)
    }

    /// Non-owning view that cannot outlive this guard.
    pub fn borrow(&self) -> Borrowed<'_, 's> {
        Borrowed {
            store: self.store,
            raw: self.raw,
            _source: PhantomData,
        }
    }
}

impl Drop for Owned<'_> {
    fn drop(&mut self) {
        tracing::trace!("Releasing native handle {:?}", self.raw);
        self.store.release(self.raw);
    }
}

impl fmt::Debug for Owned<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owned").field(&self.raw).finish()
    }
}

/// A native object owned by some container.
///
/// `'src` is the lifetime of the container (an [`Owned`] array, dictionary or
/// identity); `'s` is the lifetime of the store, which is what a retained copy
/// is tied to.
#[derive(Clone, Copy)]
pub struct Borrowed<'src, 's> {
    store: &'s dyn NativeStore,
    raw: RawHandle,
    _source: PhantomData<&'src ()>,
}

impl<'src, 's> Borrowed<'src, 's> {
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn store(&self) -> &'s dyn NativeStore {
        self.store
    }

    pub fn kind(&self) -> HandleKind {
        self.store.kind_of(self.raw)
    }

    /// Promotes to an owned handle that survives the source container.
    pub fn retain(&self) -> Owned<'s> {
        let raw = self.store.retain(self.raw);
        tracing::trace!("Retained native handle {:?}", raw);
        Owned {
            store: self.store,
            raw,
        }
    }

    pub fn array_len(&self) -> usize {
        self.store.array_len(self.raw)
    }

    /// Array element, borrowed from the same source as the array.
    pub fn array_get(&self, index: usize) -> Option<Borrowed<'src, 's>> {
        self.store
            .array_get(self.raw, index)
            .map(|raw| self.child(raw))
    }

    /// Dictionary value, borrowed from the same source as the dictionary.
    pub fn dictionary_get(&self, key: AttributeKey) -> Option<Borrowed<'src, 's>> {
        self.store
            .dictionary_get(self.raw, key)
            .map(|raw| self.child(raw))
    }

    /// Copies the contents of a data object out of native memory.
    pub fn data_bytes(&self) -> Vec<u8> {
        self.store.data_bytes(self.raw)
    }

    fn child(&self, raw: RawHandle) -> Borrowed<'src, 's> {
        Borrowed {
            store: self.store,
            raw,
            _source: PhantomData,
        }
    }
}

impl fmt::Debug for Borrowed<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Borrowed").field(&self.raw).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::FakeKeychain;

    const DER: &[u8] = include_bytes!("../../tests/fixtures/test_cert.der");

    #[test]
    fn test_owned_releases_once_on_drop() {
        let store = FakeKeychain::new();
        let raw = store.create_string("hello").unwrap();
        {
            let owned = Owned::adopt(&store, raw);
            assert_eq!(owned.kind(), HandleKind::String);
        }

        assert_eq!(store.stats().acquired, 1);
        assert_eq!(store.stats().released, 1);
        assert_eq!(store.stats().double_releases, 0);
    }

    #[test]
    fn test_retained_child_outlives_container() {
        let store = FakeKeychain::new().with_identity("Signing", DER);
        let criteria = crate::keychain::query::identity_search_criteria();

        let identity = {
            let results = Owned::adopt(&store, store.copy_matching(&criteria).unwrap());
            let entry = results.borrow().array_get(0).unwrap();
            let value = entry.dictionary_get(AttributeKey::ValueRef).unwrap();
            value.retain()
        };

        // The result array is gone but the identity is still alive.
        assert_eq!(identity.kind(), HandleKind::Identity);
        drop(identity);
        assert!(store.is_balanced());
    }
}
