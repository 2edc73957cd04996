use super::{Borrowed, HandleKind, NativeStore, Owned};
use crate::utils::errors::{KeychainError, Result};

/// Build a native string object from UTF-8 text.
pub fn to_native_string<'s>(store: &'s dyn NativeStore, text: &str) -> Result<Owned<'s>> {
    store
        .create_string(text)
        .map(|raw| Owned::adopt(store, raw))
        .ok_or_else(|| {
            KeychainError::Conversion(format!("failed to create native string from {text:?}"))
        })
}

/// Copy a native string object into a host string.
///
/// The native length is counted in encoding units, not bytes, so the buffer is
/// sized from the worst-case UTF-8 expansion of that length plus a terminator.
pub fn from_native_string(handle: Borrowed<'_, '_>) -> Result<String> {
    if handle.kind() != HandleKind::String {
        return Err(KeychainError::Conversion(format!(
            "value {:?} is not a string",
            handle.raw()
        )));
    }

    let store = handle.store();
    let length = store.string_length(handle.raw());
    let capacity = store.max_encoded_len(length) + 1;
    tracing::trace!("String length {length}, buffer capacity {capacity}");

    let mut buffer = vec![0u8; capacity];
    if !store.copy_string_into(handle.raw(), &mut buffer) {
        return Err(KeychainError::Conversion(
            "failed to copy native string into buffer".to_string(),
        ));
    }

    let end = buffer.iter().position(|b| *b == 0).unwrap_or(buffer.len());
    buffer.truncate(end);

    String::from_utf8(buffer)
        .map_err(|e| KeychainError::Conversion(format!("native string is not valid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::FakeKeychain;

    #[test]
    fn test_string_round_trip_multibyte() {
        let store = FakeKeychain::new();
        let text = "Developer: Zoë Ångström 🔑";

        let native = to_native_string(&store, text).unwrap();
        assert_eq!(from_native_string(native.borrow()).unwrap(), text);

        drop(native);
        assert!(store.is_balanced());
    }

    #[test]
    fn test_empty_string() {
        let store = FakeKeychain::new();
        let native = to_native_string(&store, "").unwrap();
        assert_eq!(from_native_string(native.borrow()).unwrap(), "");
    }

    #[test]
    fn test_non_string_is_conversion_error() {
        let store = FakeKeychain::new();
        let array = Owned::adopt(&store, store.create_array(&[]).unwrap());

        let err = from_native_string(array.borrow()).unwrap_err();
        assert!(matches!(err, KeychainError::Conversion(_)));
    }
}
