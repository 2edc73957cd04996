use crate::native::{from_native_string, AttributeKey, Borrowed, HandleKind};
use crate::utils::errors::{KeychainError, Result};

/// Typed view over one search result dictionary.
#[derive(Debug, Clone, Copy)]
pub struct AttributeRecord<'src, 's> {
    dictionary: Borrowed<'src, 's>,
}

impl<'src, 's> AttributeRecord<'src, 's> {
    pub fn new(entry: Borrowed<'src, 's>) -> Result<Self> {
        if entry.kind() != HandleKind::Dictionary {
            return Err(KeychainError::Extraction(format!(
                "search result entry {:?} is not a dictionary",
                entry.raw()
            )));
        }
        Ok(Self { dictionary: entry })
    }

    /// The item's label.
    pub fn label(&self) -> Result<String> {
        from_native_string(self.value(AttributeKey::Label)?)
    }

    /// The identity the entry describes, borrowed from the result set.
    pub fn value_ref(&self) -> Result<Borrowed<'src, 's>> {
        let value = self.value(AttributeKey::ValueRef)?;
        if value.kind() != HandleKind::Identity {
            return Err(KeychainError::Extraction(format!(
                "attribute '{}' is not an identity",
                AttributeKey::ValueRef
            )));
        }
        Ok(value)
    }

    fn value(&self, key: AttributeKey) -> Result<Borrowed<'src, 's>> {
        self.dictionary
            .dictionary_get(key)
            .ok_or_else(|| KeychainError::Extraction(format!("attribute '{key}' is missing")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keychain::query::identity_search_criteria;
    use crate::native::{FakeKeychain, NativeStore, Owned};

    const DER: &[u8] = include_bytes!("../../tests/fixtures/test_cert.der");

    #[test]
    fn test_reads_label_and_reference() {
        let store = FakeKeychain::new().with_identity("Apple Development: Jo", DER);
        let results = Owned::adopt(&store, store.copy_matching(&identity_search_criteria()).unwrap());
        let record = AttributeRecord::new(results.borrow().array_get(0).unwrap()).unwrap();

        assert_eq!(record.label().unwrap(), "Apple Development: Jo");
        assert_eq!(record.value_ref().unwrap().kind(), HandleKind::Identity);
    }

    #[test]
    fn test_missing_key_is_typed_error() {
        let store = FakeKeychain::new().with_reference_missing("No ref");
        let results = Owned::adopt(&store, store.copy_matching(&identity_search_criteria()).unwrap());
        let record = AttributeRecord::new(results.borrow().array_get(0).unwrap()).unwrap();

        let err = record.value_ref().unwrap_err();
        assert!(matches!(err, KeychainError::Extraction(ref msg) if msg.contains("v_Ref")));
    }

    #[test]
    fn test_non_dictionary_entry_rejected() {
        let store = FakeKeychain::new();
        let text = Owned::adopt(&store, store.create_string("not a dictionary").unwrap());

        assert!(AttributeRecord::new(text.borrow()).is_err());
    }
}
