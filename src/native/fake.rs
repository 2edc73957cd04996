//! In-memory identity store with reference-count bookkeeping.
//!
//! `FakeKeychain` behaves like the native service closely enough to exercise
//! the ownership rules: every object carries a reference count, containers
//! hold references to their children, and every caller-visible acquire and
//! release is counted so tests can assert the two balance.

use super::{
    AttributeKey, ContainerFormat, ExportParameters, HandleKind, NativeStore, OsStatus, RawHandle,
    ERR_SEC_ITEM_NOT_FOUND, ERR_SEC_PARAM,
};
use crate::keychain::query::{ItemClass, QueryCriteria};
use std::cell::{Cell, RefCell};

/// Status returned when an identity has no readable certificate.
pub const FAKE_BROKEN_IDENTITY_STATUS: OsStatus = -26275;

/// Prefix of the bytes produced by a successful fake export.
pub const FAKE_EXPORT_MAGIC: &[u8] = b"FAKE-PKCS12";

#[derive(Debug, Clone)]
enum Object {
    String(String),
    Array(Vec<RawHandle>),
    Dictionary(Vec<(AttributeKey, RawHandle)>),
    Data(Vec<u8>),
    Identity(Result<RawHandle, OsStatus>),
    Certificate(Vec<u8>),
}

#[derive(Debug)]
struct Slot {
    object: Object,
    ref_count: usize,
}

/// Counters describing how the caller used the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FakeStats {
    /// Objects handed to the caller with +1 ownership, including retains.
    pub acquired: usize,
    pub released: usize,
    /// Releases of objects whose count was already zero.
    pub double_releases: usize,
    /// Every trait method invocation.
    pub native_calls: usize,
}

/// Snapshot of one bulk export call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportCall {
    pub format: ContainerFormat,
    pub item_count: usize,
    pub secure_passphrase: bool,
    pub passphrase: Option<String>,
    pub alert_prompt: Option<String>,
    pub pem_armour: bool,
}

#[derive(Debug, Default)]
pub struct FakeKeychain {
    slots: RefCell<Vec<Slot>>,
    entries: Vec<RawHandle>,
    stats: Cell<FakeStats>,
    exports: RefCell<Vec<ExportCall>>,
    search_failure: Option<OsStatus>,
    export_failure: Option<OsStatus>,
    empty_export: bool,
    empty_search_array: bool,
}

impl FakeKeychain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an identity whose certificate is the given DER encoding.
    pub fn with_identity(mut self, label: &str, certificate_der: &[u8]) -> Self {
        let certificate = self.insert(Object::Certificate(certificate_der.to_vec()));
        let identity = self.insert(Object::Identity(Ok(certificate)));
        self.push_entry(Some(label), Some(identity));
        self
    }

    /// Adds an identity whose certificate cannot be copied.
    pub fn with_broken_identity(mut self, label: &str) -> Self {
        let identity = self.insert(Object::Identity(Err(FAKE_BROKEN_IDENTITY_STATUS)));
        self.push_entry(Some(label), Some(identity));
        self
    }

    /// Adds a result entry without a label attribute.
    pub fn with_unlabelled_entry(mut self, certificate_der: &[u8]) -> Self {
        let certificate = self.insert(Object::Certificate(certificate_der.to_vec()));
        let identity = self.insert(Object::Identity(Ok(certificate)));
        self.push_entry(None, Some(identity));
        self
    }

    /// Adds a result entry with a label but no value reference.
    pub fn with_reference_missing(mut self, label: &str) -> Self {
        self.push_entry(Some(label), None);
        self
    }

    /// Make the search call fail with `status`.
    pub fn failing_search(mut self, status: OsStatus) -> Self {
        self.search_failure = Some(status);
        self
    }

    /// Make the bulk export call fail with `status`.
    pub fn failing_export(mut self, status: OsStatus) -> Self {
        self.export_failure = Some(status);
        self
    }

    /// Make the bulk export call succeed with zero bytes.
    pub fn empty_export(mut self) -> Self {
        self.empty_export = true;
        self
    }

    /// Report an empty result array instead of "item not found" when the
    /// store holds no identities.
    pub fn empty_search_array(mut self) -> Self {
        self.empty_search_array = true;
        self
    }

    pub fn stats(&self) -> FakeStats {
        self.stats.get()
    }

    /// Every object handed to the caller was released exactly once.
    pub fn is_balanced(&self) -> bool {
        let stats = self.stats();
        stats.acquired == stats.released && stats.double_releases == 0
    }

    pub fn exports(&self) -> Vec<ExportCall> {
        self.exports.borrow().clone()
    }

    pub fn ref_count(&self, raw: RawHandle) -> usize {
        self.slots
            .borrow()
            .get(Self::index(raw))
            .map_or(0, |slot| slot.ref_count)
    }

    /// Handles of the identities held by the store, in store order.
    pub fn identity_handles(&self) -> Vec<RawHandle> {
        self.entries
            .iter()
            .filter_map(|entry| self.dictionary_value(*entry, AttributeKey::ValueRef))
            .collect()
    }

    fn push_entry(&mut self, label: Option<&str>, identity: Option<RawHandle>) {
        let mut attributes = Vec::new();
        if let Some(label) = label {
            let label = self.insert(Object::String(label.to_string()));
            attributes.push((AttributeKey::Label, label));
        }
        if let Some(identity) = identity {
            attributes.push((AttributeKey::ValueRef, identity));
        }
        let entry = self.insert(Object::Dictionary(attributes));
        self.entries.push(entry);
    }

    fn insert(&self, object: Object) -> RawHandle {
        let mut slots = self.slots.borrow_mut();
        slots.push(Slot {
            object,
            ref_count: 1,
        });
        // Zero is never a valid handle.
        RawHandle::new(slots.len())
    }

    fn index(raw: RawHandle) -> usize {
        raw.addr().wrapping_sub(1)
    }

    fn object(&self, raw: RawHandle) -> Option<Object> {
        self.slots
            .borrow()
            .get(Self::index(raw))
            .filter(|slot| slot.ref_count > 0)
            .map(|slot| slot.object.clone())
    }

    fn dictionary_value(&self, dictionary: RawHandle, key: AttributeKey) -> Option<RawHandle> {
        match self.object(dictionary)? {
            Object::Dictionary(attributes) => attributes
                .iter()
                .find(|(candidate, _)| *candidate == key)
                .map(|(_, value)| *value),
            _ => None,
        }
    }

    fn update(&self, f: impl FnOnce(&mut FakeStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    fn call(&self) {
        self.update(|stats| stats.native_calls += 1);
    }

    fn acquire(&self, raw: RawHandle) -> RawHandle {
        self.update(|stats| stats.acquired += 1);
        raw
    }

    /// Container-held reference, not visible in the caller's counters.
    fn retain_internal(&self, raw: RawHandle) {
        if let Some(slot) = self.slots.borrow_mut().get_mut(Self::index(raw)) {
            slot.ref_count += 1;
        }
    }

    /// Drops one reference; returns false if the count was already zero.
    fn release_internal(&self, raw: RawHandle) -> bool {
        let children = {
            let mut slots = self.slots.borrow_mut();
            let Some(slot) = slots.get_mut(Self::index(raw)) else {
                return false;
            };
            if slot.ref_count == 0 {
                return false;
            }
            slot.ref_count -= 1;
            if slot.ref_count > 0 {
                return true;
            }
            match &slot.object {
                Object::Array(items) => items.clone(),
                Object::Dictionary(attributes) => attributes.iter().map(|(_, v)| *v).collect(),
                Object::Identity(Ok(certificate)) => vec![*certificate],
                _ => Vec::new(),
            }
        };

        for child in children {
            self.release_internal(child);
        }
        true
    }

    fn string_value(&self, raw: RawHandle) -> Option<String> {
        match self.object(raw)? {
            Object::String(text) => Some(text),
            _ => None,
        }
    }
}

impl NativeStore for FakeKeychain {
    fn retain(&self, raw: RawHandle) -> RawHandle {
        self.call();
        self.retain_internal(raw);
        self.acquire(raw)
    }

    fn release(&self, raw: RawHandle) {
        self.call();
        if self.release_internal(raw) {
            self.update(|stats| stats.released += 1);
        } else {
            tracing::error!("Double release of {:?}", raw);
            self.update(|stats| stats.double_releases += 1);
        }
    }

    fn kind_of(&self, raw: RawHandle) -> HandleKind {
        self.call();
        match self.object(raw) {
            Some(Object::String(_)) => HandleKind::String,
            Some(Object::Array(_)) => HandleKind::Array,
            Some(Object::Dictionary(_)) => HandleKind::Dictionary,
            Some(Object::Data(_)) => HandleKind::Data,
            Some(Object::Identity(_)) => HandleKind::Identity,
            Some(Object::Certificate(_)) => HandleKind::Certificate,
            None => HandleKind::Other,
        }
    }

    fn create_string(&self, text: &str) -> Option<RawHandle> {
        self.call();
        let raw = self.insert(Object::String(text.to_string()));
        Some(self.acquire(raw))
    }

    fn string_length(&self, string: RawHandle) -> usize {
        self.call();
        self.string_value(string)
            .map_or(0, |text| text.encode_utf16().count())
    }

    fn max_encoded_len(&self, length: usize) -> usize {
        self.call();
        length * 3
    }

    fn copy_string_into(&self, string: RawHandle, buffer: &mut [u8]) -> bool {
        self.call();
        let Some(text) = self.string_value(string) else {
            return false;
        };
        let bytes = text.as_bytes();
        if bytes.len() + 1 > buffer.len() {
            return false;
        }
        buffer[..bytes.len()].copy_from_slice(bytes);
        buffer[bytes.len()] = 0;
        true
    }

    fn array_len(&self, array: RawHandle) -> usize {
        self.call();
        match self.object(array) {
            Some(Object::Array(items)) => items.len(),
            _ => 0,
        }
    }

    fn array_get(&self, array: RawHandle, index: usize) -> Option<RawHandle> {
        self.call();
        match self.object(array)? {
            Object::Array(items) => items.get(index).copied(),
            _ => None,
        }
    }

    fn create_array(&self, items: &[RawHandle]) -> Option<RawHandle> {
        self.call();
        for item in items {
            self.retain_internal(*item);
        }
        let raw = self.insert(Object::Array(items.to_vec()));
        Some(self.acquire(raw))
    }

    fn dictionary_get(&self, dictionary: RawHandle, key: AttributeKey) -> Option<RawHandle> {
        self.call();
        self.dictionary_value(dictionary, key)
    }

    fn data_bytes(&self, data: RawHandle) -> Vec<u8> {
        self.call();
        match self.object(data) {
            Some(Object::Data(bytes)) => bytes,
            _ => Vec::new(),
        }
    }

    fn copy_matching(&self, criteria: &QueryCriteria) -> Result<RawHandle, OsStatus> {
        self.call();
        if criteria.item_class != ItemClass::Identity
            || !criteria.return_attributes
            || !criteria.return_reference
        {
            return Err(ERR_SEC_PARAM);
        }
        if let Some(status) = self.search_failure {
            return Err(status);
        }
        if self.entries.is_empty() && !self.empty_search_array {
            return Err(ERR_SEC_ITEM_NOT_FOUND);
        }

        let entries = criteria.match_limit.apply(&self.entries);
        for entry in entries {
            self.retain_internal(*entry);
        }
        let raw = self.insert(Object::Array(entries.to_vec()));
        Ok(self.acquire(raw))
    }

    fn copy_identity_certificate(&self, identity: RawHandle) -> Result<RawHandle, OsStatus> {
        self.call();
        match self.object(identity) {
            Some(Object::Identity(Ok(certificate))) => {
                self.retain_internal(certificate);
                Ok(self.acquire(certificate))
            }
            Some(Object::Identity(Err(status))) => Err(status),
            _ => Err(ERR_SEC_PARAM),
        }
    }

    fn copy_certificate_data(&self, certificate: RawHandle) -> Option<RawHandle> {
        self.call();
        match self.object(certificate)? {
            Object::Certificate(der) => {
                let raw = self.insert(Object::Data(der));
                Some(self.acquire(raw))
            }
            _ => None,
        }
    }

    fn export_items(
        &self,
        items: RawHandle,
        format: ContainerFormat,
        params: &ExportParameters,
    ) -> Result<RawHandle, OsStatus> {
        self.call();
        let Some(Object::Array(handles)) = self.object(items) else {
            return Err(ERR_SEC_PARAM);
        };
        if handles
            .iter()
            .any(|h| !matches!(self.object(*h), Some(Object::Identity(_))))
        {
            return Err(ERR_SEC_PARAM);
        }

        self.exports.borrow_mut().push(ExportCall {
            format,
            item_count: handles.len(),
            secure_passphrase: params.secure_passphrase,
            passphrase: params.passphrase.and_then(|raw| self.string_value(raw)),
            alert_prompt: params.alert_prompt.and_then(|raw| self.string_value(raw)),
            pem_armour: params.pem_armour,
        });

        if let Some(status) = self.export_failure {
            return Err(status);
        }

        let bytes = if self.empty_export {
            Vec::new()
        } else {
            let mut bytes = FAKE_EXPORT_MAGIC.to_vec();
            bytes.extend_from_slice(&(handles.len() as u32).to_be_bytes());
            bytes
        };
        let raw = self.insert(Object::Data(bytes));
        Ok(self.acquire(raw))
    }
}
