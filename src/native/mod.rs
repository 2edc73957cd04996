//! Native secure-storage seam.
//!
//! Everything this crate asks of the platform keychain goes through
//! [`NativeStore`]. Implementations hand out [`RawHandle`] tokens that carry no
//! ownership by themselves; callers wrap them in the guards from [`handle`] so
//! that every retained object is released exactly once.

pub mod fake;
pub mod handle;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod strings;

pub use fake::FakeKeychain;
pub use handle::{Borrowed, Owned};
#[cfg(target_os = "macos")]
pub use macos::MacKeychain;
pub use strings::{from_native_string, to_native_string};

use crate::keychain::query::QueryCriteria;
use std::fmt;

/// Status code returned by native keychain calls.
pub type OsStatus = i32;

pub const ERR_SEC_SUCCESS: OsStatus = 0;
pub const ERR_SEC_PARAM: OsStatus = -50;
pub const ERR_SEC_ALLOCATE: OsStatus = -108;
pub const ERR_SEC_ITEM_NOT_FOUND: OsStatus = -25300;

/// Opaque token naming one native object.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(usize);

impl RawHandle {
    /// Backends mint handles from object addresses; callers never fabricate them.
    pub fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle({:#x})", self.0)
    }
}

/// Runtime type of a native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    String,
    Array,
    Dictionary,
    Data,
    Identity,
    Certificate,
    Other,
}

/// Attribute keys read from a search result dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    Label,
    ValueRef,
}

impl AttributeKey {
    /// Native key name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Label => "labl",
            Self::ValueRef => "v_Ref",
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Container formats the bulk export call can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Pkcs12,
}

impl ContainerFormat {
    /// Whether the format cannot be written without some passphrase.
    pub fn requires_passphrase(&self) -> bool {
        match self {
            Self::Pkcs12 => true,
        }
    }
}

/// Key parameters passed to the bulk export call.
///
/// The string handles are borrowed from guards held by the caller for the
/// duration of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportParameters {
    /// Ask the native layer to prompt the user for the passphrase.
    pub secure_passphrase: bool,
    pub passphrase: Option<RawHandle>,
    pub alert_prompt: Option<RawHandle>,
    pub pem_armour: bool,
}

/// Operations the crate needs from the platform identity store.
///
/// Methods returning a handle from a `create_*` or `copy_*` call transfer
/// ownership to the caller (+1). Handles returned by `array_get` and
/// `dictionary_get` are borrowed from their container.
pub trait NativeStore {
    fn retain(&self, raw: RawHandle) -> RawHandle;
    fn release(&self, raw: RawHandle);
    fn kind_of(&self, raw: RawHandle) -> HandleKind;

    fn create_string(&self, text: &str) -> Option<RawHandle>;
    /// Length in native string units.
    fn string_length(&self, string: RawHandle) -> usize;
    /// Worst-case UTF-8 byte count for `length` native units.
    fn max_encoded_len(&self, length: usize) -> usize;
    /// Writes the NUL-terminated UTF-8 form into `buffer`.
    fn copy_string_into(&self, string: RawHandle, buffer: &mut [u8]) -> bool;

    fn array_len(&self, array: RawHandle) -> usize;
    fn array_get(&self, array: RawHandle, index: usize) -> Option<RawHandle>;
    fn create_array(&self, items: &[RawHandle]) -> Option<RawHandle>;

    fn dictionary_get(&self, dictionary: RawHandle, key: AttributeKey) -> Option<RawHandle>;
    fn data_bytes(&self, data: RawHandle) -> Vec<u8>;

    fn copy_matching(&self, criteria: &QueryCriteria) -> Result<RawHandle, OsStatus>;
    fn copy_identity_certificate(&self, identity: RawHandle) -> Result<RawHandle, OsStatus>;
    fn copy_certificate_data(&self, certificate: RawHandle) -> Option<RawHandle>;
    fn export_items(
        &self,
        items: RawHandle,
        format: ContainerFormat,
        params: &ExportParameters,
    ) -> Result<RawHandle, OsStatus>;
}
