//! Keychain access through CoreFoundation and the Security framework.

use super::{
    AttributeKey, ContainerFormat, ExportParameters, HandleKind, NativeStore, OsStatus, RawHandle,
    ERR_SEC_SUCCESS,
};
use crate::keychain::query::{ItemClass, MatchLimit, QueryCriteria};
use core_foundation_sys::array::{
    kCFTypeArrayCallBacks, CFArrayCreate, CFArrayGetCount, CFArrayGetTypeID,
    CFArrayGetValueAtIndex, CFArrayRef,
};
use core_foundation_sys::base::{
    kCFAllocatorDefault, Boolean, CFGetTypeID, CFIndex, CFRelease, CFRetain, CFTypeRef,
};
use core_foundation_sys::data::{CFDataGetBytePtr, CFDataGetLength, CFDataGetTypeID, CFDataRef};
use core_foundation_sys::dictionary::{
    kCFTypeDictionaryKeyCallBacks, kCFTypeDictionaryValueCallBacks, CFDictionaryCreate,
    CFDictionaryGetTypeID, CFDictionaryGetValueIfPresent, CFDictionaryRef,
};
use core_foundation_sys::number::{
    kCFBooleanFalse, kCFBooleanTrue, kCFNumberSInt64Type, CFNumberCreate,
};
use core_foundation_sys::string::{
    kCFStringEncodingUTF8, CFStringCreateWithBytes, CFStringGetCString, CFStringGetLength,
    CFStringGetMaximumSizeForEncoding, CFStringGetTypeID, CFStringRef,
};
use security_framework_sys::base::{SecCertificateRef, SecIdentityRef};
use security_framework_sys::certificate::{SecCertificateCopyData, SecCertificateGetTypeID};
use security_framework_sys::identity::{SecIdentityCopyCertificate, SecIdentityGetTypeID};
use security_framework_sys::import_export::{
    kSecFormatPKCS12, kSecItemPemArmour, kSecKeySecurePassphrase, SecItemExport,
    SecItemImportExportKeyParameters, SEC_KEY_IMPORT_EXPORT_PARAMS_VERSION,
};
use security_framework_sys::item::{
    kSecAttrLabel, kSecClass, kSecClassCertificate, kSecClassIdentity, kSecMatchLimit,
    kSecMatchLimitAll, kSecReturnAttributes, kSecReturnRef, kSecValueRef,
};
use security_framework_sys::keychain_item::SecItemCopyMatching;
use std::ffi::c_void;
use std::os::raw::c_char;
use std::ptr;

fn to_raw(ptr: CFTypeRef) -> Option<RawHandle> {
    (!ptr.is_null()).then(|| RawHandle::new(ptr as usize))
}

fn to_ptr(raw: RawHandle) -> CFTypeRef {
    raw.addr() as CFTypeRef
}

fn cf_index(value: usize) -> CFIndex {
    CFIndex::try_from(value).unwrap_or(CFIndex::MAX)
}

fn cf_bool(value: bool) -> CFTypeRef {
    unsafe {
        if value {
            kCFBooleanTrue as CFTypeRef
        } else {
            kCFBooleanFalse as CFTypeRef
        }
    }
}

/// The login keychain search list of the current user.
///
/// Handles passed to this store must come from this store.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacKeychain;

impl MacKeychain {
    pub fn new() -> Self {
        Self
    }
}

impl NativeStore for MacKeychain {
    fn retain(&self, raw: RawHandle) -> RawHandle {
        unsafe { RawHandle::new(CFRetain(to_ptr(raw)) as usize) }
    }

    fn release(&self, raw: RawHandle) {
        unsafe { CFRelease(to_ptr(raw)) }
    }

    fn kind_of(&self, raw: RawHandle) -> HandleKind {
        unsafe {
            let type_id = CFGetTypeID(to_ptr(raw));
            if type_id == CFStringGetTypeID() {
                HandleKind::String
            } else if type_id == CFArrayGetTypeID() {
                HandleKind::Array
            } else if type_id == CFDictionaryGetTypeID() {
                HandleKind::Dictionary
            } else if type_id == CFDataGetTypeID() {
                HandleKind::Data
            } else if type_id == SecIdentityGetTypeID() {
                HandleKind::Identity
            } else if type_id == SecCertificateGetTypeID() {
                HandleKind::Certificate
            } else {
                HandleKind::Other
            }
        }
    }

    fn create_string(&self, text: &str) -> Option<RawHandle> {
        let string = unsafe {
            CFStringCreateWithBytes(
                kCFAllocatorDefault,
                text.as_ptr(),
                cf_index(text.len()),
                kCFStringEncodingUTF8,
                false as Boolean,
            )
        };
        to_raw(string as CFTypeRef)
    }

    fn string_length(&self, string: RawHandle) -> usize {
        let length = unsafe { CFStringGetLength(to_ptr(string) as CFStringRef) };
        usize::try_from(length).unwrap_or(0)
    }

    fn max_encoded_len(&self, length: usize) -> usize {
        let size =
            unsafe { CFStringGetMaximumSizeForEncoding(cf_index(length), kCFStringEncodingUTF8) };
        // kCFNotFound (-1) on overflow
        usize::try_from(size).unwrap_or(0)
    }

    fn copy_string_into(&self, string: RawHandle, buffer: &mut [u8]) -> bool {
        unsafe {
            CFStringGetCString(
                to_ptr(string) as CFStringRef,
                buffer.as_mut_ptr() as *mut c_char,
                cf_index(buffer.len()),
                kCFStringEncodingUTF8,
            ) != 0
        }
    }

    fn array_len(&self, array: RawHandle) -> usize {
        let count = unsafe { CFArrayGetCount(to_ptr(array) as CFArrayRef) };
        usize::try_from(count).unwrap_or(0)
    }

    fn array_get(&self, array: RawHandle, index: usize) -> Option<RawHandle> {
        if index >= self.array_len(array) {
            return None;
        }
        let value =
            unsafe { CFArrayGetValueAtIndex(to_ptr(array) as CFArrayRef, cf_index(index)) };
        to_raw(value)
    }

    fn create_array(&self, items: &[RawHandle]) -> Option<RawHandle> {
        let values: Vec<*const c_void> = items.iter().map(|raw| to_ptr(*raw)).collect();
        let array = unsafe {
            CFArrayCreate(
                kCFAllocatorDefault,
                values.as_ptr(),
                cf_index(values.len()),
                &kCFTypeArrayCallBacks,
            )
        };
        to_raw(array as CFTypeRef)
    }

    fn dictionary_get(&self, dictionary: RawHandle, key: AttributeKey) -> Option<RawHandle> {
        let key = unsafe {
            match key {
                AttributeKey::Label => kSecAttrLabel,
                AttributeKey::ValueRef => kSecValueRef,
            }
        };
        let mut value: *const c_void = ptr::null();
        let present = unsafe {
            CFDictionaryGetValueIfPresent(
                to_ptr(dictionary) as CFDictionaryRef,
                key as *const c_void,
                &mut value,
            )
        };
        if present == 0 {
            return None;
        }
        to_raw(value)
    }

    fn data_bytes(&self, data: RawHandle) -> Vec<u8> {
        unsafe {
            let data = to_ptr(data) as CFDataRef;
            let length = usize::try_from(CFDataGetLength(data)).unwrap_or(0);
            let bytes = CFDataGetBytePtr(data);
            if bytes.is_null() || length == 0 {
                return Vec::new();
            }
            std::slice::from_raw_parts(bytes, length).to_vec()
        }
    }

    fn copy_matching(&self, criteria: &QueryCriteria) -> Result<RawHandle, OsStatus> {
        // A limit of one is expressed as a CFNumber; "all" is a constant.
        let limit: CFTypeRef = match criteria.match_limit {
            MatchLimit::All => unsafe { kSecMatchLimitAll as CFTypeRef },
            MatchLimit::One => {
                let one: i64 = 1;
                let number = unsafe {
                    CFNumberCreate(
                        kCFAllocatorDefault,
                        kCFNumberSInt64Type,
                        &one as *const i64 as *const c_void,
                    )
                };
                if number.is_null() {
                    return Err(super::ERR_SEC_ALLOCATE);
                }
                number as CFTypeRef
            }
        };
        let owns_limit = criteria.match_limit == MatchLimit::One;

        let (keys, values) = unsafe {
            let class = match criteria.item_class {
                ItemClass::Identity => kSecClassIdentity,
                ItemClass::Certificate => kSecClassCertificate,
            };
            (
                [
                    kSecClass as *const c_void,
                    kSecMatchLimit as *const c_void,
                    kSecReturnAttributes as *const c_void,
                    kSecReturnRef as *const c_void,
                ],
                [
                    class as *const c_void,
                    limit,
                    cf_bool(criteria.return_attributes),
                    cf_bool(criteria.return_reference),
                ],
            )
        };

        unsafe {
            let query = CFDictionaryCreate(
                kCFAllocatorDefault,
                keys.as_ptr(),
                values.as_ptr(),
                cf_index(keys.len()),
                &kCFTypeDictionaryKeyCallBacks,
                &kCFTypeDictionaryValueCallBacks,
            );
            if owns_limit {
                CFRelease(limit);
            }
            if query.is_null() {
                return Err(super::ERR_SEC_ALLOCATE);
            }

            let mut result: CFTypeRef = ptr::null();
            let status = SecItemCopyMatching(query, &mut result);
            CFRelease(query as CFTypeRef);

            if status != ERR_SEC_SUCCESS {
                return Err(status);
            }
            to_raw(result).ok_or(super::ERR_SEC_ITEM_NOT_FOUND)
        }
    }

    fn copy_identity_certificate(&self, identity: RawHandle) -> Result<RawHandle, OsStatus> {
        let mut certificate: SecCertificateRef = ptr::null_mut();
        let status = unsafe {
            SecIdentityCopyCertificate(to_ptr(identity) as SecIdentityRef, &mut certificate)
        };
        if status != ERR_SEC_SUCCESS {
            return Err(status);
        }
        to_raw(certificate as CFTypeRef).ok_or(super::ERR_SEC_PARAM)
    }

    fn copy_certificate_data(&self, certificate: RawHandle) -> Option<RawHandle> {
        let data = unsafe { SecCertificateCopyData(to_ptr(certificate) as SecCertificateRef) };
        to_raw(data as CFTypeRef)
    }

    fn export_items(
        &self,
        items: RawHandle,
        format: ContainerFormat,
        params: &ExportParameters,
    ) -> Result<RawHandle, OsStatus> {
        let output_format = match format {
            ContainerFormat::Pkcs12 => kSecFormatPKCS12,
        };
        let key_params = SecItemImportExportKeyParameters {
            version: SEC_KEY_IMPORT_EXPORT_PARAMS_VERSION,
            flags: if params.secure_passphrase {
                kSecKeySecurePassphrase
            } else {
                0
            },
            passphrase: params.passphrase.map_or(ptr::null(), to_ptr),
            alertTitle: ptr::null(),
            alertPrompt: params
                .alert_prompt
                .map_or(ptr::null(), |raw| to_ptr(raw) as CFStringRef),
            accessRef: ptr::null_mut(),
            keyUsage: ptr::null(),
            keyAttributes: ptr::null(),
        };
        let flags = if params.pem_armour { kSecItemPemArmour } else { 0 };

        let mut exported: CFDataRef = ptr::null();
        let status = unsafe {
            SecItemExport(
                to_ptr(items),
                output_format,
                flags,
                &key_params,
                &mut exported,
            )
        };
        if status != ERR_SEC_SUCCESS {
            return Err(status);
        }
        to_raw(exported as CFTypeRef).ok_or(super::ERR_SEC_ALLOCATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{from_native_string, to_native_string, Owned};

    #[test]
    fn test_string_round_trip() {
        let store = MacKeychain::new();
        let owned = to_native_string(&store, "Développeur: Zoë").unwrap();

        assert_eq!(owned.kind(), HandleKind::String);
        assert_eq!(from_native_string(owned.borrow()).unwrap(), "Développeur: Zoë");
    }

    #[test]
    fn test_array_holds_items() {
        let store = MacKeychain::new();
        let first = to_native_string(&store, "a").unwrap();
        let second = to_native_string(&store, "b").unwrap();

        let array = Owned::adopt(
            &store,
            store.create_array(&[first.raw(), second.raw()]).unwrap(),
        );
        assert_eq!(array.kind(), HandleKind::Array);
        assert_eq!(array.borrow().array_len(), 2);
        assert_eq!(array.borrow().array_get(1).map(|b| b.raw()), Some(second.raw()));
        assert!(array.borrow().array_get(2).is_none());
    }
}
