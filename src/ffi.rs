//! FFI bindings for the HQM bridge
//!
//! This module provides the C-compatible `hqm_*` functions called by the game.
//! Functions returning a status use `0` for success and `-1` for failure; call
//! `hqm_last_error` for the message. Strings and group arrays handed to the
//! caller must be released with `hqm_free_string` / `hqm_free_user_groups`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use log::{info, warn};

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::jvm::{HostContext, JniSdk};
use crate::logging;
use crate::types::UserGroupList;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Why a C string argument was rejected
enum CStrError {
    Null,
    InvalidUtf8,
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Result<String, CStrError> {
    if ptr.is_null() {
        return Err(CStrError::Null);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(|s| s.to_string())
        .map_err(|_| CStrError::InvalidUtf8)
}

/// Report a rejected string argument named `what` and produce the error status
fn reject_arg(what: &str, e: CStrError) -> i32 {
    let msg = match e {
        CStrError::Null => format!("Invalid {what} string pointer"),
        CStrError::InvalidUtf8 => format!("{what} is not valid UTF-8"),
    };
    warn!("{msg}");
    set_last_error(&msg);
    -1
}

/// Helper to convert Rust string to C string (caller must free).
///
/// Interior NUL characters end the C copy.
fn string_to_cstr(s: &str) -> *mut c_char {
    let end = s.find('\0').unwrap_or(s.len());
    CString::new(&s[..end]).unwrap_or_default().into_raw()
}

unsafe fn free_cstr(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Report a failed operation and produce the error status
fn fail(e: &BridgeError) -> i32 {
    warn!("{e}");
    set_last_error(&e.to_string());
    -1
}

fn status(result: Result<(), BridgeError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => fail(&e),
    }
}

// ============================================================================
// Bridge slot
// ============================================================================

#[derive(Default)]
struct Runtime {
    config: BridgeConfig,
    bridge: Option<Arc<Bridge>>,
}

fn runtime() -> &'static RwLock<Runtime> {
    static RUNTIME: OnceLock<RwLock<Runtime>> = OnceLock::new();
    RUNTIME.get_or_init(|| RwLock::new(Runtime::default()))
}

/// Put `bridge` in the process-wide slot, replacing any previous one.
pub(crate) fn install(bridge: Bridge) -> Arc<Bridge> {
    let bridge = Arc::new(bridge);
    let mut runtime = runtime().write().unwrap_or_else(PoisonError::into_inner);
    runtime.bridge = Some(Arc::clone(&bridge));
    bridge
}

fn attach_with(host: HostContext) -> Result<Arc<Bridge>, BridgeError> {
    let config = runtime()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .config
        .clone();
    let sdk = JniSdk::bind(host, &config.contract())?;
    info!("attached ({} flavor)", config.flavor.as_str());
    Ok(install(Bridge::new(sdk, config)))
}

#[cfg(all(target_os = "android", feature = "sdl"))]
fn attach_lazily() -> Result<Arc<Bridge>, BridgeError> {
    attach_with(crate::jvm::sdl::host_context()?)
}

#[cfg(not(all(target_os = "android", feature = "sdl")))]
fn attach_lazily() -> Result<Arc<Bridge>, BridgeError> {
    Err(BridgeError::NotAttached)
}

/// The bound bridge, attaching through the host when possible
fn current_bridge() -> Result<Arc<Bridge>, BridgeError> {
    let bound = runtime()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .bridge
        .clone();
    match bound {
        Some(bridge) => Ok(bridge),
        None => attach_lazily(),
    }
}

fn with_bridge<T>(f: impl FnOnce(&Bridge) -> Result<T, BridgeError>) -> Result<T, BridgeError> {
    let bridge = current_bridge()?;
    f(&bridge)
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Bind the bridge to a Java VM and the hosting activity.
///
/// Every managed class, method and field is resolved here; a missing one is
/// reported through `hqm_last_error`.
///
/// # Safety
/// - `vm` must be a valid `JavaVM` pointer.
/// - `activity` must be a live reference to an `android.content.Context`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn hqm_attach(
    vm: *mut jni::sys::JavaVM,
    activity: jni::sys::jobject,
) -> i32 {
    clear_last_error();

    match HostContext::from_raw(vm, activity).and_then(attach_with) {
        Ok(_) => 0,
        Err(e) => fail(&e),
    }
}

/// Set the bridge configuration from JSON.
///
/// Applies to the next attach; an already bound bridge keeps its settings.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn hqm_configure(json: *const c_char) -> i32 {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Ok(s) => s,
        Err(e) => return reject_arg("configuration", e),
    };

    match BridgeConfig::from_json(&json_str) {
        Ok(config) => {
            let mut runtime = runtime().write().unwrap_or_else(PoisonError::into_inner);
            if runtime.bridge.is_some() {
                warn!("configuration changed while attached; applies on next attach");
            }
            runtime.config = config;
            0
        }
        Err(e) => fail(&e),
    }
}

/// Drop the bound bridge and its cached JNI references.
#[no_mangle]
pub extern "C" fn hqm_detach() {
    let mut runtime = runtime().write().unwrap_or_else(PoisonError::into_inner);
    if runtime.bridge.take().is_some() {
        info!("detached");
    }
}

// ============================================================================
// SDK operations
// ============================================================================

/// Initialize the HQ SDK.
///
/// ```c
/// hqm_init("38e44d7", 1); // sdk key, enable debug mode
/// ```
///
/// # Safety
/// - `key` must be a valid null-terminated C string.
/// - Any non-zero `enable_debug` enables debug mode.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn hqm_init(key: *const c_char, enable_debug: c_int) -> i32 {
    clear_last_error();

    let key_str = match cstr_to_string(key) {
        Ok(s) => s,
        Err(e) => return reject_arg("key", e),
    };

    status(with_bridge(|bridge| bridge.init(&key_str, enable_debug != 0)))
}

/// Start SDK jobs (installed apps collection).
///
/// Returns 0 on success, -1 on error.
#[no_mangle]
pub extern "C" fn hqm_start() -> i32 {
    clear_last_error();
    status(with_bridge(Bridge::start))
}

/// Same as `hqm_start`; name used by the legacy bridge.
#[no_mangle]
pub extern "C" fn hqm_collect_apps() -> i32 {
    hqm_start()
}

/// Log a custom event.
///
/// ```c
/// hqm_log("test", "{\"text\": \"sdl_test\", \"event\": \"app_start\"}");
/// ```
///
/// # Safety
/// - `event_name` and `event_data` must be valid null-terminated C strings.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn hqm_log(event_name: *const c_char, event_data: *const c_char) -> i32 {
    clear_last_error();

    let name_str = match cstr_to_string(event_name) {
        Ok(s) => s,
        Err(e) => return reject_arg("event name", e),
    };

    let data_str = match cstr_to_string(event_data) {
        Ok(s) => s,
        Err(e) => return reject_arg("event data", e),
    };

    status(with_bridge(|bridge| bridge.log(&name_str, &data_str)))
}

/// One user group; both strings are owned by the enclosing array
#[repr(C)]
#[derive(Debug)]
pub struct HqmUserGroup {
    pub id: *mut c_char,
    pub name: *mut c_char,
}

/// Array of user groups owned by the caller
///
/// An empty result has `length == 0` and `user_groups == NULL`.
#[repr(C)]
#[derive(Debug)]
pub struct HqmUserGroupData {
    pub user_groups: *mut HqmUserGroup,
    pub length: c_int,
}

impl HqmUserGroupData {
    fn empty() -> Self {
        Self {
            user_groups: ptr::null_mut(),
            length: 0,
        }
    }
}

impl From<UserGroupList> for HqmUserGroupData {
    fn from(list: UserGroupList) -> Self {
        if list.is_empty() {
            return Self::empty();
        }

        // A managed list size is a jint, so the length always fits.
        let groups: Box<[HqmUserGroup]> = list
            .into_iter()
            .take(c_int::MAX as usize)
            .map(|group| HqmUserGroup {
                id: string_to_cstr(&group.id),
                name: string_to_cstr(&group.name),
            })
            .collect();
        let length = groups.len() as c_int;

        Self {
            user_groups: Box::into_raw(groups) as *mut HqmUserGroup,
            length,
        }
    }
}

/// Synchronously retrieve predicted user groups.
///
/// ```c
/// HqmUserGroupData data = hqm_get_user_groups();
/// for (int i = 0; i < data.length; i++) {
///     printf("id:\"%s\" name:\"%s\"\n", data.user_groups[i].id, data.user_groups[i].name);
/// }
/// hqm_free_user_groups(data);
/// ```
///
/// A null managed list, or a failure, yields the empty result; a null list
/// element yields a group with empty strings at the same index.
/// Must be freed with `hqm_free_user_groups`.
#[no_mangle]
pub extern "C" fn hqm_get_user_groups() -> HqmUserGroupData {
    clear_last_error();

    match with_bridge(Bridge::user_groups) {
        Ok(groups) => groups.into(),
        Err(e) => {
            fail(&e);
            HqmUserGroupData::empty()
        }
    }
}

/// Free a user group array returned by `hqm_get_user_groups`.
///
/// # Safety
/// - `data` must be a value returned by `hqm_get_user_groups`, freed only once.
#[no_mangle]
pub unsafe extern "C" fn hqm_free_user_groups(data: HqmUserGroupData) {
    if data.user_groups.is_null() || data.length <= 0 {
        return;
    }

    let slice = ptr::slice_from_raw_parts_mut(data.user_groups, data.length as usize);
    let groups = Box::from_raw(slice);
    for group in groups.iter() {
        free_cstr(group.id);
        free_cstr(group.name);
    }
}

/// Ask the SDK to send the user's collected data to `email`.
///
/// # Safety
/// - `email` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn hqm_request_user_data(email: *const c_char) -> i32 {
    clear_last_error();

    let email_str = match cstr_to_string(email) {
        Ok(s) => s,
        Err(e) => return reject_arg("email", e),
    };

    status(with_bridge(|bridge| bridge.request_user_data(&email_str)))
}

/// Delete the user's collected data.
///
/// Returns 0 on success, -1 on error.
#[no_mangle]
pub extern "C" fn hqm_delete_user_data() -> i32 {
    clear_last_error();
    status(with_bridge(Bridge::delete_user_data))
}

/// Get the SDK user identifier.
///
/// Never returns NULL: a null managed value, or a failure, yields "".
/// Must be freed with `hqm_free_string`.
#[no_mangle]
pub extern "C" fn hqm_get_uuid() -> *mut c_char {
    clear_last_error();

    match with_bridge(Bridge::uuid) {
        Ok(uuid) => string_to_cstr(&uuid),
        Err(e) => {
            fail(&e);
            string_to_cstr("")
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by HQM functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an HQM function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn hqm_free_string(ptr: *mut c_char) {
    free_cstr(ptr);
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next HQM function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn hqm_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Logging & Version
// ============================================================================

/// Install the platform logger (logcat on Android).
///
/// `level`: 0 off, 1 error, 2 warn, 3 info, 4 debug, 5 trace. A `log_level`
/// set through `hqm_configure` takes precedence.
///
/// Returns 0 on success, -1 if a logger was already installed.
#[no_mangle]
pub extern "C" fn hqm_logging_init(level: c_int) -> i32 {
    clear_last_error();

    let configured = runtime()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .config
        .level_filter();
    let filter = match configured {
        Ok(Some(filter)) => filter,
        _ => logging::level_from_raw(level),
    };

    status(logging::init(filter))
}

/// Get the HQM bridge version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn hqm_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::fake::{Call, RecordingSdk};
    use crate::types::ManagedGroup;
    use pretty_assertions::assert_eq;
    use std::sync::{Mutex, MutexGuard};

    // The bridge slot is process-wide; tests touching it run one at a time.
    static SLOT: Mutex<()> = Mutex::new(());

    fn lock_slot() -> MutexGuard<'static, ()> {
        SLOT.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn install_fake(sdk: &RecordingSdk) {
        install(Bridge::new(sdk.clone(), BridgeConfig::default()));
    }

    fn group(id: &str, name: &str) -> Option<ManagedGroup> {
        Some(ManagedGroup {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
        })
    }

    unsafe fn read(ptr: *const c_char) -> String {
        assert!(!ptr.is_null());
        CStr::from_ptr(ptr).to_str().unwrap().to_string()
    }

    unsafe fn last_error() -> String {
        read(hqm_last_error())
    }

    #[test]
    fn test_ffi_init_debug_flag_truthiness() {
        let _slot = lock_slot();
        let key = CString::new("38e44d7").unwrap();

        for (flag, expected) in [(0, false), (1, true), (2, true), (-1, true)] {
            let sdk = RecordingSdk::new();
            install_fake(&sdk);

            let result = unsafe { hqm_init(key.as_ptr(), flag) };
            assert_eq!(result, 0);
            assert_eq!(
                sdk.calls(),
                vec![
                    Call::EnableDebug(expected),
                    Call::Init {
                        key: "38e44d7".to_string(),
                        debug: expected,
                        background_tasks: true,
                    },
                ]
            );
        }
        hqm_detach();
    }

    #[test]
    fn test_ffi_empty_and_null_lists() {
        let _slot = lock_slot();

        for managed in [None, Some(Vec::new())] {
            install_fake(&RecordingSdk::new().with_groups(managed));

            let data = hqm_get_user_groups();
            assert_eq!(data.length, 0);
            assert!(data.user_groups.is_null());
            unsafe { hqm_free_user_groups(data) };
        }
        hqm_detach();
    }

    #[test]
    fn test_ffi_user_groups_copied() {
        let _slot = lock_slot();
        install_fake(&RecordingSdk::new().with_groups(Some(vec![
            group("1", "Gamers"),
            group("2", "Readers"),
            group("3", "Travellers"),
        ])));

        let data = hqm_get_user_groups();
        assert_eq!(data.length, 3);

        unsafe {
            let groups = std::slice::from_raw_parts(data.user_groups, data.length as usize);
            let read_back: Vec<(String, String)> = groups
                .iter()
                .map(|g| (read(g.id), read(g.name)))
                .collect();
            assert_eq!(
                read_back,
                vec![
                    ("1".to_string(), "Gamers".to_string()),
                    ("2".to_string(), "Readers".to_string()),
                    ("3".to_string(), "Travellers".to_string()),
                ]
            );
            assert_ne!(groups[0].id, groups[1].id);
            assert_ne!(groups[0].id, groups[0].name);

            hqm_free_user_groups(data);
        }
        hqm_detach();
    }

    #[test]
    fn test_ffi_null_element_becomes_empty_strings() {
        let _slot = lock_slot();
        install_fake(&RecordingSdk::new().with_groups(Some(vec![
            group("1", "Gamers"),
            None,
            group("3", "Travellers"),
        ])));

        let data = hqm_get_user_groups();
        assert_eq!(data.length, 3);

        unsafe {
            let groups = std::slice::from_raw_parts(data.user_groups, 3);
            assert_eq!(read(groups[1].id), "");
            assert_eq!(read(groups[1].name), "");
            assert_eq!(read(groups[2].id), "3");
            hqm_free_user_groups(data);
        }
        hqm_detach();
    }

    #[test]
    fn test_ffi_interior_nul_truncates() {
        let copied = string_to_cstr("abc\0def");
        unsafe {
            assert_eq!(read(copied), "abc");
            hqm_free_string(copied);
        }
    }

    #[test]
    fn test_ffi_uuid_never_null() {
        let _slot = lock_slot();

        install_fake(&RecordingSdk::new());
        unsafe {
            let uuid = hqm_get_uuid();
            assert_eq!(read(uuid), "");
            hqm_free_string(uuid);
        }

        install_fake(&RecordingSdk::new().with_uuid(Some("5f0c2a54-1d2b-4c67-9a55-0c0e1d3a7b21")));
        unsafe {
            let uuid = hqm_get_uuid();
            assert_eq!(read(uuid), "5f0c2a54-1d2b-4c67-9a55-0c0e1d3a7b21");
            hqm_free_string(uuid);
        }

        install_fake(&RecordingSdk::new().failing());
        unsafe {
            let uuid = hqm_get_uuid();
            assert_eq!(read(uuid), "");
            assert!(last_error().contains("uuid"));
            hqm_free_string(uuid);
        }
        hqm_detach();
    }

    #[test]
    fn test_ffi_forwarding_and_status() {
        let _slot = lock_slot();
        let sdk = RecordingSdk::new();
        install_fake(&sdk);

        let name = CString::new("test").unwrap();
        let data = CString::new("just a string").unwrap();
        let email = CString::new("player@example.com").unwrap();

        unsafe {
            assert_eq!(hqm_start(), 0);
            assert_eq!(hqm_collect_apps(), 0);
            assert_eq!(hqm_log(name.as_ptr(), data.as_ptr()), 0);
            assert_eq!(hqm_request_user_data(email.as_ptr()), 0);
            assert_eq!(hqm_delete_user_data(), 0);
            assert!(hqm_last_error().is_null());

            assert_eq!(hqm_log(name.as_ptr(), ptr::null()), -1);
            assert_eq!(last_error(), "Invalid event data string pointer");
        }

        assert_eq!(
            sdk.calls(),
            vec![
                Call::Start,
                Call::Start,
                Call::LogEvent("test".to_string(), "just a string".to_string()),
                Call::RequestUserData("player@example.com".to_string()),
                Call::DeleteUserData,
            ]
        );
        hqm_detach();
    }

    #[test]
    fn test_ffi_invalid_utf8_arguments() {
        let _slot = lock_slot();
        let sdk = RecordingSdk::new();
        install_fake(&sdk);

        let bad = CStr::from_bytes_with_nul(b"\xff\0").unwrap();
        let name = CString::new("test").unwrap();

        unsafe {
            assert_eq!(hqm_init(bad.as_ptr(), 1), -1);
            assert_eq!(last_error(), "key is not valid UTF-8");

            assert_eq!(hqm_init(ptr::null(), 1), -1);
            assert_eq!(last_error(), "Invalid key string pointer");

            assert_eq!(hqm_log(name.as_ptr(), bad.as_ptr()), -1);
            assert_eq!(last_error(), "event data is not valid UTF-8");

            assert_eq!(hqm_request_user_data(bad.as_ptr()), -1);
            assert_eq!(last_error(), "email is not valid UTF-8");

            assert_eq!(hqm_configure(bad.as_ptr()), -1);
            assert_eq!(last_error(), "configuration is not valid UTF-8");
        }

        assert!(sdk.calls().is_empty());
        hqm_detach();
    }

    #[test]
    fn test_ffi_managed_failure_sets_last_error() {
        let _slot = lock_slot();
        install_fake(&RecordingSdk::new().failing());

        unsafe {
            assert_eq!(hqm_start(), -1);
            assert_eq!(last_error(), "Managed exception thrown during start");

            let data = hqm_get_user_groups();
            assert_eq!(data.length, 0);
            assert!(data.user_groups.is_null());
        }
        hqm_detach();
    }

    #[cfg(not(all(target_os = "android", feature = "sdl")))]
    #[test]
    fn test_ffi_not_attached() {
        let _slot = lock_slot();
        hqm_detach();

        unsafe {
            assert_eq!(hqm_start(), -1);
            assert_eq!(last_error(), "Bridge is not attached to a Java VM");
        }
    }

    #[test]
    fn test_ffi_attach_rejects_null_pointers() {
        unsafe {
            assert_eq!(hqm_attach(ptr::null_mut(), ptr::null_mut()), -1);
            assert_eq!(last_error(), "Invalid argument: null JavaVM pointer");
        }
    }

    #[test]
    fn test_ffi_configure() {
        let _slot = lock_slot();

        let invalid = CString::new(r#"{"flavor": "beta"}"#).unwrap();
        let legacy = CString::new(r#"{"flavor": "legacy", "background_tasks": false}"#).unwrap();

        unsafe {
            assert_eq!(hqm_configure(invalid.as_ptr()), -1);
            assert!(last_error().starts_with("Invalid JSON"));

            assert_eq!(hqm_configure(legacy.as_ptr()), 0);
        }
        let config = runtime().read().unwrap().config.clone();
        assert!(!config.background_tasks);
        assert_eq!(config.contract().methods.start, "collectApps");

        runtime().write().unwrap().config = BridgeConfig::default();
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = hqm_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
