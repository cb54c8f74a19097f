//! # Field Sync Core
//!
//! Offline-first cache and synchronization layer for the project-tracking
//! mobile client. Collection snapshots live in LMDB, the backend is reached
//! over HTTP, and a single [`sync::Synchronizer`] decides for every read
//! whether to trust the network or the last local snapshot.
//!
//! ## Features
//!
//! - **Refresh-or-fallback reads**: the backend is always tried first; on a
//!   connectivity failure the cached snapshot (or an empty list) is served
//! - **Local appends**: client-originated records extend a snapshot without
//!   waiting for the backend
//! - **Per-key serialization**: a refresh and an append on the same
//!   collection never interleave their read-modify-write
//! - **Durable storage**: a committed snapshot survives a process restart
//! - **FFI surface**: C-compatible functions returning JSON envelopes
//!
//! ## Quick Start
//!
//! ```no_run
//! use field_sync_core::config::SyncConfig;
//! use field_sync_core::record::CollectionKey;
//! use field_sync_core::SyncCore;
//! use serde_json::json;
//!
//! let core = SyncCore::open(SyncConfig::new("http://10.0.2.2:8000"))?;
//! let sync = core.synchronizer();
//!
//! let projects = core.block_on(sync.sync_projects())?;
//! let key = CollectionKey::photos(&"5".into());
//! core.block_on(sync.append_local(key.as_str(), json!({"uri": "a.jpg"})))?;
//! # let _ = projects;
//! # Ok::<(), field_sync_core::error::SyncError>(())
//! ```
//!
//! ## FFI Functions
//!
//! - [`create_sync_core`] - Open the store and build the client from a JSON config
//! - [`sync_collection`] - Refresh a collection, falling back to the cache
//! - [`append_local`] - Append a record to a cached collection
//! - [`get_snapshot`] - Read a cached collection
//! - [`create_project`] - Create a project and cache the server's copy
//! - [`report_progress`] - Send a progress note and cache a dated copy
//! - [`stage_photo`] - Cache a picked photo before upload
//! - [`upload_photo`] - Upload the bytes of a picked photo
//! - [`get_project_detail`] - Fetch one project, falling back to the cached list
//! - [`free_response`] - Release a string returned by any of the above
//! - [`close_sync_core`] - Flush the store and release the handle

pub mod app_response;
pub mod config;
pub mod error;
pub mod record;
pub mod remote;
pub mod store;
pub mod sync;
mod sync_core;

pub use crate::sync_core::SyncCore;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};
use serde_json::Value as JsonValue;

use crate::app_response::AppResponse;
use crate::config::SyncConfig;
use crate::record::{PhotoAsset, PhotoUpload, ProjectDraft, RecordId};

/// Opens a sync core from a JSON [`SyncConfig`].
///
/// This function opens (creating if needed) the LMDB snapshot store at
/// `store_path`, builds the HTTP client for `base_url` and starts the runtime
/// every later call is driven on.
///
/// # Parameters
///
/// * `config_json` - A null-terminated C string holding the config document,
///   e.g. `{"base_url": "http://10.0.2.2:8000", "store_path": "ranger"}`
///
/// # Returns
///
/// Returns a pointer to the [`SyncCore`] on success, or a null pointer on
/// failure. The pointer must eventually be passed to [`close_sync_core`].
///
/// # Safety
///
/// This function is unsafe because it:
/// - Dereferences a raw pointer without validation beyond a null check
/// - Returns a raw pointer that must be properly managed
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use field_sync_core::create_sync_core;
///
/// let config = CString::new(r#"{"base_url":"http://10.0.2.2:8000","store_path":"ranger"}"#).unwrap();
/// let core = create_sync_core(config.as_ptr());
/// assert!(!core.is_null());
/// ```
///
/// # Errors
///
/// Returns null pointer if:
/// - The config pointer is null or not valid UTF-8
/// - The config is not valid JSON or fails validation
/// - The store cannot be opened
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_sync_core(config_json: *const c_char) -> *mut SyncCore {
    let json = match read_c_str(config_json) {
        Some(s) => s,
        None => {
            warn!("Null or non UTF-8 config passed to create_sync_core");
            return std::ptr::null_mut();
        }
    };

    let config = match SyncConfig::from_json(&json) {
        Ok(config) => config,
        Err(e) => {
            warn!("Rejected sync core config: {e}");
            return std::ptr::null_mut();
        }
    };

    match SyncCore::open(config) {
        Ok(core) => {
            info!("Sync core initialized");
            Box::into_raw(Box::new(core))
        }
        Err(e) => {
            warn!("Failed to initialize sync core: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Refreshes the collection at `path` into the snapshot under `key`.
///
/// The backend is always asked first. Connectivity failures are not errors
/// here: the response is the cached snapshot, or `[]` when nothing was
/// cached.
///
/// # Parameters
///
/// * `core` - Pointer returned by [`create_sync_core`]
/// * `path` - Backend path, e.g. `/projects/`
/// * `key` - Cache key, e.g. `projects` or `photos_5`
///
/// # Returns
///
/// A JSON `AppResponse` whose `Ok` payload is the collection as a JSON array.
/// Release it with [`free_response`].
///
/// # Safety
///
/// `core` must be null or a live pointer from [`create_sync_core`].
///
/// # Errors
///
/// - `BadRequest` for null or non UTF-8 arguments
/// - `SerializationError` when the response or the stored snapshot is not a JSON array
/// - `DatabaseError` when the store fails
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn sync_collection(
    core: *mut SyncCore,
    path: *const c_char,
    key: *const c_char,
) -> *const c_char {
    let core = match core_ref(core, "sync_collection") {
        Ok(core) => core,
        Err(err) => return err,
    };
    let path = match c_ptr_to_string(path, "path") {
        Ok(path) => path,
        Err(err) => return err,
    };
    let key = match c_ptr_to_string(key, "key") {
        Ok(key) => key,
        Err(err) => return err,
    };

    let result = core.block_on(core.synchronizer().sync_collection(&path, &key));
    records_response(result)
}

/// Appends one JSON record to the snapshot under `key`.
///
/// The backend is not consulted and nothing is deduplicated.
///
/// # Parameters
///
/// * `core` - Pointer returned by [`create_sync_core`]
/// * `key` - Cache key to append to
/// * `record_json` - The record as a JSON document
///
/// # Returns
///
/// An `Ok` envelope confirming the append.
///
/// # Errors
///
/// - `BadRequest` for null pointers
/// - `SerializationError` for malformed record JSON or a non-array snapshot
/// - `DatabaseError` when the store fails
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn append_local(
    core: *mut SyncCore,
    key: *const c_char,
    record_json: *const c_char,
) -> *const c_char {
    let core = match core_ref(core, "append_local") {
        Ok(core) => core,
        Err(err) => return err,
    };
    let key = match c_ptr_to_string(key, "key") {
        Ok(key) => key,
        Err(err) => return err,
    };
    let record: JsonValue = match parse_json_arg(record_json, "record") {
        Ok(record) => record,
        Err(err) => return err,
    };

    match core.block_on(core.synchronizer().append_local(&key, record)) {
        Ok(()) => response_to_c_string(&AppResponse::success(format!("Appended to '{key}'"))),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Returns the snapshot under `key` as a JSON array (`[]` when absent).
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_snapshot(core: *mut SyncCore, key: *const c_char) -> *const c_char {
    let core = match core_ref(core, "get_snapshot") {
        Ok(core) => core,
        Err(err) => return err,
    };
    let key = match c_ptr_to_string(key, "key") {
        Ok(key) => key,
        Err(err) => return err,
    };

    let result = core.block_on(core.synchronizer().snapshot(&key));
    records_response(result)
}

/// Looks up one project, from the backend or from the cached `projects` list.
///
/// # Parameters
///
/// * `core` - Pointer returned by [`create_sync_core`]
/// * `project_id` - Project id as text; matched against cached ids as text
///
/// # Returns
///
/// An `Ok` envelope carrying the project as a JSON object.
///
/// # Errors
///
/// - `NotFound` when the backend is unreachable and the cache has no such project
/// - `SerializationError` when the backend answers with a malformed body
/// - `BadRequest` for null pointers
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_project_detail(
    core: *mut SyncCore,
    project_id: *const c_char,
) -> *const c_char {
    let core = match core_ref(core, "get_project_detail") {
        Ok(core) => core,
        Err(err) => return err,
    };
    let project_id = match c_ptr_to_string(project_id, "project_id") {
        Ok(id) => RecordId::from(id),
        Err(err) => return err,
    };

    match core.block_on(core.synchronizer().project_detail(&project_id)) {
        Ok(Some(project)) => json_response(&project),
        Ok(None) => {
            let error = AppResponse::NotFound(format!("Project '{project_id}' is not cached"));
            response_to_c_string(&error)
        }
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Creates a project and appends the server's copy to the `projects`
/// snapshot.
///
/// # Parameters
///
/// * `core` - Pointer returned by [`create_sync_core`]
/// * `draft_json` - `{"name": ..., "description": ...}`
///
/// # Returns
///
/// An `Ok` envelope carrying the created project as returned by the backend.
///
/// # Errors
///
/// - `BadRequest` for an empty name or null pointers
/// - `NetworkError` or `ServerError` when the backend refuses; nothing is cached then
/// - `SerializationError` for a malformed draft
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_project(core: *mut SyncCore, draft_json: *const c_char) -> *const c_char {
    let core = match core_ref(core, "create_project") {
        Ok(core) => core,
        Err(err) => return err,
    };
    let draft: ProjectDraft = match parse_json_arg(draft_json, "project") {
        Ok(draft) => draft,
        Err(err) => return err,
    };

    match core.block_on(core.synchronizer().create_project(&draft)) {
        Ok(created) => json_response(&created),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Sends a progress note for `project_id`.
///
/// Once the backend accepts it, a dated copy is appended to
/// `progress_{project_id}` and returned.
///
/// # Errors
///
/// - `BadRequest` for an empty note or null pointers
/// - `NetworkError` or `ServerError` when the report is not accepted
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn report_progress(
    core: *mut SyncCore,
    project_id: *const c_char,
    note: *const c_char,
) -> *const c_char {
    let core = match core_ref(core, "report_progress") {
        Ok(core) => core,
        Err(err) => return err,
    };
    let project_id = match c_ptr_to_string(project_id, "project_id") {
        Ok(id) => RecordId::from(id),
        Err(err) => return err,
    };
    let note = match c_ptr_to_string(note, "note") {
        Ok(note) => note,
        Err(err) => return err,
    };

    match core.block_on(core.synchronizer().report_progress(&project_id, &note)) {
        Ok(local) => json_response(&local),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Caches a picked photo descriptor under `photos_{project_id}`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn stage_photo(
    core: *mut SyncCore,
    project_id: *const c_char,
    asset_json: *const c_char,
) -> *const c_char {
    let core = match core_ref(core, "stage_photo") {
        Ok(core) => core,
        Err(err) => return err,
    };
    let project_id = match c_ptr_to_string(project_id, "project_id") {
        Ok(id) => RecordId::from(id),
        Err(err) => return err,
    };
    let asset: PhotoAsset = match parse_json_arg(asset_json, "photo") {
        Ok(asset) => asset,
        Err(err) => return err,
    };

    match core.block_on(core.synchronizer().stage_photo(&project_id, &asset)) {
        Ok(()) => response_to_c_string(&AppResponse::success("Photo staged")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Uploads the bytes of a picked photo to `/projects/{project_id}/photos/`.
///
/// The staged entry under `photos_{project_id}` is never touched, whatever
/// the outcome.
///
/// # Parameters
///
/// * `core` - Pointer returned by [`create_sync_core`]
/// * `project_id` - Project id as text
/// * `asset_json` - The picked asset; its `fileName` and `type` name the upload
/// * `bytes` - Start of the image data
/// * `len` - Number of bytes at `bytes`
///
/// # Returns
///
/// An `Ok` envelope carrying the backend's photo record.
///
/// # Safety
///
/// `bytes` must point to at least `len` readable bytes. It may only be null
/// when `len` is zero. The bytes are copied before the call returns.
///
/// # Errors
///
/// - `BadRequest` for null pointers or an invalid MIME type
/// - `NetworkError` or `ServerError` when the upload fails
/// - `SerializationError` for malformed asset JSON
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn upload_photo(
    core: *mut SyncCore,
    project_id: *const c_char,
    asset_json: *const c_char,
    bytes: *const u8,
    len: usize,
) -> *const c_char {
    let core = match core_ref(core, "upload_photo") {
        Ok(core) => core,
        Err(err) => return err,
    };
    let project_id = match c_ptr_to_string(project_id, "project_id") {
        Ok(id) => RecordId::from(id),
        Err(err) => return err,
    };
    let asset: PhotoAsset = match parse_json_arg(asset_json, "photo") {
        Ok(asset) => asset,
        Err(err) => return err,
    };
    let data = if len == 0 {
        Vec::new()
    } else if bytes.is_null() {
        let error = AppResponse::BadRequest("Null bytes pointer with non-zero length".to_string());
        return response_to_c_string(&error);
    } else {
        unsafe { std::slice::from_raw_parts(bytes, len) }.to_vec()
    };

    let upload = PhotoUpload::from_asset(&asset, data);
    match core.block_on(core.synchronizer().upload_photo(&project_id, upload)) {
        Ok(photo) => json_response(&photo),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Releases a string returned by any function of this library.
///
/// Passing null is a no-op. Each string must be released exactly once.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr as *mut c_char) });
}

/// Flushes the store and frees the handle.
///
/// # Parameters
///
/// * `core` - Pointer returned by [`create_sync_core`]
///
/// # Returns
///
/// An `Ok` envelope once the store is flushed, or `DatabaseError` if the
/// flush failed. The handle is freed either way.
///
/// # Safety
///
/// The pointer is invalid after this call and must not be used again.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_sync_core(core: *mut SyncCore) -> *const c_char {
    if core.is_null() {
        let error = AppResponse::BadRequest("Null core pointer passed to close_sync_core".to_string());
        return response_to_c_string(&error);
    }

    let core = unsafe { Box::from_raw(core) };
    let response = match core.close() {
        Ok(()) => AppResponse::success("Sync core closed"),
        Err(e) => AppResponse::from(e),
    };
    drop(core);
    response_to_c_string(&response)
}

fn core_ref<'a>(core: *mut SyncCore, caller: &str) -> Result<&'a SyncCore, *const c_char> {
    match unsafe { core.as_ref() } {
        Some(core) => Ok(core),
        None => {
            let error = AppResponse::BadRequest(format!("Null core pointer passed to {caller}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn records_response(result: error::Result<Vec<JsonValue>>) -> *const c_char {
    match result {
        Ok(records) => json_response(&records),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

fn json_response<T: serde::Serialize>(value: &T) -> *const c_char {
    match serde_json::to_string(value) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

fn parse_json_arg<T: serde::de::DeserializeOwned>(
    ptr: *const c_char,
    field_name: &str,
) -> Result<T, *const c_char> {
    let json = c_ptr_to_string(ptr, field_name)?;
    serde_json::from_str(&json).map_err(|e| {
        let error = AppResponse::SerializationError(format!("Invalid {field_name} JSON: {e}"));
        response_to_c_string(&error)
    })
}

/// Serializes `response` into a heap C string owned by the caller.
///
/// Returns null only if serialization itself fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok().map(str::to_string)
}

/// Converts a C string argument, producing an error envelope for null
/// pointers and invalid UTF-8.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}
