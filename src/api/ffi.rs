//! C-compatible API for non-Rust hosts.
//!
//! Ownership rules:
//! - `realty_service_open` returns a handle that must be released with
//!   `realty_service_close`; a null return means the service failed to start.
//! - every `*mut c_char` returned by this module is a UTF-8 JSON envelope that
//!   must be released with `realty_free_str`.
//! - input strings are borrowed for the duration of the call only and must be
//!   UTF-8; anything else is answered with a `schema_violation` envelope.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::api::serving;
use crate::common::config::AppCfg;
use crate::common::error::{RealtyError, RealtyResult};
use crate::common::log;
use crate::inference::service::InferenceService;
use crate::training::domain::ArtifactId;
use crate::training::repo_fs::FsArtifactRegistry;

/// Opaque service handle owned by the host.
pub struct ServiceHandle {
    registry: Arc<FsArtifactRegistry>,
    service: InferenceService<FsArtifactRegistry>,
}

impl ServiceHandle {
    fn open(cfg: &AppCfg) -> RealtyResult<Self> {
        cfg.validate()?;
        let registry = Arc::new(FsArtifactRegistry::new(cfg)?);
        let service = InferenceService::new(Arc::clone(&registry));
        Ok(Self { registry, service })
    }
}

/// ABI version to coordinate with the host layer.
#[no_mangle]
pub extern "C" fn realty_api_version() -> u32 {
    1
}

/// Open a service over `<data_root>/artifacts`. A null `data_root` falls back
/// to `REALTY_DATA_ROOT`.
#[no_mangle]
pub extern "C" fn realty_service_open(data_root: *const c_char) -> *mut ServiceHandle {
    let (mut cfg, env_error) = with_fallback(AppCfg::load());
    log::init(&cfg);
    if let Some(err) = env_error {
        warn!(error = %err, "environment configuration rejected, using defaults");
    }

    // SAFETY: the caller passes null or a NUL-terminated string.
    let opened = unsafe { read_str(data_root, "data_root") }.and_then(|root| {
        if let Some(root) = root {
            cfg.data_root = root.into();
        }
        ServiceHandle::open(&cfg)
    });
    match opened {
        Ok(handle) => {
            info!(data_root = %cfg.data_root.display(), "service opened");
            Box::into_raw(Box::new(handle))
        }
        Err(err) => {
            error!(error = %err, "service failed to open");
            std::ptr::null_mut()
        }
    }
}

/// Release a handle returned by `realty_service_open`.
#[no_mangle]
pub extern "C" fn realty_service_close(handle: *mut ServiceHandle) {
    if handle.is_null() {
        return;
    }
    // SAFETY: the pointer came from `Box::into_raw` in `realty_service_open`
    // and is closed at most once.
    drop(unsafe { Box::from_raw(handle) });
}

/// Train on a CSV file and register the artifact. `cfg_json` may be null
/// for defaults.
#[no_mangle]
pub extern "C" fn realty_train(
    handle: *const ServiceHandle,
    csv_path: *const c_char,
    cfg_json: *const c_char,
) -> *mut c_char {
    // SAFETY: handle and strings follow the module ownership rules.
    let (handle, csv_path, cfg_json) =
        unsafe { (handle.as_ref(), read_str(csv_path, "csv_path"), read_str(cfg_json, "cfg_json")) };
    let out = match (handle, csv_path, cfg_json) {
        (None, _, _) => bad_argument("handle"),
        (_, Err(err), _) | (_, _, Err(err)) => serving::error_envelope(&err),
        (_, Ok(None), _) => bad_argument("csv_path"),
        (Some(h), Ok(Some(path)), Ok(cfg_json)) => {
            serving::train_csv(h.registry.as_ref(), Path::new(&path), cfg_json.as_deref().unwrap_or(""))
        }
    };
    string_to_raw(out)
}

/// Predict for a `{"record": {...}}` payload. A non-null `artifact_id`
/// pins the artifact, otherwise the latest one is used.
#[no_mangle]
pub extern "C" fn realty_predict(
    handle: *const ServiceHandle,
    payload: *const c_char,
    artifact_id: *const c_char,
) -> *mut c_char {
    // SAFETY: handle and strings follow the module ownership rules.
    let (handle, payload, artifact_id) =
        unsafe { (handle.as_ref(), read_str(payload, "payload"), read_str(artifact_id, "artifact_id")) };
    let out = match (handle, payload, artifact_id) {
        (None, _, _) => bad_argument("handle"),
        (_, Err(err), _) | (_, _, Err(err)) => serving::error_envelope(&err),
        (_, Ok(None), _) => bad_argument("payload"),
        (Some(h), Ok(Some(payload)), Ok(artifact_id)) => {
            serving::predict_json_for(&h.service, &payload, artifact_id.map(ArtifactId::new))
        }
    };
    string_to_raw(out)
}

/// Free strings allocated by Rust.
#[no_mangle]
pub extern "C" fn realty_free_str(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: the pointer came from `CString::into_raw` in this module.
    drop(unsafe { CString::from_raw(ptr) });
}

/// Defaults when the environment is rejected; the error is kept so it can be
/// logged once a subscriber is installed.
fn with_fallback(loaded: RealtyResult<AppCfg>) -> (AppCfg, Option<RealtyError>) {
    match loaded {
        Ok(cfg) => (cfg, None),
        Err(err) => (AppCfg::default(), Some(err)),
    }
}

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn read_str(ptr: *const c_char, name: &'static str) -> RealtyResult<Option<String>> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(|s| Some(s.to_owned()))
        .map_err(|e| RealtyError::schema(name, format!("not valid UTF-8: {e}")))
}

fn bad_argument(name: &'static str) -> String {
    serving::error_envelope(&RealtyError::config(name, "null pointer"))
}

fn string_to_raw(s: String) -> *mut c_char {
    // serde_json escapes control characters, so interior NULs cannot occur.
    match CString::new(s) {
        Ok(cstring) => cstring.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}
