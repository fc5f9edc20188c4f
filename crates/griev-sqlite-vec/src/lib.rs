//! Registers the sqlite-vec extension for every SQLite connection the
//! process opens, so candidate retrieval can use `vec_distance_cosine` in
//! SQL. Registration is process-wide and happens at most once; when it is
//! skipped or fails, callers fall back to a pure-Rust cosine scan.

use std::sync::OnceLock;

/// Set to `1`, `true`, or `on` to skip sqlite-vec registration entirely.
const DISABLE_ENV: &str = "GRIEV_DISABLE_SQLITE_VEC";

static REGISTRATION: OnceLock<Result<(), String>> = OnceLock::new();

/// Register sqlite-vec as an auto-extension for all future connections.
///
/// # Errors
///
/// Returns a description of why registration did not happen: either the
/// kill-switch env var is set, or `sqlite3_auto_extension` itself failed.
pub fn register_auto_extension() -> Result<(), String> {
    if matches!(
        std::env::var(DISABLE_ENV).ok().as_deref(),
        Some("1" | "true" | "on")
    ) {
        return Err(format!("sqlite-vec registration disabled by {DISABLE_ENV}"));
    }

    REGISTRATION.get_or_init(register_once).clone()
}

fn register_once() -> Result<(), String> {
    #[allow(clippy::transmute_ptr_to_ptr)]
    let entrypoint: unsafe extern "C" fn(
        *mut rusqlite::ffi::sqlite3,
        *mut *const std::os::raw::c_char,
        *const rusqlite::ffi::sqlite3_api_routines,
    ) -> std::os::raw::c_int =
        unsafe { std::mem::transmute(sqlite_vec::sqlite3_vec_init as *const ()) };

    let rc = unsafe { rusqlite::ffi::sqlite3_auto_extension(Some(entrypoint)) };
    if rc == rusqlite::ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(format!("sqlite3_auto_extension failed with rc={rc}"))
    }
}
