// src/privilege.rs
//! Effective-identity bracketing.
//!
//! The `coursework` binary is installed setuid so it can write into
//! instructor-owned directories. Anything that touches student files has to
//! happen as the invoking user instead, so those operations are wrapped in an
//! [`IdentityGuard`], which swaps the effective uid for the real uid and puts
//! it back when dropped.

use std::ffi::CStr;
use std::io;

use crate::errors::{CourseworkError, Result};

/// Holds the process at its real uid until dropped.
#[must_use = "the previous identity is restored as soon as the guard is dropped"]
pub struct IdentityGuard {
    saved_euid: libc::uid_t,
}

/// Switch the effective uid to the real uid for the lifetime of the returned guard.
pub fn scoped_privilege_elevation() -> Result<IdentityGuard> {
    // SAFETY: plain syscalls without pointer arguments.
    let (real, effective) = unsafe { (libc::getuid(), libc::geteuid()) };

    if unsafe { libc::seteuid(real) } != 0 {
        return Err(CourseworkError::Privilege(io::Error::last_os_error()));
    }

    log::debug!("effective uid {} -> {}", effective, real);
    Ok(IdentityGuard { saved_euid: effective })
}

/// Run `f` as the real user, restoring the effective identity afterwards.
pub fn with_real_identity<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    let _guard = scoped_privilege_elevation()?;
    f()
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        if unsafe { libc::seteuid(self.saved_euid) } != 0 {
            // Carrying on under the wrong identity is worse than dying here.
            log::error!(
                "failed to restore effective uid {}: {}",
                self.saved_euid,
                io::Error::last_os_error()
            );
            std::process::abort();
        }
    }
}

/// Login name of the real uid, looked up in the passwd database.
pub fn real_user_name() -> Option<String> {
    // SAFETY: getpwuid returns either null or a pointer into static storage
    // that stays valid until the next passwd lookup; we copy out immediately.
    unsafe {
        let entry = libc::getpwuid(libc::getuid());
        if entry.is_null() || (*entry).pw_name.is_null() {
            return None;
        }
        CStr::from_ptr((*entry).pw_name)
            .to_str()
            .ok()
            .map(str::to_string)
    }
}

/// Numeric gid of a named group, if the group exists.
pub fn group_id(name: &str) -> Option<libc::gid_t> {
    let name = std::ffi::CString::new(name).ok()?;
    // SAFETY: `name` is a valid NUL-terminated string for the duration of the call.
    unsafe {
        let entry = libc::getgrnam(name.as_ptr());
        if entry.is_null() {
            None
        } else {
            Some((*entry).gr_gid)
        }
    }
}
