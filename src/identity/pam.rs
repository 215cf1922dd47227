//! Host account check through Linux-PAM (`pam_authenticate` + `pam_acct_mgmt`).

use super::Authenticator;
use crate::common::{WatchpostError, Result};
use libc::{c_char, c_int, c_void};
use std::ffi::CString;
use std::sync::Mutex;

const PAM_SUCCESS: c_int = 0;
const PAM_PROMPT_ECHO_OFF: c_int = 1;
const PAM_PROMPT_ECHO_ON: c_int = 2;
const PAM_BUF_ERR: c_int = 5;

#[repr(C)]
struct PamMessage {
    msg_style: c_int,
    msg: *const c_char,
}

#[repr(C)]
struct PamResponse {
    resp: *mut c_char,
    resp_retcode: c_int,
}

type ConvFn = extern "C" fn(
    num_msg: c_int,
    msg: *mut *const PamMessage,
    resp: *mut *mut PamResponse,
    appdata_ptr: *mut c_void,
) -> c_int;

#[repr(C)]
struct PamConv {
    conv: Option<ConvFn>,
    appdata_ptr: *mut c_void,
}

#[repr(C)]
struct PamHandle {
    _private: [u8; 0],
}

#[link(name = "pam")]
extern "C" {
    fn pam_start(
        service_name: *const c_char,
        user: *const c_char,
        pam_conversation: *const PamConv,
        pamh: *mut *mut PamHandle,
    ) -> c_int;
    fn pam_authenticate(pamh: *mut PamHandle, flags: c_int) -> c_int;
    fn pam_acct_mgmt(pamh: *mut PamHandle, flags: c_int) -> c_int;
    fn pam_end(pamh: *mut PamHandle, pam_status: c_int) -> c_int;
}

struct ConvData {
    user: CString,
    password: CString,
}

/// Answers password prompts with the password and visible prompts with the user.
extern "C" fn conversation(
    num_msg: c_int,
    msg: *mut *const PamMessage,
    resp: *mut *mut PamResponse,
    appdata_ptr: *mut c_void,
) -> c_int {
    if num_msg <= 0 || msg.is_null() || resp.is_null() || appdata_ptr.is_null() {
        return PAM_BUF_ERR;
    }

    unsafe {
        let data = &*(appdata_ptr as *const ConvData);
        let replies = libc::calloc(num_msg as usize, std::mem::size_of::<PamResponse>()) as *mut PamResponse;
        if replies.is_null() {
            return PAM_BUF_ERR;
        }

        for i in 0..num_msg as usize {
            let message = *msg.add(i);
            if message.is_null() {
                continue;
            }
            let answer = match (*message).msg_style {
                PAM_PROMPT_ECHO_OFF => data.password.as_ptr(),
                PAM_PROMPT_ECHO_ON => data.user.as_ptr(),
                _ => continue,
            };
            (*replies.add(i)).resp = libc::strdup(answer);
            (*replies.add(i)).resp_retcode = 0;
        }

        // PAM takes ownership of `replies` and frees it
        *resp = replies;
    }
    PAM_SUCCESS
}

pub struct PamAuthenticator {
    service: CString,
    // PAM modules are not guaranteed to be reentrant
    lock: Mutex<()>,
}

impl PamAuthenticator {
    pub fn new(service: &str) -> Result<Self> {
        let service = CString::new(service)
            .map_err(|_| WatchpostError::Auth("PAM service name contains NUL".into()))?;
        Ok(Self { service, lock: Mutex::new(()) })
    }

    fn check(&self, username: &str, password: &str) -> Result<bool> {
        let data = ConvData {
            user: CString::new(username)
                .map_err(|_| WatchpostError::Auth("username contains NUL".into()))?,
            password: CString::new(password)
                .map_err(|_| WatchpostError::Auth("password contains NUL".into()))?,
        };
        let conv = PamConv {
            conv: Some(conversation),
            appdata_ptr: &data as *const ConvData as *mut c_void,
        };

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        unsafe {
            let mut handle: *mut PamHandle = std::ptr::null_mut();
            let mut status = pam_start(self.service.as_ptr(), data.user.as_ptr(), &conv, &mut handle);
            if status == PAM_SUCCESS {
                status = pam_authenticate(handle, 0);
            }
            if status == PAM_SUCCESS {
                status = pam_acct_mgmt(handle, 0);
            }
            if !handle.is_null() {
                pam_end(handle, status);
            }
            tracing::debug!("PAM status for web login: {}", status);
            Ok(status == PAM_SUCCESS)
        }
    }
}

impl Authenticator for PamAuthenticator {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        match self.check(username, password) {
            Ok(ok) => ok,
            Err(e) => {
                tracing::debug!("PAM check not attempted: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_bytes_are_rejected_before_pam() {
        let auth = PamAuthenticator::new("login").unwrap();
        assert!(!auth.authenticate("ro\0ot", "pw"));
        assert!(PamAuthenticator::new("lo\0gin").is_err());
    }
}
