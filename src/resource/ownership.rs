//! User and group name resolution

use anyhow::anyhow;
use declarative::{Error, Result};
use std::ffi::CString;

/// Resolve a user name (or numeric id) to a uid
pub fn uid_for(name: &str) -> Result<u32> {
    if let Ok(uid) = name.parse::<u32>() {
        return Ok(uid);
    }
    let c_name = c_string(name)?;
    // SAFETY: `c_name` is NUL-terminated and outlives the call. The returned
    // record is read before any other passwd lookup can overwrite it.
    let uid = unsafe {
        let pw = libc::getpwnam(c_name.as_ptr());
        if pw.is_null() { None } else { Some((*pw).pw_uid) }
    };
    uid.ok_or_else(|| Error::Other(anyhow!("unknown user: {}", name)))
}

/// Resolve a group name (or numeric id) to a gid
pub fn gid_for(name: &str) -> Result<u32> {
    if let Ok(gid) = name.parse::<u32>() {
        return Ok(gid);
    }
    let c_name = c_string(name)?;
    // SAFETY: as in `uid_for`, for the group database
    let gid = unsafe {
        let gr = libc::getgrnam(c_name.as_ptr());
        if gr.is_null() { None } else { Some((*gr).gr_gid) }
    };
    gid.ok_or_else(|| Error::Other(anyhow!("unknown group: {}", name)))
}

fn c_string(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::Other(anyhow!("invalid account name: {:?}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_resolves_to_zero() {
        assert_eq!(uid_for("root").unwrap(), 0);
        assert_eq!(gid_for("0").unwrap(), 0);
    }

    #[test]
    fn test_unknown_user_is_error() {
        assert!(uid_for("no-such-user-chefboot").is_err());
        assert!(gid_for("no-such-group-chefboot").is_err());
        assert!(uid_for("bad\0name").is_err());
    }
}
