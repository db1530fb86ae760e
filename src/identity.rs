//! Identity resolution and the privilege switch.

use nix::unistd::{setgid, setuid, Gid, Group, Uid, User};
use tracing::debug;

use crate::error::{LaunchError, Result};

/// Resolves a user argument to a uid.
///
/// A decimal string is the id itself and is never looked up; anything else
/// goes through the passwd database.
pub fn resolve_user(name: &str) -> Result<Uid> {
    if let Ok(id) = name.parse::<u32>() {
        return Ok(Uid::from_raw(id));
    }
    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid),
        _ => Err(LaunchError::UnknownUser(name.to_string())),
    }
}

/// Resolves a group argument to a gid, decimal first like [`resolve_user`].
pub fn resolve_group(name: &str) -> Result<Gid> {
    if let Ok(id) = name.parse::<u32>() {
        return Ok(Gid::from_raw(id));
    }
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid),
        _ => Err(LaunchError::UnknownGroup(name.to_string())),
    }
}

/// Applies the requested identity change, group first.
///
/// The group must change while the process still holds the privilege to do
/// so; the uid change can take that privilege away. Any failure is fatal,
/// the child must not run under a half-switched identity.
pub fn switch(uid: Option<Uid>, gid: Option<Gid>) -> Result<()> {
    if let Some(gid) = gid {
        setgid(gid).map_err(|source| LaunchError::SetGid {
            gid: gid.as_raw(),
            source,
        })?;
        debug!(gid = gid.as_raw(), "changed group id");
    }
    if let Some(uid) = uid {
        setuid(uid).map_err(|source| LaunchError::SetUid {
            uid: uid.as_raw(),
            source,
        })?;
        debug!(uid = uid.as_raw(), "changed user id");
    }
    Ok(())
}
