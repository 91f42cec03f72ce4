//! Current OS user name, getpass-style: environment first, then passwd.

/// Environment keys consulted before falling back to a passwd lookup,
/// in order.
const USER_ENV_KEYS: &[&str] = &["LOGNAME", "USER", "LNAME", "USERNAME"];

/// Resolve the current user name. `None` when no env key is set and the
/// current uid has no passwd entry.
pub fn os_user_name() -> Option<String> {
    for key in USER_ENV_KEYS {
        if let Ok(value) = std::env::var(key) {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    passwd_user_name()
}

#[cfg(unix)]
fn passwd_user_name() -> Option<String> {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|u| u.name)
}

#[cfg(not(unix))]
fn passwd_user_name() -> Option<String> {
    None
}
