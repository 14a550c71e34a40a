//! OS keyring lookups for API keys not supplied on the command line or environment.

use keyring::Entry;

const SERVICE_NAME: &str = "anime-nfo-updater";
pub const CLAUDE_ACCOUNT: &str = "claude";
pub const YOUTUBE_ACCOUNT: &str = "youtube";

/// Read-only secret source, keyed by account name.
pub trait SecretStore {
    fn lookup(&self, account: &str) -> Result<Option<String>, String>;
}

/// Secret store backed by the platform keyring.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

fn entry(account: &str) -> Result<Entry, String> {
    Entry::new(SERVICE_NAME, account)
        .map_err(|err| format!("failed to create keyring entry for '{account}': {err}"))
}

fn keyring_error_hint(error: &str) -> Option<String> {
    if error.contains("org.freedesktop.DBus.Error.ServiceUnknown") {
        return Some(
            "no Secret Service provider is available. Start GNOME Keyring or KeePassXC Secret Service, or pass the key through the environment."
                .to_string(),
        );
    }
    None
}

fn format_keyring_error(account: &str, error: &str) -> String {
    let base = format!("loading '{account}' key from system keyring failed: {error}");
    match keyring_error_hint(error) {
        Some(hint) => format!("{base}. Hint: {hint}"),
        None => base,
    }
}

impl SecretStore for KeyringStore {
    fn lookup(&self, account: &str) -> Result<Option<String>, String> {
        let entry = entry(account)?;
        match entry.get_password() {
            Ok(secret) if secret.trim().is_empty() => Ok(None),
            Ok(secret) => Ok(Some(secret.trim().to_string())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(format_keyring_error(account, &err.to_string())),
        }
    }
}
