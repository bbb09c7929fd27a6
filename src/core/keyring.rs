use std::error::Error;
use std::fmt;

use keyring::Entry;
use tracing::debug;

use crate::core::secret::ApiSecret;

const KEYRING_SERVICE: &str = "charchat";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was
/// temporarily unavailable (for example when the keychain service is
/// locked or inaccessible). Permanent errors surface the underlying
/// cause directly so callers can report them to the user.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Provider secrets kept in the platform keyring, one entry per
/// credential slot (`openai`, `openrouter`, `huggingface`).
#[derive(Debug, Clone, Copy)]
pub struct SecretVault {
    use_keyring: bool,
}

impl SecretVault {
    pub fn system() -> Self {
        Self { use_keyring: true }
    }

    /// A vault that never touches the keyring and always comes up empty.
    pub fn disabled() -> Self {
        Self { use_keyring: false }
    }

    pub fn load(&self, slot: &str) -> Result<Option<ApiSecret>, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(None);
        }
        let entry = Entry::new(KEYRING_SERVICE, slot)?;
        match entry.get_password() {
            Ok(secret) => {
                debug!(slot, "Keyring lookup found a secret");
                Ok(ApiSecret::new(secret))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(slot, "Keyring lookup found nothing");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn store(&self, slot: &str, secret: &ApiSecret) -> Result<(), KeyringAccessError> {
        if !self.use_keyring {
            return Ok(());
        }
        let entry = Entry::new(KEYRING_SERVICE, slot)?;
        entry.set_password(secret.expose())?;
        debug!(slot, credential = %secret, "Stored secret in keyring");
        Ok(())
    }

    /// Forget a stored secret. Removing an absent entry is not an error.
    pub fn remove(&self, slot: &str) -> Result<(), KeyringAccessError> {
        if !self.use_keyring {
            return Ok(());
        }
        let entry = Entry::new(KEYRING_SERVICE, slot)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
