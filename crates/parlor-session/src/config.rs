//! Session configuration and identity minting.

use parlor_protocol::UserId;
use rand::Rng;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Display name that grants admin rights. Compared case-insensitively.
    ///
    /// Default: `"admin"`.
    pub admin_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            admin_name: "admin".to_string(),
        }
    }
}

impl SessionConfig {
    /// Returns `true` if `name` is the reserved admin name, ignoring case.
    pub fn is_admin(&self, name: &str) -> bool {
        name.to_lowercase() == self.admin_name.to_lowercase()
    }
}

// ---------------------------------------------------------------------------
// Identity minting
// ---------------------------------------------------------------------------

/// Generates a session token: 16 random bytes (128 bits) as 32 lowercase
/// hex characters.
///
/// `rand::rng()` is a thread-local CSPRNG, so tokens are unguessable.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Mints a fresh user id (random UUID v4).
pub fn new_user_id() -> UserId {
    UserId(uuid::Uuid::new_v4().to_string())
}
