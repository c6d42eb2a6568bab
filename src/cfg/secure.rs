// src/cfg/secure.rs

use secure_string::SecureString;
use serde::{Deserialize, Deserializer};

/// Deserializes an optional OAuth secret from YAML without keeping a plain copy.
pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<SecureString>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(SecureString::from))
}

/// Plain copy of a secret, for the moment it has to go on the wire.
pub fn reveal(secret: &SecureString) -> String {
    secret.unsecure().to_string()
}
