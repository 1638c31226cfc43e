//! Random resource names and derived credentials.
//!
//! Azure requires globally unique names for SQL servers and regionally unique
//! names for most other resources, so every run suffixes its name prefixes
//! with fresh random material.

use uuid::Uuid;

/// Length of the random suffix appended to name prefixes.
/// Eight hex chars keep SQL server names well under the 63-character limit
/// while making cross-run collisions implausible.
const SUFFIX_LEN: usize = 8;

/// Build a resource name from a prefix and a random suffix.
pub fn random_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, &suffix[..SUFFIX_LEN])
}

/// Derive a throwaway administrator password for this run.
///
/// The password is not sourced from a secret manager; the demo tears down
/// everything it creates. The fixed frame around the random hex satisfies
/// the provider's complexity rules (upper, lower, digit, special).
pub fn derive_password() -> String {
    let entropy = Uuid::new_v4().simple().to_string();
    format!("Fp{}!aZ9", &entropy[..12])
}
