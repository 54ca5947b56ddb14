use anyhow::{bail, Context, Result};
use rand::Rng;

use parley_db::Database;

/// Upper bound on allocation attempts. Each stem only has 9000 suffixes, so
/// hitting the cap means the space is effectively full for this email and
/// the signup fails instead of spinning.
pub const MAX_ATTEMPTS: usize = 32;

/// Candidate handle derived from an email: the local part with everything
/// outside `[A-Za-z0-9_]` stripped, plus a random 4-digit suffix
/// (1000..=9999 inclusive).
pub fn derive_candidate(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let stem: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let suffix: u32 = rand::rng().random_range(1000..=9999);
    format!("{stem}{suffix}")
}

/// Find a username unused at the moment of the check. The check is advisory:
/// a concurrent signup may still claim the candidate before our insert lands,
/// so callers treat a `users.username` UNIQUE violation at insert time as a
/// lost race and allocate again. A storage error here aborts the signup.
pub fn allocate(db: &Database, email: &str) -> Result<String> {
    for _ in 0..MAX_ATTEMPTS {
        let candidate = derive_candidate(email);
        let taken = db
            .username_exists(&candidate)
            .context("username existence check failed")?;
        if !taken {
            return Ok(candidate);
        }
    }

    bail!("no free username for this email after {MAX_ATTEMPTS} attempts")
}
