use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::data::user::PasswordHash;
use crate::error::CredentialError;

/// Turns plaintext passwords into stored hashes and checks them later.
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, password: &str) -> Result<PasswordHash, CredentialError>;

    /// `false` for a wrong password as well as for a hash that can't be parsed.
    fn verify(&self, password: &str, hash: &PasswordHash) -> bool;
}

pub type DynVerifier = Box<dyn CredentialVerifier>;

/// Argon2id with a random salt per password, stored as a PHC string.
#[derive(Clone, Default)]
pub struct Argon2Verifier {
    argon: Argon2<'static>,
}

impl Argon2Verifier {
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Argon2Verifier, CredentialError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| CredentialError(e.to_string()))?;

        Ok(Argon2Verifier {
            argon: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn hash(&self, password: &str) -> Result<PasswordHash, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError(e.to_string()))?;

        Ok(PasswordHash::from_phc(hash.to_string()))
    }

    fn verify(&self, password: &str, hash: &PasswordHash) -> bool {
        let parsed = match argon2::PasswordHash::new(hash.as_phc()) {
            Ok(it) => it,
            Err(e) => {
                tracing::warn!("stored password hash is unreadable: {}", e);
                return false;
            }
        };

        self.argon
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) fn cheap_verifier() -> Argon2Verifier {
    Argon2Verifier::with_params(1024, 1, 1).expect("valid argon2 parameters")
}
