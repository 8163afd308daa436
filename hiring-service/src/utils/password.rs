use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Plain-text password held only long enough to hash or verify it.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// PHC-formatted Argon2 hash as stored in `users.password_hash`.
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash with Argon2id and a fresh random salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Returns `Ok(())` only when the password matches the stored hash.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Password verification failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_phc_argon2() {
        let hash = hash_password(&Password::new("correct horse".to_string())).unwrap();
        assert!(hash.as_str().starts_with("$argon2id$"));
    }

    #[test]
    fn verifies_only_the_original_password() {
        let password = Password::new("correct horse".to_string());
        let hash = hash_password(&password).unwrap();

        assert!(verify_password(&password, &hash).is_ok());
        assert!(verify_password(&Password::new("battery staple".to_string()), &hash).is_err());
    }

    #[test]
    fn salts_differ_between_hashes() {
        let password = Password::new("correct horse".to_string());
        let first = hash_password(&password).unwrap();
        let second = hash_password(&password).unwrap();
        assert_ne!(first.as_str(), second.as_str());
    }

    #[test]
    fn garbage_hash_is_rejected() {
        let password = Password::new("correct horse".to_string());
        let hash = PasswordHashString::new("not-a-hash".to_string());
        assert!(verify_password(&password, &hash).is_err());
    }

    #[test]
    fn debug_output_hides_password() {
        let password = Password::new("correct horse".to_string());
        assert_eq!(format!("{:?}", password), "Password(***)");
    }
}
