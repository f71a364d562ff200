//! 密码值对象
//!
//! 只保存 Argon2 哈希；明文只在校验与一次性返回时短暂存在

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::Rng;
use rand::distributions::Alphanumeric;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

use ag_errors::{AppError, AppResult};

/// 最小密码长度
pub const MIN_PASSWORD_LEN: usize = 8;

/// 重置密码长度
pub const GENERATED_PASSWORD_LEN: usize = 12;

/// 哈希后的密码
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashedPassword(String);

impl HashedPassword {
    /// 从明文生成哈希
    pub fn from_plain(plain: &str) -> AppResult<Self> {
        let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
            .map_err(|e| AppError::internal(format!("Failed to build salt: {}", e)))?;

        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| AppError::internal(format!("Failed to hash password: {}", e)))?
            .to_string();

        Ok(Self(hash))
    }

    /// 从已存储的哈希恢复
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// 校验明文是否匹配
    pub fn verify(&self, plain: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(&self.0)
            .map_err(|e| AppError::internal(format!("Stored password hash is invalid: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashedPassword([REDACTED])")
    }
}

/// 生成随机密码（字母数字）
pub fn generate_password() -> SecretString {
    let plain: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect();
    SecretString::new(plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_hash_and_verify() {
        let hashed = HashedPassword::from_plain("correct horse").unwrap();
        assert!(hashed.verify("correct horse").unwrap());
        assert!(!hashed.verify("wrong horse").unwrap());
        assert!(hashed.as_str().starts_with("$argon2"));
    }

    #[test]
    fn test_debug_is_redacted() {
        let hashed = HashedPassword::from_plain("secret-value").unwrap();
        assert!(!format!("{:?}", hashed).contains("argon2"));
    }

    #[test]
    fn test_generated_password_shape() {
        let password = generate_password();
        let plain = password.expose_secret();
        assert_eq!(plain.len(), GENERATED_PASSWORD_LEN);
        assert!(plain.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
