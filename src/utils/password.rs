use bcrypt::{DEFAULT_COST, hash, verify};
use crate::error::{AppError, AppResult};

const PASSWORD_RULE_MESSAGE: &str = "密碼至少包含數字、字母，並超過8位～";

/// 验证密码强度：9-128 个字符，至少包含一个数字和一个英文字母
pub fn validate_password(password: &str) -> AppResult<()> {
    let len = password.chars().count();
    if len > 128 {
        return Err(AppError::ValidationError(
            "密碼長度不能超過128個字符".to_string(),
        ));
    }

    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if len < 9 || !has_letter || !has_digit {
        return Err(AppError::ValidationError(PASSWORD_RULE_MESSAGE.to_string()));
    }

    Ok(())
}

/// 对密码进行哈希
pub fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::InternalError(format!("密码哈希失败: {}", e)))
}

/// 验证密码
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    verify(password, hash)
        .map_err(|e| AppError::InternalError(format!("密码验证失败: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password() {
        assert!(validate_password("password123").is_ok());
        assert!(validate_password("Password1").is_ok());
        assert!(validate_password("password1").is_ok());
        assert!(validate_password("pass1234").is_err()); // 太短
        assert!(validate_password("passwordabc").is_err()); // 缺少数字
        assert!(validate_password("123456789").is_err()); // 缺少字母
        assert!(validate_password(&format!("a1{}", "x".repeat(127))).is_err()); // 太长
    }

    #[test]
    fn test_hash_and_verify_password() {
        let password = "password123";
        let hashed = hash_password(password).unwrap();

        assert!(verify_password(password, &hashed).unwrap());
        assert!(!verify_password("password124", &hashed).unwrap());
    }
}
