use regex::Regex;
use std::sync::OnceLock;

use crate::error::{AppError, AppResult};

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("valid phone regex"))
}

/// 去掉空格、短横线与括号，保留可选的 `+` 前缀
pub fn format_phone(phone: &str) -> String {
    phone
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect()
}

/// 校验并返回规范化后的手机号（10-15 位数字，可带 `+`）
pub fn validate_phone(phone: &str) -> AppResult<String> {
    let formatted = format_phone(phone);
    if !phone_regex().is_match(&formatted) {
        return Err(AppError::ValidationError(
            "手機號碼格式無效，需為 10-15 位數字".to_string(),
        ));
    }
    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone() {
        assert_eq!(validate_phone("85251738110").unwrap(), "85251738110");
        assert_eq!(validate_phone("+852 5173-8110").unwrap(), "+85251738110");
        assert_eq!(validate_phone("(176) 0160-0216").unwrap(), "17601600216");
        assert!(validate_phone("123456789").is_err());
        assert!(validate_phone("1234567890123456").is_err());
        assert!(validate_phone("85251abc110").is_err());
        assert!(validate_phone("").is_err());
    }

    #[test]
    fn test_validate_phone_rejects_non_ascii_digits() {
        assert!(validate_phone("٠١٢٣٤٥٦٧٨٩").is_err());
        assert!(validate_phone("８５２５１７３８１１０").is_err());
        assert!(validate_phone("+852５１７３８１１０").is_err());
    }

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone(" +1 (234) 567-8901 "), "+12345678901");
    }
}
