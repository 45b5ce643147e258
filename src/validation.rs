//! 请求参数校验，供认证、管理与列表路由共用。

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// 密码：8-256 字符，需同时包含字母和数字
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    let len = password.chars().count();
    if len < 8 {
        return Err("密码长度不能少于8个字符");
    }
    if len > 256 {
        return Err("密码长度不能超过256个字符");
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err("密码必须同时包含字母和数字");
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || local.starts_with('.') || local.ends_with('.') {
        return false;
    }
    let local_ok = local
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'+' | b'-'));
    let domain_ok = domain
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.'));
    local_ok
        && !local.contains("..")
        && domain_ok
        && domain.contains('.')
        && domain
            .split('.')
            .all(|part| !part.is_empty() && !part.starts_with('-') && !part.ends_with('-'))
}

/// 用户名：2-50 字符，允许字母、数字、下划线、连字符和空格
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    let count = username.chars().count();
    if !(2..=50).contains(&count) {
        return Err("用户名长度需在2到50个字符之间");
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ' '))
    {
        return Err("用户名只能包含字母、数字、下划线、连字符和空格");
    }
    Ok(())
}

/// 页码从 1 开始；返回 (page, per_page, offset)。
pub fn page_window(page: Option<u64>, per_page: Option<u64>) -> (u64, u64, usize) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, per_page, ((page - 1) * per_page) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules() {
        assert!(validate_password("short1").is_err());
        assert!(validate_password("allletters").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("green2030").is_ok());
    }

    #[test]
    fn email_rules() {
        assert!(is_valid_email("learner@example.org"));
        assert!(!is_valid_email("learner@example"));
        assert!(!is_valid_email("a..b@example.org"));
        assert!(!is_valid_email("@example.org"));
        assert!(!is_valid_email("a@-bad.org"));
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("x").is_err());
        assert!(validate_username("eco learner").is_ok());
        assert!(validate_username("bad<name>").is_err());
    }

    #[test]
    fn page_window_is_clamped() {
        assert_eq!(page_window(None, None), (1, 20, 0));
        assert_eq!(page_window(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(page_window(Some(0), Some(1000)), (1, 100, 0));
    }
}
