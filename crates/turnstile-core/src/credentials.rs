//! Email and password rules for Turnstile accounts.
//!
//! Emails are stored trimmed and lowercased so the `users.email` unique index is
//! effectively case-insensitive.

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 128;
pub const EMAIL_MAX_LEN: usize = 254;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check only; deliverability is the provider's (or the mailer's) problem.
pub fn is_valid_email(email: &str) -> bool {
    let e = email.trim();
    if e.is_empty() || e.len() > EMAIL_MAX_LEN || e.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = e.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err("Please enter a valid email address")
    }
}

pub fn validate_password(password: &str) -> Result<(), &'static str> {
    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN {
        return Err("Password must be at least 6 characters");
    }
    if len > PASSWORD_MAX_LEN {
        return Err("Password must be at most 128 characters");
    }
    Ok(())
}
