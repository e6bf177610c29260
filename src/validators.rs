/// Input validators
///
/// Each request is checked field by field and every failure is collected,
/// so the caller learns about all bad fields in one round trip. Validators
/// also normalize in place (trimmed text, lower-case email).

use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::service::{
    ForgotPasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
    ResetPasswordRequest,
};
use crate::error::{AppError, FieldError};
use crate::users::repository::UserFilter;
use crate::users::service::{
    ChangePasswordRequest, CreateUserRequest, ListUsersQuery, UpdateProfileRequest,
    UpdateUserRequest,
};

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_NAME_LENGTH: usize = 2;
const MAX_NAME_LENGTH: usize = 50;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 30;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 30;
const MAX_STORE_NAME_LENGTH: usize = 100;
const MIN_SEARCH_LENGTH: usize = 2;
const MAX_PAGE_LIMIT: i64 = 100;
const MAX_PAGE: i64 = 1_000_000;

const PASSWORD_SPECIALS: &str = "@$!%*?&";

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).unwrap();

    static ref PHONE_REGEX: Regex = Regex::new(r"^[0-9]{10}$").unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_.]+$").unwrap();

    static ref PASSWORD_CHARSET: Regex = Regex::new(r"^[A-Za-z\d@$!%*?&]+$").unwrap();
}

/// Accumulates field errors across a whole request
#[derive(Debug, Default)]
struct Collector {
    errors: Vec<FieldError>,
}

impl Collector {
    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Record the error of `result`, or hand back its value
    fn check<T>(&mut self, field: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.fail(field, message);
                None
            }
        }
    }

    /// Normalize an optional field in place; `None` stays `None`
    fn check_optional(
        &mut self,
        field: &str,
        value: &mut Option<String>,
        validate: fn(&str) -> Result<String, String>,
    ) {
        if let Some(raw) = value.as_deref() {
            if let Some(normalized) = self.check(field, validate(raw)) {
                *value = Some(normalized);
            }
        }
    }

    fn required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.fail(field, format!("{} is required", field));
        }
    }

    fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation_fields(self.errors))
        }
    }
}

/// Validates an email address, returning it trimmed and lower-cased
pub fn is_valid_email(email: &str) -> Result<String, String> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err("email is required".to_string());
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(format!("email must be at most {} characters", MAX_EMAIL_LENGTH));
    }
    if has_suspicious_email_patterns(trimmed) || !EMAIL_REGEX.is_match(trimmed) {
        return Err("email must be a valid email address".to_string());
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a person or store name, returning it trimmed
pub fn is_valid_name(name: &str) -> Result<String, String> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();

    if trimmed.is_empty() {
        return Err("name is required".to_string());
    }
    if length < MIN_NAME_LENGTH || length > MAX_NAME_LENGTH {
        return Err(format!(
            "name must be between {} and {} characters",
            MIN_NAME_LENGTH, MAX_NAME_LENGTH
        ));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err("name contains invalid characters".to_string());
    }

    Ok(trimmed.to_string())
}

/// Checks the password policy: 8 to 30 characters drawn from letters,
/// digits and `@$!%*?&`, with at least one of each class.
pub fn is_strong_password(password: &str) -> Result<(), String> {
    let length = password.chars().count();

    if password.is_empty() {
        return Err("password is required".to_string());
    }
    if length < MIN_PASSWORD_LENGTH || length > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "password must be between {} and {} characters",
            MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH
        ));
    }

    let complete = PASSWORD_CHARSET.is_match(password)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    if !complete {
        return Err(format!(
            "password must contain an uppercase letter, a lowercase letter, a digit and one of {}",
            PASSWORD_SPECIALS
        ));
    }

    Ok(())
}

pub fn is_valid_phone(phone: &str) -> Result<String, String> {
    let trimmed = phone.trim();
    if !PHONE_REGEX.is_match(trimmed) {
        return Err("phone must contain exactly 10 digits".to_string());
    }
    Ok(trimmed.to_string())
}

pub fn is_valid_username(username: &str) -> Result<String, String> {
    let trimmed = username.trim();
    let length = trimmed.chars().count();

    if length < MIN_USERNAME_LENGTH || length > MAX_USERNAME_LENGTH {
        return Err(format!(
            "username must be between {} and {} characters",
            MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
        ));
    }
    if !USERNAME_REGEX.is_match(trimmed) {
        return Err("username may only contain letters, digits, '_' and '.'".to_string());
    }
    // Would collide with phone numbers at login
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err("username must contain at least one letter or symbol".to_string());
    }
    Ok(trimmed.to_string())
}

fn is_valid_store_name(name: &str) -> Result<String, String> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();

    if length < MIN_NAME_LENGTH || length > MAX_STORE_NAME_LENGTH {
        return Err(format!(
            "storeName must be between {} and {} characters",
            MIN_NAME_LENGTH, MAX_STORE_NAME_LENGTH
        ));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err("storeName contains invalid characters".to_string());
    }
    Ok(trimmed.to_string())
}

/// Detects malformed addresses the regex lets through
fn has_suspicious_email_patterns(email: &str) -> bool {
    // Local part is limited to 64 octets
    if let Some(at_pos) = email.find('@') {
        if email[..at_pos].len() > 64 {
            return true;
        }
    }

    email.matches('@').count() != 1 || email.contains('\0') || email.contains("..")
}

pub fn validate_register(request: &mut RegisterRequest) -> Result<(), AppError> {
    let mut c = Collector::default();

    if let Some(name) = c.check("name", is_valid_name(&request.name)) {
        request.name = name;
    }
    if let Some(email) = c.check("email", is_valid_email(&request.email)) {
        request.email = email;
    }
    c.check("password", is_strong_password(&request.password));
    if request.password_confirm != request.password {
        c.fail("passwordConfirm", "passwords do not match");
    }
    c.check_optional("storeName", &mut request.store_name, is_valid_store_name);
    c.check_optional("phone", &mut request.phone, is_valid_phone);
    c.check_optional("username", &mut request.username, is_valid_username);

    c.finish()
}

pub fn validate_login(request: &mut LoginRequest) -> Result<(), AppError> {
    let mut c = Collector::default();

    request.identifier = request.identifier.trim().to_string();
    c.required("identifier", &request.identifier);
    c.required("password", &request.password);
    if matches!(request.store_id, Some(id) if id <= 0) {
        c.fail("storeId", "storeId must be a positive integer");
    }

    c.finish()
}

pub fn validate_refresh(request: &RefreshTokenRequest) -> Result<(), AppError> {
    let mut c = Collector::default();
    c.required("refreshToken", &request.refresh_token);
    c.finish()
}

pub fn validate_forgot_password(request: &mut ForgotPasswordRequest) -> Result<(), AppError> {
    let mut c = Collector::default();
    if let Some(email) = c.check("email", is_valid_email(&request.email)) {
        request.email = email;
    }
    c.finish()
}

pub fn validate_reset_password(request: &ResetPasswordRequest) -> Result<(), AppError> {
    let mut c = Collector::default();

    c.required("token", &request.token);
    c.check("password", is_strong_password(&request.password));
    if request.password_confirm != request.password {
        c.fail("passwordConfirm", "passwords do not match");
    }

    c.finish()
}

pub fn validate_create_user(request: &mut CreateUserRequest) -> Result<(), AppError> {
    let mut c = Collector::default();

    if let Some(name) = c.check("name", is_valid_name(&request.name)) {
        request.name = name;
    }
    if let Some(email) = c.check("email", is_valid_email(&request.email)) {
        request.email = email;
    }
    c.check("password", is_strong_password(&request.password));
    c.check_optional("phone", &mut request.phone, is_valid_phone);
    c.check_optional("username", &mut request.username, is_valid_username);
    if matches!(request.store_id, Some(id) if id <= 0) {
        c.fail("storeId", "storeId must be a positive integer");
    }

    c.finish()
}

pub fn validate_update_user(request: &mut UpdateUserRequest) -> Result<(), AppError> {
    let mut c = Collector::default();

    let empty = request.name.is_none()
        && request.email.is_none()
        && request.phone.is_none()
        && request.role.is_none()
        && request.is_active.is_none();
    if empty {
        c.fail("body", "at least one field must be provided");
    }
    c.check_optional("name", &mut request.name, is_valid_name);
    c.check_optional("email", &mut request.email, is_valid_email);
    c.check_optional("phone", &mut request.phone, is_valid_phone);

    c.finish()
}

pub fn validate_update_profile(request: &mut UpdateProfileRequest) -> Result<(), AppError> {
    let mut c = Collector::default();

    if request.name.is_none() && request.email.is_none() && request.phone.is_none() {
        c.fail("body", "at least one field must be provided");
    }
    c.check_optional("name", &mut request.name, is_valid_name);
    c.check_optional("email", &mut request.email, is_valid_email);
    c.check_optional("phone", &mut request.phone, is_valid_phone);

    c.finish()
}

pub fn validate_change_password(request: &ChangePasswordRequest) -> Result<(), AppError> {
    let mut c = Collector::default();

    if matches!(request.current_password.as_deref(), Some(current) if current.is_empty()) {
        c.fail("currentPassword", "currentPassword must not be empty");
    }
    c.check("newPassword", is_strong_password(&request.new_password));
    if request.new_password_confirm != request.new_password {
        c.fail("newPasswordConfirm", "passwords do not match");
    }

    c.finish()
}

/// Check list parameters and fill in defaults
pub fn validate_list_query(query: ListUsersQuery) -> Result<UserFilter, AppError> {
    let mut c = Collector::default();
    let defaults = UserFilter::default();

    let page = query.page.unwrap_or(defaults.page);
    if !(1..=MAX_PAGE).contains(&page) {
        c.fail("page", format!("page must be between 1 and {}", MAX_PAGE));
    }
    let limit = query.limit.unwrap_or(defaults.limit);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        c.fail("limit", format!("limit must be between 1 and {}", MAX_PAGE_LIMIT));
    }
    let search = query.search.map(|s| s.trim().to_string());
    if matches!(&search, Some(s) if s.chars().count() < MIN_SEARCH_LENGTH) {
        c.fail(
            "search",
            format!("search must be at least {} characters", MIN_SEARCH_LENGTH),
        );
    }

    c.finish()?;
    Ok(UserFilter {
        page,
        limit,
        search,
        role: query.role,
        is_active: query.is_active,
        sort_by: query.sort_by.unwrap_or(defaults.sort_by),
        sort_order: query.sort_order.unwrap_or(defaults.sort_order),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repository::{SortField, SortOrder};

    fn fields(err: AppError) -> Vec<String> {
        err.errors.into_iter().map(|e| e.field).collect()
    }

    #[test]
    fn test_valid_email() {
        assert_eq!(is_valid_email("user@example.com").unwrap(), "user@example.com");
        assert_eq!(is_valid_email("  User@Example.COM ").unwrap(), "user@example.com");
        assert!(is_valid_email("user+tag@example.co.uk").is_ok());
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(is_valid_email("invalid").is_err());
        assert!(is_valid_email("user@").is_err());
        assert!(is_valid_email("@example.com").is_err());
        assert!(is_valid_email("user@localhost").is_err());
        assert!(is_valid_email("a@b@example.com").is_err());
        assert!(is_valid_email("").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let long_local = format!("{}@example.com", "a".repeat(65));
        assert!(is_valid_email(&long_local).is_err());

        let long_email = format!("{}@{}.com", "a".repeat(60), "b".repeat(250));
        assert!(is_valid_email(&long_email).is_err());
    }

    #[test]
    fn test_name_bounds() {
        assert_eq!(is_valid_name("  Jo ").unwrap(), "Jo");
        assert!(is_valid_name("J").is_err());
        assert!(is_valid_name(&"a".repeat(51)).is_err());
        assert!(is_valid_name(&"é".repeat(50)).is_ok());
        assert!(is_valid_name("Bad\u{0007}Name").is_err());
    }

    #[test]
    fn test_password_policy() {
        assert!(is_strong_password("Passw0rd!").is_ok());
        assert!(is_strong_password("Sh0rt!").is_err());
        assert!(is_strong_password("alllowercase1!").is_err());
        assert!(is_strong_password("ALLUPPERCASE1!").is_err());
        assert!(is_strong_password("NoDigitsHere!").is_err());
        assert!(is_strong_password("NoSpecial123").is_err());
        assert!(is_strong_password("Has Space1!").is_err());
        assert!(is_strong_password(&format!("Aa1!{}", "a".repeat(27))).is_err());
    }

    #[test]
    fn test_phone_and_username() {
        assert!(is_valid_phone("0612345678").is_ok());
        assert!(is_valid_phone("061234567").is_err());
        assert!(is_valid_phone("06-1234567").is_err());
        assert!(is_valid_username("cashier_01").is_ok());
        assert!(is_valid_username("ab").is_err());
        assert!(is_valid_username("no spaces").is_err());
        assert!(is_valid_username("5551234567").is_err());
        assert!(is_valid_username("555").is_err());
        assert!(is_valid_username("555_till").is_ok());
    }

    #[test]
    fn test_register_collects_every_error() {
        let mut request = RegisterRequest {
            name: "A".to_string(),
            email: "nope".to_string(),
            password: "weak".to_string(),
            password_confirm: "other".to_string(),
            phone: Some("123".to_string()),
            ..RegisterRequest::default()
        };

        let err = validate_register(&mut request).unwrap_err();

        assert_eq!(
            fields(err),
            vec!["name", "email", "password", "passwordConfirm", "phone"]
        );
    }

    #[test]
    fn test_register_normalizes() {
        let mut request = RegisterRequest {
            name: " Alice ".to_string(),
            email: "Alice@Example.com".to_string(),
            password: "Passw0rd!".to_string(),
            password_confirm: "Passw0rd!".to_string(),
            store_name: Some(" Corner Shop ".to_string()),
            ..RegisterRequest::default()
        };

        validate_register(&mut request).unwrap();

        assert_eq!(request.name, "Alice");
        assert_eq!(request.email, "alice@example.com");
        assert_eq!(request.store_name.as_deref(), Some("Corner Shop"));
    }

    #[test]
    fn test_update_requires_a_field() {
        let err = validate_update_user(&mut UpdateUserRequest::default()).unwrap_err();
        assert_eq!(fields(err), vec!["body"]);
    }

    #[test]
    fn test_change_password_mismatch() {
        let request = ChangePasswordRequest {
            current_password: Some("Old1pass!".to_string()),
            new_password: "Passw0rd!".to_string(),
            new_password_confirm: "Passw0rd?".to_string(),
        };

        assert_eq!(
            fields(validate_change_password(&request).unwrap_err()),
            vec!["newPasswordConfirm"]
        );
    }

    #[test]
    fn test_list_query_defaults() {
        let filter = validate_list_query(ListUsersQuery::default()).unwrap();

        assert_eq!(filter, UserFilter::default());
        assert_eq!(filter.sort_by, SortField::CreatedAt);
        assert_eq!(filter.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_list_query_bounds() {
        let query = ListUsersQuery {
            page: Some(0),
            limit: Some(101),
            search: Some("a".to_string()),
            ..ListUsersQuery::default()
        };

        assert_eq!(
            fields(validate_list_query(query).unwrap_err()),
            vec!["page", "limit", "search"]
        );
    }

    #[test]
    fn test_list_query_rejects_huge_page() {
        let query = ListUsersQuery {
            page: Some(i64::MAX),
            limit: Some(MAX_PAGE_LIMIT),
            ..ListUsersQuery::default()
        };

        assert_eq!(fields(validate_list_query(query).unwrap_err()), vec!["page"]);

        let last = validate_list_query(ListUsersQuery {
            page: Some(MAX_PAGE),
            limit: Some(MAX_PAGE_LIMIT),
            ..ListUsersQuery::default()
        })
        .unwrap();
        assert_eq!(last.offset(), (MAX_PAGE - 1) * MAX_PAGE_LIMIT);
    }
}
