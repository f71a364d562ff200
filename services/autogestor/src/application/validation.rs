//! 字段校验辅助

use ag_errors::FieldErrors;
use rust_decimal::Decimal;

pub const MAX_NAME_LEN: usize = 255;

pub fn required(errors: &mut FieldErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, format!("The {} field is required.", field));
        return false;
    }
    true
}

pub fn max_len(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.trim().chars().count() > max {
        errors.add(
            field,
            format!("The {} may not be greater than {} characters.", field, max),
        );
    }
}

pub fn optional_max_len(errors: &mut FieldErrors, field: &str, value: Option<&str>, max: usize) {
    if let Some(value) = value {
        max_len(errors, field, value, max);
    }
}

pub fn non_negative(errors: &mut FieldErrors, field: &str, value: Option<Decimal>) {
    if value.is_some_and(|v| v.is_sign_negative() && !v.is_zero()) {
        errors.add(field, format!("The {} must be at least 0.", field));
    }
}

pub fn non_negative_int(errors: &mut FieldErrors, field: &str, value: Option<i32>) {
    if value.is_some_and(|v| v < 0) {
        errors.add(field, format!("The {} must be at least 0.", field));
    }
}

pub fn url(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return;
    };
    let valid = ["http://", "https://"]
        .iter()
        .any(|scheme| value.len() > scheme.len() && value.starts_with(scheme))
        && !value.contains(char::is_whitespace);
    if !valid {
        errors.add(field, format!("The {} format is invalid.", field));
    }
}

pub fn taken(errors: &mut FieldErrors, field: &str) {
    errors.add(field, format!("The {} has already been taken.", field));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers() {
        let mut errors = FieldErrors::new();
        assert!(!required(&mut errors, "name", "  "));
        non_negative(&mut errors, "price", Some(Decimal::new(-1, 2)));
        non_negative(&mut errors, "cost_price", Some(Decimal::ZERO));
        url(&mut errors, "website", Some("ftp://example.com"));
        url(&mut errors, "images", Some("https://cdn.example.com/a.png"));

        assert!(errors.has("name"));
        assert!(errors.has("price"));
        assert!(!errors.has("cost_price"));
        assert!(errors.has("website"));
        assert!(!errors.has("images"));
    }
}
