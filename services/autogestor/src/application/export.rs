//! CSV 读写辅助

use ag_errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// 写出带表头的 CSV
pub fn write_csv<I>(header: &[&str], rows: I) -> AppResult<Vec<u8>>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(header)
        .map_err(|e| AppError::internal(format!("Failed to write CSV header: {}", e)))?;
    for row in rows {
        writer
            .write_record(&row)
            .map_err(|e| AppError::internal(format!("Failed to write CSV row: {}", e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::internal(format!("Failed to flush CSV: {}", e)))
}

pub fn opt_text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

pub fn opt_decimal(value: Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn opt_int(value: Option<i32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

pub fn timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 解析布尔列：1/0、true/false、yes/no
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "active" => Some(true),
        "0" | "false" | "no" | "n" | "inactive" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_csv_quotes_fields() {
        let bytes = write_csv(
            &["name", "description"],
            vec![vec!["Mouse".to_string(), "Small, wireless".to_string()]],
        )
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "name,description\nMouse,\"Small, wireless\"\n");
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
