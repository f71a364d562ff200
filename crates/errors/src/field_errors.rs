//! 字段级校验错误

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 字段 → 消息列表
///
/// 校验函数返回它而不是直接报错，调用方可以与其他来源的校验结果合并
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// 非空时转换为 `AppError::InvalidData`
    pub fn into_result(self) -> crate::AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(crate::AppError::InvalidData(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_appends_messages() {
        let mut a = FieldErrors::new();
        a.add("name", "required");
        let mut b = FieldErrors::new();
        b.add("name", "too long");
        b.add("price", "must be positive");

        a.merge(b);
        assert_eq!(a.get("name").unwrap().len(), 2);
        assert!(a.has("price"));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_into_result() {
        assert!(FieldErrors::new().into_result().is_ok());
        let mut errors = FieldErrors::new();
        errors.add("email", "invalid");
        assert!(errors.into_result().is_err());
    }
}
