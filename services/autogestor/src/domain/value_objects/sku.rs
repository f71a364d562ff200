//! SKU 编码规则
//!
//! 格式：`{CAT}-{SLUG}-{NNN}`
//! - CAT：分类名前三个 ASCII 字母数字，大写，不足补 `X`
//! - SLUG：商品名的大写 ASCII slug，最长 12 个字符
//! - NNN：从 001 起第一个未被占用的三位序号

/// SLUG 最大长度
pub const SLUG_MAX_LEN: usize = 12;

/// 序号上限
pub const MAX_SEQUENCE: u16 = 999;

/// 分类编码
pub fn category_code(category_name: &str) -> String {
    let mut code: String = category_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(3)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    while code.len() < 3 {
        code.push('X');
    }
    code
}

/// 商品名 slug：非字母数字折叠为单个 `-`，去掉首尾 `-` 后截断
pub fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_uppercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let truncated: String = slug.chars().take(SLUG_MAX_LEN).collect();
    let trimmed = truncated.trim_end_matches('-');
    if trimmed.is_empty() {
        "ITEM".to_string()
    } else {
        trimmed.to_string()
    }
}

/// 组装 SKU
pub fn compose(category_code: &str, slug: &str, sequence: u16) -> String {
    format!("{}-{}-{:03}", category_code, slug, sequence)
}

/// 候选 SKU 序列（001..=999）
pub fn candidates(category_name: &str, product_name: &str) -> impl Iterator<Item = String> {
    let code = category_code(category_name);
    let slug = slug(product_name);
    (1..=MAX_SEQUENCE).map(move |n| compose(&code, &slug, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_code() {
        assert_eq!(category_code("Electronics"), "ELE");
        assert_eq!(category_code("TV"), "TVX");
        assert_eq!(category_code("  é-a 1"), "A1X");
        assert_eq!(category_code(""), "XXX");
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Wireless Mouse"), "WIRELESS-MOU");
        assert_eq!(slug("  USB   cable!! "), "USB-CABLE");
        assert_eq!(slug("Disco-Duro-SSD"), "DISCO-DURO-S");
        assert_eq!(slug("Café"), "CAF");
        assert_eq!(slug("!!!"), "ITEM");
    }

    #[test]
    fn test_slug_does_not_end_with_dash_after_truncation() {
        assert_eq!(slug("Abcdefghijk Lmn"), "ABCDEFGHIJK");
    }

    #[test]
    fn test_candidates_start_at_one() {
        let mut iter = candidates("Electronics", "Mouse");
        assert_eq!(iter.next().unwrap(), "ELE-MOUSE-001");
        assert_eq!(iter.next().unwrap(), "ELE-MOUSE-002");
        assert_eq!(candidates("a", "b").count(), 999);
    }
}
