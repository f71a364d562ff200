//! HTTP 处理函数

pub mod brands;
pub mod categories;
pub mod dashboard;
pub mod products;
pub mod roles;
pub mod users;

use ag_common::Pagination;
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::application::ListingCachePolicy;

/// 下拉框与仪表盘区块的默认条数
pub(crate) const DEFAULT_LIMIT: usize = 10;

/// 列表公共的分页参数
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self, policy: &ListingCachePolicy) -> Pagination {
        policy.default_pagination(self.page, self.per_page)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 100)
    }
}

/// 批量操作请求体：`{"ids": [...], ...changes}`
#[derive(Debug, Deserialize)]
pub struct BulkRequest<I, C> {
    pub ids: Vec<I>,
    #[serde(flatten)]
    pub changes: C,
}

/// 简单的提示消息
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CSV 附件下载，文件名带导出时间
pub fn csv_download(prefix: &str, body: Vec<u8>) -> Response {
    let filename = format!("{}_{}.csv", prefix, Utc::now().format("%Y-%m-%d_%H-%M-%S"));
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_uses_policy_defaults() {
        let policy = ListingCachePolicy::new(15, 10);
        let pagination = PageQuery::default().pagination(&policy);
        assert_eq!((pagination.page, pagination.per_page), (1, 15));

        let query = PageQuery {
            page: Some(0),
            per_page: Some(50),
        };
        let pagination = query.pagination(&policy);
        assert_eq!((pagination.page, pagination.per_page), (1, 50));
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(LimitQuery::default().limit(), DEFAULT_LIMIT);
        assert_eq!(LimitQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(LimitQuery { limit: Some(500) }.limit(), 100);
    }

    #[test]
    fn test_csv_download_headers() {
        let response = csv_download("products", b"id,name\n".to_vec());
        let disposition = response.headers()[CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"products_"));
        assert!(disposition.ends_with(".csv\""));
        assert_eq!(response.headers()[CONTENT_TYPE], "text/csv; charset=utf-8");
    }
}
