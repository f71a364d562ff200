//! 批量操作与导入结果

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单个 id 的失败原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: Uuid,
    pub reason: String,
}

/// 批量操作结果
///
/// 每个 id 独立处理，部分成功不是错误
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    pub affected: usize,
    pub failures: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn succeeded(&mut self) {
        self.affected += 1;
    }

    pub fn failed(&mut self, id: Uuid, reason: impl Into<String>) {
        self.failures.push(BulkFailure {
            id,
            reason: reason.into(),
        });
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 导入失败的行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    /// 文件中的行号（从 1 开始，表头为第 1 行）
    pub row: u64,
    pub reason: String,
}

/// 导入结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: usize,
    pub errors: Vec<ImportRowError>,
}

impl ImportReport {
    pub fn row_failed(&mut self, row: u64, reason: impl Into<String>) {
        self.errors.push(ImportRowError {
            row,
            reason: reason.into(),
        });
    }
}
