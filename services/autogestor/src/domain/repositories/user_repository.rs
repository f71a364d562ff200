//! 用户仓储接口

use ag_common::{PagedResult, Pagination};
use ag_errors::AppResult;
use async_trait::async_trait;

use super::filters::{UserFilter, UserStats};
use crate::domain::entities::User;
use crate::domain::value_objects::UserId;

/// 用户仓储接口
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 分页列表（最新创建的在前）
    async fn list(&self, filter: &UserFilter, pagination: Pagination) -> AppResult<PagedResult<User>>;

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>>;

    /// 邮箱查询（传入值会被转为小写）
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn insert(&self, user: &User) -> AppResult<()>;

    async fn update(&self, user: &User) -> AppResult<()>;

    /// 删除用户及其角色、直接权限关联
    async fn delete(&self, id: UserId) -> AppResult<bool>;

    /// 没有任何角色的用户（按创建顺序）
    async fn without_roles(&self) -> AppResult<Vec<User>>;

    async fn stats(&self) -> AppResult<UserStats>;

    async fn recent(&self, limit: usize) -> AppResult<Vec<User>>;
}
