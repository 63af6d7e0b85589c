// ==========================================
// 私募基金数据平台 - 实体存储 Trait
// ==========================================
// 职责: 导入核心所需的数据访问接口（不包含实现）
// 红线: Repository 不含业务规则，只做按键查找与按标识写入
// ==========================================

use crate::domain::resource::{EntityRef, FieldValue, ResourceSpec, StoredRecord};
use crate::domain::types::EntityKind;
use crate::repository::error::RepositoryResult;
use std::sync::Arc;

/// 按业务标识写入的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

// ==========================================
// EntityStore Trait
// ==========================================
// 实现者: SqliteEntityStore（使用 rusqlite）
pub trait EntityStore {
    /// 按主键查找实体
    ///
    /// # 返回
    /// - Ok(Some(EntityRef)): 找到
    /// - Ok(None): 不存在（不是错误）
    /// - Err: 存储故障
    fn find_one(&self, kind: EntityKind, key: &str) -> RepositoryResult<Option<EntityRef>>;

    /// 按业务标识字段查找已存储实体
    ///
    /// # 参数
    /// - spec: 资源声明（表名/列名/字段类型）
    /// - identity: (字段名, 值) 列表，与 spec.import_id_fields 对应
    fn find_by_identity(
        &self,
        spec: &ResourceSpec,
        identity: &[(String, FieldValue)],
    ) -> RepositoryResult<Option<StoredRecord>>;

    /// 按业务标识新建或更新实体
    ///
    /// # 参数
    /// - identity: 业务标识字段值
    /// - values: 需要写入的字段值（可包含标识字段）
    fn upsert(
        &self,
        spec: &ResourceSpec,
        identity: &[(String, FieldValue)],
        values: &[(String, FieldValue)],
    ) -> RepositoryResult<UpsertOutcome>;

    /// 读取该资源的全部实体（导出用，按写入顺序）
    fn list_all(&self, spec: &ResourceSpec) -> RepositoryResult<Vec<StoredRecord>>;
}

impl<T: EntityStore + ?Sized> EntityStore for &T {
    fn find_one(&self, kind: EntityKind, key: &str) -> RepositoryResult<Option<EntityRef>> {
        (**self).find_one(kind, key)
    }

    fn find_by_identity(
        &self,
        spec: &ResourceSpec,
        identity: &[(String, FieldValue)],
    ) -> RepositoryResult<Option<StoredRecord>> {
        (**self).find_by_identity(spec, identity)
    }

    fn upsert(
        &self,
        spec: &ResourceSpec,
        identity: &[(String, FieldValue)],
        values: &[(String, FieldValue)],
    ) -> RepositoryResult<UpsertOutcome> {
        (**self).upsert(spec, identity, values)
    }

    fn list_all(&self, spec: &ResourceSpec) -> RepositoryResult<Vec<StoredRecord>> {
        (**self).list_all(spec)
    }
}

impl<T: EntityStore + ?Sized> EntityStore for Arc<T> {
    fn find_one(&self, kind: EntityKind, key: &str) -> RepositoryResult<Option<EntityRef>> {
        (**self).find_one(kind, key)
    }

    fn find_by_identity(
        &self,
        spec: &ResourceSpec,
        identity: &[(String, FieldValue)],
    ) -> RepositoryResult<Option<StoredRecord>> {
        (**self).find_by_identity(spec, identity)
    }

    fn upsert(
        &self,
        spec: &ResourceSpec,
        identity: &[(String, FieldValue)],
        values: &[(String, FieldValue)],
    ) -> RepositoryResult<UpsertOutcome> {
        (**self).upsert(spec, identity, values)
    }

    fn list_all(&self, spec: &ResourceSpec) -> RepositoryResult<Vec<StoredRecord>> {
        (**self).list_all(spec)
    }
}
