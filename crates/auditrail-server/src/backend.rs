//! Storage construction from configuration.

use std::sync::Arc;

use auditrail_core::{AuditError, Context, MemoryStorage, Storage};
use auditrail_object::ObjectEventStore;
use auditrail_redis::RedisStore;
use auditrail_sql::SqlStore;
use tracing::info;

use crate::config::StorageConfig;

/// Build the configured backend.
///
/// Only the SQL backend touches its medium here (to connect and, when
/// `ensure_schema` is set, create its table); Redis and object stores
/// connect lazily on first use.
pub async fn build_storage(
    config: &StorageConfig,
    ctx: &Context,
) -> Result<Arc<dyn Storage>, AuditError> {
    let storage: Arc<dyn Storage> = match config {
        StorageConfig::Memory => Arc::new(MemoryStorage::new()),

        StorageConfig::Redis { url, key_prefix } => {
            Arc::new(RedisStore::open(url)?.with_key_prefix(key_prefix.clone()))
        }

        StorageConfig::Sql {
            url,
            table_prefix,
            ensure_schema,
        } => {
            let store = ctx
                .run(SqlStore::connect(url))
                .await??
                .with_table_prefix(table_prefix)?;
            if *ensure_schema {
                store.ensure_schema(ctx).await?;
            }
            Arc::new(store)
        }

        StorageConfig::Object {
            url,
            prefix,
            options,
        } => {
            let store = ObjectEventStore::from_url(url, options.clone())?;
            Arc::new(match prefix {
                Some(prefix) => store.with_prefix(prefix.as_str()),
                None => store,
            })
        }
    };

    info!(backend = storage.backend(), "Audit storage ready");
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditrail_core::{Event, Query};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_build_each_backend() {
        let ctx = Context::background();

        let memory = build_storage(&StorageConfig::Memory, &ctx).await.unwrap();
        assert_eq!(memory.backend(), "memory");

        let redis = build_storage(
            &StorageConfig::Redis {
                url: "redis://127.0.0.1:6379".into(),
                key_prefix: "test:".into(),
            },
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(redis.backend(), "redis");

        let object = build_storage(
            &StorageConfig::Object {
                url: "memory:///".into(),
                prefix: Some("events".into()),
                options: BTreeMap::new(),
            },
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(object.backend(), "object");
    }

    #[tokio::test]
    async fn test_sql_backend_is_ready_to_use() {
        let ctx = Context::background();
        let storage = build_storage(
            &StorageConfig::Sql {
                url: "sqlite::memory:".into(),
                table_prefix: "svc_".into(),
                ensure_schema: true,
            },
            &ctx,
        )
        .await
        .unwrap();

        let event = Event::builder("t", "login")
            .id("1")
            .timestamp(chrono::Utc::now())
            .build();
        storage.save(&ctx, event.clone()).await.unwrap();
        let found = storage.query(&ctx, &Query::for_tenant("t")).await.unwrap();
        assert_eq!(found, vec![event]);
    }

    #[tokio::test]
    async fn test_invalid_settings_are_configuration_errors() {
        let ctx = Context::background();
        let err = build_storage(
            &StorageConfig::Redis {
                url: "not a url".into(),
                key_prefix: String::new(),
            },
            &ctx,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, AuditError::Configuration(_)));

        let err = build_storage(
            &StorageConfig::Sql {
                url: "sqlite::memory:".into(),
                table_prefix: "bad prefix;".into(),
                ensure_schema: false,
            },
            &ctx,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, AuditError::Configuration(_)));

        let err = build_storage(
            &StorageConfig::Sql {
                url: "mysql://localhost/audit".into(),
                table_prefix: String::new(),
                ensure_schema: false,
            },
            &ctx,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, AuditError::Configuration(_)));
    }
}
