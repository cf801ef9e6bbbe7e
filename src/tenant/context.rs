use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::cache::{Clock, TtlCache};
use crate::database::models::trust::{ConfigEntry, Trust};
use crate::database::{ConnectionManager, DatabaseError};

/// Denormalized trust metadata attached to every tenant request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrustContext {
    pub trust_id: i64,
    pub trust_name: String,
    pub trust_code: String,
    pub subdomain: String,
    pub theme: Option<Value>,
    pub logo_url: Option<String>,
    pub theme_css: Option<String>,
    pub settings: Map<String, Value>,
}

impl TrustContext {
    /// Merge global then trust-specific config rows into one settings bag.
    /// Values are parsed as JSON when possible, otherwise kept as strings.
    pub fn build(trust: Trust, entries: Vec<ConfigEntry>) -> Self {
        let mut settings = Map::new();
        let (global, specific): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.trust_id.is_none());
        for entry in global.into_iter().chain(specific) {
            settings.insert(entry.config_key, parse_config_value(&entry.config_value));
        }

        let theme = settings.get("theme").cloned();
        let logo_url = settings
            .get("logo_url")
            .or_else(|| settings.get("logo"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let theme_css = settings.get("theme_css").and_then(Value::as_str).map(str::to_string);

        Self {
            trust_id: trust.id,
            trust_name: trust.trust_name,
            trust_code: trust.trust_code,
            subdomain: trust.subdomain,
            theme,
            logo_url,
            theme_css,
            settings,
        }
    }
}

pub fn parse_config_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Where trust metadata comes from on a cache miss.
#[async_trait]
pub trait TrustContextSource: Send + Sync {
    /// Active trust registered under this subdomain.
    async fn find_trust(&self, slug: &str) -> Result<Option<Trust>, DatabaseError>;

    /// Global and trust-specific `system_config` rows.
    async fn config_entries(&self, trust_id: i64) -> Result<Vec<ConfigEntry>, DatabaseError>;
}

/// Reads the master `trusts` and `system_config` tables.
pub struct MySqlTrustSource {
    connections: Arc<ConnectionManager<MySqlPool>>,
}

impl MySqlTrustSource {
    pub fn new(connections: Arc<ConnectionManager<MySqlPool>>) -> Self {
        Self { connections }
    }
}

#[async_trait]
impl TrustContextSource for MySqlTrustSource {
    async fn find_trust(&self, slug: &str) -> Result<Option<Trust>, DatabaseError> {
        let master = self.connections.master().await?;
        let trust = sqlx::query_as::<_, Trust>(
            "SELECT id, trust_name, trust_code, subdomain, contact_email, contact_phone, address,
                    is_active, created_at, updated_at
             FROM trusts
             WHERE subdomain = ? AND is_active = 1",
        )
        .bind(slug)
        .fetch_optional(master.as_ref())
        .await?;
        Ok(trust)
    }

    async fn config_entries(&self, trust_id: i64) -> Result<Vec<ConfigEntry>, DatabaseError> {
        let master = self.connections.master().await?;
        let entries = sqlx::query_as::<_, ConfigEntry>(
            "SELECT trust_id, config_key, config_value
             FROM system_config
             WHERE trust_id IS NULL OR trust_id = ?",
        )
        .bind(trust_id)
        .fetch_all(master.as_ref())
        .await?;
        Ok(entries)
    }
}

/// Cache-or-fetch resolution of slug → [`TrustContext`].
pub struct TrustContextResolver {
    source: Arc<dyn TrustContextSource>,
    cache: TtlCache<String, TrustContext>,
}

impl TrustContextResolver {
    pub fn new(source: Arc<dyn TrustContextSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: TtlCache::new(ttl),
        }
    }

    pub fn with_clock(source: Arc<dyn TrustContextSource>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            cache: TtlCache::with_clock(ttl, clock),
        }
    }

    /// `Ok(None)` when no active trust uses this slug. Misses are not cached.
    pub async fn resolve(&self, slug: &str) -> Result<Option<TrustContext>, DatabaseError> {
        let key = slug.to_ascii_lowercase();
        if let Some(context) = self.cache.get(&key).await {
            debug!("Trust context cache hit for '{}'", key);
            return Ok(Some(context));
        }

        let Some(trust) = self.source.find_trust(&key).await? else {
            return Ok(None);
        };
        let entries = self.source.config_entries(trust.id).await?;
        let context = TrustContext::build(trust, entries);

        self.cache.insert(key.clone(), context.clone()).await;
        debug!("Trust context cached for '{}' (trust {})", key, context.trust_id);
        Ok(Some(context))
    }

    /// Invalidate one slug, or every slug when `None`. Returns entries removed.
    pub async fn clear(&self, slug: Option<&str>) -> usize {
        let removed = match slug {
            Some(s) => usize::from(self.cache.remove(&s.to_ascii_lowercase()).await),
            None => self.cache.clear().await,
        };
        info!("Cleared {} trust context cache entr{}", removed, if removed == 1 { "y" } else { "ies" });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::cache::tests::ManualClock;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn trust(id: i64, subdomain: &str) -> Trust {
        Trust {
            id,
            trust_name: "Green Valley Trust".into(),
            trust_code: "GVT".into(),
            subdomain: subdomain.into(),
            contact_email: "office@gvt.edu".into(),
            contact_phone: None,
            address: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn entry(trust_id: Option<i64>, key: &str, value: &str) -> ConfigEntry {
        ConfigEntry {
            trust_id,
            config_key: key.into(),
            config_value: value.into(),
        }
    }

    struct CountingSource {
        queries: AtomicUsize,
    }

    #[async_trait]
    impl TrustContextSource for CountingSource {
        async fn find_trust(&self, slug: &str) -> Result<Option<Trust>, DatabaseError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok((slug == "green").then(|| trust(4, "green")))
        }

        async fn config_entries(&self, _trust_id: i64) -> Result<Vec<ConfigEntry>, DatabaseError> {
            Ok(vec![entry(Some(4), "theme_css", "body{}")])
        }
    }

    fn resolver() -> (Arc<CountingSource>, Arc<ManualClock>, TrustContextResolver) {
        let source = Arc::new(CountingSource {
            queries: AtomicUsize::new(0),
        });
        let clock = Arc::new(ManualClock::new());
        let resolver = TrustContextResolver::with_clock(source.clone(), Duration::from_secs(15 * 60), clock.clone());
        (source, clock, resolver)
    }

    #[test]
    fn settings_merge_prefers_trust_rows() {
        let context = TrustContext::build(
            trust(1, "green"),
            vec![
                entry(Some(1), "theme", r##"{"primary":"#0a0"}"##),
                entry(None, "theme", r##"{"primary":"#000"}"##),
                entry(None, "logo", "https://cdn/logo.png"),
                entry(None, "max_upload_mb", "25"),
                entry(Some(1), "storage", r#"{"provider":"local","path":"/data"}"#),
            ],
        );

        assert_eq!(context.theme.unwrap()["primary"], "#0a0");
        assert_eq!(context.logo_url.as_deref(), Some("https://cdn/logo.png"));
        assert_eq!(context.settings["max_upload_mb"], 25);
        assert_eq!(context.settings["storage"]["provider"], "local");
        assert!(context.theme_css.is_none());
    }

    #[test]
    fn non_json_values_stay_strings() {
        assert_eq!(parse_config_value("plain text"), Value::String("plain text".into()));
        assert_eq!(parse_config_value("true"), Value::Bool(true));
    }

    #[tokio::test]
    async fn second_lookup_within_ttl_hits_cache() {
        let (source, clock, resolver) = resolver();

        let first = resolver.resolve("green").await.unwrap().unwrap();
        clock.advance(Duration::from_secs(14 * 60));
        let second = resolver.resolve("GREEN").await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(second.theme_css.as_deref(), Some("body{}"));
        assert_eq!(source.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expiry_or_clear_forces_requery() {
        let (source, clock, resolver) = resolver();

        resolver.resolve("green").await.unwrap();
        clock.advance(Duration::from_secs(15 * 60));
        resolver.resolve("green").await.unwrap();
        assert_eq!(source.queries.load(Ordering::SeqCst), 2);

        assert_eq!(resolver.clear(Some("green")).await, 1);
        resolver.resolve("green").await.unwrap();
        assert_eq!(source.queries.load(Ordering::SeqCst), 3);

        assert_eq!(resolver.clear(None).await, 1);
    }

    #[tokio::test]
    async fn unknown_slug_is_none_and_uncached() {
        let (source, _clock, resolver) = resolver();

        assert!(resolver.resolve("ghost").await.unwrap().is_none());
        assert!(resolver.resolve("ghost").await.unwrap().is_none());
        assert_eq!(source.queries.load(Ordering::SeqCst), 2);
    }
}
