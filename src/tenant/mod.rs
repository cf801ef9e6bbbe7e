//! Tenant resolution: slug extraction, the trust context cache, and the
//! resolver that ties them to the master registry.

pub mod cache;
pub mod context;
pub mod slug;

pub use cache::{Clock, SystemClock, TtlCache};
pub use context::{MySqlTrustSource, TrustContext, TrustContextResolver, TrustContextSource};
pub use slug::{resolve_slug, SlugError};
