pub mod authenticate;
pub mod authorize;
pub mod rate_limit;
pub mod resolve_trust;
pub mod response;

pub use authenticate::{authenticate_middleware, AuthUser};
pub use authorize::authorize_middleware;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
pub use resolve_trust::{resolve_trust_middleware, TrustDb};
pub use response::{ApiResponse, ApiResult};
