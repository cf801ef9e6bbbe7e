//! Parameterized SQL, one module per table group. Functions take the pool
//! (or an open transaction's connection) they should run against.

pub mod attendance;
pub mod audit;
pub mod fee;
pub mod message;
pub mod report;
pub mod school;
pub mod student;
pub mod system_user;
pub mod trust;
pub mod user;

/// Clamp paging input to sane bounds. Returns `(limit, offset)`.
pub fn page_bounds(page: Option<u32>, limit: Option<u32>) -> (i64, i64) {
    let limit = limit.unwrap_or(50).clamp(1, 200) as i64;
    let page = page.unwrap_or(1).max(1) as i64;
    (limit, (page - 1) * limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_and_clamps() {
        assert_eq!(page_bounds(None, None), (50, 0));
        assert_eq!(page_bounds(Some(3), Some(20)), (20, 40));
        assert_eq!(page_bounds(Some(0), Some(10_000)), (200, 0));
    }
}
