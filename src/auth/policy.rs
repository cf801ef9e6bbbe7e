//! Declarative authorization: one table of route prefix + access kind →
//! allowed roles, evaluated by a single component. Paths are relative to
//! `/api/v1`. Authenticated paths with no matching rule are denied.

use axum::http::Method;

use super::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Any,
}

impl Access {
    fn matches(&self, method: &Method) -> bool {
        let is_read = *method == Method::GET || *method == Method::HEAD;
        match self {
            Access::Read => is_read,
            Access::Write => !is_read,
            Access::Any => true,
        }
    }
}

#[derive(Debug)]
pub struct PolicyRule {
    pub prefix: &'static str,
    pub access: Access,
    pub roles: &'static [Role],
}

const ADMINS: &[Role] = &[Role::TrustAdmin, Role::SchoolAdmin];
const STAFF: &[Role] = &[Role::TrustAdmin, Role::SchoolAdmin, Role::Teacher, Role::Accountant];
const FINANCE: &[Role] = &[Role::TrustAdmin, Role::SchoolAdmin, Role::Accountant];
const ACADEMIC: &[Role] = &[Role::TrustAdmin, Role::SchoolAdmin, Role::Teacher];
const EVERYONE: &[Role] = &[
    Role::SystemAdmin,
    Role::TrustAdmin,
    Role::SchoolAdmin,
    Role::Teacher,
    Role::Accountant,
    Role::Parent,
];

pub static POLICY: &[PolicyRule] = &[
    PolicyRule { prefix: "/system", access: Access::Any, roles: &[Role::SystemAdmin] },
    PolicyRule { prefix: "/setup", access: Access::Any, roles: &[Role::SystemAdmin] },
    PolicyRule { prefix: "/auth/system/me", access: Access::Read, roles: &[Role::SystemAdmin] },
    PolicyRule { prefix: "/auth/system/change-password", access: Access::Write, roles: &[Role::SystemAdmin] },
    PolicyRule { prefix: "/auth/me", access: Access::Read, roles: EVERYONE },
    PolicyRule { prefix: "/auth/change-password", access: Access::Write, roles: EVERYONE },
    PolicyRule { prefix: "/users", access: Access::Any, roles: ADMINS },
    PolicyRule { prefix: "/students", access: Access::Read, roles: STAFF },
    PolicyRule { prefix: "/students", access: Access::Write, roles: ADMINS },
    PolicyRule { prefix: "/fees", access: Access::Any, roles: FINANCE },
    PolicyRule { prefix: "/attendance", access: Access::Any, roles: ACADEMIC },
    PolicyRule { prefix: "/reports", access: Access::Read, roles: FINANCE },
    PolicyRule { prefix: "/reports/attendance", access: Access::Read, roles: ACADEMIC },
    PolicyRule { prefix: "/dashboards", access: Access::Read, roles: STAFF },
    PolicyRule { prefix: "/communications/inbox", access: Access::Any, roles: EVERYONE },
    PolicyRule { prefix: "/communications/messages", access: Access::Any, roles: ACADEMIC },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Role not in the matching rule.
    Deny,
    /// No rule covers the route.
    NoRule,
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Most specific (longest prefix) rule for the method and path.
pub fn matching_rule(method: &Method, path: &str) -> Option<&'static PolicyRule> {
    let path = path.strip_prefix("/api/v1").unwrap_or(path);
    POLICY
        .iter()
        .filter(|rule| rule.access.matches(method) && prefix_matches(rule.prefix, path))
        .max_by_key(|rule| rule.prefix.len())
}

pub fn authorize(role: Role, method: &Method, path: &str) -> Decision {
    match matching_rule(method, path) {
        Some(rule) if rule.roles.contains(&role) => Decision::Allow,
        Some(_) => Decision::Deny,
        None => Decision::NoRule,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_routes_only_for_system_admin() {
        assert_eq!(authorize(Role::SystemAdmin, &Method::POST, "/api/v1/setup/trusts"), Decision::Allow);
        assert_eq!(authorize(Role::TrustAdmin, &Method::POST, "/api/v1/setup/trusts"), Decision::Deny);
        assert_eq!(authorize(Role::TrustAdmin, &Method::GET, "/api/v1/system/health"), Decision::Deny);
        assert_eq!(authorize(Role::SystemAdmin, &Method::GET, "/api/v1/auth/system/me"), Decision::Allow);
        assert_eq!(authorize(Role::Teacher, &Method::GET, "/api/v1/auth/system/me"), Decision::Deny);
    }

    #[test]
    fn students_read_vs_write() {
        assert_eq!(authorize(Role::Teacher, &Method::GET, "/api/v1/students/9"), Decision::Allow);
        assert_eq!(authorize(Role::Teacher, &Method::POST, "/api/v1/students"), Decision::Deny);
        assert_eq!(authorize(Role::SchoolAdmin, &Method::PATCH, "/api/v1/students/9/status"), Decision::Allow);
        assert_eq!(authorize(Role::Parent, &Method::GET, "/api/v1/students"), Decision::Deny);
    }

    #[test]
    fn longest_prefix_wins() {
        // Teachers cannot read finance reports but can read attendance reports
        assert_eq!(authorize(Role::Teacher, &Method::GET, "/api/v1/reports/fee-collection"), Decision::Deny);
        assert_eq!(authorize(Role::Teacher, &Method::GET, "/api/v1/reports/attendance"), Decision::Allow);
        assert_eq!(authorize(Role::Parent, &Method::GET, "/api/v1/communications/inbox"), Decision::Allow);
        assert_eq!(authorize(Role::Parent, &Method::POST, "/api/v1/communications/messages"), Decision::Deny);
    }

    #[test]
    fn prefix_requires_segment_boundary() {
        assert_eq!(authorize(Role::SchoolAdmin, &Method::GET, "/api/v1/usersettings"), Decision::NoRule);
        assert_eq!(authorize(Role::SchoolAdmin, &Method::GET, "/api/v1/unknown"), Decision::NoRule);
    }
}
