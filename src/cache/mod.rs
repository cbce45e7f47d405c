//! Local cache for API responses
//!
//! Provides a SQLite-backed read-through cache for billing API responses,
//! with per-category freshness windows and substring-based invalidation.

pub mod client;
pub mod clock;
pub mod key;
pub mod storage;

use std::time::Duration;

use serde::{Deserialize, Serialize};

// Re-export main types
pub use client::CachedClient;
pub use key::fingerprint;
pub use storage::ResponseCache;

/// Response categories with distinct freshness requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheKind {
    Products,
    Customers,
    Orders,
    Transactions,
    Categories,
    Reports,
    Dashboard,
    #[default]
    Default,
}

impl CacheKind {
    /// All categories, for stats and sweep scans.
    pub const ALL: [CacheKind; 8] = [
        CacheKind::Products,
        CacheKind::Customers,
        CacheKind::Orders,
        CacheKind::Transactions,
        CacheKind::Categories,
        CacheKind::Reports,
        CacheKind::Dashboard,
        CacheKind::Default,
    ];

    /// Infer the category from a request path. First match wins, in the
    /// priority order the billing endpoints are laid out in.
    pub fn from_path(path: &str) -> Self {
        if path.contains("products") {
            CacheKind::Products
        } else if path.contains("customers") {
            CacheKind::Customers
        } else if path.contains("orders") {
            CacheKind::Orders
        } else if path.contains("transactions") {
            CacheKind::Transactions
        } else if path.contains("categories") {
            CacheKind::Categories
        } else if path.contains("reports") {
            CacheKind::Reports
        } else if path.contains("dashboard") {
            CacheKind::Dashboard
        } else {
            CacheKind::Default
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Products => "products",
            CacheKind::Customers => "customers",
            CacheKind::Orders => "orders",
            CacheKind::Transactions => "transactions",
            CacheKind::Categories => "categories",
            CacheKind::Reports => "reports",
            CacheKind::Dashboard => "dashboard",
            CacheKind::Default => "default",
        }
    }

    /// Parse a stored category label. Unrecognized labels fall back to the
    /// default policy rather than erroring.
    pub fn parse(label: &str) -> Self {
        match label {
            "products" => CacheKind::Products,
            "customers" => CacheKind::Customers,
            "orders" => CacheKind::Orders,
            "transactions" => CacheKind::Transactions,
            "categories" => CacheKind::Categories,
            "reports" => CacheKind::Reports,
            "dashboard" => CacheKind::Dashboard,
            _ => CacheKind::Default,
        }
    }
}

/// Cache TTL policy per response category.
///
/// A single overridable table so policy changes never touch call sites.
/// Validity is always evaluated against the policy at read time, so edits
/// here apply to entries already on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlPolicy {
    #[serde(with = "secs")]
    pub transactions: Duration,
    #[serde(with = "secs")]
    pub orders: Duration,
    #[serde(with = "secs")]
    pub products: Duration,
    #[serde(with = "secs")]
    pub dashboard: Duration,
    #[serde(with = "secs")]
    pub customers: Duration,
    #[serde(with = "secs")]
    pub reports: Duration,
    #[serde(with = "secs")]
    pub categories: Duration,
    #[serde(rename = "default", with = "secs")]
    pub default_ttl: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            transactions: Duration::from_secs(60),
            orders: Duration::from_secs(2 * 60),
            products: Duration::from_secs(5 * 60),
            dashboard: Duration::from_secs(15 * 60),
            customers: Duration::from_secs(10 * 60),
            reports: Duration::from_secs(30 * 60),
            categories: Duration::from_secs(60 * 60),
            default_ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl TtlPolicy {
    pub fn ttl(&self, kind: CacheKind) -> Duration {
        match kind {
            CacheKind::Transactions => self.transactions,
            CacheKind::Orders => self.orders,
            CacheKind::Products => self.products,
            CacheKind::Dashboard => self.dashboard,
            CacheKind::Customers => self.customers,
            CacheKind::Reports => self.reports,
            CacheKind::Categories => self.categories,
            CacheKind::Default => self.default_ttl,
        }
    }
}

/// Serialize TTLs as whole seconds in config files.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// Endpoints whose payloads must always reflect live server state
/// (plan/entitlement status and sync bookkeeping). Matched as substrings of
/// the request path, for any HTTP method.
pub const EXEMPT_ENDPOINTS: [&str; 6] = [
    "current-plan",
    "plans/usage",
    "all",
    "delta-sync",
    "sync-tracking",
    "targets",
];

/// Substring match against the request path, per the billing API contract.
/// `extra` carries any configured additions to the built-in list.
pub fn is_exempt(path: &str, extra: &[String]) -> bool {
    EXEMPT_ENDPOINTS.iter().any(|e| path.contains(e))
        || extra.iter().any(|e| path.contains(e.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_inference_priority_order() {
        assert_eq!(CacheKind::from_path("/api/products"), CacheKind::Products);
        assert_eq!(CacheKind::from_path("/api/customers/42"), CacheKind::Customers);
        assert_eq!(CacheKind::from_path("/api/orders?page=2"), CacheKind::Orders);
        assert_eq!(
            CacheKind::from_path("/api/transactions/today"),
            CacheKind::Transactions
        );
        assert_eq!(CacheKind::from_path("/api/categories"), CacheKind::Categories);
        assert_eq!(CacheKind::from_path("/api/reports/monthly"), CacheKind::Reports);
        assert_eq!(CacheKind::from_path("/api/dashboard"), CacheKind::Dashboard);
        assert_eq!(CacheKind::from_path("/api/sellers/me"), CacheKind::Default);
    }

    #[test]
    fn test_kind_inference_first_match_wins() {
        // Both substrings present; products has priority.
        assert_eq!(
            CacheKind::from_path("/api/products/orders-view"),
            CacheKind::Products
        );
    }

    #[test]
    fn test_kind_label_round_trip() {
        for kind in CacheKind::ALL {
            assert_eq!(CacheKind::parse(kind.as_str()), kind);
        }
        assert_eq!(CacheKind::parse("unknown-label"), CacheKind::Default);
    }

    #[test]
    fn test_default_ttl_table() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.ttl(CacheKind::Transactions), Duration::from_secs(60));
        assert_eq!(policy.ttl(CacheKind::Orders), Duration::from_secs(120));
        assert_eq!(policy.ttl(CacheKind::Products), Duration::from_secs(300));
        assert_eq!(policy.ttl(CacheKind::Dashboard), Duration::from_secs(900));
        assert_eq!(policy.ttl(CacheKind::Customers), Duration::from_secs(600));
        assert_eq!(policy.ttl(CacheKind::Reports), Duration::from_secs(1800));
        assert_eq!(policy.ttl(CacheKind::Categories), Duration::from_secs(3600));
        assert_eq!(policy.ttl(CacheKind::Default), Duration::from_secs(300));
    }

    #[test]
    fn test_ttl_policy_overridable_from_config() {
        let policy: TtlPolicy = serde_yaml::from_str("products: 30\norders: 10\n").unwrap();
        assert_eq!(policy.products, Duration::from_secs(30));
        assert_eq!(policy.orders, Duration::from_secs(10));
        // Unspecified fields keep their defaults.
        assert_eq!(policy.dashboard, Duration::from_secs(900));
    }

    #[test]
    fn test_exempt_substring_match() {
        assert!(is_exempt("/api/sellers/current-plan", &[]));
        assert!(is_exempt("/api/plans/usage", &[]));
        assert!(is_exempt("/api/delta-sync", &[]));
        assert!(is_exempt("/api/sync-tracking/status", &[]));
        assert!(is_exempt("/api/targets/2024", &[]));
        assert!(!is_exempt("/api/products", &[]));
    }

    #[test]
    fn test_exempt_all_matches_as_substring() {
        // The `all` rule is a literal substring match, kept for compatibility
        // with the backend contract even where it over-matches.
        assert!(is_exempt("/api/products/all", &[]));
        assert!(is_exempt("/api/products/all-variants", &[]));
        assert!(!is_exempt("/api/catalog", &[]));
    }

    #[test]
    fn test_exempt_extra_entries() {
        let extra = vec!["live-stock".to_string()];
        assert!(is_exempt("/api/live-stock/counts", &extra));
        assert!(!is_exempt("/api/stock/counts", &extra));
    }
}
