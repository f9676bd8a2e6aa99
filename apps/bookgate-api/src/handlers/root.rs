//! 探活端点。

/// GET /
pub async fn root() -> &'static str {
    "Hello Feig!"
}

/// GET /test
pub async fn test() -> &'static str {
    "Test successful"
}
