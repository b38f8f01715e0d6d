//! Environment-driven configuration
//!
//! Kept in its own test binary because it mutates process environment.

use mongo_cache_adapter::{get_settings, CacheConfig, CacheError};
use std::time::Duration;

#[test]
fn test_config_from_env() {
    std::env::set_var("CACHE_PARTITION", "env-testing");
    std::env::set_var("MONGODB_URI", "mongodb://db1:27017,db2:27017/?replicaSet=rs");
    std::env::set_var("MONGODB_CONNECT_TIMEOUT_MS", "2500");
    std::env::remove_var("MONGODB_SERVER_SELECTION_TIMEOUT_MS");

    let config = CacheConfig::from_env().unwrap();
    assert_eq!(config.partition, "env-testing");
    assert_eq!(config.connect_timeout, Some(Duration::from_millis(2500)));
    assert_eq!(config.server_selection_timeout, None);

    let settings = get_settings(&config).unwrap();
    assert_eq!(
        settings.uri,
        "mongodb://db1:27017,db2:27017/env-testing?replicaSet=rs"
    );

    std::env::set_var("MONGODB_CONNECT_TIMEOUT_MS", "soon");
    assert!(matches!(
        CacheConfig::from_env(),
        Err(CacheError::InvalidConfiguration(_))
    ));

    std::env::remove_var("MONGODB_CONNECT_TIMEOUT_MS");
    std::env::remove_var("CACHE_PARTITION");
    assert!(matches!(
        CacheConfig::from_env(),
        Err(CacheError::InvalidConfiguration(_))
    ));
}
