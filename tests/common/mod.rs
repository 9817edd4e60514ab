//! Shared test utilities

use hearth::config::{
    AnalyzerConfig, ComposerConfig, Config, RegistryConfig, StoreConfig,
};
use hearth::{db, DbPool, MemorySystem};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Default test configuration with a throwaway data dir
#[must_use]
pub fn test_config() -> Config {
    Config {
        data_dir: std::env::temp_dir(),
        store: StoreConfig::default(),
        registry: RegistryConfig::default(),
        analyzer: AnalyzerConfig::default(),
        composer: ComposerConfig::default(),
    }
}

/// Assemble a full memory system over an in-memory database
#[must_use]
pub fn setup_system() -> MemorySystem {
    MemorySystem::new(setup_test_db(), test_config())
}
