pub mod config;
pub mod error;
pub mod key_value_store;
pub mod ledger_repository;
pub mod lookup_cache;
pub mod nameday_client;
pub mod notifier;
