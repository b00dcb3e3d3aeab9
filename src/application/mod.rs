pub mod bootstrap;
pub mod commands;
pub mod favorites;
pub mod notifications;
pub mod reconciliation;
pub mod settings;
