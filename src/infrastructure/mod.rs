// Infrastructure module - External dependencies and adapters
pub mod autosocket;
pub mod config;
pub mod logging;
pub mod serial;
pub mod tcp;
pub mod udp;
