pub mod adapters;
pub mod env;
pub mod error;
pub mod logging;
