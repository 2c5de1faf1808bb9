#![forbid(unsafe_code)]

pub(crate) mod auth;
mod cli;
pub mod client;
pub mod features;
pub mod transport;

pub use cli::run;
