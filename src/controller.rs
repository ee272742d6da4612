mod client;
mod context;
mod coordinator;
pub mod generate;
mod interactive;
mod pipeline;
mod protocol;
mod semver;
mod service;
#[cfg(test)]
mod testing;
mod verify;

pub use client::Client;
pub use interactive::InteractiveLock;
