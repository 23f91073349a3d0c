//! Cucumber scenarios for the key broker

pub mod step_definitions;

pub use support::TestWorld;
