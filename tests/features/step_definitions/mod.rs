//! Step definitions for Cucumber scenarios

pub mod key_steps;
