//! Contract bindings

pub mod account;

pub use account::*;
