//! Utils module - logging setup and small text helpers

pub mod logging;
pub mod string;
