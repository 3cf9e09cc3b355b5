//! Operator commands built on the list pipeline and concurrency primitives.

pub mod batch;
pub mod context;
pub mod error;
pub mod inspect;
pub mod list;
