//! Application services layer.

pub mod catalog;
pub mod clock;
pub mod error;
pub mod pagination;
pub mod repos;
