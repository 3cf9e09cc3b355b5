//! Client-side list data pipeline for the sourcing console.
//!
//! Paginated collections (categories, items, commissions, schemes) are fetched
//! from the admin API, cached per query, served stale-while-revalidate and
//! extended with "load more". The concurrency helpers used by batch sourcing
//! workflows live alongside.

pub mod application;
pub mod cache;
pub mod concurrency;
pub mod config;
pub mod infra;
pub mod pipeline;
pub mod util;
