//! Integration tests for layerdiff
//!
//! `pipeline` drives the whole diff against a mock engine. `docker` and `nerdctl`
//! exercise the real engines and only build with the matching feature.

pub mod docker;
pub mod nerdctl;
pub mod pipeline;
