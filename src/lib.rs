//! SoftVault: a software catalog with a remote table store or local storage
//! behind a single façade.

pub mod admin;
pub mod app;
pub mod config;
pub mod relay;
pub mod session;
pub mod storage;
pub mod theme;
pub mod tunnel;
pub mod util;
