pub(crate) mod config;
pub(crate) mod drivers;
pub(crate) mod repositories;
pub(crate) mod tasks;
pub(crate) mod types;
