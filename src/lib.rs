pub mod accumulator;
pub mod app_config;
pub mod decoder;
pub mod device;
pub mod domain;
pub mod fleet;
pub mod listener;
pub mod runner;
pub mod session;
