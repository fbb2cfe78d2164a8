pub mod app;
pub mod audit;
pub mod config;
pub mod criteria;
pub mod document;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod predicate;
pub mod records;
pub mod repository;
pub mod response;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;
pub mod validation;
