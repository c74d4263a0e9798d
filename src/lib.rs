#![forbid(unsafe_code)]

pub mod capture;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod form;
pub mod generator;
pub mod logging;
pub mod pdf;
pub mod request;
pub mod selectors;
