#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod command;
pub mod epub;
pub mod error;
pub mod formats;
pub mod gemini;
pub mod logging;
pub mod translate;

pub use error::{Error, Result};
