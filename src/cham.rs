pub(crate) mod api;
pub(crate) mod backend;
pub(crate) mod cli;
pub(crate) mod config;
pub(crate) mod content;
pub(crate) mod countries;
pub(crate) mod mailer;
pub(crate) mod membership;
pub(crate) mod pages;
pub(crate) mod router;
pub(crate) mod session;
pub(crate) mod state;

pub(crate) type IoResult<T> = std::io::Result<T>;
pub(crate) type ChamError = Box<dyn std::error::Error + Send + Sync>;
pub(crate) type ChamResult<T> = Result<T, ChamError>;
