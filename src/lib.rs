#![forbid(unsafe_code)]

pub mod bilingual;
pub mod build;
pub mod chapter;
pub mod classify;
pub mod cli;
pub mod crawl;
pub mod dom;
pub mod epub;
pub mod error;
pub mod fetch;
pub mod formats;
pub mod links;
pub mod logging;
pub mod next_page;
pub mod profile;
pub mod resources;
pub mod slice;
pub mod stylesheet;
pub mod workspace;
pub mod wrap;
