pub mod analytics;
pub mod api;
pub mod clicks;
pub mod config;
pub mod creator;
pub mod error;
pub mod links;
pub mod models;
pub mod pipeline;
pub mod qr;
pub mod ratelimit;
pub mod redirect;
pub mod storage;
pub mod useragent;
pub mod validation;
