pub mod client;
mod fetch_utils;
pub mod http_client;
pub mod models;
pub mod urls;

pub use client::{CartolaApi, HttpCartolaApi};
pub use http_client::*;
pub use urls::*;
