pub mod cache;
pub mod compressor;
pub mod config;
pub mod exception;
pub mod filename;
pub mod framer;
pub mod logging;
pub mod param;
pub mod query;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod storage;
pub mod util;

pub use cache::{CacheDecision, CacheDescriptor};
pub use config::{Config, RouteMode};
pub use exception::Exception;
pub use param::{HttpRequestMethod, HttpVersion};
pub use request::{Headers, Request};
pub use response::Response;
pub use server::{serve, AppState};
pub use util::HtmlBuilder;
