//! Local request resolution
//!
//! Reproduces the gateway's routing, authorization and parameter mapping
//! so requests can be checked without deploying.

mod error;
mod request;
mod resolver;

pub use error::ProxyError;
pub use request::{parse_header_arg, ProxyRequest};
pub use resolver::{BackendResponse, ProxyResponse, RequestResolver, Resolution};
