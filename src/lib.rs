//! shout: a blocking TCP server that answers the first line of each request
//! in uppercase.
//!
//! The socket lifecycle is a railway: each stage returns a [`socket::Handle`]
//! and a failure at any stage rides through the rest of the chain untouched.
//!
//! - `socket`: listener, connection and address handling
//! - `protocol`: line framing and the uppercase response
//! - `server`: the accept -> read -> write -> close pipeline
//! - `config`: CLI arguments and TOML file
//! - `http`: request/response values for an HTTP layer on top

pub mod config;
pub mod http;
pub mod protocol;
pub mod server;
pub mod socket;
