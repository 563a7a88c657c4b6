#![allow(dead_code)]

mod fake_provider;
mod test_server;

pub use fake_provider::{DEFAULT_REPLY, FakeProvider, reply_body};
pub use test_server::{PASSWORD, TestServer};
