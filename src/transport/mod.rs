//! Transport module - TCP connection to the MLLP server.

mod tcp;

pub use tcp::connect;
