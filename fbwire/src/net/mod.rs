//! Underlying socket io.
mod socket;

pub use socket::Socket;
