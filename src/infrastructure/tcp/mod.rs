// TCP module - Client and server transports
pub mod client;
pub mod server;

pub use client::TcpClientTransport;
pub use server::TcpServerTransport;
