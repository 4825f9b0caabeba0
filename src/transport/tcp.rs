//! TCP connection to the MLLP server.
//!
//! # Example
//!
//! ```ignore
//! use aki_client::transport::connect;
//!
//! let stream = connect("localhost", 8440).await?;
//! ```

use tokio::net::TcpStream;
use tracing::info;

use crate::error::Result;

/// Connect to `host:port` with Nagle disabled.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true)?;
    info!("Connected to MLLP server at {}:{}", host, port);
    Ok(stream)
}
