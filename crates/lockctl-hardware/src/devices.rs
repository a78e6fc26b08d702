//! Enum wrapper for transport dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn Transport>`
//! is not an option. [`AnyTransport`] gives the command manager one
//! concrete type to own while still supporting every transport, with the
//! serial variant compiled in only under the `hardware-serial` feature.
//!
//! # Examples
//!
//! ```
//! use lockctl_hardware::devices::AnyTransport;
//! use lockctl_hardware::mock::MockTransport;
//! use lockctl_hardware::traits::Transport;
//!
//! let (transport, _handle) = MockTransport::new();
//! let transport = AnyTransport::from(transport);
//! assert!(transport.is_connected());
//! ```

use crate::Result;
use crate::mock::MockTransport;
#[cfg(feature = "hardware-serial")]
use crate::serial::SerialTransport;
use crate::traits::{InboundStream, Transport};

/// Any supported transport, chosen at construction time.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyTransport {
    /// In-memory transport for development and testing.
    Mock(MockTransport),

    /// Real serial port.
    #[cfg(feature = "hardware-serial")]
    Serial(SerialTransport),
}

impl Transport for AnyTransport {
    fn take_inbound(&mut self) -> Result<InboundStream> {
        match self {
            Self::Mock(transport) => transport.take_inbound(),
            #[cfg(feature = "hardware-serial")]
            Self::Serial(transport) => transport.take_inbound(),
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            Self::Mock(transport) => transport.write(bytes).await,
            #[cfg(feature = "hardware-serial")]
            Self::Serial(transport) => transport.write(bytes).await,
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Self::Mock(transport) => transport.is_connected(),
            #[cfg(feature = "hardware-serial")]
            Self::Serial(transport) => transport.is_connected(),
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        match self {
            Self::Mock(transport) => transport.disconnect().await,
            #[cfg(feature = "hardware-serial")]
            Self::Serial(transport) => transport.disconnect().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Mock(transport) => transport.name(),
            #[cfg(feature = "hardware-serial")]
            Self::Serial(transport) => transport.name(),
        }
    }
}

impl From<MockTransport> for AnyTransport {
    fn from(transport: MockTransport) -> Self {
        Self::Mock(transport)
    }
}

#[cfg(feature = "hardware-serial")]
impl From<SerialTransport> for AnyTransport {
    fn from(transport: SerialTransport) -> Self {
        Self::Serial(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatch_to_mock() {
        let (transport, mut handle) = MockTransport::new();
        let mut transport = AnyTransport::from(transport);

        assert_eq!(transport.name(), "Mock Transport");
        assert!(transport.take_inbound().is_ok());

        transport.write(&[0xAA]).await.unwrap();
        assert_eq!(handle.next_write().await.unwrap().as_ref(), &[0xAA]);

        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());
    }
}
