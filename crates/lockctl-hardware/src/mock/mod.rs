//! Mock transport and simulated board for development and testing.

pub mod board;
pub mod transport;

pub use board::{Latency, MockBoard};
pub use transport::{MockTransport, MockTransportHandle};
