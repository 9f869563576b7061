//! Host port allocation.
//!
//! A port is obtained by binding a listener to port 0 and releasing it
//! immediately. The port was free at that instant only; another process may
//! take it before the container publishes it, in which case `run` fails with
//! an address-in-use error and the caller decides whether to retry.

use std::net::{Ipv4Addr, TcpListener};

use crate::error::CoreError;

/// Source of host ports for new instances.
pub trait PortAllocator: Send + Sync {
    fn allocate(&self) -> Result<u16, CoreError>;
}

/// Asks the OS for an ephemeral port on all interfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsPortAllocator;

impl PortAllocator for OsPortAllocator {
    fn allocate(&self) -> Result<u16, CoreError> {
        allocate()
    }
}

/// Bind `0.0.0.0:0`, read back the assigned port, release the socket.
pub fn allocate() -> Result<u16, CoreError> {
    let listener =
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(CoreError::PortAllocation)?;
    let port = listener
        .local_addr()
        .map_err(CoreError::PortAllocation)?
        .port();
    drop(listener);
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_port_is_nonzero_and_bindable() {
        let port = allocate().expect("allocate");
        assert_ne!(port, 0);
        // The socket was released, so the port can be bound again right away.
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).expect("rebind released port");
    }

    #[test]
    fn os_allocator_delegates() {
        let port = OsPortAllocator.allocate().expect("allocate");
        assert!(port > 0);
    }
}
