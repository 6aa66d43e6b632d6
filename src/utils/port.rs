use std::net::{Ipv4Addr, TcpListener};
use tracing::debug;

/// First loopback port in `start..start + max_attempts` that accepts an
/// exclusive bind. The probe socket is released before returning.
pub fn find_available_port(start: u16, max_attempts: u16) -> Option<u16> {
    for offset in 0..max_attempts {
        let port = start.checked_add(offset)?;
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
            Ok(listener) => {
                drop(listener);
                return Some(port);
            }
            Err(e) => debug!("Port {} unavailable: {}", port, e),
        }
    }
    None
}
