//! Port Negotiator
//!
//! Binds a listener to the first free port in a configured range. Attempts
//! are strictly sequential: a port already in use advances to the next one,
//! any other bind error fails immediately, and running off the end of the
//! range fails with an error naming it.

use std::io::ErrorKind;
use std::net::IpAddr;

use thiserror::Error;
use tokio::net::TcpListener;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("all attempted ports are already in use (ports: {min} - {max})")]
    Exhausted { min: u16, max: u16 },
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// Bind the first free port in `[min, max]`. The bound port is available
/// from the listener's local address.
pub async fn bind_first_free(host: IpAddr, min: u16, max: u16) -> Result<TcpListener, PortError> {
    let mut port = min;
    loop {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(error) if error.kind() == ErrorKind::AddrInUse => {}
            Err(source) => return Err(PortError::Bind { port, source }),
        }
        if port >= max {
            return Err(PortError::Exhausted { min, max });
        }
        port += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn binds_the_exact_port_when_free() {
        // Grab an ephemeral port, release it, then negotiate the
        // single-port range it came from.
        let probe = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let listener = bind_first_free(LOCALHOST, port, port).await.unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn exhausted_range_names_the_ports() {
        let occupied = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let error = bind_first_free(LOCALHOST, port, port).await.unwrap_err();
        match &error {
            PortError::Exhausted { min, max } => {
                assert_eq!((*min, *max), (port, port));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(
            error.to_string(),
            format!("all attempted ports are already in use (ports: {port} - {port})")
        );
    }

    #[tokio::test]
    async fn skips_occupied_ports_sequentially() {
        let occupied = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let first = occupied.local_addr().unwrap().port();
        // The next port up may or may not be free; retry a few candidate
        // ranges so the test does not depend on one specific port.
        for offset in 1..10 {
            let max = first.saturating_add(offset);
            if let Ok(listener) = bind_first_free(LOCALHOST, first, max).await {
                assert!(listener.local_addr().unwrap().port() > first);
                return;
            }
        }
        panic!("no free port found above {first}");
    }
}
