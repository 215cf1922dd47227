use super::router::Router;
use crate::common::config::ServerConfig;
use crate::common::{Result, WatchpostError};
use crate::core::ShutdownFlag;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Accepts connections and hands each one to its own thread.
pub struct WebServer {
    listener: TcpListener,
    router: Router,
    shutdown: ShutdownFlag,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl WebServer {
    pub fn bind(config: &ServerConfig, router: Router, shutdown: ShutdownFlag) -> Result<Self> {
        let addr_text = format!("{}:{}", config.bind_address, config.port);
        let bind_err = |source: io::Error| WatchpostError::Bind {
            addr: addr_text.clone(),
            source,
        };

        let addr = addr_text
            .to_socket_addrs()
            .map_err(bind_err)?
            .next()
            .ok_or_else(|| bind_err(io::Error::new(io::ErrorKind::InvalidInput, "no address")))?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;
        socket.listen(config.backlog).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;

        let listener: TcpListener = socket.into();
        Ok(Self {
            listener,
            router,
            shutdown,
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Returns once the shutdown flag is set.
    pub fn run(self) {
        if let Ok(addr) = self.local_addr() {
            tracing::info!("Web interface listening on http://{}", addr);
        }

        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }

        tracing::info!("Web interface stopped");
    }

    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("web-accept".into())
            .spawn(move || self.run())
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = self.prepare(&stream) {
            tracing::warn!("{}: could not configure socket: {}", peer, e);
            return;
        }

        let router = self.router.clone();
        let spawned = thread::Builder::new()
            .name(format!("conn-{}", peer))
            .spawn(move || router.handle(stream, peer));
        if let Err(e) = spawned {
            tracing::warn!("{}: could not start connection thread: {}", peer, e);
        }
    }

    fn prepare(&self, stream: &TcpStream) -> io::Result<()> {
        // accepted sockets inherit non-blocking mode on some platforms
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.read_timeout))?;
        stream.set_write_timeout(Some(self.write_timeout))?;
        stream.set_nodelay(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Authenticator;
    use crate::web::{AuthGate, PageHandler};
    use std::sync::Arc;

    struct Nobody;

    impl Authenticator for Nobody {
        fn authenticate(&self, _: &str, _: &str) -> bool {
            false
        }
    }

    fn router(config: &ServerConfig) -> Router {
        Router::new(
            AuthGate::new(Arc::new(Nobody)),
            crate::core::FrameStore::new(),
            ShutdownFlag::new(),
            PageHandler::new("event_log.csv".into()),
            config.clone(),
        )
    }

    #[test]
    fn bind_failure_is_reported_with_address() {
        let config = ServerConfig {
            bind_address: "256.0.0.1".into(),
            ..ServerConfig::default()
        };
        let router = router(&config);
        match WebServer::bind(&config, router, ShutdownFlag::new()) {
            Err(WatchpostError::Bind { addr, .. }) => assert_eq!(addr, "256.0.0.1:8080"),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("bound an invalid address"),
        }
    }

    #[test]
    fn port_zero_picks_a_free_port_and_stops_on_shutdown() {
        let config = ServerConfig {
            bind_address: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        };
        let shutdown = ShutdownFlag::new();
        let server = WebServer::bind(&config, router(&config), shutdown.clone()).unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);

        let handle = server.spawn().unwrap();
        shutdown.trigger();
        handle.join().unwrap();
    }
}
