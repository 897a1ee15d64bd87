use std::io::{self, Write};
use std::mem;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::Transport;
use crate::config::TransportConfig;
use crate::error::{ConnectError, SendError};

enum Link {
    Disconnected,
    /// Non-blocking connect issued; completion is confirmed by the first
    /// writability poll in `send`.
    Connecting(TcpStream),
    Connected(TcpStream),
}

/// Non-blocking TCP connection to a fixed `host:port`.
pub struct TcpTransport {
    config: TransportConfig,
    link: Link,
}

impl TcpTransport {
    /// Creates a disconnected transport. Call [`Transport::connect`] to open it.
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            link: Link::Disconnected,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self.link, Link::Disconnected)
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>, ConnectError> {
        let host = &self.config.host;
        let addrs: Vec<SocketAddr> = (host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|source| ConnectError::Resolve {
                host: host.clone(),
                source,
            })?
            .collect();
        if addrs.is_empty() {
            return Err(ConnectError::NoAddress { host: host.clone() });
        }
        Ok(addrs)
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> Result<(), ConnectError> {
        self.link = Link::Disconnected;
        let mut last_err = None;
        for addr in self.resolve()? {
            match platform::connect_nonblocking(&addr, self.config.send_timeout()) {
                Ok((stream, in_progress)) => {
                    self.link = if in_progress {
                        info!("connecting to {} ({addr})", self.config.host);
                        Link::Connecting(stream)
                    } else {
                        info!("connected to {} ({addr})", self.config.host);
                        Link::Connected(stream)
                    };
                    return Ok(());
                }
                Err(err) => {
                    debug!("connect to {addr} failed: {err}");
                    last_err = Some(err);
                }
            }
        }
        Err(match last_err {
            Some(err) => ConnectError::Io(err),
            None => ConnectError::NoAddress {
                host: self.config.host.clone(),
            },
        })
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        let deadline = Instant::now() + self.config.send_timeout();
        let poll_interval = self.config.poll_interval();

        // The link stays Disconnected unless the write completes, so every
        // error path drops (and closes) the stream.
        let stream = match mem::replace(&mut self.link, Link::Disconnected) {
            Link::Disconnected => return Err(SendError::NotConnected),
            Link::Connecting(stream) => {
                finish_connect(&stream, deadline, poll_interval)?;
                info!("connected to {}", self.config.host);
                stream
            }
            Link::Connected(stream) => stream,
        };

        match write_all_bounded(&stream, bytes, deadline, poll_interval) {
            Ok(()) => {
                self.link = Link::Connected(stream);
                Ok(())
            }
            Err(err) => {
                warn!(
                    "send to {} failed, closing connection: {err}",
                    self.config.host
                );
                Err(err)
            }
        }
    }

    fn identity(&self) -> &str {
        &self.config.host
    }
}

fn finish_connect(
    stream: &TcpStream,
    deadline: Instant,
    poll_interval: Duration,
) -> Result<(), SendError> {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(SendError::Fatal(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection was not established in time",
            )));
        }
        if wait_writable(stream, (deadline - now).min(poll_interval))? {
            break;
        }
    }
    if let Some(err) = stream.take_error()? {
        return Err(SendError::Fatal(err));
    }
    // Writable without a pending error but still not connected (e.g. a hang-up).
    stream.peer_addr()?;
    Ok(())
}

fn write_all_bounded(
    mut stream: &TcpStream,
    bytes: &[u8],
    deadline: Instant,
    poll_interval: Duration,
) -> Result<(), SendError> {
    let mut written = 0;
    let mut stalled_since: Option<Instant> = None;
    while written < bytes.len() {
        match stream.write(&bytes[written..]) {
            Ok(0) => return Err(SendError::Fatal(io::ErrorKind::WriteZero.into())),
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                let now = Instant::now();
                let since = *stalled_since.get_or_insert(now);
                if now >= deadline {
                    return Err(SendError::Backpressure(now - since));
                }
                wait_writable(stream, (deadline - now).min(poll_interval))?;
            }
            Err(err) => return Err(SendError::Fatal(err)),
        }
    }
    Ok(())
}

/// Waits up to `timeout` for the socket to accept more bytes. Error and
/// hang-up conditions also count as ready so the next write surfaces them.
#[cfg(unix)]
fn wait_writable(stream: &TcpStream, timeout: Duration) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let mut pfd = libc::pollfd {
        fd: stream.as_raw_fd(),
        events: libc::POLLOUT,
        revents: 0,
    };
    let millis = timeout.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int;
    loop {
        let res = unsafe { libc::poll(&mut pfd, 1, millis) };
        if res < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(res > 0);
    }
}

#[cfg(not(unix))]
fn wait_writable(_stream: &TcpStream, timeout: Duration) -> io::Result<bool> {
    std::thread::sleep(timeout);
    Ok(true)
}

#[cfg(target_os = "linux")]
mod platform {
    use std::io;
    use std::mem;
    use std::net::{SocketAddr, TcpStream};
    use std::os::unix::io::{AsRawFd, FromRawFd};
    use std::time::Duration;

    use libc::{sockaddr, sockaddr_in, sockaddr_in6, sockaddr_storage, socklen_t};

    /// Starts a non-blocking connect. The flag is `true` while the handshake
    /// is still in flight.
    pub fn connect_nonblocking(
        addr: &SocketAddr,
        _timeout: Duration,
    ) -> io::Result<(TcpStream, bool)> {
        let family = match addr {
            SocketAddr::V4(_) => libc::AF_INET,
            SocketAddr::V6(_) => libc::AF_INET6,
        };
        let fd = unsafe {
            libc::socket(
                family,
                libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                0,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // Owns the fd from here on; dropping it closes the socket.
        let stream = unsafe { TcpStream::from_raw_fd(fd) };

        let (storage, len) = raw_sockaddr(addr);
        let res = unsafe {
            libc::connect(
                stream.as_raw_fd(),
                &storage as *const sockaddr_storage as *const sockaddr,
                len,
            )
        };
        if res == 0 {
            return Ok((stream, false));
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINPROGRESS) {
            return Ok((stream, true));
        }
        Err(err)
    }

    fn raw_sockaddr(addr: &SocketAddr) -> (sockaddr_storage, socklen_t) {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let len = match addr {
            SocketAddr::V4(v4) => {
                let sin = unsafe { &mut *(&mut storage as *mut sockaddr_storage as *mut sockaddr_in) };
                sin.sin_family = libc::AF_INET as libc::sa_family_t;
                sin.sin_port = v4.port().to_be();
                sin.sin_addr = libc::in_addr {
                    s_addr: u32::from_ne_bytes(v4.ip().octets()),
                };
                mem::size_of::<sockaddr_in>()
            }
            SocketAddr::V6(v6) => {
                let sin6 =
                    unsafe { &mut *(&mut storage as *mut sockaddr_storage as *mut sockaddr_in6) };
                sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_flowinfo = v6.flowinfo();
                sin6.sin6_addr = libc::in6_addr {
                    s6_addr: v6.ip().octets(),
                };
                sin6.sin6_scope_id = v6.scope_id();
                mem::size_of::<sockaddr_in6>()
            }
        };
        (storage, len as socklen_t)
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use std::io;
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    pub fn connect_nonblocking(
        addr: &SocketAddr,
        timeout: Duration,
    ) -> io::Result<(TcpStream, bool)> {
        let stream = TcpStream::connect_timeout(addr, timeout)?;
        stream.set_nonblocking(true)?;
        Ok((stream, false))
    }
}
