use crate::{config::ServerConfig, handler, http, server::nix_err};
use log::{debug, info, warn};
use nix::{
	errno::Errno,
	sys::epoll::{epoll_create1, epoll_ctl, epoll_wait, EpollCreateFlags, EpollEvent, EpollFlags, EpollOp},
	unistd::close
};
use std::{
	collections::HashMap,
	io::{self, Read, Write},
	net::{Shutdown, SocketAddr, TcpListener, TcpStream},
	os::unix::io::{AsRawFd, RawFd},
	process
};

const READ_CHUNK: usize = 4096;
const MAX_EVENTS: usize = 1024;
const POLL_TIMEOUT_MS: isize = 1000;

// No back-transitions. Dispatching is a synchronous step between the
// last read and the first write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
	ReadingRequest,
	Dispatching,
	WritingResponse,
	Closing
}

#[derive(Debug)]
struct Connection {
	stream:   TcpStream,
	inbound:  Vec<u8>,
	outbound: Vec<u8>,
	phase:    Phase
}

enum Action {
	None,
	Close,
	Dispatched,
	Flushed
}

// One instance per worker. The table is owned outright; connections are
// never shared across workers or threads.
pub struct EventLoop {
	epoll_fd:    RawFd,
	listener:    TcpListener,
	connections: HashMap<RawFd, Connection>,
	config:      ServerConfig
}

impl EventLoop {
	pub fn new(listener: TcpListener, config: ServerConfig) -> io::Result<EventLoop> {
		listener.set_nonblocking(true)?;
		let epoll_fd = epoll_create1(EpollCreateFlags::empty()).map_err(nix_err)?;
		let event_loop = EventLoop {
			epoll_fd,
			listener,
			connections: HashMap::new(),
			config
		};
		let listener_fd = event_loop.listener.as_raw_fd();
		event_loop.register(listener_fd, EpollFlags::EPOLLIN)?;
		Ok(event_loop)
	}

	fn register(&self, fd: RawFd, flags: EpollFlags) -> io::Result<()> {
		let mut event = EpollEvent::new(flags, fd as u64);
		epoll_ctl(self.epoll_fd, EpollOp::EpollCtlAdd, fd, &mut event).map_err(nix_err)
	}

	fn modify(&self, fd: RawFd, flags: EpollFlags) -> io::Result<()> {
		let mut event = EpollEvent::new(flags, fd as u64);
		epoll_ctl(self.epoll_fd, EpollOp::EpollCtlMod, fd, &mut event).map_err(nix_err)
	}

	fn deregister(&self, fd: RawFd) -> io::Result<()> {
		epoll_ctl(self.epoll_fd, EpollOp::EpollCtlDel, fd, None::<&mut EpollEvent>).map_err(nix_err)
	}

	// epoll_wait is the sole blocking point; sockets never suspend the
	// worker. The listener stays registered for the lifetime of the loop.
	pub fn run(&mut self) -> io::Result<()> {
		let listener_fd = self.listener.as_raw_fd();
		let mut events = vec![EpollEvent::empty(); MAX_EVENTS];
		info!("worker {} serving", process::id());

		loop {
			let ready = match epoll_wait(self.epoll_fd, &mut events, POLL_TIMEOUT_MS) {
				Ok(n) => n,
				Err(Errno::EINTR) => continue,
				Err(e) => return Err(nix_err(e))
			};

			for event in &events[..ready] {
				let fd = event.data() as RawFd;
				let flags = event.events();
				if fd == listener_fd {
					self.accept_ready();
				} else if flags.intersects(EpollFlags::EPOLLHUP | EpollFlags::EPOLLERR) {
					self.close(fd);
				} else if flags.contains(EpollFlags::EPOLLIN) {
					self.input_ready(fd);
				} else if flags.contains(EpollFlags::EPOLLOUT) {
					self.output_ready(fd);
				}
			}
		}
	}

	fn accept_ready(&mut self) {
		loop {
			match self.listener.accept() {
				Ok((stream, peer)) => {
					if let Err(e) = self.track(stream, peer) {
						debug!("dropping connection from {}: {}", peer, e);
					}
				}
				Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
				Err(e) => {
					warn!("accept failed: {}", e);
					break;
				}
			}
		}
	}

	fn track(&mut self, stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
		stream.set_nonblocking(true)?;
		let fd = stream.as_raw_fd();
		self.register(fd, EpollFlags::EPOLLIN)?;
		self.connections.insert(fd, Connection {
			stream,
			inbound:  Vec::new(),
			outbound: Vec::new(),
			phase:    Phase::ReadingRequest
		});
		debug!("accepted {} on fd {}", peer, fd);
		Ok(())
	}

	fn input_ready(&mut self, fd: RawFd) {
		let action = match self.connections.get_mut(&fd) {
			None => Action::None,
			Some(conn) => {
				let mut chunk = [0u8; READ_CHUNK];
				match conn.stream.read(&mut chunk) {
					// zero-byte read means the peer closed
					Ok(0) => Action::Close,
					Ok(n) => {
						conn.inbound.extend_from_slice(&chunk[..n]);
						match http::find_header_end(&conn.inbound) {
							Some(end) => {
								conn.phase = Phase::Dispatching;
								conn.outbound = handler::handle(&self.config, &conn.inbound[..end]);
								conn.phase = Phase::WritingResponse;
								Action::Dispatched
							}
							None => Action::None
						}
					}
					Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Action::None,
					Err(e) => {
						debug!("read failed on fd {}: {}", fd, e);
						Action::Close
					}
				}
			}
		};

		match action {
			Action::Close => self.close(fd),
			Action::Dispatched => {
				if let Err(e) = self.modify(fd, EpollFlags::EPOLLOUT) {
					debug!("could not arm fd {} for output: {}", fd, e);
					self.close(fd);
				}
			}
			_ => {}
		}
	}

	fn output_ready(&mut self, fd: RawFd) {
		let action = match self.connections.get_mut(&fd) {
			None => Action::None,
			Some(conn) => match conn.stream.write(&conn.outbound) {
				Ok(written) => {
					conn.outbound.drain(..written);
					if conn.outbound.is_empty() {
						Action::Flushed
					} else {
						Action::None
					}
				}
				Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Action::None,
				Err(e) => {
					debug!("write failed on fd {}: {}", fd, e);
					Action::Close
				}
			}
		};

		match action {
			Action::Close => self.close(fd),
			Action::Flushed => {
				// orderly half-close: the peer sees EOF once it drains
				let _ = self.deregister(fd);
				if let Some(mut conn) = self.connections.remove(&fd) {
					conn.phase = Phase::Closing;
					let _ = conn.stream.shutdown(Shutdown::Both);
					debug!("flushed response on fd {}", fd);
				}
			}
			_ => {}
		}
	}

	// Transport errors land here: tear down silently, never retry.
	fn close(&mut self, fd: RawFd) {
		if let Some(mut conn) = self.connections.remove(&fd) {
			conn.phase = Phase::Closing;
			let _ = self.deregister(fd);
			debug!("closed fd {}", fd);
		}
	}
}

impl Drop for EventLoop {
	fn drop(&mut self) {
		let _ = close(self.epoll_fd);
	}
}
