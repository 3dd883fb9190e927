pub mod event_loop;

use crate::config::ServerConfig;
use self::event_loop::EventLoop;
use log::{debug, error, info};
use nix::{
	errno::Errno,
	sys::{
		signal,
		socket::{bind, listen, setsockopt, socket, sockopt, AddressFamily, SockFlag, SockType, SockaddrIn},
		wait::waitpid
	},
	unistd::{fork, ForkResult, Pid}
};
use std::{
	io::{self, Error, ErrorKind},
	net::{SocketAddr, SocketAddrV4, TcpListener, ToSocketAddrs},
	os::unix::io::FromRawFd,
	process::exit
};

pub(crate) fn nix_err(e: nix::Error) -> io::Error {
	io::Error::from_raw_os_error(e as i32)
}

extern "C" fn handle_worker_shutdown(_: i32) {
	exit(0);
}

extern "C" fn handle_supervisor_shutdown(_: i32) {
	// workers share the process group and exit on SIGTERM
	let _ = signal::kill(Pid::from_raw(0), signal::Signal::SIGTERM);
	exit(0);
}

fn install_handler(handler: extern "C" fn(i32)) {
	let action = signal::SigAction::new(
		signal::SigHandler::Handler(handler),
		signal::SaFlags::SA_NODEFER,
		signal::SigSet::empty()
	);
	unsafe {
		signal::sigaction(signal::Signal::SIGINT, &action).expect("sigaction SIGINT");
		signal::sigaction(signal::Signal::SIGTERM, &action).expect("sigaction SIGTERM");
	}
}

fn lookup_host(host: &str, port: u16) -> io::Result<SocketAddrV4> {
	(host, port)
		.to_socket_addrs()?
		.find_map(|addr| match addr {
			SocketAddr::V4(v4) => Some(v4),
			SocketAddr::V6(_) => None
		})
		.ok_or_else(|| {
			let msg = format!("no IPv4 address for {}", host);
			Error::new(ErrorKind::AddrNotAvailable, msg)
		})
}

// One listening socket, created before any fork. SO_REUSEPORT lets every
// worker process accept on the same address; the kernel spreads incoming
// connections across them.
pub fn bind_listener(config: &ServerConfig) -> io::Result<TcpListener> {
	let addr = lookup_host(&config.host, config.port)?;
	let fd = socket(
		AddressFamily::Inet,
		SockType::Stream,
		SockFlag::empty(),
		None
	)
	.map_err(nix_err)?;
	setsockopt(fd, sockopt::ReuseAddr, &true).map_err(nix_err)?;
	setsockopt(fd, sockopt::ReusePort, &true).map_err(nix_err)?;
	bind(fd, &SockaddrIn::from(addr)).map_err(nix_err)?;
	listen(fd, config.backlog).map_err(nix_err)?;
	Ok(unsafe { TcpListener::from_raw_fd(fd) })
}

// Forks the workers, then reaps them. Failure to bind or listen is fatal
// before any worker starts; per-worker failures are not.
pub fn run(config: &ServerConfig) -> io::Result<()> {
	let listener = bind_listener(config)?;
	info!(
		"listening on {}:{} with {} workers, serving {:?}",
		config.host, config.port, config.workers, config.root
	);

	for i in 0..config.workers {
		match unsafe { fork() } {
			Ok(ForkResult::Child) => {
				install_handler(handle_worker_shutdown);
				let worker = listener.try_clone().and_then(|l| EventLoop::new(l, config.clone()));
				match worker.and_then(|mut event_loop| event_loop.run()) {
					Ok(_) => exit(0),
					Err(e) => {
						error!("worker {} failed: {}", i, e);
						exit(1);
					}
				}
			}
			Ok(ForkResult::Parent { child }) => {
				debug!("started worker {} with pid {}", i, child);
			}
			Err(e) => error!("fork for worker {} failed: {}", i, e)
		}
	}

	drop(listener);
	install_handler(handle_supervisor_shutdown);

	loop {
		match waitpid(Some(Pid::from_raw(-1)), None) {
			Ok(status) => debug!("worker exited: {:?}", status),
			Err(Errno::ECHILD) => break,
			Err(Errno::EINTR) => continue,
			Err(e) => return Err(nix_err(e))
		}
	}

	Ok(())
}
