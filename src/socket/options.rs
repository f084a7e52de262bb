use std::os::fd::AsRawFd;
use crate::error::{SocketError, errno};

fn setsockopt_int<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	value: libc::c_int,
	option: &'static str,
) -> Result<(), SocketError> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&value as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option })
	} else {
		Ok(())
	}
}

fn getsockopt_int<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	option: &'static str,
) -> Result<libc::c_int, SocketError> {
	let mut value: libc::c_int = 0;
	let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
	let result = unsafe {
		libc::getsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&mut value as *mut _ as *mut libc::c_void,
			&mut len,
		)
	};
	if result == -1 {
		Err(SocketError::GetOption { errno: errno(), option })
	} else {
		Ok(value)
	}
}

/// Sets SO_REUSEADDR on a socket.
///
/// Allows binding to an address that's in TIME_WAIT state.
/// Must be applied before bind() to have any effect.
pub fn set_reuse_addr<S: AsRawFd>(socket: &S, enable: bool) -> crate::Result<()> {
	setsockopt_int(socket, libc::SOL_SOCKET, libc::SO_REUSEADDR, enable as libc::c_int, "SO_REUSEADDR")?;
	Ok(())
}

/// Sets the receive buffer size (SO_RCVBUF).
///
/// The kernel doubles the value for bookkeeping overhead.
pub fn set_recv_buffer_size<S: AsRawFd>(socket: &S, size: usize) -> crate::Result<()> {
	let size = size.min(libc::c_int::MAX as usize) as libc::c_int;
	setsockopt_int(socket, libc::SOL_SOCKET, libc::SO_RCVBUF, size, "SO_RCVBUF")?;
	Ok(())
}

/// Sets the send buffer size (SO_SNDBUF).
///
/// A small send buffer makes short sends on flush likely under load.
pub fn set_send_buffer_size<S: AsRawFd>(socket: &S, size: usize) -> crate::Result<()> {
	let size = size.min(libc::c_int::MAX as usize) as libc::c_int;
	setsockopt_int(socket, libc::SOL_SOCKET, libc::SO_SNDBUF, size, "SO_SNDBUF")?;
	Ok(())
}

/// Sets or clears O_NONBLOCK on the descriptor.
pub fn set_nonblocking<S: AsRawFd>(socket: &S, nonblocking: bool) -> crate::Result<()> {
	let flags = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_GETFL) };
	if flags == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "F_GETFL" }.into());
	}
	let new_flags = if nonblocking {
		flags | libc::O_NONBLOCK
	} else {
		flags & !libc::O_NONBLOCK
	};
	let result = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_SETFL, new_flags) };
	if result == -1 {
		return Err(SocketError::SetOption { errno: errno(), option: "O_NONBLOCK" }.into());
	}
	Ok(())
}

/// Reports whether O_NONBLOCK is set.
pub fn is_nonblocking<S: AsRawFd>(socket: &S) -> crate::Result<bool> {
	let flags = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_GETFL) };
	if flags == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "F_GETFL" }.into());
	}
	Ok(flags & libc::O_NONBLOCK != 0)
}

/// Sets or clears FD_CLOEXEC on the descriptor.
pub fn set_cloexec<S: AsRawFd>(socket: &S, close: bool) -> crate::Result<()> {
	let flags = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_GETFD) };
	if flags == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "F_GETFD" }.into());
	}
	let new_flags = if close {
		flags | libc::FD_CLOEXEC
	} else {
		flags & !libc::FD_CLOEXEC
	};
	let result = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_SETFD, new_flags) };
	if result == -1 {
		return Err(SocketError::SetOption { errno: errno(), option: "FD_CLOEXEC" }.into());
	}
	Ok(())
}

/// Reports whether FD_CLOEXEC is set.
pub fn is_cloexec<S: AsRawFd>(socket: &S) -> crate::Result<bool> {
	let flags = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_GETFD) };
	if flags == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "F_GETFD" }.into());
	}
	Ok(flags & libc::FD_CLOEXEC != 0)
}

/// Reports whether SO_REUSEADDR is enabled.
pub fn is_reuse_addr<S: AsRawFd>(socket: &S) -> crate::Result<bool> {
	Ok(getsockopt_int(socket, libc::SOL_SOCKET, libc::SO_REUSEADDR, "SO_REUSEADDR")? != 0)
}

/// Reads and clears the pending socket error (SO_ERROR).
///
/// Returns the errno, `None` when no error is pending.
pub fn take_error<S: AsRawFd>(socket: &S) -> crate::Result<Option<i32>> {
	let error = getsockopt_int(socket, libc::SOL_SOCKET, libc::SO_ERROR, "SO_ERROR")?;
	Ok((error != 0).then_some(error))
}
