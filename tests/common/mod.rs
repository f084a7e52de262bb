#![allow(dead_code)]

use std::time::Duration;

use socklane::{
	AcceptResult, Endpoint, Family, FamilyPrefs, Interest, ListenConfig, Multiplexer, Role,
	accept, connect, listen,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// A wildcard listener on an ephemeral port.
pub fn wildcard_listener() -> Endpoint {
	let mut listener = Endpoint::new("", "0");
	listen(&mut listener, &ListenConfig::default()).expect("listen on wildcard");
	assert_eq!(listener.role(), Role::Listening);
	listener
}

pub fn port_of(endpoint: &Endpoint) -> u16 {
	endpoint.addr().to_socket_addr().expect("inet address").port()
}

/// Connects a client to `listener` over loopback.
///
/// An IPv6 wildcard listener normally takes IPv4 peers too, so `::1` is only
/// the first thing tried.
pub fn connect_to(listener: &Endpoint) -> Endpoint {
	let port = port_of(listener).to_string();
	let hosts: &[&str] = match listener.family() {
		Family::Inet6 => &["::1", "127.0.0.1"],
		_ => &["127.0.0.1"],
	};
	for host in hosts {
		let mut client = Endpoint::new(*host, port.as_str());
		if connect(&mut client, &FamilyPrefs::any()).is_ok() {
			assert_eq!(client.role(), Role::Connected);
			return client;
		}
	}
	panic!("no loopback address reaches {}", listener.addr());
}

/// Waits until `listener` has a pending connection and accepts it.
pub fn accept_one(listener: &Endpoint) -> Endpoint {
	for _ in 0..100 {
		wait_readable(listener);
		match accept(listener).expect("accept") {
			AcceptResult::Connection(endpoint) => return endpoint,
			AcceptResult::WouldBlock | AcceptResult::Interrupted => continue,
		}
	}
	panic!("no connection arrived");
}

/// Listener plus both ends of one loopback connection.
pub struct Pair {
	pub listener: Endpoint,
	pub client: Endpoint,
	pub server: Endpoint,
}

pub fn loopback_pair() -> Pair {
	let listener = wildcard_listener();
	let client = connect_to(&listener);
	let server = accept_one(&listener);
	Pair { listener, client, server }
}

/// Blocks up to `WAIT` for `endpoint` to become readable.
pub fn wait_readable(endpoint: &Endpoint) -> bool {
	let mut mux = Multiplexer::new();
	mux.register(endpoint, Interest::READ);
	mux.poll(Some(WAIT)).expect("poll") > 0
}
