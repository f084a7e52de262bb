mod common;

use std::net::SocketAddr;

use socklane::{
	Endpoint, Error, Family, FamilyPrefs, ListenConfig, NameFlags, PeerAddr, SocketError, connect,
	listen,
};

#[test]
fn family_maps_to_libc_constants() {
	for family in [Family::Inet, Family::Inet6, Family::Unspec] {
		assert_eq!(Family::from_raw(family.raw()), family);
	}
	assert_eq!(Family::from_raw(libc::AF_UNIX), Family::Unspec);
	assert_eq!(Family::default(), Family::Unspec);
}

#[test]
fn unspec_preference_accepts_every_family() {
	assert!(Family::Unspec.accepts(Family::Inet));
	assert!(Family::Unspec.accepts(Family::Inet6));
	assert!(Family::Inet.accepts(Family::Inet));
	assert!(!Family::Inet.accepts(Family::Inet6));
	assert!(!Family::Inet6.accepts(Family::Inet));
}

#[test]
fn peer_addr_from_std_address() {
	let v4: SocketAddr = "127.0.0.1:8080".parse().unwrap();
	let addr = PeerAddr::from(v4);
	assert_eq!(addr.family(), Family::Inet);
	assert_eq!(addr.to_socket_addr(), Some(v4));
	assert_eq!(addr.to_string(), "127.0.0.1:8080");
	assert!(addr.len() <= PeerAddr::CAPACITY);

	let v6: SocketAddr = "[::1]:443".parse().unwrap();
	let addr = PeerAddr::from(v6);
	assert_eq!(addr.family(), Family::Inet6);
	assert_eq!(addr.to_socket_addr(), Some(v6));
	assert_ne!(addr, PeerAddr::from(v4));
}

#[test]
fn empty_peer_addr() {
	let addr = PeerAddr::default();
	assert!(addr.is_empty());
	assert_eq!(addr.len(), 0);
	assert_eq!(addr.family(), Family::Unspec);
	assert_eq!(addr.to_socket_addr(), None);
}

#[test]
fn listening_endpoint_names_its_bound_interface() {
	let mut listener = Endpoint::new("127.0.0.1", "0");
	listen(&mut listener, &ListenConfig::default()).unwrap();
	let port = common::port_of(&listener);
	assert_ne!(port, 0);

	assert_eq!(
		listener.peer_name_with(NameFlags::numeric()).unwrap(),
		format!("127.0.0.1:{port}")
	);
	// Host part may be a name from the hosts file; the service is always numeric.
	assert!(listener.peer_name().unwrap().ends_with(&format!(":{port}")));
}

#[test]
fn accepted_peer_name_is_the_client() {
	let pair = common::loopback_pair();
	let client_port = pair.client.local_addr().unwrap().to_socket_addr().unwrap().port();
	let name = pair.server.peer_name_with(NameFlags::numeric()).unwrap();
	assert!(name.ends_with(&format!(":{client_port}")), "{name}");
}

#[test]
fn unknown_service_fails_resolution() {
	let mut endpoint = Endpoint::new("127.0.0.1", "no-such-service-socklane");
	let err = connect(&mut endpoint, &FamilyPrefs::default()).unwrap_err();
	assert!(matches!(err, Error::Socket(SocketError::Resolve { .. })), "{err:?}");
	assert!(!endpoint.is_open());
}

#[test]
fn name_flags_defaults() {
	assert_eq!(NameFlags::default().raw(), libc::NI_NOFQDN | libc::NI_NUMERICSERV);
	assert_eq!(
		NameFlags::numeric().raw(),
		libc::NI_NOFQDN | libc::NI_NUMERICSERV | libc::NI_NUMERICHOST
	);
}
