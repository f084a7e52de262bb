mod common;

use std::net::IpAddr;
use std::time::{Duration, Instant};

use socklane::{
	AcceptOutcome, ConnectionId, Endpoint, Error, FrameCodec, Interest, IoError, Kind, ListenerId,
	NameFlags, Ready, Server, ServerConfig, SocketError, SocketStream,
};

fn accept_next(server: &mut Server, id: ListenerId) -> ConnectionId {
	for _ in 0..100 {
		let summary = server.poll_and_classify(Some(common::WAIT)).unwrap();
		if !summary.pending_accepts.contains(&id) {
			continue;
		}
		assert!(server.is_connect_request(id));
		if let AcceptOutcome::Accepted(conn) = server.accept(id).unwrap() {
			return conn;
		}
	}
	panic!("no connection accepted");
}

fn wait_ready(server: &mut Server, conn: ConnectionId) -> Ready {
	for _ in 0..100 {
		let summary = server.poll_and_classify(Some(common::WAIT)).unwrap();
		if let Some(entry) = summary.ready.iter().find(|r| r.id == conn) {
			return entry.ready;
		}
	}
	panic!("connection {conn} never became ready");
}

fn serve_one() -> (Server, ListenerId, Endpoint, ConnectionId) {
	let mut server = Server::new(ServerConfig::default());
	let id = server.listen_on("", "0").unwrap();
	let client = common::connect_to(server.listener(id).unwrap());
	let conn = accept_next(&mut server, id);
	(server, id, client, conn)
}

#[test]
fn idle_poll_honours_the_timeout() {
	let (mut server, _, _client, _) = serve_one();

	let timeout = Duration::from_millis(50);
	let started = Instant::now();
	let summary = server.poll_and_classify(Some(timeout)).unwrap();
	let elapsed = started.elapsed();

	assert_eq!(summary.count, 0);
	assert!(summary.is_empty());
	assert!(summary.pending_accepts.is_empty());
	assert!(summary.ready.is_empty());
	assert_eq!(server.len(), 1);
	assert!(elapsed >= timeout, "returned after {elapsed:?}");
	assert!(elapsed < Duration::from_secs(2), "blocked for {elapsed:?}");
}

#[test]
fn accepted_connections_join_the_next_cycle() {
	let mut server = Server::new(ServerConfig::default());
	let id = server.listen_on("", "0").unwrap();
	let _client = common::connect_to(server.listener(id).unwrap());

	let conn = accept_next(&mut server, id);
	assert_eq!(server.staged_len(), 1);
	assert_eq!(server.len(), 0);
	assert_eq!(server.connections().count(), 0);
	assert!(server.connection(conn).is_some());
	assert!(!server.is_ready(conn, Kind::Read));

	let accepted = server.connection(conn).unwrap();
	assert_eq!(accepted.interest(), Interest::READ);
	assert!(!accepted.peer_name().is_empty());

	server.poll_and_classify(Some(Duration::ZERO)).unwrap();
	assert_eq!(server.staged_len(), 0);
	assert_eq!(server.len(), 1);
	assert_eq!(server.connections().next().map(|c| c.id()), Some(conn));

	assert!(matches!(server.accept(id).unwrap(), AcceptOutcome::WouldBlock));
}

#[test]
fn accepted_peers_are_named_numerically() {
	assert_eq!(ServerConfig::default().name_flags, NameFlags::numeric());

	let (server, _, _client, conn) = serve_one();
	let peer = server.connection(conn).unwrap().peer_name();
	let (host, port) = peer.rsplit_once(':').expect("host:port");
	assert!(host.parse::<IpAddr>().is_ok(), "peer named {peer}");
	assert!(port.parse::<u16>().is_ok(), "peer named {peer}");
}

#[test]
fn framed_strings_cross_the_wire_intact() {
	let (mut server, _, client, conn) = serve_one();
	let codec = FrameCodec::default();

	let mut tx = SocketStream::new(&client);
	codec.write_string(&mut tx, "A<B").unwrap();
	codec.write_separator(&mut tx).unwrap();
	codec.write_strings(&mut tx, ["", "\x02\x03\x0e\x1f", "tail"]).unwrap();
	assert!(tx.flush().unwrap() > 0);
	assert_eq!(tx.pending(), 0);

	let ready = wait_ready(&mut server, conn);
	assert!(ready.is_readable());
	assert!(server.is_ready(conn, Kind::Read));

	let rx = server.connection_mut(conn).unwrap().stream_mut();
	assert_eq!(codec.read_string(rx).unwrap(), "A<B");
	codec.read_separator(rx).unwrap();
	assert_eq!(
		codec.read_strings(rx, 3).unwrap(),
		vec!["".to_string(), "\x02\x03\x0e\x1f".to_string(), "tail".to_string()]
	);
	assert!(rx.read_some(&mut [0u8; 1]).is_ok_and(|t| t == socklane::Transfer::WouldBlock));
}

#[test]
fn taken_connections_are_never_polled_again() {
	let (mut server, _, client, conn) = serve_one();
	server.poll_and_classify(Some(Duration::ZERO)).unwrap();

	let taken = server.take(conn).expect("live connection");
	assert_eq!(server.len(), 0);
	assert!(server.connection(conn).is_none());
	assert!(server.take(conn).is_none());
	assert!(taken.is_open());

	let mut tx = SocketStream::new(&client);
	tx.write_some(b"ping").unwrap();
	tx.flush().unwrap();

	let summary = server.poll_and_classify(Some(Duration::from_millis(50))).unwrap();
	assert!(summary.ready.is_empty());
	assert!(!server.is_ready(conn, Kind::Read));

	let (mut stream, peer) = taken.into_parts();
	assert!(!peer.is_empty());
	assert!(common::wait_readable(stream.endpoint()));
	let mut buf = [0u8; 4];
	assert_eq!(stream.read_some(&mut buf).unwrap(), socklane::Transfer::Bytes(4));
	assert_eq!(&buf, b"ping");
}

#[test]
fn staged_connections_can_be_taken() {
	let mut server = Server::new(ServerConfig::default());
	let id = server.listen_on("", "0").unwrap();
	let _client = common::connect_to(server.listener(id).unwrap());
	let conn = accept_next(&mut server, id);

	assert!(server.take(conn).is_some());
	assert_eq!(server.staged_len(), 0);
	server.poll_and_classify(Some(Duration::ZERO)).unwrap();
	assert_eq!(server.len(), 0);
}

#[test]
fn closed_connections_are_pruned() {
	let (mut server, _, mut client, conn) = serve_one();
	server.poll_and_classify(Some(Duration::ZERO)).unwrap();

	client.close().unwrap();
	assert!(wait_ready(&mut server, conn).is_readable());

	let peer = server.connection_mut(conn).unwrap();
	let err = peer.stream_mut().get().unwrap_err();
	assert!(matches!(err, Error::Io(IoError::ConnectionClosed)));
	peer.close().unwrap();
	assert!(!peer.is_open());

	assert_eq!(server.prune(), 1);
	assert_eq!(server.len(), 0);
	assert_eq!(server.prune(), 0);
}

#[test]
fn interest_controls_what_is_reported() {
	let config = ServerConfig::new().default_interest(Interest::NONE);
	let mut server = Server::new(config);
	let id = server.listen_on("", "0").unwrap();
	let client = common::connect_to(server.listener(id).unwrap());
	let conn = accept_next(&mut server, id);

	let mut tx = SocketStream::new(&client);
	tx.write_some(b"x").unwrap();
	tx.flush().unwrap();

	let summary = server.poll_and_classify(Some(Duration::from_millis(50))).unwrap();
	assert!(summary.ready.is_empty());

	server.connection_mut(conn).unwrap().set_interest(Interest::READ | Interest::WRITE);
	// The byte arrived during the 50ms cycle above.
	let ready = wait_ready(&mut server, conn);
	assert!(ready.is_writable());
	assert!(ready.is_readable());
}

#[test]
fn only_listening_endpoints_are_registered() {
	let mut server = Server::new(ServerConfig::default());
	let err = server.add_listener(Endpoint::new("", "0")).unwrap_err();
	assert!(matches!(
		err,
		Error::Socket(SocketError::InvalidRole { operation: "add_listener", expected: "listening", .. })
	));
	assert_eq!(server.listeners().count(), 0);
}
