use std::time::Duration;

use arena_engine::Channel;
use arena_protocol::{EngineFrame, RemoteDescriptor};
use arena_server::endpoint::Backend;
use serde_json::json;
use tokio::sync::watch;
use tokio::time::timeout;

const PATIENCE: Duration = Duration::from_secs(5);

#[test]
fn backend_names() {
    assert_eq!("socket".parse::<Backend>().unwrap(), Backend::Socket);
    assert_eq!("TCP".parse::<Backend>().unwrap(), Backend::Socket);
    assert_eq!("auto".parse::<Backend>().unwrap(), Backend::detect());
    assert!("carrier-pigeon".parse::<Backend>().is_err());
}

#[tokio::test]
async fn socket_endpoint_queues_until_the_peer_connects() {
    let (mut endpoint, remote) = Backend::Socket.open().unwrap();
    let descriptor = remote.descriptor();
    let RemoteDescriptor::Socket { port } = descriptor else {
        panic!("expected a socket descriptor, got {descriptor}");
    };

    let (_exited_tx, exited_rx) = watch::channel(false);
    remote.release(exited_rx);

    // nobody has connected yet; the write waits for the peer
    let writer = tokio::spawn(async move {
        endpoint.write_frame(r#"{"type":"message","payload":1}"#).await;
        endpoint
    });

    let peer = tokio::task::spawn_blocking(move || {
        let mut channel = Channel::connect(&descriptor).unwrap();
        let first = channel.receive().unwrap();
        channel.send(&EngineFrame::message(json!(2))).unwrap();
        channel.close(true);
        first
    });

    let mut endpoint = timeout(PATIENCE, writer).await.unwrap().unwrap();
    assert_eq!(peer.await.unwrap(), EngineFrame::message(json!(1)));

    let reply = timeout(PATIENCE, endpoint.read_frame()).await.unwrap().unwrap();
    assert_eq!(reply.as_deref(), Some(r#"{"payload":2,"type":"message"}"#));
    let close = timeout(PATIENCE, endpoint.read_frame()).await.unwrap().unwrap();
    assert_eq!(close.as_deref(), Some(r#"{"type":"close"}"#));
    assert_eq!(endpoint.read_frame().await.unwrap(), None);

    // one peer only: the listener is gone
    assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_err());
}

#[tokio::test]
async fn abandoned_socket_endpoint_reads_end_of_stream() {
    let (mut endpoint, remote) = Backend::Socket.open().unwrap();
    drop(remote);

    let frame = timeout(PATIENCE, endpoint.read_frame()).await.unwrap().unwrap();
    assert_eq!(frame, None);
    // writing to it is harmless
    endpoint.write_frame("{}").await;
}

#[tokio::test]
async fn socket_endpoint_gives_up_when_the_unit_exits() {
    let (endpoint, remote) = Backend::Socket.open().unwrap();
    let (exited_tx, exited_rx) = watch::channel(false);
    remote.release(exited_rx);

    let (mut reader, mut writer) = endpoint.split();
    exited_tx.send(true).unwrap();

    assert_eq!(timeout(PATIENCE, reader.read_frame()).await.unwrap().unwrap(), None);
    timeout(PATIENCE, writer.write_frame("{}")).await.unwrap();
}

#[tokio::test]
async fn closed_endpoint_ignores_writes_and_reads_nothing() {
    let (mut endpoint, _remote) = Backend::Socket.open().unwrap();
    endpoint.close().await;
    endpoint.close().await;
    endpoint.write_frame("{}").await;
    assert_eq!(endpoint.read_frame().await.unwrap(), None);
}

#[cfg(unix)]
#[tokio::test]
async fn pipe_endpoint_talks_to_an_inheriting_peer() {
    let (mut endpoint, remote) = Backend::Pipe.open().unwrap();
    let RemoteDescriptor::Pipe { read_fd, write_fd } = remote.descriptor() else {
        panic!("expected a pipe descriptor");
    };
    assert_eq!(remote.inheritable_fds(), [read_fd, write_fd]);

    // stand in for a child process: duplicate the fds it would inherit
    let (peer_read, peer_write) = unsafe { (libc::dup(read_fd), libc::dup(write_fd)) };
    assert!(peer_read >= 0 && peer_write >= 0);
    let (_exited_tx, exited_rx) = watch::channel(false);
    remote.release(exited_rx);

    let peer = tokio::task::spawn_blocking(move || {
        let descriptor = RemoteDescriptor::Pipe {
            read_fd: peer_read,
            write_fd: peer_write,
        };
        let mut channel = Channel::connect(&descriptor).unwrap();
        let first = channel.receive().unwrap();
        channel.send(&EngineFrame::message(json!("pong"))).unwrap();
        // no close frame: just go away
        drop(channel);
        first
    });

    endpoint.write_frame(r#"{"type":"message","payload":"ping"}"#).await;
    assert_eq!(
        timeout(PATIENCE, peer).await.unwrap().unwrap(),
        EngineFrame::message(json!("ping"))
    );

    let reply = timeout(PATIENCE, endpoint.read_frame()).await.unwrap().unwrap();
    assert_eq!(reply.as_deref(), Some(r#"{"payload":"pong","type":"message"}"#));
    assert_eq!(endpoint.read_frame().await.unwrap(), None);
}
