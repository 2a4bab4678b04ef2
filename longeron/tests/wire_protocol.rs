//! Byte-level checks against a hand-driven peer: exact REQ framing,
//! envelope concatenation, and handshake tolerance.

use bytes::{BufMut, Bytes, BytesMut};
use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::{TcpListener, TcpStream};
use longeron::codec::Frame;
use longeron::greeting::Greeting;
use longeron::handshake::{perform_handshake, HandshakeRole};
use longeron::{Context, LongeronError, SendFlags, SocketType};
use std::sync::Arc;
use std::time::Duration;

async fn read_exact(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let buf = vec![0u8; n];
    let BufResult(res, buf) = stream.read_exact(buf).await;
    res.unwrap();
    buf
}

async fn write_all(stream: &mut TcpStream, bytes: &[u8]) {
    let BufResult(res, _) = stream.write_all(bytes.to_vec()).await;
    res.unwrap();
}

#[compio::test]
async fn req_send_produces_delimiter_then_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = compio::runtime::spawn(async move {
        let ctx = Context::new();
        let req = ctx.socket(SocketType::Req);
        req.connect(&format!("tcp://127.0.0.1:{}", addr.port()))
            .await
            .unwrap();
        req.send(b"Hello", SendFlags::empty()).await.unwrap();
        // Flags are accepted syntactically and do not change the shape.
        req.send(b"Hello", SendFlags::DONTWAIT | SendFlags::SNDMORE)
            .await
            .unwrap();
    });

    let (mut stream, _) = listener.accept().await.unwrap();
    perform_handshake(&mut stream, HandshakeRole::Acceptor, SocketType::Rep)
        .await
        .unwrap();

    for _ in 0..2 {
        // Delimiter: short message frame, MORE set, zero length.
        assert_eq!(read_exact(&mut stream, 2).await, vec![0x01, 0x00]);
        // Payload: short message frame, last, five bytes.
        let frame = read_exact(&mut stream, 7).await;
        assert_eq!(&frame[..2], [0x00, 0x05]);
        assert_eq!(&frame[2..], b"Hello");
    }

    client.await;
}

#[compio::test]
async fn rep_recv_concatenates_envelope_parts() {
    let ctx = Context::new();
    let rep = Arc::new(ctx.socket(SocketType::Rep));
    rep.bind("tcp://127.0.0.1:0").await.unwrap();
    let addr = rep.local_addr().unwrap();

    let fake_req = compio::runtime::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        perform_handshake(&mut stream, HandshakeRole::Initiator, SocketType::Req)
            .await
            .unwrap();

        let mut wire = BytesMut::new();
        wire.extend_from_slice(&Frame::message(Bytes::new(), true).encode());
        wire.extend_from_slice(&Frame::message(Bytes::from_static(b"foo"), true).encode());
        wire.extend_from_slice(&Frame::message(Bytes::from_static(b"bar"), false).encode());
        write_all(&mut stream, &wire).await;

        // Hold the stream open until the server is done reading.
        compio::time::sleep(Duration::from_millis(200)).await;
    });

    rep.accept().await.unwrap();
    let mut buf = [0u8; 64];
    let n = rep.recv(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"foobar");

    fake_req.await;
}

/// Build a READY frame by hand, with whatever properties the caller wants.
fn ready_frame(props: &[(&[u8], &[u8])]) -> Bytes {
    let mut body = BytesMut::new();
    body.put_u8(5);
    body.extend_from_slice(b"READY");
    for (name, value) in props {
        body.put_u8(name.len() as u8);
        body.extend_from_slice(name);
        body.put_u32(value.len() as u32);
        body.extend_from_slice(value);
    }
    Frame::command(body.freeze()).encode()
}

async fn read_peer_ready(stream: &mut TcpStream) {
    let header = read_exact(stream, 2).await;
    assert_eq!(header[0], 0x04, "expected a short command frame");
    read_exact(stream, header[1] as usize).await;
}

#[compio::test]
async fn handshake_tolerates_padded_mechanism_and_unknown_properties() {
    let ctx = Context::new();
    let rep = Arc::new(ctx.socket(SocketType::Rep));
    rep.bind("tcp://127.0.0.1:0").await.unwrap();
    let addr = rep.local_addr().unwrap();

    let peer = compio::runtime::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();

        // Lowercase mechanism, still zero-padded: must be accepted.
        let mut greeting = Greeting::local(false).encode();
        greeting[12..32].fill(0);
        greeting[12..16].copy_from_slice(b"null");
        write_all(&mut stream, &greeting).await;
        read_exact(&mut stream, 64).await;

        // READY with properties the server never asked about.
        let ready = ready_frame(&[
            (b"Socket-Type", b"REQ"),
            (b"Identity", b"peer-1"),
            (b"X-Flavour", b"vanilla"),
        ]);
        write_all(&mut stream, &ready).await;
        read_peer_ready(&mut stream).await;

        compio::time::sleep(Duration::from_millis(200)).await;
    });

    rep.accept().await.unwrap();
    assert_eq!(rep.connection_count().await, 1);
    peer.await;
}

#[compio::test]
async fn handshake_tolerates_unparseable_greeting() {
    let ctx = Context::new();
    let rep = Arc::new(ctx.socket(SocketType::Rep));
    rep.bind("tcp://127.0.0.1:0").await.unwrap();
    let addr = rep.local_addr().unwrap();

    let peer = compio::runtime::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();

        // Broken signature byte: the greeting no longer parses, but with
        // 64 readable bytes the server must carry on assuming 3.1/NULL.
        let mut greeting = Greeting::local(false).encode();
        greeting[0] = 0xaa;
        write_all(&mut stream, &greeting).await;
        read_exact(&mut stream, 64).await;

        write_all(&mut stream, &ready_frame(&[(b"Socket-Type", b"REQ")])).await;
        read_peer_ready(&mut stream).await;

        compio::time::sleep(Duration::from_millis(200)).await;
    });

    rep.accept().await.unwrap();
    peer.await;
}

#[compio::test]
async fn plain_mechanism_fails_handshake() {
    let ctx = Context::new();
    let rep = Arc::new(ctx.socket(SocketType::Rep));
    rep.bind("tcp://127.0.0.1:0").await.unwrap();
    let addr = rep.local_addr().unwrap();

    let peer = compio::runtime::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let mut greeting = Greeting::local(false).encode();
        greeting[12..32].fill(0);
        greeting[12..17].copy_from_slice(b"PLAIN");
        write_all(&mut stream, &greeting).await;

        // The server drops us after reading the greeting.
        compio::time::sleep(Duration::from_millis(200)).await;
    });

    let err = rep.accept().await.unwrap_err();
    assert!(
        matches!(&err, LongeronError::MechanismUnsupported(m) if m == "PLAIN"),
        "got {err}"
    );
    // Only that connection failed; the socket keeps listening.
    assert_eq!(rep.connection_count().await, 0);
    peer.await;
}

#[compio::test]
async fn expecting_ready_rejects_data_frames() {
    let ctx = Context::new();
    let rep = Arc::new(ctx.socket(SocketType::Rep));
    rep.bind("tcp://127.0.0.1:0").await.unwrap();
    let addr = rep.local_addr().unwrap();

    let peer = compio::runtime::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_all(&mut stream, &Greeting::local(false).encode()).await;
        read_exact(&mut stream, 64).await;

        // A message frame where READY belongs.
        write_all(
            &mut stream,
            &Frame::message(Bytes::from_static(b"hi"), false).encode(),
        )
        .await;
        compio::time::sleep(Duration::from_millis(200)).await;
    });

    let err = rep.accept().await.unwrap_err();
    assert!(matches!(err, LongeronError::BadCommand(_)), "got {err}");
    peer.await;
}
