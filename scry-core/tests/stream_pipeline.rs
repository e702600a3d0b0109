//! Integration tests — full transmit/receive pipeline over real UDP
//! sockets on localhost, covering the relay path, the direct path, and
//! the P2P activation signal.

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;

use scry_core::datagram::{ControlDatagram, Datagram};
use scry_core::stream::{
    FrameReceiver, StreamTransmitter, SyntheticSource, TransmitterConfig, ZstdFrameCodec,
};

fn transmitter_config() -> TransmitterConfig {
    TransmitterConfig {
        target_fps: 60,
        ..Default::default()
    }
}

#[tokio::test]
async fn relay_path_delivers_frames_end_to_end() {
    // A minimal stand-in for the broker's relay loop: forward frame
    // datagrams verbatim, swallow control datagrams.
    let relay = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = relay.local_addr().unwrap();

    let controller_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let controller_addr = controller_socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65_535];
        loop {
            let (len, _) = match relay.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(_) => break,
            };
            if matches!(Datagram::classify(&buf[..len]), Ok(Datagram::Frame(_))) {
                let _ = relay.send_to(&buf[..len], controller_addr).await;
            }
        }
    });

    // Receiver registers with the relay; no streamer IP is known, so
    // everything counts as relay traffic.
    let (_peer_tx, peer_rx) = watch::channel(None);
    let mut receiver = FrameReceiver::new(
        controller_socket,
        relay_addr,
        ZstdFrameCodec::new(),
        peer_rx,
    );
    let mut frames = receiver.frame_receiver();
    let stats = receiver.stats_receiver();
    let receiver_stop = receiver.stop_handle();
    let receiver_handle = tokio::spawn(async move { receiver.run().await });

    // Transmitter sends through the relay.
    let streamer_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let (_tx_peer_tx, tx_peer_rx) = watch::channel(None);
    let mut transmitter = StreamTransmitter::new(
        SyntheticSource::new(1280, 720),
        ZstdFrameCodec::new(),
        streamer_socket,
        relay_addr,
        tx_peer_rx,
        transmitter_config(),
    );
    let transmitter_stop = transmitter.stop_handle();
    let transmitter_handle = tokio::spawn(async move { transmitter.run().await });

    // A decoded frame appears with the canonical geometry.
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            frames.changed().await.unwrap();
            if frames.borrow_and_update().is_some() {
                break;
            }
        }
    })
    .await
    .expect("no frame made it through the relay");

    let frame = frames.borrow().clone().unwrap();
    assert_eq!(frame.width, 800);
    assert_eq!(frame.height, 600);
    assert!(stats.borrow().relay_frames > 0);
    assert_eq!(stats.borrow().p2p_frames, 0);

    transmitter_stop.store(false, Ordering::SeqCst);
    receiver_stop.store(false, Ordering::SeqCst);
    let _ = tokio::time::timeout(Duration::from_secs(5), transmitter_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), receiver_handle).await;
}

#[tokio::test]
async fn direct_path_activates_p2p_and_survives_without_relay() {
    // The broker here only collects control datagrams; it never
    // forwards a frame. Display updates must come from the direct
    // path alone.
    let broker = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let broker_addr = broker.local_addr().unwrap();

    let controller_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let controller_addr = controller_socket.local_addr().unwrap();

    // The controller knows the streamer's IP (as learned from auth).
    let (_peer_tx, peer_rx) = watch::channel(Some("127.0.0.1".parse().unwrap()));
    let mut receiver = FrameReceiver::new(
        controller_socket,
        broker_addr,
        ZstdFrameCodec::new(),
        peer_rx,
    );
    let mut frames = receiver.frame_receiver();
    let stats = receiver.stats_receiver();
    let receiver_stop = receiver.stop_handle();
    let receiver_handle = tokio::spawn(async move { receiver.run().await });

    // The streamer learned the controller's endpoint via PEER_INFO and
    // sends directly; the relay address points at the broker, which
    // drops frames.
    let streamer_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let (_tx_peer_tx, tx_peer_rx) = watch::channel(Some(controller_addr));
    let mut transmitter = StreamTransmitter::new(
        SyntheticSource::new(1280, 720),
        ZstdFrameCodec::new(),
        streamer_socket,
        broker_addr,
        tx_peer_rx,
        transmitter_config(),
    );
    let transmitter_stop = transmitter.stop_handle();
    let transmitter_handle = tokio::spawn(async move { transmitter.run().await });

    // The broker sees the registration, then exactly one p2p_active.
    let mut buf = vec![0u8; 65_535];
    let mut saw_registration = false;
    let mut saw_activation = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !(saw_registration && saw_activation) {
        let (len, _) = tokio::time::timeout_at(deadline, broker.recv_from(&mut buf))
            .await
            .expect("broker never saw both control datagrams")
            .unwrap();
        match Datagram::classify(&buf[..len]) {
            Ok(Datagram::Control(ControlDatagram::ControllerUdp { .. })) => {
                saw_registration = true;
            }
            Ok(Datagram::Control(ControlDatagram::P2pActive)) => saw_activation = true,
            _ => {}
        }
    }

    // Display keeps updating though the relay forwards nothing.
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            frames.changed().await.unwrap();
            if stats.borrow().p2p_frames >= 3 {
                break;
            }
        }
    })
    .await
    .expect("direct frames did not keep flowing");
    assert!(frames.borrow().is_some());
    assert_eq!(stats.borrow().relay_frames, 0);

    transmitter_stop.store(false, Ordering::SeqCst);
    receiver_stop.store(false, Ordering::SeqCst);
    let _ = tokio::time::timeout(Duration::from_secs(5), transmitter_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), receiver_handle).await;
}
