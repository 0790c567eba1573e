//! A full session against a scripted MQTT broker on localhost.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mechination_bridge_framework::Session;
use mechination_common::{MqttConfig, TopicBuilder, mqtt_options};
use mqtt_bridge_serial::BridgeSession;
use rumqttc::AsyncClient;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// A control packet the broker read from the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Received {
    Subscribe(Vec<String>),
    Publish {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    Other(u8),
}

impl Received {
    fn is_publish_to(&self, wanted: &str) -> bool {
        matches!(self, Received::Publish { topic, .. } if topic == wanted)
    }
}

/// Accepts any number of clients. Each one gets a CONNACK after `delay`,
/// then `after_connack` verbatim, then SUBACKs and PINGRESPs.
struct FakeBroker {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    received: mpsc::UnboundedReceiver<Received>,
    seen: Vec<Received>,
}

impl FakeBroker {
    async fn start(delay: Duration, after_connack: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let (tx, received) = mpsc::unbounded_channel();

        let accepted = connections.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, delay, after_connack.clone(), tx.clone()));
            }
        });

        Self {
            addr,
            connections,
            received,
            seen: Vec::new(),
        }
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Collect packets until `done` holds for everything seen so far.
    async fn wait_for(&mut self, done: impl Fn(&[Received]) -> bool) -> &[Received] {
        while !done(&self.seen) {
            let packet = self.received.recv().await.expect("broker stopped");
            self.seen.push(packet);
        }
        &self.seen
    }
}

async fn serve(
    mut socket: TcpStream,
    delay: Duration,
    after_connack: Vec<u8>,
    received: mpsc::UnboundedSender<Received>,
) -> std::io::Result<()> {
    let (header, _) = read_packet(&mut socket).await?;
    assert_eq!(header >> 4, 1, "first packet must be CONNECT");

    tokio::time::sleep(delay).await;
    socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await?;
    socket.write_all(&after_connack).await?;

    loop {
        let (header, body) = read_packet(&mut socket).await?;
        let packet = match header >> 4 {
            3 => decode_publish(header, &body),
            8 => {
                socket.write_all(&[0x90, 0x03, body[0], body[1], 0x00]).await?;
                decode_subscribe(&body)
            }
            12 => {
                socket.write_all(&[0xd0, 0x00]).await?;
                Received::Other(header)
            }
            _ => Received::Other(header),
        };
        if received.send(packet).is_err() {
            return Ok(());
        }
    }
}

async fn read_packet(socket: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let header = socket.read_u8().await?;

    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = socket.read_u8().await?;
        len |= usize::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0; len];
    socket.read_exact(&mut body).await?;
    Ok((header, body))
}

/// Split a length-prefixed string off the front of `bytes`.
fn take_string(bytes: &[u8]) -> (String, &[u8]) {
    let len = usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
    let text = String::from_utf8(bytes[2..2 + len].to_vec()).unwrap();
    (text, &bytes[2 + len..])
}

fn decode_publish(header: u8, body: &[u8]) -> Received {
    let qos = (header >> 1) & 0x03;
    let (topic, rest) = take_string(body);
    let payload = if qos > 0 { &rest[2..] } else { rest };

    Received::Publish {
        topic,
        payload: payload.to_vec(),
        retain: header & 0x01 == 1,
    }
}

fn decode_subscribe(body: &[u8]) -> Received {
    let mut filters = Vec::new();
    let mut rest = &body[2..];
    while !rest.is_empty() {
        let (filter, tail) = take_string(rest);
        filters.push(filter);
        rest = &tail[1..];
    }
    Received::Subscribe(filters)
}

/// Encode a QoS 0 PUBLISH from the broker to the bridge.
fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let len = 2 + topic.len() + payload.len();
    assert!(len < 128, "single-byte remaining length only");

    let mut packet = vec![0x30, len as u8];
    packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    packet.extend_from_slice(topic.as_bytes());
    packet.extend_from_slice(payload);
    packet
}

fn session(broker: &FakeBroker, serial: DuplexStream) -> BridgeSession<DuplexStream> {
    let config = MqttConfig {
        host: broker.addr.ip().to_string(),
        port: broker.addr.port(),
        ..Default::default()
    };
    let options = mqtt_options(&config, None).unwrap();
    let (client, eventloop) = AsyncClient::new(options, config.request_capacity);

    BridgeSession::new(
        serial,
        client,
        eventloop,
        TopicBuilder::new(&config.client_id),
        Duration::from_secs(config.keep_alive_secs),
    )
}

fn subscriptions(seen: &[Received]) -> Vec<String> {
    seen.iter()
        .filter_map(|packet| match packet {
            Received::Subscribe(filters) => Some(filters.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn announced_online(seen: &[Received]) -> bool {
    seen.iter().any(|packet| {
        *packet
            == Received::Publish {
                topic: "mechination/btnbridge/available".to_string(),
                payload: b"online".to_vec(),
                retain: true,
            }
    })
}

/// Run the session until the broker has seen what `done` asks for.
async fn run_until(
    session: &mut BridgeSession<DuplexStream>,
    broker: &mut FakeBroker,
    done: impl Fn(&[Received]) -> bool,
) -> Vec<Received> {
    let outcome = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::select! {
            result = session.run() => panic!("session ended early: {:?}", result),
            seen = broker.wait_for(done) => seen.to_vec(),
        }
    })
    .await;
    outcome.expect("broker did not see the expected packets")
}

#[tokio::test]
async fn test_connack_announces_bridge_while_device_chatters() {
    let mut broker = FakeBroker::start(Duration::from_millis(250), Vec::new()).await;
    let (bridge_side, device) = tokio::io::duplex(64 * 1024);
    let (mut device_rx, mut device_tx) = tokio::io::split(device);
    let mut session = session(&broker, bridge_side);

    let chatter = tokio::spawn(async move {
        device_tx
            .write_all(b"\tswitch relay_1 state=OFF\r\n")
            .await
            .unwrap();
        while device_tx.write_all(b"tick\r\n").await.is_ok() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    let seen = run_until(&mut session, &mut broker, |seen| {
        subscriptions(seen).len() == 3
            && announced_online(seen)
            && seen.iter().any(|p| p.is_publish_to("homeassistant/switch/btnbridge/relay_1/config"))
    })
    .await;
    chatter.abort();

    assert!(session.is_connected());
    assert_eq!(broker.connections(), 1);

    let mut filters = subscriptions(&seen);
    filters.sort();
    assert_eq!(
        filters,
        [
            "homeassistant/status",
            "mechination/btnbridge/+/+/set",
            "mechination/btnbridge/+/set",
        ]
    );

    let discovery = seen
        .iter()
        .find(|p| p.is_publish_to("homeassistant/switch/btnbridge/relay_1/config"))
        .unwrap();
    match discovery {
        Received::Publish { payload, retain, .. } => {
            assert!(!retain);
            let message: serde_json::Value = serde_json::from_slice(payload).unwrap();
            assert_eq!(message["command_topic"], "mechination/btnbridge/relay_1/set");
        }
        other => panic!("unexpected packet {:?}", other),
    }

    let mut written = [0u8; 11];
    device_rx.read_exact(&mut written).await.unwrap();
    assert_eq!(&written, b"enumerate\r\n");

    session.close().await;
}

#[tokio::test]
async fn test_burst_larger_than_request_queue_is_delivered() {
    let mut broker = FakeBroker::start(Duration::from_millis(250), Vec::new()).await;
    let (bridge_side, mut device) = tokio::io::duplex(64 * 1024);
    let mut session = session(&broker, bridge_side);

    let lines = MqttConfig::default().request_capacity + 6;
    for n in 0..lines {
        let line = format!("\tswitch relay_{} state=OFF\r\n", n);
        device.write_all(line.as_bytes()).await.unwrap();
    }

    let seen = run_until(&mut session, &mut broker, |seen| {
        announced_online(seen)
            && seen
                .iter()
                .filter(|p| matches!(p, Received::Publish { topic, .. } if topic.starts_with("homeassistant/switch/")))
                .count()
                == lines
    })
    .await;

    let last = format!("homeassistant/switch/btnbridge/relay_{}/config", lines - 1);
    assert!(seen.iter().any(|p| p.is_publish_to(&last)));
    assert_eq!(broker.connections(), 1);

    session.close().await;
}

#[tokio::test]
async fn test_broker_command_reaches_device() {
    let command = publish_packet("mechination/btnbridge/zone/2/set", b"ON");
    let broker = FakeBroker::start(Duration::ZERO, command).await;
    let (bridge_side, mut device) = tokio::io::duplex(64 * 1024);
    let mut session = session(&broker, bridge_side);

    let expected = b"enumerate\r\nzone.2 ON\r\n";
    let mut written = vec![0u8; expected.len()];
    let read = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::select! {
            result = session.run() => panic!("session ended early: {:?}", result),
            read = device.read_exact(&mut written) => read,
        }
    })
    .await
    .expect("command never reached the device");
    read.unwrap();

    assert_eq!(&written[..], expected);
    assert!(session.is_connected());

    session.close().await;
}

#[tokio::test]
async fn test_state_updates_keep_device_key_order() {
    let mut broker = FakeBroker::start(Duration::ZERO, Vec::new()).await;
    let (bridge_side, mut device) = tokio::io::duplex(64 * 1024);
    let mut session = session(&broker, bridge_side);

    device
        .write_all(b"\tporch_1 state=ON brightness=40 color=warm\r\n")
        .await
        .unwrap();

    let seen = run_until(&mut session, &mut broker, |seen| {
        seen.iter().any(|p| p.is_publish_to("mechination/btnbridge/porch_1"))
    })
    .await;

    let state = seen
        .iter()
        .find(|p| p.is_publish_to("mechination/btnbridge/porch_1"))
        .unwrap();
    assert_eq!(
        *state,
        Received::Publish {
            topic: "mechination/btnbridge/porch_1".to_string(),
            payload: br#"{"state":"ON","brightness":40,"color":"warm"}"#.to_vec(),
            retain: false,
        }
    );

    session.close().await;
}
