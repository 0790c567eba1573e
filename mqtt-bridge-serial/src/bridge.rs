//! The serial ⇄ MQTT session.
//!
//! One [`BridgeSession`] owns the serial stream and the MQTT client of a
//! single connection attempt. The rumqttc event loop is polled on its own
//! task and hands incoming packets to the session over a channel, so the
//! session can wait on the broker, the serial port and the liveness tick
//! without ever cancelling a half-finished broker read or write. Any error
//! ends the attempt; the framework supervisor then closes the session and
//! reconnects from scratch.

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Packet};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_serial::SerialStream;

use mechination_bridge_framework::{Availability, BridgeError, Connector, Publisher, Session};
use mechination_common::{TopicBuilder, mqtt_options};

use crate::commands::{self, SerialCommand};
use crate::config::SerialBridgeConfig;
use crate::error::{Error, Result};
use crate::interpreter::StatusInterpreter;
use crate::line::{LineAssembler, SerialLine};
use crate::serial;

/// Period of the liveness check.
const HOUSEKEEPING_PERIOD: Duration = Duration::from_secs(1);

/// Serial read chunk size.
const READ_CHUNK: usize = 1024;

/// An incoming packet, or the error that stopped the event loop.
type BrokerEvent = std::result::Result<Packet, ConnectionError>;

/// Opens the serial port and the broker client for each attempt.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    config: SerialBridgeConfig,
}

impl SerialConnector {
    pub fn new(config: &SerialBridgeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Connector for SerialConnector {
    type Error = Error;
    type Session = BridgeSession<SerialStream>;

    async fn connect(&mut self) -> Result<BridgeSession<SerialStream>> {
        let serial = serial::open(&self.config.serial)?;

        let mqtt = &self.config.mqtt;
        let topics = TopicBuilder::new(&mqtt.client_id);
        let will = Availability::Offline.last_will(topics.availability());
        let options = mqtt_options(mqtt, Some(will)).map_err(BridgeError::from)?;
        let (client, eventloop) = AsyncClient::new(options, mqtt.request_capacity);

        Ok(BridgeSession::new(
            serial,
            client,
            eventloop,
            topics,
            Duration::from_secs(mqtt.keep_alive_secs),
        ))
    }
}

/// Poll the event loop until it fails or the session goes away.
///
/// Outgoing notifications are dropped. The channel is unbounded so this task
/// keeps draining the client's request queue while the session is busy.
async fn pump_broker_events(mut eventloop: EventLoop, events: mpsc::UnboundedSender<BrokerEvent>) {
    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(packet)) => Ok(packet),
            Ok(Event::Outgoing(_)) => continue,
            Err(e) => Err(e),
        };

        let failed = event.is_err();
        if events.send(event).is_err() || failed {
            break;
        }
    }
}

/// Live transports of one attempt.
pub struct BridgeSession<S> {
    serial: S,
    broker: mpsc::UnboundedReceiver<BrokerEvent>,
    pump: JoinHandle<()>,
    publisher: Publisher,
    interpreter: StatusInterpreter,
    assembler: LineAssembler,
    keep_alive: Duration,
    last_broker_activity: Instant,
    connected: bool,
}

impl<S> BridgeSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Start polling `eventloop` and wrap both transports.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        serial: S,
        client: AsyncClient,
        eventloop: EventLoop,
        topics: TopicBuilder,
        keep_alive: Duration,
    ) -> Self {
        let (events, broker) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_broker_events(eventloop, events));

        Self {
            serial,
            broker,
            pump,
            interpreter: StatusInterpreter::new(topics.clone()),
            publisher: Publisher::new(client, topics),
            assembler: LineAssembler::new(),
            keep_alive,
            last_broker_activity: Instant::now(),
            connected: false,
        }
    }

    /// Whether the broker has acknowledged the connection.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    async fn on_broker_packet(&mut self, packet: Packet) -> Result<()> {
        match packet {
            Packet::ConnAck(ack) => self.on_connected(ack.code).await,
            Packet::Publish(publish) => {
                self.on_broker_message(&publish.topic, &publish.payload)
                    .await
            }
            Packet::Disconnect => Err(Error::transport("broker closed the session")),
            packet => {
                tracing::trace!(?packet, "Broker packet");
                Ok(())
            }
        }
    }

    async fn on_connected(&mut self, code: ConnectReturnCode) -> Result<()> {
        if code != ConnectReturnCode::Success {
            return Err(Error::transport(format!(
                "broker refused connection: {:?}",
                code
            )));
        }

        self.connected = true;
        tracing::info!(client_id = %self.publisher.topics().client_id(), "Connected to MQTT broker");

        for topic in self.publisher.topics().subscriptions() {
            self.publisher.subscribe(&topic).await?;
        }
        Availability::Online.publish(&self.publisher).await?;

        self.write_command(&SerialCommand::Enumerate).await
    }

    async fn on_broker_message(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        match commands::translate(self.publisher.topics(), topic, payload)? {
            Some(command) => {
                tracing::debug!(topic = %topic, "Forwarding command to serial bus");
                self.write_command(&command).await
            }
            None => {
                tracing::debug!(topic = %topic, "Ignoring broker message");
                Ok(())
            }
        }
    }

    async fn on_serial_line(&self, line: SerialLine) -> Result<()> {
        match line {
            SerialLine::Status(text) => {
                let intent = self.interpreter.interpret(&text)?;
                tracing::debug!(
                    topic = %intent.topic,
                    kind = ?intent.kind,
                    bytes = intent.payload.len(),
                    "Publishing"
                );
                self.publisher.publish(&intent.topic, intent.payload).await?;
            }
            SerialLine::Diagnostic(text) => {
                if !text.is_empty() {
                    tracing::info!(source = "device", "{}", text);
                }
            }
        }
        Ok(())
    }

    async fn write_command(&mut self, command: &SerialCommand) -> Result<()> {
        let line = command.to_line();
        self.serial.write_all(line.as_bytes()).await?;
        self.serial.flush().await?;
        tracing::debug!(line = %line.trim_end(), "Wrote serial command");
        Ok(())
    }

    /// Fail the attempt when the broker has been silent for two keep-alive
    /// periods.
    fn check_broker_liveness(&self) -> Result<()> {
        let idle = self.last_broker_activity.elapsed();
        if idle > self.keep_alive * 2 {
            return Err(Error::transport(format!(
                "no broker activity for {:?}",
                idle
            )));
        }
        Ok(())
    }
}

impl<S> Session for BridgeSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    type Error = Error;

    async fn run(&mut self) -> Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        let mut housekeeping =
            tokio::time::interval_at(Instant::now() + HOUSEKEEPING_PERIOD, HOUSEKEEPING_PERIOD);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.broker.recv() => {
                    let packet = event.ok_or_else(|| Error::transport("broker event loop stopped"))??;
                    self.last_broker_activity = Instant::now();
                    self.on_broker_packet(packet).await?;
                }
                read = self.serial.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Err(Error::transport("serial port closed"));
                    }
                    for line in self.assembler.push(&buf[..n])? {
                        self.on_serial_line(line).await?;
                    }
                }
                _ = housekeeping.tick() => self.check_broker_liveness()?,
            }
        }
    }

    async fn close(mut self) {
        self.pump.abort();
        if let Err(e) = self.serial.shutdown().await {
            tracing::debug!(error = %e, "Serial shutdown failed");
        }
        tracing::info!(connected = self.connected, "Transports closed");
    }
}

impl<S> Drop for BridgeSession<S> {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
