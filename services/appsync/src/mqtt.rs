//! MQTT command channel to the broker's dynamic-security control topic.
//!
//! # Purpose
//! Holds the one long-lived broker connection the service publishes admin
//! commands on. It is created once at start-up and shared by handle.
//!
//! # Key invariants and assumptions
//! - A background task owns the `rumqttc` event loop and keeps polling it;
//!   without that task no publish ever leaves the process.
//! - Publishing while the session is down fails fast with `Disconnected`.
//!   A command queued just before the session drops may still be sent once
//!   the event loop reconnects.
//! - A full request queue fails the publish with `Rejected` rather than
//!   waiting for the event loop to drain it.
//! - Replies on the control response topic are not consumed.
use crate::config::BrokerConfig;
use async_trait::async_trait;
use iotgate_dynsec::{ChannelError, CommandBatch, CommandChannel};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

const REQUEST_QUEUE_CAPACITY: usize = 64;

pub struct MqttCommandChannel {
    client: AsyncClient,
    topic: String,
    qos: QoS,
    connected: Arc<AtomicBool>,
}

impl MqttCommandChannel {
    /// Build the client and spawn the task that drives its event loop.
    ///
    /// The connection is established asynchronously; until the broker
    /// acknowledges it, `publish` returns `Disconnected`.
    pub fn connect(config: &BrokerConfig) -> (Self, JoinHandle<()>) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let driver = tokio::spawn(drive_event_loop(
            event_loop,
            connected.clone(),
            config.reconnect_delay,
        ));
        tracing::info!(
            host = %config.host,
            port = config.port,
            topic = %config.control_topic,
            "broker command channel starting"
        );

        (
            Self {
                client,
                topic: config.control_topic.clone(),
                qos: qos_from_level(config.qos),
                connected,
            },
            driver,
        )
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

#[async_trait]
impl CommandChannel for MqttCommandChannel {
    async fn publish(&self, batch: &CommandBatch) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }
        let payload = batch.to_json()?;
        self.client
            .try_publish(self.topic.as_str(), self.qos, false, payload)
            .map_err(|err| ChannelError::Rejected(err.to_string()))
    }
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    connected: Arc<AtomicBool>,
    reconnect_delay: Duration,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                connected.store(true, Ordering::Release);
                tracing::info!(code = ?ack.code, "connected to broker");
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected.store(false, Ordering::Release);
                tracing::warn!("broker closed the session");
            }
            Ok(_) => {}
            Err(err) => {
                if connected.swap(false, Ordering::AcqRel) {
                    tracing::warn!(error = %err, "broker connection lost");
                } else {
                    tracing::debug!(error = %err, "broker connection attempt failed");
                }
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

fn qos_from_level(level: u8) -> QoS {
    match level {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CONTROL_TOPIC;
    use iotgate_dynsec::Command;

    #[test]
    fn qos_levels_map_to_rumqttc() {
        assert_eq!(qos_from_level(0), QoS::AtMostOnce);
        assert_eq!(qos_from_level(1), QoS::AtLeastOnce);
        assert_eq!(qos_from_level(2), QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn publish_before_connack_is_disconnected() {
        let config = BrokerConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            reconnect_delay: Duration::from_millis(10),
            ..BrokerConfig::default()
        };
        let (channel, driver) = MqttCommandChannel::connect(&config);
        assert!(!channel.is_connected());
        assert_eq!(channel.topic, "$CONTROL/dynamic-security/v1");

        let batch = CommandBatch::single(Command::DeleteClient {
            username: "dash".to_string(),
        });
        let err = channel.publish(&batch).await.expect_err("not connected");
        assert!(matches!(err, ChannelError::Disconnected));

        driver.abort();
    }

    #[tokio::test]
    async fn full_request_queue_rejects_publish() {
        let (client, _event_loop) =
            AsyncClient::new(MqttOptions::new("appsync-test", "127.0.0.1", 1), 1);
        let channel = MqttCommandChannel {
            client,
            topic: DEFAULT_CONTROL_TOPIC.to_string(),
            qos: QoS::AtMostOnce,
            connected: Arc::new(AtomicBool::new(true)),
        };
        let batch = CommandBatch::single(Command::DeleteClient {
            username: "dash".to_string(),
        });

        channel.publish(&batch).await.expect("queued");
        let err = channel.publish(&batch).await.expect_err("queue full");
        assert!(matches!(err, ChannelError::Rejected(_)));
    }
}
