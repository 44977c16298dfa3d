use crate::entity::ActuatorRegistration;
use crate::event::{ActuatorEvent, Event, SensorEvent};
use crate::request::{Request, RequestCommand};
use anyhow::Context;
use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// A sensor that pushes a random reading to the hub at a fixed period.
pub struct SimulatedSensor {
    client_id: i32,
    entity_id: i32,
    entity_type: String,
}

impl SimulatedSensor {
    pub fn new(client_id: i32, entity_id: i32, entity_type: &str) -> Self {
        Self {
            client_id,
            entity_id,
            entity_type: entity_type.to_string(),
        }
    }

    pub async fn run(self, hub_addr: &str, period: Duration) -> anyhow::Result<()> {
        let mut stream = TcpStream::connect(hub_addr)
            .await
            .with_context(|| format!("connecting sensor to hub at {hub_addr}"))?;
        info!(entity_id = self.entity_id, "Sensor connected");
        loop {
            let event = Event::Sensor(SensorEvent {
                timestamp: Utc::now().timestamp_millis() as f64,
                client_id: self.client_id,
                entity_id: self.entity_id,
                entity_type: self.entity_type.clone(),
                value: rand::thread_rng().gen_range(15.0..30.0),
            });
            stream.write_all(format!("{event}\n").as_bytes()).await?;
            tokio::time::sleep(period).await;
        }
    }
}

/// An actuator that registers a reverse command endpoint with the hub,
/// applies SET and TOGGLE commands to its state, and reports that state
/// back as events at a fixed period.
pub struct SimulatedActuator {
    client_id: i32,
    entity_id: i32,
    entity_type: String,
    state: Arc<AtomicBool>,
}

impl SimulatedActuator {
    pub fn new(client_id: i32, entity_id: i32, entity_type: &str, initial_state: bool) -> Self {
        Self {
            client_id,
            entity_id,
            entity_type: entity_type.to_string(),
            state: Arc::new(AtomicBool::new(initial_state)),
        }
    }

    pub fn state(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }

    /// Shared handle to the switch state, for observing it externally.
    pub fn state_handle(&self) -> Arc<AtomicBool> {
        self.state.clone()
    }

    pub async fn run(self, hub_addr: &str, period: Duration) -> anyhow::Result<()> {
        let command_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("binding actuator command endpoint")?;
        let command_addr = command_listener.local_addr()?;

        let mut stream = TcpStream::connect(hub_addr)
            .await
            .with_context(|| format!("connecting actuator to hub at {hub_addr}"))?;
        let registration = ActuatorRegistration {
            id: self.entity_id,
            client_id: self.client_id,
            entity_type: self.entity_type.clone(),
            host: command_addr.ip().to_string(),
            port: command_addr.port(),
        };
        stream
            .write_all(format!("{registration}\n").as_bytes())
            .await?;
        info!(entity_id = self.entity_id, command_addr = %command_addr, "Actuator registered");

        let state = self.state.clone();
        tokio::spawn(async move {
            if let Ok((conn, _)) = command_listener.accept().await {
                serve_commands(conn, state).await;
            }
        });

        loop {
            let event = Event::Actuator(ActuatorEvent {
                timestamp: Utc::now().timestamp_millis() as f64,
                client_id: self.client_id,
                entity_id: self.entity_id,
                entity_type: self.entity_type.clone(),
                value: self.state(),
            });
            stream.write_all(format!("{event}\n").as_bytes()).await?;
            tokio::time::sleep(period).await;
        }
    }
}

async fn serve_commands(stream: TcpStream, state: Arc<AtomicBool>) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match line.parse::<Request>() {
            Ok(request) => apply_command(&request, &state),
            Err(e) => warn!(error = %e, "Ignoring malformed command line"),
        }
    }
}

fn apply_command(request: &Request, state: &AtomicBool) {
    match request.command {
        RequestCommand::ControlSetActuatorState => match request.data.parse::<bool>() {
            Ok(value) => {
                state.store(value, Ordering::SeqCst);
                info!(value, "Actuator state set by hub");
            }
            Err(_) => warn!(data = %request.data, "Bad actuator command payload"),
        },
        RequestCommand::ControlToggleActuatorState => {
            let previous = state.fetch_xor(true, Ordering::SeqCst);
            info!(value = !previous, "Actuator state toggled by hub");
        }
        _ => debug!(command = ?request.command, "Ignoring non-control command"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestType;

    fn control(command: RequestCommand, data: &str) -> Request {
        Request::new(RequestType::Control, command, data).with_client_id(1)
    }

    #[test]
    fn set_command_overwrites_state() {
        let state = AtomicBool::new(false);
        apply_command(
            &control(RequestCommand::ControlSetActuatorState, "true"),
            &state,
        );
        assert!(state.load(Ordering::SeqCst));
        apply_command(
            &control(RequestCommand::ControlSetActuatorState, "false"),
            &state,
        );
        assert!(!state.load(Ordering::SeqCst));
    }

    #[test]
    fn toggle_command_flips_state() {
        let state = AtomicBool::new(false);
        apply_command(
            &control(RequestCommand::ControlToggleActuatorState, ""),
            &state,
        );
        assert!(state.load(Ordering::SeqCst));
    }

    #[test]
    fn bad_payload_leaves_state_alone() {
        let state = AtomicBool::new(true);
        apply_command(
            &control(RequestCommand::ControlSetActuatorState, "maybe"),
            &state,
        );
        assert!(state.load(Ordering::SeqCst));
    }
}
