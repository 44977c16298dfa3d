use crate::entity::{Actuator, ActuatorRegistration, Entity, Sensor};
use crate::event::Event;
use crate::filter::Filter;
use crate::request::{Request, RequestCommand, RequestType, TimeWindow};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

mod registry;
pub use registry::ClientRegistry;


/// Engine operation failures. Operations on unknown ids are contracted to
/// no-op instead, so this surface is small.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A trigger evaluation needs the latest history event, but no event
    /// has been received yet.
    NoHistoryAvailable,
    /// The referenced id is not a known actuator of this client.
    UnknownActuator(i32),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NoHistoryAvailable => write!(f, "no events in history"),
            EngineError::UnknownActuator(id) => write!(f, "actuator {} is not known", id),
        }
    }
}

impl std::error::Error for EngineError {}

/// Per-entity record: the registry entry plus every event it produced.
#[derive(Debug)]
struct EntityRecord {
    entity: Entity,
    events: Vec<Event>,
}

impl EntityRecord {
    fn from_event(event: &Event) -> Self {
        let entity = match event {
            Event::Sensor(e) => Entity::Sensor(Sensor {
                id: e.entity_id,
                client_id: e.client_id,
                entity_type: e.entity_type.clone(),
            }),
            Event::Actuator(e) => Entity::Actuator(Actuator {
                id: e.entity_id,
                client_id: e.client_id,
                entity_type: e.entity_type.clone(),
                state: e.value,
            }),
        };
        Self {
            entity,
            events: Vec::new(),
        }
    }
}

/// Mutable per-client state, guarded by one lock per engine instance.
struct EngineState {
    max_wait_seconds: f64,
    /// Event history ordered by event timestamp, stable for ties.
    history: Vec<Event>,
    entities: HashMap<i32, EntityRecord>,
    /// Command channels to registered actuators, keyed by entity id.
    command_channels: HashMap<i32, mpsc::UnboundedSender<String>>,
    response_sink: Option<mpsc::UnboundedSender<String>>,
    log_filter: Filter,
    /// Epoch ms of the last log-filter replacement.
    last_filter_change: f64,
    logs: Vec<i32>,
}

/// The per-client state machine: event history, entity registry, trigger
/// filters, and the response/command channels for one client.
///
/// Created lazily by the [`ClientRegistry`] on the first message bearing a
/// new client id, and lives for the process's duration.
pub struct ClientEngine {
    client_id: i32,
    state: Mutex<EngineState>,
}

impl ClientEngine {
    pub fn new(client_id: i32, default_max_wait_seconds: f64) -> Self {
        Self {
            client_id,
            state: Mutex::new(EngineState {
                max_wait_seconds: default_max_wait_seconds,
                history: Vec::new(),
                entities: HashMap::new(),
                command_channels: HashMap::new(),
                response_sink: None,
                log_filter: Filter::unsatisfiable(),
                last_filter_change: Utc::now().timestamp_millis() as f64,
                logs: Vec::new(),
            }),
        }
    }

    pub fn client_id(&self) -> i32 {
        self.client_id
    }

    /// Bind the connection the engine writes response lines to. Replaces
    /// any previous sink.
    pub fn bind_response_sink(&self, sink: mpsc::UnboundedSender<String>) {
        self.state.lock().unwrap().response_sink = Some(sink);
    }

    /// Store the command channel for a registered actuator.
    pub fn register_actuator(
        &self,
        registration: &ActuatorRegistration,
        commands: mpsc::UnboundedSender<String>,
    ) {
        info!(
            client_id = self.client_id,
            actuator_id = registration.id,
            addr = %registration.command_addr(),
            "Actuator registered"
        );
        self.state
            .lock()
            .unwrap()
            .command_channels
            .insert(registration.id, commands);
    }

    pub fn update_max_wait_time(&self, seconds: f64) {
        self.state.lock().unwrap().max_wait_seconds = seconds;
    }

    pub fn max_wait_seconds(&self) -> f64 {
        self.state.lock().unwrap().max_wait_seconds
    }

    /// Insert an event into history (timestamp order, ties after equal
    /// predecessors), update the entity registry, and synchronize actuator
    /// state.
    pub fn process_incoming_event(&self, event: Event) {
        debug!(client_id = self.client_id, %event, "Event received");
        let mut state = self.state.lock().unwrap();

        let timestamp = event.timestamp();
        let idx = state
            .history
            .partition_point(|e| e.timestamp() <= timestamp);
        state.history.insert(idx, event.clone());

        if timestamp >= state.last_filter_change && state.log_filter.satisfies(&event) {
            let entity_id = event.entity_id();
            state.logs.push(entity_id);
        }

        let record = state
            .entities
            .entry(event.entity_id())
            .or_insert_with(|| EntityRecord::from_event(&event));
        if let (Entity::Actuator(actuator), Some(value)) =
            (&mut record.entity, event.value_boolean())
        {
            actuator.state = value;
        }
        record.events.push(event);
    }

    /// Dispatch a request and write exactly one response line back to the
    /// bound sink. A missing sink is a silent no-op.
    pub fn process_incoming_request(&self, request: &Request) {
        info!(client_id = self.client_id, %request, "Request received");
        let mut state = self.state.lock().unwrap();
        let response = state.handle_request(self.client_id, request);
        if let Some(sink) = &state.response_sink {
            let _ = sink.send(response);
        }
    }

    /// Evaluate `filter` against the latest history event and force the
    /// actuator's state to the result. Returns the state that was applied.
    pub fn set_actuator_state_if(
        &self,
        filter: Filter,
        actuator_id: i32,
    ) -> Result<bool, EngineError> {
        self.state
            .lock()
            .unwrap()
            .set_actuator_state_if(self.client_id, filter, actuator_id)
    }

    /// Flip the actuator's state if the latest history event satisfies
    /// `filter`. Returns the new state, or `None` when the trigger did not
    /// fire or the actuator has no recorded events yet.
    pub fn toggle_actuator_state_if(
        &self,
        filter: Filter,
        actuator_id: i32,
    ) -> Result<Option<bool>, EngineError> {
        self.state
            .lock()
            .unwrap()
            .toggle_actuator_state_if(self.client_id, filter, actuator_id)
    }

    /// Replace the log trigger, clear accumulated logs, and re-scan history
    /// for events at-or-after the change time that satisfy the new filter.
    pub fn log_if(&self, filter: Filter) {
        self.state.lock().unwrap().log_if(filter)
    }

    /// Return and clear the accumulated log entity ids, in insertion order.
    pub fn read_logs(&self) -> Vec<i32> {
        std::mem::take(&mut self.state.lock().unwrap().logs)
    }

    /// All history events with timestamps inside the window, ascending.
    pub fn events_in_time_window(&self, window: TimeWindow) -> Vec<Event> {
        let state = self.state.lock().unwrap();
        state
            .history
            .iter()
            .filter(|e| window.contains(e.timestamp()))
            .cloned()
            .collect()
    }

    /// Ids of every entity seen so far, unordered.
    pub fn all_entities(&self) -> Vec<i32> {
        self.state.lock().unwrap().entities.keys().copied().collect()
    }

    /// The `n` latest events by timestamp, returned ascending. The whole
    /// history if it holds fewer than `n` events.
    pub fn last_n_events(&self, n: usize) -> Vec<Event> {
        let state = self.state.lock().unwrap();
        let start = state.history.len().saturating_sub(n);
        state.history[start..].to_vec()
    }

    /// Id of the entity with the most events; ties break to the larger id.
    /// Returns -1 when no entities exist.
    pub fn most_active_entity(&self) -> i32 {
        self.state.lock().unwrap().most_active()
    }
}

impl EngineState {
    fn latest_event(&self) -> Result<&Event, EngineError> {
        self.history.last().ok_or(EngineError::NoHistoryAvailable)
    }

    fn most_active(&self) -> i32 {
        let mut best_id = -1;
        let mut best_count = 0usize;
        for (id, record) in &self.entities {
            let count = record.events.len();
            if count > best_count || (count == best_count && *id > best_id) {
                best_count = count;
                best_id = *id;
            }
        }
        best_id
    }

    fn set_actuator_state_if(
        &mut self,
        client_id: i32,
        filter: Filter,
        actuator_id: i32,
    ) -> Result<bool, EngineError> {
        let satisfied = filter.satisfies(self.latest_event()?);

        let record = self
            .entities
            .get_mut(&actuator_id)
            .ok_or(EngineError::UnknownActuator(actuator_id))?;
        let actuator = match &mut record.entity {
            Entity::Actuator(a) => a,
            Entity::Sensor(_) => return Err(EngineError::UnknownActuator(actuator_id)),
        };
        if actuator.client_id != client_id {
            return Ok(actuator.state);
        }

        actuator.state = satisfied;
        self.push_command(actuator_id, satisfied);
        Ok(satisfied)
    }

    fn toggle_actuator_state_if(
        &mut self,
        client_id: i32,
        filter: Filter,
        actuator_id: i32,
    ) -> Result<Option<bool>, EngineError> {
        let satisfied = filter.satisfies(self.latest_event()?);

        let record = self
            .entities
            .get_mut(&actuator_id)
            .ok_or(EngineError::UnknownActuator(actuator_id))?;
        let actuator = match &mut record.entity {
            Entity::Actuator(a) => a,
            Entity::Sensor(_) => return Err(EngineError::UnknownActuator(actuator_id)),
        };
        if actuator.client_id != client_id || record.events.is_empty() || !satisfied {
            return Ok(None);
        }

        actuator.state = !actuator.state;
        let new_state = actuator.state;
        self.push_command(actuator_id, new_state);
        Ok(Some(new_state))
    }

    /// Send a set-state command line downstream if a command channel is
    /// registered for the actuator. Delivery failures are logged and do not
    /// propagate.
    fn push_command(&self, actuator_id: i32, state: bool) {
        if let Some(channel) = self.command_channels.get(&actuator_id) {
            let command = Request::new(
                RequestType::Control,
                RequestCommand::ControlSetActuatorState,
                state.to_string(),
            );
            if channel.send(command.to_string()).is_err() {
                warn!(actuator_id, "Actuator command channel closed");
            }
        }
    }

    fn log_if(&mut self, filter: Filter) {
        self.last_filter_change = Utc::now().timestamp_millis() as f64;
        self.logs.clear();
        for event in &self.history {
            if event.timestamp() >= self.last_filter_change && filter.satisfies(event) {
                self.logs.push(event.entity_id());
            }
        }
        self.log_filter = filter;
    }

    fn handle_request(&mut self, client_id: i32, request: &Request) -> String {
        match request.command {
            RequestCommand::ConfigUpdateMaxWaitTime => match request.data.parse::<f64>() {
                Ok(seconds) => {
                    self.max_wait_seconds = seconds;
                    format!("max wait time updated to {}s", seconds)
                }
                Err(_) => {
                    warn!(client_id, data = %request.data, "Invalid max wait time");
                    format!("invalid max wait time '{}'", request.data)
                }
            },

            RequestCommand::ControlSetActuatorState => match parse_control_data(&request.data) {
                Some((actuator_id, filter)) => {
                    match self.set_actuator_state_if(client_id, filter, actuator_id) {
                        Ok(state) => format!("actuator {} state set to {}", actuator_id, state),
                        Err(e) => {
                            warn!(client_id, actuator_id, error = %e, "Set-state request dropped");
                            e.to_string()
                        }
                    }
                }
                None => format!("malformed control data '{}'", request.data),
            },

            RequestCommand::ControlToggleActuatorState => match parse_control_data(&request.data) {
                Some((actuator_id, filter)) => {
                    match self.toggle_actuator_state_if(client_id, filter, actuator_id) {
                        Ok(Some(state)) => format!("actuator {} toggled to {}", actuator_id, state),
                        Ok(None) => format!("actuator {} unchanged", actuator_id),
                        Err(e) => {
                            warn!(client_id, actuator_id, error = %e, "Toggle request dropped");
                            e.to_string()
                        }
                    }
                }
                None => format!("malformed control data '{}'", request.data),
            },

            RequestCommand::ControlNotifyIf => match request.data.parse::<Filter>() {
                Ok(filter) => {
                    self.log_if(filter);
                    "log trigger installed".to_string()
                }
                Err(e) => {
                    warn!(client_id, error = %e, "Invalid notify filter");
                    format!("malformed filter '{}'", request.data)
                }
            },

            RequestCommand::AnalysisGetEventsInWindow => {
                match request.data.parse::<TimeWindow>() {
                    Ok(window) => {
                        let mut response =
                            "These entities sent events within the time window".to_string();
                        for event in self.history.iter().filter(|e| window.contains(e.timestamp()))
                        {
                            response.push_str(&format!(", {}", event.entity_id()));
                        }
                        response
                    }
                    Err(e) => {
                        warn!(client_id, error = %e, "Invalid time window");
                        format!("malformed time window '{}'", request.data)
                    }
                }
            }

            RequestCommand::AnalysisGetAllEntities => {
                let mut response = "These are all the entities".to_string();
                for id in self.entities.keys() {
                    response.push_str(&format!(", {}", id));
                }
                response
            }

            RequestCommand::AnalysisGetLatestEvents => match request.data.parse::<usize>() {
                Ok(n) => {
                    let start = self.history.len().saturating_sub(n);
                    let mut response = format!("These are the latest {} events", n);
                    for event in &self.history[start..] {
                        response.push_str(&format!(", {}", event));
                    }
                    response
                }
                Err(_) => format!("invalid event count '{}'", request.data),
            },

            RequestCommand::AnalysisGetMostActiveEntity => {
                format!("The most active entity was: {}", self.most_active())
            }

            RequestCommand::PredictNextNTimestamps | RequestCommand::PredictNextNValues => {
                "prediction is not yet supported".to_string()
            }
        }
    }
}

/// Control request data has the form `<actuatorId>#<Filter>`.
fn parse_control_data(data: &str) -> Option<(i32, Filter)> {
    let (id, filter) = data.split_once('#')?;
    Some((id.parse().ok()?, filter.parse().ok()?))
}
