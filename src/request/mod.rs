use chrono::Utc;

/// Broad category of a client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Config,
    Control,
    Analysis,
    Predict,
}

/// Concrete operation a client request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCommand {
    ConfigUpdateMaxWaitTime,
    ControlSetActuatorState,
    ControlToggleActuatorState,
    ControlNotifyIf,
    AnalysisGetEventsInWindow,
    AnalysisGetAllEntities,
    AnalysisGetLatestEvents,
    AnalysisGetMostActiveEntity,
    PredictNextNTimestamps,
    PredictNextNValues,
}

/// A client request. Immutable once constructed.
///
/// `client_id` of [`Request::UNATTRIBUTED`] marks a request not yet bound
/// to a connection; it must be resolved before the request reaches the
/// dispatch loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub client_id: i32,
    /// Milliseconds since the Unix epoch, fractional allowed.
    pub timestamp: f64,
    pub request_type: RequestType,
    pub command: RequestCommand,
    /// Free-form payload; grammar depends on `command`.
    pub data: String,
}

impl Request {
    pub const UNATTRIBUTED: i32 = -1;

    /// New unattributed request stamped with the current time.
    pub fn new(request_type: RequestType, command: RequestCommand, data: impl Into<String>) -> Self {
        Self {
            client_id: Self::UNATTRIBUTED,
            timestamp: Utc::now().timestamp_millis() as f64,
            request_type,
            command,
            data: data.into(),
        }
    }

    /// Copy of the request attributed to the given client.
    pub fn with_client_id(mut self, client_id: i32) -> Self {
        self.client_id = client_id;
        self
    }
}

/// Inclusive time window over event timestamps, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}
