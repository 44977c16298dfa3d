//! Line-oriented wire codec.
//!
//! One message per line. Fields are comma-delimited with a fixed tag prefix
//! (`Request{`, `SensorEvent{`, `ActuatorEvent{`, `Actuator{`) so the router
//! can dispatch on a cheap prefix check before full parsing. Composed
//! filters use `:` as an inner separator since their children contain
//! commas. Request data may itself contain commas; everything between the
//! command field and the trailing `}` is rejoined greedily.

use crate::entity::ActuatorRegistration;
use crate::event::{ActuatorEvent, Event, SensorEvent};
use crate::filter::{BooleanOperator, DoubleField, DoubleOperator, Filter};
use crate::request::{Request, RequestCommand, RequestType, TimeWindow};
use std::fmt;
use std::str::FromStr;


/// Decode failures. Contained to the offending line; the router logs and
/// drops the message rather than failing the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    UnknownPrefix(String),
    FieldCount { expected: usize, found: usize },
    InvalidNumber(String),
    UnknownToken(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnknownPrefix(line) => {
                write!(f, "unrecognized message prefix: '{}'", truncate(line))
            }
            CodecError::FieldCount { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            }
            CodecError::InvalidNumber(token) => write!(f, "invalid number '{}'", token),
            CodecError::UnknownToken(token) => write!(f, "unrecognized token '{}'", token),
        }
    }
}

impl std::error::Error for CodecError {}

fn truncate(line: &str) -> &str {
    let mut end = line.len().min(32);
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Event(Event),
    Registration(ActuatorRegistration),
}

impl Message {
    /// Classify one wire line by prefix and decode it.
    pub fn decode(line: &str) -> Result<Message, CodecError> {
        let line = line.trim_end();
        if line.starts_with("Request{") {
            Ok(Message::Request(line.parse()?))
        } else if line.starts_with("SensorEvent{") || line.starts_with("ActuatorEvent{") {
            Ok(Message::Event(line.parse()?))
        } else if line.starts_with("Actuator{") {
            Ok(Message::Registration(line.parse()?))
        } else {
            Err(CodecError::UnknownPrefix(line.to_string()))
        }
    }
}

fn parse_f64(token: &str) -> Result<f64, CodecError> {
    token
        .parse()
        .map_err(|_| CodecError::InvalidNumber(token.to_string()))
}

fn parse_i32(token: &str) -> Result<i32, CodecError> {
    token
        .parse()
        .map_err(|_| CodecError::InvalidNumber(token.to_string()))
}

fn parse_u16(token: &str) -> Result<u16, CodecError> {
    token
        .parse()
        .map_err(|_| CodecError::InvalidNumber(token.to_string()))
}

fn parse_bool(token: &str) -> Result<bool, CodecError> {
    token
        .parse()
        .map_err(|_| CodecError::UnknownToken(token.to_string()))
}

/// Split a comma-delimited line and check the exact field count, including
/// the tag prefix and the trailing `}`.
fn split_fields(line: &str, expected: usize) -> Result<Vec<&str>, CodecError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != expected || fields[fields.len() - 1] != "}" {
        return Err(CodecError::FieldCount {
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Sensor(e) => write!(
                f,
                "SensorEvent{{,{},{},{},{},{},}}",
                e.timestamp, e.client_id, e.entity_id, e.entity_type, e.value
            ),
            Event::Actuator(e) => write!(
                f,
                "ActuatorEvent{{,{},{},{},{},{},}}",
                e.timestamp, e.client_id, e.entity_id, e.entity_type, e.value
            ),
        }
    }
}

impl FromStr for Event {
    type Err = CodecError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields = split_fields(line, 7)?;
        let timestamp = parse_f64(fields[1])?;
        let client_id = parse_i32(fields[2])?;
        let entity_id = parse_i32(fields[3])?;
        let entity_type = fields[4].to_string();
        match fields[0] {
            "SensorEvent{" => Ok(Event::Sensor(SensorEvent {
                timestamp,
                client_id,
                entity_id,
                entity_type,
                value: parse_f64(fields[5])?,
            })),
            "ActuatorEvent{" => Ok(Event::Actuator(ActuatorEvent {
                timestamp,
                client_id,
                entity_id,
                entity_type,
                value: parse_bool(fields[5])?,
            })),
            other => Err(CodecError::UnknownPrefix(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

impl RequestType {
    fn wire_token(&self) -> &'static str {
        match self {
            RequestType::Config => "CONFIG",
            RequestType::Control => "CONTROL",
            RequestType::Analysis => "ANALYSIS",
            RequestType::Predict => "PREDICT",
        }
    }

    fn from_wire_token(token: &str) -> Result<Self, CodecError> {
        match token {
            "CONFIG" => Ok(RequestType::Config),
            "CONTROL" => Ok(RequestType::Control),
            "ANALYSIS" => Ok(RequestType::Analysis),
            "PREDICT" => Ok(RequestType::Predict),
            other => Err(CodecError::UnknownToken(other.to_string())),
        }
    }
}

impl RequestCommand {
    fn wire_token(&self) -> &'static str {
        match self {
            RequestCommand::ConfigUpdateMaxWaitTime => "CONFIG_UPDATE_MAX_WAIT_TIME",
            RequestCommand::ControlSetActuatorState => "CONTROL_SET_ACTUATOR_STATE",
            RequestCommand::ControlToggleActuatorState => "CONTROL_TOGGLE_ACTUATOR_STATE",
            RequestCommand::ControlNotifyIf => "CONTROL_NOTIFY_IF",
            RequestCommand::AnalysisGetEventsInWindow => "ANALYSIS_GET_EVENTS_IN_WINDOW",
            RequestCommand::AnalysisGetAllEntities => "ANALYSIS_GET_ALL_ENTITIES",
            RequestCommand::AnalysisGetLatestEvents => "ANALYSIS_GET_LATEST_EVENTS",
            RequestCommand::AnalysisGetMostActiveEntity => "ANALYSIS_GET_MOST_ACTIVE_ENTITY",
            RequestCommand::PredictNextNTimestamps => "PREDICT_NEXT_N_TIMESTAMPS",
            RequestCommand::PredictNextNValues => "PREDICT_NEXT_N_VALUES",
        }
    }

    fn from_wire_token(token: &str) -> Result<Self, CodecError> {
        match token {
            "CONFIG_UPDATE_MAX_WAIT_TIME" => Ok(RequestCommand::ConfigUpdateMaxWaitTime),
            "CONTROL_SET_ACTUATOR_STATE" => Ok(RequestCommand::ControlSetActuatorState),
            "CONTROL_TOGGLE_ACTUATOR_STATE" => Ok(RequestCommand::ControlToggleActuatorState),
            "CONTROL_NOTIFY_IF" => Ok(RequestCommand::ControlNotifyIf),
            "ANALYSIS_GET_EVENTS_IN_WINDOW" => Ok(RequestCommand::AnalysisGetEventsInWindow),
            "ANALYSIS_GET_ALL_ENTITIES" => Ok(RequestCommand::AnalysisGetAllEntities),
            "ANALYSIS_GET_LATEST_EVENTS" => Ok(RequestCommand::AnalysisGetLatestEvents),
            "ANALYSIS_GET_MOST_ACTIVE_ENTITY" => Ok(RequestCommand::AnalysisGetMostActiveEntity),
            "PREDICT_NEXT_N_TIMESTAMPS" => Ok(RequestCommand::PredictNextNTimestamps),
            "PREDICT_NEXT_N_VALUES" => Ok(RequestCommand::PredictNextNValues),
            other => Err(CodecError::UnknownToken(other.to_string())),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request{{,{},{},{},{},{},}}",
            self.client_id,
            self.timestamp,
            self.request_type.wire_token(),
            self.command.wire_token(),
            self.data
        )
    }
}

impl FromStr for Request {
    type Err = CodecError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split(',').collect();
        // tag, clientId, timestamp, type, command, data..., "}"
        if fields.len() < 7 || fields[fields.len() - 1] != "}" {
            return Err(CodecError::FieldCount {
                expected: 7,
                found: fields.len(),
            });
        }
        let client_id = parse_i32(fields[1])?;
        let timestamp = parse_f64(fields[2])?;
        let request_type = RequestType::from_wire_token(fields[3])?;
        let command = RequestCommand::from_wire_token(fields[4])?;
        // Greedy re-join: the data field may contain the outer delimiter.
        let data = fields[5..fields.len() - 1].join(",");
        Ok(Request {
            client_id,
            timestamp,
            request_type,
            command,
            data,
        })
    }
}

// ---------------------------------------------------------------------------
// Actuator registration
// ---------------------------------------------------------------------------

impl fmt::Display for ActuatorRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Actuator{{,{},{},{},{},{},}}",
            self.id, self.client_id, self.entity_type, self.host, self.port
        )
    }
}

impl FromStr for ActuatorRegistration {
    type Err = CodecError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields = split_fields(line, 7)?;
        Ok(ActuatorRegistration {
            id: parse_i32(fields[1])?,
            client_id: parse_i32(fields[2])?,
            entity_type: fields[3].to_string(),
            host: fields[4].to_string(),
            port: parse_u16(fields[5])?,
        })
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

impl BooleanOperator {
    fn wire_token(&self) -> &'static str {
        match self {
            BooleanOperator::Equals => "EQUALS",
            BooleanOperator::NotEquals => "NOT_EQUALS",
        }
    }

    fn from_wire_token(token: &str) -> Result<Self, CodecError> {
        match token {
            "EQUALS" => Ok(BooleanOperator::Equals),
            "NOT_EQUALS" => Ok(BooleanOperator::NotEquals),
            other => Err(CodecError::UnknownToken(other.to_string())),
        }
    }
}

impl DoubleOperator {
    fn wire_token(&self) -> &'static str {
        match self {
            DoubleOperator::Equals => "EQUALS",
            DoubleOperator::GreaterThan => "GREATER_THAN",
            DoubleOperator::LessThan => "LESS_THAN",
            DoubleOperator::GreaterThanOrEquals => "GREATER_THAN_OR_EQUALS",
            DoubleOperator::LessThanOrEquals => "LESS_THAN_OR_EQUALS",
        }
    }

    fn from_wire_token(token: &str) -> Result<Self, CodecError> {
        match token {
            "EQUALS" => Ok(DoubleOperator::Equals),
            "GREATER_THAN" => Ok(DoubleOperator::GreaterThan),
            "LESS_THAN" => Ok(DoubleOperator::LessThan),
            "GREATER_THAN_OR_EQUALS" => Ok(DoubleOperator::GreaterThanOrEquals),
            "LESS_THAN_OR_EQUALS" => Ok(DoubleOperator::LessThanOrEquals),
            other => Err(CodecError::UnknownToken(other.to_string())),
        }
    }
}

impl DoubleField {
    fn wire_token(&self) -> &'static str {
        match self {
            DoubleField::Value => "value",
            DoubleField::Timestamp => "timestamp",
        }
    }

    fn from_wire_token(token: &str) -> Result<Self, CodecError> {
        match token {
            "value" => Ok(DoubleField::Value),
            "timestamp" => Ok(DoubleField::Timestamp),
            other => Err(CodecError::UnknownToken(other.to_string())),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Boolean { op, value } => {
                write!(f, "BooleanFilter{{,{},{},}}", op.wire_token(), value)
            }
            Filter::Double { field, op, value } => write!(
                f,
                "DoubleFilter{{,{},{},{},}}",
                field.wire_token(),
                op.wire_token(),
                value
            ),
            Filter::Composed(children) => {
                write!(f, "ComposedFilter{{:")?;
                for child in children {
                    write!(f, "{}:", child)?;
                }
                write!(f, "}}")
            }
        }
    }
}

const COMPOSED_PREFIX: &str = "ComposedFilter{:";
const COMPOSED_SUFFIX: &str = "}";

/// Split the body of a composed filter at top-level `:` separators. Nested
/// composed children carry their own separators at deeper brace depth.
fn split_composed_children(body: &str) -> Vec<&str> {
    let mut children = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                children.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    children.push(&body[start..]);
    children.retain(|c| !c.is_empty());
    children
}

impl FromStr for Filter {
    type Err = CodecError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = line.strip_prefix(COMPOSED_PREFIX) {
            let body = rest
                .strip_suffix(COMPOSED_SUFFIX)
                .ok_or_else(|| CodecError::UnknownPrefix(line.to_string()))?;
            let children = split_composed_children(body)
                .into_iter()
                .map(Filter::from_str)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Filter::Composed(children));
        }
        if line.starts_with("BooleanFilter{") {
            let fields = split_fields(line, 4)?;
            return Ok(Filter::Boolean {
                op: BooleanOperator::from_wire_token(fields[1])?,
                value: parse_bool(fields[2])?,
            });
        }
        if line.starts_with("DoubleFilter{") {
            let fields = split_fields(line, 5)?;
            return Ok(Filter::Double {
                field: DoubleField::from_wire_token(fields[1])?,
                op: DoubleOperator::from_wire_token(fields[2])?,
                value: parse_f64(fields[3])?,
            });
        }
        Err(CodecError::UnknownPrefix(line.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Time windows
// ---------------------------------------------------------------------------

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeWindow{{,{},{},}}", self.start, self.end)
    }
}

impl FromStr for TimeWindow {
    type Err = CodecError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields = split_fields(line, 4)?;
        if fields[0] != "TimeWindow{" {
            return Err(CodecError::UnknownPrefix(line.to_string()));
        }
        Ok(TimeWindow {
            start: parse_f64(fields[1])?,
            end: parse_f64(fields[2])?,
        })
    }
}
