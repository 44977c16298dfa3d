#[cfg(test)]
mod tests;

/// A timestamped numeric reading emitted by a sensor.
///
/// Timestamps are milliseconds since the Unix epoch, fractional allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub timestamp: f64,
    pub client_id: i32,
    pub entity_id: i32,
    pub entity_type: String,
    pub value: f64,
}

/// A timestamped boolean state report emitted by an actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorEvent {
    pub timestamp: f64,
    pub client_id: i32,
    pub entity_id: i32,
    pub entity_type: String,
    pub value: bool,
}

/// An event received by the hub. Immutable value object; equality is
/// structural.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Sensor(SensorEvent),
    Actuator(ActuatorEvent),
}

impl Event {
    pub fn timestamp(&self) -> f64 {
        match self {
            Event::Sensor(e) => e.timestamp,
            Event::Actuator(e) => e.timestamp,
        }
    }

    pub fn client_id(&self) -> i32 {
        match self {
            Event::Sensor(e) => e.client_id,
            Event::Actuator(e) => e.client_id,
        }
    }

    pub fn entity_id(&self) -> i32 {
        match self {
            Event::Sensor(e) => e.entity_id,
            Event::Actuator(e) => e.entity_id,
        }
    }

    pub fn entity_type(&self) -> &str {
        match self {
            Event::Sensor(e) => &e.entity_type,
            Event::Actuator(e) => &e.entity_type,
        }
    }

    /// Numeric value for sensor events, `None` for actuator events.
    pub fn value_double(&self) -> Option<f64> {
        match self {
            Event::Sensor(e) => Some(e.value),
            Event::Actuator(_) => None,
        }
    }

    /// Boolean value for actuator events, `None` for sensor events.
    pub fn value_boolean(&self) -> Option<bool> {
        match self {
            Event::Sensor(_) => None,
            Event::Actuator(e) => Some(e.value),
        }
    }
}
