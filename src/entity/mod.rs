/// Registry record for a sensor known to an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub id: i32,
    pub client_id: i32,
    pub entity_type: String,
}

/// Registry record for an actuator known to an engine. Carries the last
/// known live state, synchronized from incoming actuator events and from
/// control operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Actuator {
    pub id: i32,
    pub client_id: i32,
    pub entity_type: String,
    pub state: bool,
}

/// A device tracked by an engine, created lazily on the first event that
/// references its id.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Sensor(Sensor),
    Actuator(Actuator),
}

impl Entity {
    pub fn id(&self) -> i32 {
        match self {
            Entity::Sensor(s) => s.id,
            Entity::Actuator(a) => a.id,
        }
    }

    pub fn client_id(&self) -> i32 {
        match self {
            Entity::Sensor(s) => s.client_id,
            Entity::Actuator(a) => a.client_id,
        }
    }

    pub fn entity_type(&self) -> &str {
        match self {
            Entity::Sensor(s) => &s.entity_type,
            Entity::Actuator(a) => &a.entity_type,
        }
    }

    pub fn is_actuator(&self) -> bool {
        matches!(self, Entity::Actuator(_))
    }
}

/// Registration record an actuator sends on connect, advertising the
/// endpoint the hub should push set/toggle commands to.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorRegistration {
    pub id: i32,
    pub client_id: i32,
    pub entity_type: String,
    pub host: String,
    pub port: u16,
}

impl ActuatorRegistration {
    /// Command endpoint as a `host:port` address string.
    pub fn command_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
