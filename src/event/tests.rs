use super::*;

fn sensor(timestamp: f64, entity_id: i32, value: f64) -> Event {
    Event::Sensor(SensorEvent {
        timestamp,
        client_id: 0,
        entity_id,
        entity_type: "TempSensor".to_string(),
        value,
    })
}

fn actuator(timestamp: f64, entity_id: i32, value: bool) -> Event {
    Event::Actuator(ActuatorEvent {
        timestamp,
        client_id: 0,
        entity_id,
        entity_type: "Switch".to_string(),
        value,
    })
}

#[test]
fn common_accessors() {
    let e = sensor(12.5, 3, 21.0);
    assert_eq!(e.timestamp(), 12.5);
    assert_eq!(e.client_id(), 0);
    assert_eq!(e.entity_id(), 3);
    assert_eq!(e.entity_type(), "TempSensor");

    let a = actuator(13.0, 7, true);
    assert_eq!(a.entity_id(), 7);
    assert_eq!(a.entity_type(), "Switch");
}

#[test]
fn variant_values() {
    let e = sensor(1.0, 1, 23.5);
    assert_eq!(e.value_double(), Some(23.5));
    assert_eq!(e.value_boolean(), None);

    let a = actuator(1.0, 2, true);
    assert_eq!(a.value_double(), None);
    assert_eq!(a.value_boolean(), Some(true));
}

#[test]
fn equality_is_structural() {
    assert_eq!(sensor(1.0, 1, 2.0), sensor(1.0, 1, 2.0));
    assert_ne!(sensor(1.0, 1, 2.0), sensor(1.0, 1, 3.0));
    assert_ne!(sensor(1.0, 1, 2.0), actuator(1.0, 1, true));
}
