use super::*;
use crate::event::{ActuatorEvent, Event, SensorEvent};

fn sensor(timestamp: f64, value: f64) -> Event {
    Event::Sensor(SensorEvent {
        timestamp,
        client_id: 0,
        entity_id: 1,
        entity_type: "TempSensor".to_string(),
        value,
    })
}

fn actuator(timestamp: f64, value: bool) -> Event {
    Event::Actuator(ActuatorEvent {
        timestamp,
        client_id: 0,
        entity_id: 97,
        entity_type: "Switch".to_string(),
        value,
    })
}

fn value_filter(op: DoubleOperator, value: f64) -> Filter {
    Filter::Double {
        field: DoubleField::Value,
        op,
        value,
    }
}

fn timestamp_filter(op: DoubleOperator, value: f64) -> Filter {
    Filter::Double {
        field: DoubleField::Timestamp,
        op,
        value,
    }
}

#[test]
fn timestamp_filter_applies_to_both_variants() {
    let f = timestamp_filter(DoubleOperator::GreaterThan, 0.0);
    assert!(f.satisfies(&sensor(0.00011, 1.0)));
    assert!(f.satisfies(&actuator(0.33080, false)));
}

#[test]
fn value_filter_matches_numeric_value() {
    let f = value_filter(DoubleOperator::LessThan, 1.0);
    assert!(f.satisfies(&sensor(5.0, 0.5)));
    assert!(!f.satisfies(&sensor(5.0, 1.0)));
    assert!(!f.satisfies(&sensor(5.0, 2.0)));
}

#[test]
fn value_filter_is_false_for_actuator_events() {
    let f = value_filter(DoubleOperator::GreaterThanOrEquals, -5.0);
    assert!(!f.satisfies(&actuator(1.0, true)));
}

#[test]
fn boolean_filter_matches_actuator_state() {
    let eq_true = Filter::Boolean {
        op: BooleanOperator::Equals,
        value: true,
    };
    assert!(eq_true.satisfies(&actuator(1.0, true)));
    assert!(!eq_true.satisfies(&actuator(1.0, false)));

    let neq_true = Filter::Boolean {
        op: BooleanOperator::NotEquals,
        value: true,
    };
    assert!(neq_true.satisfies(&actuator(1.0, false)));
    assert!(!neq_true.satisfies(&actuator(1.0, true)));
}

#[test]
fn boolean_filter_is_false_for_sensor_events() {
    let f = Filter::Boolean {
        op: BooleanOperator::Equals,
        value: false,
    };
    assert!(!f.satisfies(&sensor(1.0, 23.5)));
}

#[test]
fn double_operator_boundaries() {
    let e = sensor(10.0, 5.0);
    assert!(value_filter(DoubleOperator::Equals, 5.0).satisfies(&e));
    assert!(value_filter(DoubleOperator::GreaterThanOrEquals, 5.0).satisfies(&e));
    assert!(value_filter(DoubleOperator::LessThanOrEquals, 5.0).satisfies(&e));
    assert!(!value_filter(DoubleOperator::GreaterThan, 5.0).satisfies(&e));
    assert!(!value_filter(DoubleOperator::LessThan, 5.0).satisfies(&e));
}

#[test]
fn composed_filter_requires_all_children() {
    let f = Filter::Composed(vec![
        value_filter(DoubleOperator::GreaterThanOrEquals, 23.0),
        timestamp_filter(DoubleOperator::LessThan, 1.0),
    ]);
    assert!(f.satisfies(&sensor(0.5, 24.0)));
    assert!(!f.satisfies(&sensor(0.5, 22.0)));
    assert!(!f.satisfies(&sensor(1.5, 24.0)));
}

#[test]
fn empty_composed_filter_is_vacuously_true() {
    let f = Filter::Composed(vec![]);
    assert!(f.satisfies(&sensor(1.0, 1.0)));
    assert!(f.satisfies(&actuator(1.0, false)));
}

#[test]
fn satisfies_all_requires_every_event() {
    let f = value_filter(DoubleOperator::GreaterThan, 0.0);
    assert!(f.satisfies_all(&[sensor(1.0, 1.0), sensor(2.0, 2.0)]));
    assert!(!f.satisfies_all(&[sensor(1.0, 1.0), sensor(2.0, -1.0)]));
    assert!(f.satisfies_all(&[]));
}

#[test]
fn sift_returns_copy_only_when_satisfied() {
    let f = value_filter(DoubleOperator::LessThan, 10.0);
    let hit = sensor(1.0, 5.0);
    assert_eq!(f.sift(&hit), Some(hit.clone()));
    assert_eq!(f.sift(&sensor(1.0, 15.0)), None);
}

#[test]
fn sift_all_preserves_order() {
    let f = value_filter(DoubleOperator::GreaterThan, 1.0);
    let events = vec![sensor(3.0, 2.0), sensor(1.0, 0.5), sensor(2.0, 4.0)];
    let sifted = f.sift_all(&events);
    assert_eq!(sifted, vec![sensor(3.0, 2.0), sensor(2.0, 4.0)]);

    let none = value_filter(DoubleOperator::GreaterThan, 100.0);
    assert!(none.sift_all(&events).is_empty());
}

#[test]
fn unsatisfiable_filter_rejects_everything() {
    let f = Filter::unsatisfiable();
    assert!(!f.satisfies(&sensor(1.0, -1.0)));
    assert!(!f.satisfies(&actuator(1.0, true)));
}

#[test]
fn leaf_equality() {
    let a = value_filter(DoubleOperator::LessThan, 1.0);
    assert_eq!(a, value_filter(DoubleOperator::LessThan, 1.0));
    assert_ne!(a, value_filter(DoubleOperator::LessThan, 2.0));
    assert_ne!(a, timestamp_filter(DoubleOperator::LessThan, 1.0));
    assert_ne!(
        a,
        Filter::Boolean {
            op: BooleanOperator::Equals,
            value: true
        }
    );
}

#[test]
fn composed_equality_is_order_independent() {
    let a = value_filter(DoubleOperator::GreaterThan, 1.0);
    let b = timestamp_filter(DoubleOperator::LessThan, 9.0);
    assert_eq!(
        Filter::Composed(vec![a.clone(), b.clone()]),
        Filter::Composed(vec![b.clone(), a.clone()])
    );
}

#[test]
fn composed_equality_is_nesting_independent() {
    let a = value_filter(DoubleOperator::GreaterThan, 1.0);
    let b = timestamp_filter(DoubleOperator::LessThan, 9.0);
    let flat = Filter::Composed(vec![a.clone(), b.clone()]);
    let nested = Filter::Composed(vec![Filter::Composed(vec![a.clone()]), b.clone()]);
    assert_eq!(flat, nested);
}

#[test]
fn composed_equality_collapses_duplicates() {
    let a = value_filter(DoubleOperator::GreaterThan, 1.0);
    assert_eq!(
        Filter::Composed(vec![a.clone(), a.clone()]),
        Filter::Composed(vec![a.clone()])
    );
}

#[test]
fn composed_never_equals_a_leaf() {
    let a = value_filter(DoubleOperator::GreaterThan, 1.0);
    assert_ne!(Filter::Composed(vec![a.clone()]), a);
}

#[test]
fn composed_inequality_on_different_leaves() {
    let a = value_filter(DoubleOperator::GreaterThan, 1.0);
    let b = timestamp_filter(DoubleOperator::LessThan, 9.0);
    let c = value_filter(DoubleOperator::LessThan, 0.0);
    assert_ne!(
        Filter::Composed(vec![a.clone(), b.clone()]),
        Filter::Composed(vec![a, c])
    );
}
