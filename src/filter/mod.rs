use crate::event::Event;

#[cfg(test)]
mod tests;

/// Comparison applied by boolean filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperator {
    Equals,
    NotEquals,
}

/// Comparison applied by double filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleOperator {
    Equals,
    GreaterThan,
    LessThan,
    GreaterThanOrEquals,
    LessThanOrEquals,
}

/// Event field a double filter reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleField {
    Value,
    Timestamp,
}

/// Predicate tree over event fields.
///
/// `Composed` is a logical AND over its children; an empty child list is
/// vacuously true. Filters are immutable; equality treats composed filters
/// as the *set* of their leaf filters, so the same leaves in a different
/// order or nesting compare equal.
#[derive(Debug, Clone)]
pub enum Filter {
    Boolean {
        op: BooleanOperator,
        value: bool,
    },
    Double {
        field: DoubleField,
        op: DoubleOperator,
        value: f64,
    },
    Composed(Vec<Filter>),
}

impl Filter {
    /// A filter no event can satisfy. Engines install this as the initial
    /// trigger filter.
    pub fn unsatisfiable() -> Self {
        Filter::Double {
            field: DoubleField::Timestamp,
            op: DoubleOperator::Equals,
            value: -1.0,
        }
    }

    /// Returns true if the given event satisfies the filter criteria.
    ///
    /// A boolean filter evaluated against a sensor event is false, and a
    /// value-field double filter evaluated against an actuator event is
    /// false; neither is an error.
    pub fn satisfies(&self, event: &Event) -> bool {
        match self {
            Filter::Boolean { op, value } => match event.value_boolean() {
                Some(event_value) => match op {
                    BooleanOperator::Equals => event_value == *value,
                    BooleanOperator::NotEquals => event_value != *value,
                },
                None => false,
            },
            Filter::Double { field, op, value } => {
                let field_value = match field {
                    DoubleField::Value => match event.value_double() {
                        Some(v) => v,
                        None => return false,
                    },
                    DoubleField::Timestamp => event.timestamp(),
                };
                match op {
                    DoubleOperator::Equals => field_value == *value,
                    DoubleOperator::GreaterThan => field_value > *value,
                    DoubleOperator::LessThan => field_value < *value,
                    DoubleOperator::GreaterThanOrEquals => field_value >= *value,
                    DoubleOperator::LessThanOrEquals => field_value <= *value,
                }
            }
            Filter::Composed(children) => children.iter().all(|f| f.satisfies(event)),
        }
    }

    /// Returns true if every event in the list satisfies the filter.
    pub fn satisfies_all(&self, events: &[Event]) -> bool {
        events.iter().all(|e| self.satisfies(e))
    }

    /// Returns a copy of the event if it satisfies the filter.
    pub fn sift(&self, event: &Event) -> Option<Event> {
        if self.satisfies(event) {
            Some(event.clone())
        } else {
            None
        }
    }

    /// Returns copies of the satisfying events, preserving order.
    pub fn sift_all(&self, events: &[Event]) -> Vec<Event> {
        events.iter().filter_map(|e| self.sift(e)).collect()
    }

    /// Flattens the filter into its non-composed leaves.
    fn leaves(&self) -> Vec<&Filter> {
        match self {
            Filter::Composed(children) => children.iter().flat_map(|f| f.leaves()).collect(),
            leaf => vec![leaf],
        }
    }
}

fn leaf_eq(a: &Filter, b: &Filter) -> bool {
    match (a, b) {
        (
            Filter::Boolean { op: op_a, value: val_a },
            Filter::Boolean { op: op_b, value: val_b },
        ) => op_a == op_b && val_a == val_b,
        (
            Filter::Double { field: f_a, op: op_a, value: val_a },
            Filter::Double { field: f_b, op: op_b, value: val_b },
        ) => f_a == f_b && op_a == op_b && val_a == val_b,
        _ => false,
    }
}

// Set containment over leaves; duplicates collapse.
fn leaves_subset(a: &[&Filter], b: &[&Filter]) -> bool {
    a.iter().all(|x| b.iter().any(|y| leaf_eq(x, y)))
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Filter::Composed(_), Filter::Composed(_)) => {
                let a = self.leaves();
                let b = other.leaves();
                leaves_subset(&a, &b) && leaves_subset(&b, &a)
            }
            (Filter::Composed(_), _) | (_, Filter::Composed(_)) => false,
            (a, b) => leaf_eq(a, b),
        }
    }
}
