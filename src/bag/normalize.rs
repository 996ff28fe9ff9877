use super::{Bag, Value};

/// Normalizes a value for case-insensitive lookups.
///
/// Keys are lowercased recursively, floats without a fractional part become
/// [`Value::Int`], references are replaced by owned bags and lists are normalized
/// element-wise. Map-like inputs convert through [`Value::from`] first, so
/// `normalize(HashMap::from([(1, 2.0)]))` yields a bag `{"1": 2}`.
///
/// When two keys differ only by case, the one sorting last wins.
pub fn normalize(value: impl Into<Value>) -> Value {
    match value.into() {
        Value::Float(f) if is_integral(f) => Value::Int(f as i64),
        Value::List(items) => Value::List(items.into_iter().map(normalize).collect()),
        Value::Bag(bag) => Value::Bag(bag.normalized()),
        Value::Ref(shared) => Value::Bag(shared.to_bag().normalized()),
        other => other,
    }
}

fn is_integral(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

impl Bag {
    /// Returns the normalized form of this bag, see [`normalize`].
    pub fn normalized(self) -> Bag {
        self.into_iter()
            .map(|(key, value)| (key.to_lowercase(), normalize(value)))
            .collect()
    }
}
