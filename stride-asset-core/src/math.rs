//! Vector-shaped values
//!
//! Positions, rotations and scales are written as flow maps
//! (`{X: 0.0, Y: 1.0, Z: 0.0}`); these types read and write that shape.

use crate::access::FromProperty;
use crate::property::PropertyValue;
use crate::value::Value;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);
    pub const ONE: Vector3 = Vector3::new(1.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn components(value: &PropertyValue, names: &[&str]) -> Option<Vec<f32>> {
    let map = match value {
        PropertyValue::Map(map) => map.clone(),
        // A flow map stored as a single token
        PropertyValue::Scalar(_) => match value.to_value() {
            Value::Object(obj) => obj
                .iter()
                .map(|(k, v)| (k.clone(), PropertyValue::from_value(v)))
                .collect(),
            _ => return None,
        },
        PropertyValue::List(_) => return None,
    };
    names
        .iter()
        .map(|name| map.get(name).and_then(f32::from_property))
        .collect()
}

fn object(pairs: &[(&str, f32)]) -> Value {
    let map: IndexMap<String, Value> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect();
    Value::Object(map)
}

impl FromProperty for Vector3 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        let c = components(value, &["X", "Y", "Z"])?;
        Some(Vector3::new(c[0], c[1], c[2]))
    }
}

impl From<Vector3> for Value {
    fn from(v: Vector3) -> Self {
        object(&[("X", v.x), ("Y", v.y), ("Z", v.z)])
    }
}

impl FromProperty for Quaternion {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        let c = components(value, &["X", "Y", "Z", "W"])?;
        Some(Quaternion::new(c[0], c[1], c[2], c[3]))
    }
}

impl From<Quaternion> for Value {
    fn from(q: Quaternion) -> Self {
        object(&[("X", q.x), ("Y", q.y), ("Z", q.z), ("W", q.w)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::format_value;

    #[test]
    fn test_vector_wire_form() {
        let text = format_value(&Value::from(Vector3::new(10.0, 5.0, 0.0)));
        assert_eq!(text, "{X: 10.0, Y: 5.0, Z: 0.0}");
    }

    #[test]
    fn test_vector_reads_map_and_token() {
        let wire = PropertyValue::from_value(&Value::from(Vector3::new(1.0, 2.0, 3.0)));
        assert_eq!(Vector3::from_property(&wire), Some(Vector3::new(1.0, 2.0, 3.0)));

        let token = PropertyValue::scalar("{X: 0.5, Y: 0.0, Z: -1.0}");
        assert_eq!(Vector3::from_property(&token), Some(Vector3::new(0.5, 0.0, -1.0)));

        let partial = PropertyValue::scalar("{X: 0.5}");
        assert_eq!(Vector3::from_property(&partial), None);
    }

    #[test]
    fn test_quaternion_identity() {
        let text = format_value(&Value::from(Quaternion::default()));
        assert_eq!(text, "{X: 0.0, Y: 0.0, Z: 0.0, W: 1.0}");
    }
}
