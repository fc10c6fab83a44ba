use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute of a sphere that is altered mid-trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Hue,
    Luminance,
    Size,
    Orientation,
}

impl ChangeType {
    pub const ALL: [ChangeType; 4] = [
        ChangeType::Hue,
        ChangeType::Luminance,
        ChangeType::Size,
        ChangeType::Orientation,
    ];
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeType::Hue => "hue",
            ChangeType::Luminance => "luminance",
            ChangeType::Size => "size",
            ChangeType::Orientation => "orientation",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionType {
    Static,
    ObjectMotion,
    ObserverMotion,
}

impl MotionType {
    /// Only object motion moves the ring; observer motion runs the static
    /// timeline and differs in its reporting label alone.
    pub fn moves_ring(&self) -> bool {
        matches!(self, MotionType::ObjectMotion)
    }

    pub fn trial_type_label(&self) -> &'static str {
        match self {
            MotionType::Static => "static",
            MotionType::ObjectMotion => "object_motion",
            MotionType::ObserverMotion => "observer_motion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeDirection {
    Increase,
    Decrease,
}

impl ChangeDirection {
    pub fn sign(&self) -> f64 {
        match self {
            ChangeDirection::Increase => 1.0,
            ChangeDirection::Decrease => -1.0,
        }
    }
}

/// Attendant ring configuration shown during a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RingLayout {
    Single,
    Dual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CueKind {
    Low,
    High,
}

/// A generated per-sphere value, typed by the attribute it drives.
///
/// Hue is normalized to [0, 1), luminance to [0, 1], size is in scene units
/// and orientation in degrees within [-180, 180).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Hue(f64),
    Luminance(f64),
    Size(f64),
    Orientation(f64),
}

impl AttributeValue {
    pub fn raw(&self) -> f64 {
        match *self {
            AttributeValue::Hue(v)
            | AttributeValue::Luminance(v)
            | AttributeValue::Size(v)
            | AttributeValue::Orientation(v) => v,
        }
    }

    /// Builds a value of the same kind, normalizing circular attributes.
    pub fn with_raw(&self, v: f64) -> AttributeValue {
        match self {
            AttributeValue::Hue(_) => AttributeValue::Hue(wrap_unit(v)),
            AttributeValue::Luminance(_) => AttributeValue::Luminance(v),
            AttributeValue::Size(_) => AttributeValue::Size(v),
            AttributeValue::Orientation(_) => AttributeValue::Orientation(wrap_degrees(v)),
        }
    }

    /// Interpolates towards `target` at `t` in [0, 1]. Hue and orientation
    /// travel the shortest arc.
    pub fn lerp(&self, target: &AttributeValue, t: f64) -> AttributeValue {
        if t >= 1.0 {
            return *target;
        }
        let t = t.max(0.0);
        let (a, b) = (self.raw(), target.raw());
        let v = match self {
            AttributeValue::Hue(_) => {
                let mut d = b - a;
                if d > 0.5 {
                    d -= 1.0;
                } else if d < -0.5 {
                    d += 1.0;
                }
                a + d * t
            }
            AttributeValue::Orientation(_) => {
                let mut d = b - a;
                if d > 180.0 {
                    d -= 360.0;
                } else if d < -180.0 {
                    d += 360.0;
                }
                a + d * t
            }
            _ => a + (b - a) * t,
        };
        self.with_raw(v)
    }
}

/// Wraps into [0, 1).
pub fn wrap_unit(v: f64) -> f64 {
    let w = v.rem_euclid(1.0);
    if w >= 1.0 { 0.0 } else { w }
}

/// Wraps into [-180, 180).
pub fn wrap_degrees(v: f64) -> f64 {
    let w = (v + 180.0).rem_euclid(360.0) - 180.0;
    if w >= 180.0 { -180.0 } else { w }
}

/// Applies stimulus directives; the rendering representation stays outside.
pub trait StimulusSink {
    /// False once the sphere's visual object has been torn down.
    fn has_stimulus(&self, sphere: usize) -> bool;
    fn render_stimulus(&mut self, sphere: usize, value: AttributeValue);
    fn set_stimulus_visible(&mut self, sphere: usize, visible: bool);
    fn place_ring(&mut self, position: [f32; 3]);

    fn has_ring(&self) -> bool {
        true
    }
}

/// Fire-and-forget audio cue output
pub trait CueSink {
    fn play_cue(&mut self, cue: CueKind);
}
