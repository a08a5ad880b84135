//! The physics parameter surface.
//!
//! Parameters can be set at any time; a new value is staged and only takes
//! effect when the integrator latches it at the start of its next iteration.

use serde::{Deserialize, Serialize};

/// Named scalar parameters of the integrator and its environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicsParam {
    AirGravity,
    AirDrag,
    LandGravity,
    LandDrag,
    ElasticFactor,
}

impl PhysicsParam {
    pub const ALL: [PhysicsParam; 5] = [
        PhysicsParam::AirGravity,
        PhysicsParam::AirDrag,
        PhysicsParam::LandGravity,
        PhysicsParam::LandDrag,
        PhysicsParam::ElasticFactor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PhysicsParam::AirGravity => "airGravity",
            PhysicsParam::AirDrag => "airDrag",
            PhysicsParam::LandGravity => "landGravity",
            PhysicsParam::LandDrag => "landDrag",
            PhysicsParam::ElasticFactor => "elasticFactor",
        }
    }
}

/// Starting values for the physics parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub air_gravity: f64,
    pub air_drag: f64,
    pub land_gravity: f64,
    pub land_drag: f64,
    pub elastic_factor: f64,
    /// Integrator passes per invocation.
    pub iterations: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            air_gravity: 0.000001,
            air_drag: 0.002,
            land_gravity: 60.0,
            land_drag: 20.0,
            elastic_factor: 0.4,
            iterations: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Value {
    current: f64,
    next: Option<f64>,
}

/// Current and staged values for every [`PhysicsParam`].
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsValues {
    values: [Value; 5],
}

impl Default for PhysicsValues {
    fn default() -> Self {
        Self::from_config(&PhysicsConfig::default())
    }
}

impl PhysicsValues {
    pub fn from_config(config: &PhysicsConfig) -> Self {
        let value = |current| Value {
            current,
            next: None,
        };
        Self {
            values: [
                value(config.air_gravity),
                value(config.air_drag),
                value(config.land_gravity),
                value(config.land_drag),
                value(config.elastic_factor),
            ],
        }
    }

    /// Stage a new value for the next iteration.
    pub fn set(&mut self, param: PhysicsParam, value: f64) {
        self.values[param as usize].next = Some(value);
    }

    /// The value in effect for the current iteration.
    pub fn get(&self, param: PhysicsParam) -> f64 {
        self.values[param as usize].current
    }

    /// The value that will be in effect next iteration.
    pub fn pending(&self, param: PhysicsParam) -> f64 {
        let value = self.values[param as usize];
        value.next.unwrap_or(value.current)
    }

    /// Promote staged values to current.
    pub(crate) fn latch(&mut self) {
        for param in PhysicsParam::ALL {
            let value = &mut self.values[param as usize];
            if let Some(next) = value.next.take() {
                tracing::info!(
                    param = param.name(),
                    from = value.current,
                    to = next,
                    "physics value changed"
                );
                value.current = next;
            }
        }
    }
}
