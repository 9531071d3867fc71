//! Grid configuration, validation, and error types.
//!
//! [`GridConfig`] is the input for [`Grid::start`](crate::grid::Grid::start).
//! [`validate()`](GridConfig::validate) checks every invariant up front so
//! that nothing is spawned for a configuration that cannot run.

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Smallest accepted grid side.
pub const MIN_SIDE: u32 = 1;
/// Largest accepted grid side. Two-digit ids must fit in a rendered cell.
pub const MAX_SIDE: u32 = 10;
/// Size of the wrapping feral id range.
pub const FERAL_ID_MODULUS: u16 = 100;

// ── BackoffConfig ──────────────────────────────────────────────────

/// Shape of the retry delay used when a cell answers "not yet".
///
/// Travelers retrying a Suspended reservation, and the camera retrying a
/// row, sleep `initial_delay_us` first and multiply by `backoff_factor`
/// on every further refusal, never exceeding `max_delay_us`.
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffConfig {
    /// First retry delay in microseconds. Default: 100.
    pub initial_delay_us: u64,
    /// Multiplicative growth per consecutive refusal. Default: 2.0.
    pub backoff_factor: f64,
    /// Upper bound on the delay in microseconds. Default: 20_000.
    pub max_delay_us: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_us: 100,
            backoff_factor: 2.0,
            max_delay_us: 20_000,
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`GridConfig::validate()`] or grid start-up.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Width outside `[MIN_SIDE, MAX_SIDE]`.
    WidthOutOfRange {
        /// The configured width.
        value: u32,
    },
    /// Height outside `[MIN_SIDE, MAX_SIDE]`.
    HeightOutOfRange {
        /// The configured height.
        value: u32,
    },
    /// Traveler capacity outside `[1, width * height]`.
    MaxTravelersOutOfRange {
        /// The configured capacity.
        value: u32,
        /// `width * height`.
        max: u32,
    },
    /// A probability is NaN or outside `[0, 1]`.
    InvalidProbability {
        /// Which probability.
        name: &'static str,
        /// The invalid value.
        value: f64,
    },
    /// An interval is zero.
    ZeroInterval {
        /// Which interval.
        name: &'static str,
    },
    /// Feral health must be at least one tick.
    ZeroFeralHealth,
    /// Hazard duration must be at least one tick.
    ZeroHazardDuration,
    /// BackoffConfig invariant violated.
    InvalidBackoff {
        /// Description of which invariant was violated.
        reason: String,
    },
    /// A background thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of which thread failed.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WidthOutOfRange { value } => {
                write!(f, "width {value} must be in range [{MIN_SIDE}, {MAX_SIDE}]")
            }
            Self::HeightOutOfRange { value } => {
                write!(f, "height {value} must be in range [{MIN_SIDE}, {MAX_SIDE}]")
            }
            Self::MaxTravelersOutOfRange { value, max } => {
                write!(f, "max_travelers {value} must be in range [1, {max}] (width * height)")
            }
            Self::InvalidProbability { name, value } => {
                write!(f, "{name} must be in [0.0, 1.0], got {value}")
            }
            Self::ZeroInterval { name } => write!(f, "{name} must be non-zero"),
            Self::ZeroFeralHealth => write!(f, "feral_health must be at least 1"),
            Self::ZeroHazardDuration => write!(f, "hazard_duration must be at least 1"),
            Self::InvalidBackoff { reason } => write!(f, "invalid backoff config: {reason}"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {}

// ── GridConfig ─────────────────────────────────────────────────────

/// Complete configuration for starting a grid.
///
/// All probabilities are independent per-tick Bernoulli trials.
#[derive(Clone, Debug)]
pub struct GridConfig {
    /// Number of columns. Default: 6.
    pub width: u32,
    /// Number of rows. Default: 4.
    pub height: u32,
    /// Ordinary traveler capacity; ids are never recycled. Default: 10.
    pub max_travelers: u32,
    /// Chance an idle empty cell spawns an ordinary traveler. Default: 0.1.
    pub spawn_probability: f64,
    /// Chance a traveler attempts a move on its tick. Default: 0.5.
    pub move_probability: f64,
    /// Chance an idle empty cell spawns a feral traveler. Default: 0.025.
    pub feral_probability: f64,
    /// Chance an idle empty cell turns into a hazard. Default: 0.025.
    pub hazard_probability: f64,
    /// Idle tick of cells and travelers. Default: 2 s.
    pub tick_interval: Duration,
    /// Camera period; `None` runs the grid without a camera. Default: 2 s.
    pub camera_interval: Option<Duration>,
    /// Starting health of a feral traveler, in idle ticks. Default: 5.
    pub feral_health: u32,
    /// Ticks a hazard stays active. Default: 3.
    pub hazard_duration: u32,
    /// Base seed for every task's RNG; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Retry delay shape.
    pub backoff: BackoffConfig,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 6,
            height: 4,
            max_travelers: 10,
            spawn_probability: 0.1,
            move_probability: 0.5,
            feral_probability: 0.025,
            hazard_probability: 0.025,
            tick_interval: Duration::from_secs(2),
            camera_interval: Some(Duration::from_secs(2)),
            feral_health: 5,
            hazard_duration: 3,
            seed: None,
            backoff: BackoffConfig::default(),
        }
    }
}

impl GridConfig {
    /// Validate all invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Dimensions.
        if !(MIN_SIDE..=MAX_SIDE).contains(&self.width) {
            return Err(ConfigError::WidthOutOfRange { value: self.width });
        }
        if !(MIN_SIDE..=MAX_SIDE).contains(&self.height) {
            return Err(ConfigError::HeightOutOfRange { value: self.height });
        }
        // 2. Capacity bounded by the number of cells.
        let max = self.width * self.height;
        if self.max_travelers < 1 || self.max_travelers > max {
            return Err(ConfigError::MaxTravelersOutOfRange {
                value: self.max_travelers,
                max,
            });
        }
        // 3. Probabilities.
        for (name, value) in [
            ("spawn_probability", self.spawn_probability),
            ("move_probability", self.move_probability),
            ("feral_probability", self.feral_probability),
            ("hazard_probability", self.hazard_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidProbability { name, value });
            }
        }
        // 4. Intervals.
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                name: "tick_interval",
            });
        }
        if self.camera_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::ZeroInterval {
                name: "camera_interval",
            });
        }
        // 5. Lifetimes.
        if self.feral_health == 0 {
            return Err(ConfigError::ZeroFeralHealth);
        }
        if self.hazard_duration == 0 {
            return Err(ConfigError::ZeroHazardDuration);
        }
        // 6. BackoffConfig invariants.
        let b = &self.backoff;
        if b.initial_delay_us == 0 {
            return Err(ConfigError::InvalidBackoff {
                reason: "initial_delay_us must be at least 1".to_string(),
            });
        }
        if b.initial_delay_us > b.max_delay_us {
            return Err(ConfigError::InvalidBackoff {
                reason: format!(
                    "initial_delay_us ({}) exceeds max_delay_us ({})",
                    b.initial_delay_us, b.max_delay_us,
                ),
            });
        }
        if !b.backoff_factor.is_finite() || b.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoff {
                reason: format!(
                    "backoff_factor must be finite and >= 1.0, got {}",
                    b.backoff_factor,
                ),
            });
        }
        Ok(())
    }

    /// Ordinary capacity as an id offset. Valid after `validate()`.
    pub(crate) fn capacity(&self) -> u16 {
        // max_travelers <= MAX_SIDE * MAX_SIDE, so this never truncates.
        self.max_travelers as u16
    }
}
