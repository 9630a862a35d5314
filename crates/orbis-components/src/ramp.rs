//! Linear parameter ramps counted in samples.

/// A value moving linearly to its target over a fixed number of samples.
///
/// Used for gain and delay interpolation: a new target is reached after
/// exactly `steps` calls to [`advance`](Self::advance), independent of the
/// block size.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRamp {
    current: f32,
    target: f32,
    increment: f32,
    remaining: usize,
    steps: usize,
}

impl LinearRamp {
    /// Creates a settled ramp. `steps == 0` applies targets immediately.
    pub fn new(initial: f32, steps: usize) -> Self {
        Self {
            current: initial,
            target: initial,
            increment: 0.0,
            remaining: 0,
            steps,
        }
    }

    /// Starts a transition from the current value to `target`.
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if self.steps == 0 {
            self.current = target;
            self.increment = 0.0;
            self.remaining = 0;
        } else {
            self.increment = (target - self.current) / self.steps as f32;
            self.remaining = self.steps;
        }
    }

    /// Jumps to `value` without a transition.
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.increment = 0.0;
        self.remaining = 0;
    }

    /// Next value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.increment
            };
        }
        self.current
    }

    /// Current value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Target value.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the target is reached.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }
}
