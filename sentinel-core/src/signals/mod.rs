//! Monitored input lines and the sampler that interprets them.

/// Raw logic level read from a GPIO line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub const fn from_high(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }

    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

/// Logic level that means "asserted" for a given line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActiveLevel {
    Low,
    High,
}

impl ActiveLevel {
    /// Returns `true` when `level` is the active level.
    pub const fn is_active(self, level: Level) -> bool {
        matches!(
            (self, level),
            (ActiveLevel::Low, Level::Low) | (ActiveLevel::High, Level::High)
        )
    }

    /// Level that asserts the line.
    pub const fn active(self) -> Level {
        match self {
            ActiveLevel::Low => Level::Low,
            ActiveLevel::High => Level::High,
        }
    }

    /// Level that leaves the line idle.
    pub const fn inactive(self) -> Level {
        match self {
            ActiveLevel::Low => Level::High,
            ActiveLevel::High => Level::Low,
        }
    }
}

/// Identifier for the monitored input lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InputLine {
    /// SATA power tap; a proxy for "PC is on".
    PowerSense,
    /// Chassis intrusion switch.
    ChassisSense,
}

/// Abstraction over the physical input pins.
pub trait SignalInputs {
    /// Reads the current level of `line`.
    fn read(&mut self, line: InputLine) -> Level;
}

/// Semantic view of one tick's inputs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Sample {
    pub power_on: bool,
    pub chassis_open: bool,
}

impl Sample {
    pub const fn new(power_on: bool, chassis_open: bool) -> Self {
        Self {
            power_on,
            chassis_open,
        }
    }
}

/// Maps raw levels to [`Sample`]s using fixed polarity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SignalSampler {
    power_on: ActiveLevel,
    chassis_open: ActiveLevel,
}

impl SignalSampler {
    pub const fn new(power_on: ActiveLevel, chassis_open: ActiveLevel) -> Self {
        Self {
            power_on,
            chassis_open,
        }
    }

    pub fn sample<S: SignalInputs + ?Sized>(&self, inputs: &mut S) -> Sample {
        let power = inputs.read(InputLine::PowerSense);
        let chassis = inputs.read(InputLine::ChassisSense);
        Sample::new(
            self.power_on.is_active(power),
            self.chassis_open.is_active(chassis),
        )
    }
}
