use anyhow::{anyhow, Result};
use enigo::{Axis, Enigo, Mouse, Settings};
use log::{info, trace};

/// Receives scroll requests. Positive units scroll up, negative scroll down.
pub trait ScrollSink {
    fn scroll(&mut self, units: i32) -> Result<()>;
}

impl<S: ScrollSink + ?Sized> ScrollSink for Box<S> {
    fn scroll(&mut self, units: i32) -> Result<()> {
        (**self).scroll(units)
    }
}

/// Turns scroll units into whole wheel notches.
///
/// Units that do not fill a notch are carried into the next call, so the
/// notch rate stays proportional to the units requested. The carry is dropped
/// when the direction changes.
#[derive(Debug, Clone)]
pub struct NotchAccumulator {
    units_per_notch: i64,
    remainder: i64,
}

impl NotchAccumulator {
    pub fn new(units_per_notch: u32) -> Self {
        Self {
            units_per_notch: units_per_notch.max(1) as i64,
            remainder: 0,
        }
    }

    pub fn remainder(&self) -> i64 {
        self.remainder
    }

    /// Adds `units` and returns the whole notches now due, with the sign of `units`.
    pub fn push(&mut self, units: i32) -> i32 {
        let units = units as i64;
        if units.signum() * self.remainder.signum() < 0 {
            self.remainder = 0;
        }

        let total = self.remainder + units;
        // truncating division keeps the remainder on the same side of zero as the total
        let notches = total / self.units_per_notch;
        self.remainder = total % self.units_per_notch;
        notches.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }
}

/// Sends scroll wheel events to the OS through enigo.
pub struct EnigoScroller {
    enigo: Enigo,
    notches: NotchAccumulator,
}

impl EnigoScroller {
    pub fn new(units_per_notch: u32) -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow!("Failed to set up input injection: {:?}", e))?;

        Ok(Self {
            enigo,
            notches: NotchAccumulator::new(units_per_notch),
        })
    }
}

impl ScrollSink for EnigoScroller {
    fn scroll(&mut self, units: i32) -> Result<()> {
        // enigo scrolls down for positive values
        let notches = -self.notches.push(units);
        if notches == 0 {
            return Ok(());
        }

        trace!("scrolling {} notches", notches);
        self.enigo
            .scroll(notches, Axis::Vertical)
            .map_err(|e| anyhow!("{:?}", e))
    }
}

/// Dry-run sink that only logs.
#[derive(Debug, Default)]
pub struct LogScroller;

impl ScrollSink for LogScroller {
    fn scroll(&mut self, units: i32) -> Result<()> {
        info!("scroll {:+}", units);
        Ok(())
    }
}
