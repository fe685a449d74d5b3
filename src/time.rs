//! Time APIs for obtaining the current time and calculating with points in time and durations.
//!
//! These APIs are made for the DTN stack and are not meant to be general-purpose. Everything here
//! has microsecond resolution and uses 64-bit arithmetic: mesh simulations run for hours of
//! simulated time, so a 32-bit microsecond counter would wrap mid-run.

use core::fmt;
use core::ops::{Add, AddAssign, Sub, SubAssign};

/// A duration with microsecond resolution.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(u64);

impl Duration {
    /// Creates a [`Duration`] from a number of microseconds.
    pub const fn from_micros(micros: u64) -> Self {
        Duration(micros)
    }

    /// Creates a [`Duration`] representing the given number of milliseconds.
    pub const fn from_millis(millis: u32) -> Self {
        Duration(millis as u64 * 1_000)
    }

    /// Creates a [`Duration`] representing a number of seconds.
    pub const fn from_secs(secs: u32) -> Self {
        Duration(secs as u64 * 1_000_000)
    }

    /// Returns the number of whole seconds that fit in `self`.
    pub fn whole_secs(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Returns the number of microseconds represented by `self`.
    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Returns the fractional part of microseconds in `self`.
    pub fn subsec_micros(&self) -> u64 {
        self.0 % 1_000_000
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Duration(self.0.checked_add(rhs.0).expect("duration overflow"))
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Duration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Duration(self.0.checked_sub(rhs.0).expect("duration underflow"))
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000_000 {
            let (secs, subsec_micros) = (self.whole_secs(), self.subsec_micros());
            if subsec_micros == 0 {
                write!(f, "{}s", secs)
            } else {
                write!(f, "{}.{:06}s", secs, subsec_micros)
            }
        } else if self.0 >= 1000 {
            let (millis, submilli_micros) = (self.0 / 1000, self.0 % 1000);
            if submilli_micros == 0 {
                write!(f, "{}ms", millis)
            } else {
                write!(f, "{}.{:03}ms", millis, submilli_micros)
            }
        } else {
            write!(f, "{}µs", self.0)
        }
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

/// A point in time, relative to an unspecified epoch.
///
/// `Instant`s are obtained from an implementation of [`Clock`]. `Instant`s created from different
/// [`Clock`] instances (even when using the same implementation) are not compatible, and mixing
/// them in operations causes unspecified results. [`Duration`]s are independent of the [`Clock`]
/// implementation and thus can be mixed freely.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Instant(u64);

impl Instant {
    /// Creates an `Instant` from raw microseconds since an arbitrary implementation-defined
    /// reference point.
    ///
    /// This should only be called from a [`Clock`] implementation.
    pub fn from_raw_micros(micros: u64) -> Self {
        Instant(micros)
    }

    /// Returns the raw value from which this `Instant` was created.
    pub fn raw_micros(&self) -> u64 {
        self.0
    }

    /// Returns the number of whole seconds since the clock's reference point.
    pub fn whole_secs(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Calculates the duration of time that has passed between `earlier` and `self`.
    ///
    /// Both `self` and `earlier` must have been created by the same [`Clock`], and `earlier` must
    /// not lie in the future of `self`.
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        debug_assert!(
            earlier.0 <= self.0,
            "{} lies after {}",
            earlier,
            self
        );

        Duration(self.0.wrapping_sub(earlier.0))
    }
}

/// [`Instant`]s can be subtracted, which computes the [`Duration`] between the rhs and lhs using
/// [`Instant::duration_since`].
impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.duration_since(rhs)
    }
}

/// A [`Duration`] can be added to an [`Instant`], moving the [`Instant`] forwards in time.
impl Add<Duration> for Instant {
    type Output = Self;

    fn add(self, d: Duration) -> Self {
        Instant(self.0 + d.as_micros())
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, d: Duration) {
        *self = *self + d;
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (secs, subsec_micros) = (self.0 / 1_000_000, self.0 % 1_000_000);
        write!(f, "{}.{:06}s", secs, subsec_micros)
    }
}

impl fmt::Debug for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

/// Trait for time providers.
///
/// The host environment has to provide an implementation of `Clock` to the stack. The
/// implementation must have microsecond accuracy.
///
/// This trait can also be implemented by a mock clock for testing.
pub trait Clock {
    /// Obtain the current time as an [`Instant`].
    ///
    /// The [`Instant`]s returned by this function must never move backwards in time.
    fn now(&self) -> Instant;
}
