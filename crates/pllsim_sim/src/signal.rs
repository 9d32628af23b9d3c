//! Typed two-phase signal cells, wakeup events, and trigger conditions.
//!
//! A [`Signal<T>`] is a copyable handle into the kernel's signal table. Units
//! stage writes through their context; the kernel commits all staged values
//! in the update phase that follows the evaluate phase, so a read in the same
//! delta as a write always observes the previous value.
//!
//! Storage is a raw `u64` masked to the value's bit width. The
//! [`SignalValue`] trait converts between the raw bits and the typed value.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::unit::InstanceId;

/// A value type that can live in a signal cell.
pub trait SignalValue: Copy + PartialEq + fmt::Debug + 'static {
    /// Bit width recorded in waveforms and used to mask raw storage.
    const WIDTH: u32;

    /// Packs the value into raw bits.
    fn to_bits(self) -> u64;

    /// Unpacks raw bits (already masked to `WIDTH`).
    fn from_bits(bits: u64) -> Self;
}

impl SignalValue for bool {
    const WIDTH: u32 = 1;

    fn to_bits(self) -> u64 {
        u64::from(self)
    }

    fn from_bits(bits: u64) -> Self {
        bits & 1 == 1
    }
}

macro_rules! impl_unsigned_signal_value {
    ($($ty:ty),*) => {
        $(
            impl SignalValue for $ty {
                const WIDTH: u32 = <$ty>::BITS;

                fn to_bits(self) -> u64 {
                    u64::from(self)
                }

                fn from_bits(bits: u64) -> Self {
                    bits as $ty
                }
            }
        )*
    };
}

impl_unsigned_signal_value!(u8, u16, u32, u64);

/// Opaque index of a signal in the kernel's signal table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SignalId(u32);

impl SignalId {
    /// Creates a `SignalId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// Opaque index of a one-shot wakeup event.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct EventId(u32);

impl EventId {
    /// Creates an `EventId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Trigger satisfied when this event fires.
    pub fn fired(self) -> Trigger {
        Trigger::Event(self)
    }
}

/// A typed handle to a signal cell.
pub struct Signal<T> {
    id: SignalId,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Signal<T> {}

impl<T> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Signal<T> {}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signal({})", self.id.0)
    }
}

impl<T: SignalValue> Signal<T> {
    pub(crate) fn new(id: SignalId) -> Self {
        Self {
            id,
            _value: PhantomData,
        }
    }

    /// Returns the untyped ID.
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// Trigger satisfied when the committed value changes.
    pub fn changed(&self) -> Trigger {
        Trigger::Changed(self.id)
    }
}

impl Signal<bool> {
    /// Trigger satisfied on a `false -> true` commit.
    pub fn rose(&self) -> Trigger {
        Trigger::Rose(self.id)
    }

    /// Trigger satisfied on a `true -> false` commit.
    pub fn fell(&self) -> Trigger {
        Trigger::Fell(self.id)
    }
}

/// A condition a unit can be sensitive to.
///
/// Triggers are not readable values: they only exist for the delta in which
/// the commit or notification happened.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Trigger {
    /// Any change of the committed value.
    Changed(SignalId),
    /// Rising edge of a 1-bit signal.
    Rose(SignalId),
    /// Falling edge of a 1-bit signal.
    Fell(SignalId),
    /// A one-shot event was delivered.
    Event(EventId),
}

/// The writer role bound to a signal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Driver {
    /// Driven by a kernel clock.
    Clock,
    /// Driven by the units of one module instance.
    Instance(InstanceId),
}

/// Runtime state of one signal cell.
#[derive(Clone, Debug)]
pub struct SignalState {
    /// Hierarchical name for display and waveform output.
    pub name: String,
    /// Bit width of the stored value.
    pub width: u32,
    /// Committed value.
    pub value: u64,
    /// Value before the most recent change (edge detection).
    pub previous_value: u64,
    /// Writer role, bound during elaboration.
    pub driver: Option<Driver>,
    pending: Option<u64>,
}

impl SignalState {
    /// Creates an undriven signal holding `init`.
    pub fn new(name: String, width: u32, init: u64) -> Self {
        let value = init & mask(width);
        Self {
            name,
            width,
            value,
            previous_value: value,
            driver: None,
            pending: None,
        }
    }

    /// Stages a value for the next update phase. The last write in a delta wins.
    pub fn stage(&mut self, bits: u64) {
        self.pending = Some(bits & mask(self.width));
    }

    /// Returns `true` if a write is staged.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Commits the staged value, appending the triggers it produces.
    ///
    /// Returns `true` if the committed value changed.
    pub fn commit(&mut self, id: SignalId, fired: &mut Vec<Trigger>) -> bool {
        let Some(next) = self.pending.take() else {
            return false;
        };
        if next == self.value {
            return false;
        }
        self.previous_value = self.value;
        self.value = next;
        fired.push(Trigger::Changed(id));
        if self.width == 1 {
            fired.push(if next == 1 {
                Trigger::Rose(id)
            } else {
                Trigger::Fell(id)
            });
        }
        true
    }
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_bits() {
        assert_eq!(true.to_bits(), 1);
        assert!(!bool::from_bits(0));
        assert!(bool::from_bits(1));
    }

    #[test]
    fn unsigned_widths() {
        assert_eq!(<u8 as SignalValue>::WIDTH, 8);
        assert_eq!(<u32 as SignalValue>::WIDTH, 32);
        assert_eq!(u32::from_bits(0xDEAD_BEEF), 0xDEAD_BEEF);
    }

    #[test]
    fn stage_is_not_visible_until_commit() {
        let mut s = SignalState::new("bus_addr".into(), 32, 0);
        s.stage(0x0C);
        assert_eq!(s.value, 0);
        assert!(s.has_pending());

        let mut fired = Vec::new();
        assert!(s.commit(SignalId::from_raw(3), &mut fired));
        assert_eq!(s.value, 0x0C);
        assert_eq!(fired, vec![Trigger::Changed(SignalId::from_raw(3))]);
    }

    #[test]
    fn last_stage_wins() {
        let mut s = SignalState::new("bus_we".into(), 1, 0);
        s.stage(0);
        s.stage(1);
        let mut fired = Vec::new();
        s.commit(SignalId::from_raw(0), &mut fired);
        assert_eq!(s.value, 1);
    }

    #[test]
    fn commit_same_value_fires_nothing() {
        let mut s = SignalState::new("locked".into(), 1, 0);
        s.stage(0);
        let mut fired = Vec::new();
        assert!(!s.commit(SignalId::from_raw(0), &mut fired));
        assert!(fired.is_empty());
        assert!(!s.has_pending());
    }

    #[test]
    fn one_bit_edges() {
        let id = SignalId::from_raw(1);
        let mut s = SignalState::new("clk".into(), 1, 0);
        let mut fired = Vec::new();
        s.stage(1);
        s.commit(id, &mut fired);
        assert_eq!(fired, vec![Trigger::Changed(id), Trigger::Rose(id)]);
        assert_eq!(s.previous_value, 0);

        fired.clear();
        s.stage(0);
        s.commit(id, &mut fired);
        assert_eq!(fired, vec![Trigger::Changed(id), Trigger::Fell(id)]);
    }

    #[test]
    fn values_are_masked() {
        let mut s = SignalState::new("narrow".into(), 8, 0x1FF);
        assert_eq!(s.value, 0xFF);
        s.stage(0x1234);
        s.commit(SignalId::from_raw(0), &mut Vec::new());
        assert_eq!(s.value, 0x34);
    }

    #[test]
    fn handle_triggers() {
        let sig: Signal<bool> = Signal::new(SignalId::from_raw(4));
        assert_eq!(sig.rose(), Trigger::Rose(SignalId::from_raw(4)));
        assert_eq!(sig.fell(), Trigger::Fell(SignalId::from_raw(4)));
        assert_eq!(sig.changed(), Trigger::Changed(SignalId::from_raw(4)));
        assert_eq!(
            EventId::from_raw(2).fired(),
            Trigger::Event(EventId::from_raw(2))
        );
    }
}
