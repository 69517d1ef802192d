//! Digital step attenuators.

use urukul_pac::register::ATT;

use crate::signals::AttPins;
use crate::sr::LatchEnable;

/// CPLD side of the attenuator chain: the latch enable.
///
/// LE is held high while the chain is deselected, pulled low by the first
/// clock edge of a selection and released on deselection, which transfers
/// the shift register into the active attenuation registers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AttenuatorSelect {
    le: LatchEnable,
}

impl AttenuatorSelect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` on the rising LE edge.
    pub fn select(&mut self, sel: bool) -> bool {
        self.le.select(sel)
    }

    pub fn sample(&mut self) {
        self.le.sample();
    }

    pub fn le(&self) -> bool {
        self.le.q()
    }
}

///////////////////////////////////////////////////////////////////////

/// Four daisy-chained attenuators forming one 32 bit shift register.
#[derive(Clone, Debug)]
pub struct AttenuatorChain {
    shift: u32,
    active: ATT,
    pins: AttPins,
}

impl AttenuatorChain {
    pub fn new() -> Self {
        Self {
            shift: 0,
            active: ATT::new(),
            pins: AttPins::default(),
        }
    }

    /// S_OUT of the last attenuator.
    pub fn s_out(&self) -> bool {
        self.shift >> 31 != 0
    }

    pub fn shift_register(&self) -> u32 {
        self.shift
    }

    pub fn active(&self) -> ATT {
        self.active
    }

    pub fn apply(&mut self, pins: &AttPins) {
        let prev = self.pins;
        if !pins.rst_n {
            self.shift = 0;
            self.active = ATT::new();
        } else {
            if !prev.clk && pins.clk {
                self.shift = (self.shift << 1) | pins.s_in as u32;
            }
            if !prev.le && pins.le {
                self.active = ATT::from(self.shift);
            }
        }
        self.pins = *pins;
    }
}

impl Default for AttenuatorChain {
    fn default() -> Self {
        Self::new()
    }
}
