use crate::sr::{width_mask, Phase};

/// Read only shift out register.
///
/// Loads a parallel value on the first sample edge after select assertion,
/// then shifts it out MSB first. Nothing is ever shifted in.
#[derive(Clone, Debug)]
pub struct SerialInSerialOut {
    width: u32,
    mask: u64,
    sr: u64,
    sdo: bool,
    sel: bool,
    load: bool,
}

impl SerialInSerialOut {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            mask: width_mask(width),
            sr: 0,
            sdo: false,
            sel: false,
            load: false,
        }
    }

    pub fn select(&mut self, sel: bool) {
        if sel && !self.sel {
            self.load = true;
        }
        self.sel = sel;
    }

    pub fn tick(&mut self, phase: Phase, parallel: u64) {
        if !self.sel {
            return;
        }
        match phase {
            Phase::Sample => {
                let next = if self.load { parallel } else { self.sr << 1 };
                self.sr = next & self.mask;
                self.load = false;
            },
            Phase::Shift => {
                self.sdo = (self.sr >> (self.width - 1)) & 1 != 0;
            },
        }
    }

    pub fn sdo(&self) -> bool {
        self.sdo
    }
}
