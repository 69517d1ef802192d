use std::fmt;

use crate::cfg::ConfigFields;
use crate::readback::ReadbackPhase;
use crate::router::Selection;

/// State changes published by the CPLD to an attached monitor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CpldEvent {
    Selected(Selection),
    Deselected(Selection),
    ConfigLatched { raw: u32, fields: ConfigFields },
    /// Rising attenuator LE.
    AttenuatorLatched,
    ReadbackPhase(ReadbackPhase),
}

impl fmt::Display for CpldEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpldEvent::Selected(selection) => write!(f, "select   cs={} {:?}", selection.code(), selection),
            CpldEvent::Deselected(selection) => write!(f, "deselect cs={} {:?}", selection.code(), selection),
            CpldEvent::ConfigLatched { raw, fields } => write!(f, "cfg      {:#08x} {:?}", raw, fields),
            CpldEvent::AttenuatorLatched => write!(f, "att      latched"),
            CpldEvent::ReadbackPhase(phase) => write!(f, "readback {:?}", phase),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(CpldEvent::Selected(Selection::Dds(1)).to_string(), "select   cs=5 Dds(1)");
        assert_eq!(CpldEvent::AttenuatorLatched.to_string(), "att      latched");
        let event = CpldEvent::ConfigLatched { raw: 0x123456, fields: ConfigFields::default() };
        assert!(event.to_string().starts_with("cfg      0x123456 "));
    }
}
