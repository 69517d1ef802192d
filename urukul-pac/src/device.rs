#![allow(non_snake_case)]

use core::{cell::Cell, marker::PhantomData};

use log::debug;
use thiserror::Error;

use crate::register::*;

pub type Word = u64;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("transfer length {0} not in 1..=64")]
    Length(u32),
    #[error("DDS channel {0} out of range")]
    Channel(usize),
    #[error("protocol revision mismatch: expected {expected}, found {found}")]
    ProtoRev { expected: u8, found: u8 },
}

pub type Result<T> = core::result::Result<T, Error>;

/// Full-duplex SPI transport to the CPLD.
///
/// One call is one transaction: CS is asserted with `cs`, `length` bits of
/// `data` are shifted out MSB first while the same number of bits is sampled
/// from MISO, then CS is deasserted.
pub trait Spi {
    fn transfer(&self, cs: ChipSelect, length: u32, data: Word) -> Result<Word>;
}

pub const CFG_LENGTH: u32 = 24;
pub const ATT_LENGTH: u32 = 32;

pub fn check_length(length: u32) -> Result<()> {
    if (1..=64).contains(&length) {
        Ok(())
    } else {
        Err(Error::Length(length))
    }
}

///////////////////////////////////////////////////////////////////////
// Access

/// Typed access to the configuration register.
///
/// CFG is write-only: every write is a full CS=1 transaction which returns
/// STA on MISO. Reads come from the shadow copy kept by [`Cpld`].
pub struct Access<'a, D, T>
where D: Spi,
{
    cpld: &'a Cpld<D>,
    t: PhantomData<T>,
}

impl<'a, D, T> Access<'a, D, T>
where D: Spi,
{
    fn new(cpld: &'a Cpld<D>) -> Self {
        Self {
            cpld,
            t: PhantomData::default(),
        }
    }
}

impl<D, T> Access<'_, D, T>
where D: Spi,
      T: From<u32> + Into<u32>,
{
    pub fn shadow(&self) -> T {
        T::from(self.cpld.cfg.get())
    }

    pub fn write<F>(&self, f: F) -> Result<STA>
    where
        F: FnOnce(T) -> T,
    {
        let value = T::from(0);
        let new_value = f(value);
        self.cpld.cfg_transfer(new_value.into())
    }

    pub fn modify<F>(&self, f: F) -> Result<STA>
    where
        F: FnOnce(T) -> T,
    {
        let value = self.shadow();
        let new_value = f(value);
        self.cpld.cfg_transfer(new_value.into())
    }
}

///////////////////////////////////////////////////////////////////////
// CPLD

pub struct Cpld<D>
where D: Spi,
{
    bus: D,
    revision: ProtoRev,
    cfg: Cell<u32>,
}

impl<D> Cpld<D>
where D: Spi,
{
    pub fn new(bus: D, revision: ProtoRev) -> Self {
        Self {
            bus,
            revision,
            cfg: Cell::new(0),
        }
    }

    pub fn bus(&self) -> &D {
        &self.bus
    }

    pub fn revision(&self) -> ProtoRev {
        self.revision
    }

    /// Raw value of the last configuration written.
    pub fn cfg_raw(&self) -> u32 {
        self.cfg.get()
    }

    pub fn cfg_rev8(&self) -> Access<'_, D, rev8::CFG> {
        assert!(self.revision == ProtoRev::V8);
        Access::new(self)
    }

    pub fn cfg_rev9(&self) -> Access<'_, D, rev9::CFG> {
        assert!(self.revision == ProtoRev::V9);
        Access::new(self)
    }

    fn cfg_transfer(&self, value: u32) -> Result<STA> {
        let sta = self.bus.transfer(ChipSelect::Cfg, CFG_LENGTH, value as Word)?;
        self.cfg.set(value);
        Ok(STA::from(sta as u32))
    }

    /// Reads the status register by rewriting the shadowed configuration.
    pub fn sta_read(&self) -> Result<STA> {
        self.cfg_transfer(self.cfg.get())
    }

    /// Resets the shadow and the CPLD configuration and checks the protocol
    /// revision reported in STA against the one this driver was built for.
    pub fn init(&self) -> Result<STA> {
        self.cfg_transfer(0)?;
        let sta = self.sta_read()?;
        let found = sta.PROTO_REV();
        let expected = self.revision.number();
        debug!("cpld: proto_rev={found} ifc_mode={:#06b}", sta.IFC_MODE());
        if found != expected {
            return Err(Error::ProtoRev { expected, found });
        }
        Ok(sta)
    }

    /// Shifts a new word into the attenuator chain and returns the word that
    /// was shifted out.
    pub fn att_write(&self, att: ATT) -> Result<ATT> {
        let previous = self.bus.transfer(ChipSelect::Att, ATT_LENGTH, u32::from(att) as Word)?;
        Ok(ATT::from(previous as u32))
    }

    pub fn dds_transfer(&self, channel: usize, length: u32, data: Word) -> Result<Word> {
        if channel >= ChipSelect::DDS_COUNT {
            return Err(Error::Channel(channel));
        }
        check_length(length)?;
        self.bus.transfer(ChipSelect::dds(channel), length, data)
    }

    /// Writes to every DDS whose CFG.MASK_NU bit is set. MISO carries the
    /// lowest-index one of them.
    pub fn dds_broadcast(&self, length: u32, data: Word) -> Result<Word> {
        check_length(length)?;
        self.bus.transfer(ChipSelect::DdsMulti, length, data)
    }

    /// Raw transaction on an arbitrary chip select.
    pub fn transfer(&self, cs: ChipSelect, length: u32, data: Word) -> Result<Word> {
        check_length(length)?;
        self.bus.transfer(cs, length, data)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Records transactions and answers with a canned MISO word.
    struct Recorder {
        log: RefCell<Vec<(ChipSelect, u32, Word)>>,
        miso: Word,
    }

    impl Recorder {
        fn new(miso: Word) -> Self {
            Self {
                log: RefCell::new(Vec::new()),
                miso,
            }
        }
    }

    impl Spi for Recorder {
        fn transfer(&self, cs: ChipSelect, length: u32, data: Word) -> Result<Word> {
            check_length(length)?;
            self.log.borrow_mut().push((cs, length, data));
            Ok(self.miso)
        }
    }

    #[test]
    fn cfg_write_and_modify_use_shadow() {
        let dut = Cpld::new(Recorder::new(0), ProtoRev::V8);
        dut.cfg_rev8().write(|m| m.with_RF_SW(0x3)).unwrap();
        dut.cfg_rev8().modify(|m| m.with_PROFILE(0x5)).unwrap();
        assert_eq!(dut.cfg_raw(), 0x503);
        assert_eq!(dut.cfg_rev8().shadow().RF_SW(), 0x3);

        let log = dut.bus().log.borrow();
        assert_eq!(log[0], (ChipSelect::Cfg, 24, 0x003));
        assert_eq!(log[1], (ChipSelect::Cfg, 24, 0x503));
    }

    #[test]
    fn sta_read_rewrites_shadow() {
        let dut = Cpld::new(Recorder::new(0x08_0001), ProtoRev::V8);
        dut.cfg_rev8().write(|m| m.with_MASK_NU(0xf)).unwrap();
        let sta = dut.sta_read().unwrap();
        assert_eq!(sta.RF_SW(), 0x1);
        assert_eq!(sta.PROTO_REV(), 8);
        assert_eq!(dut.bus().log.borrow()[1].2, 0xf << 13);
    }

    #[test]
    fn init_checks_proto_rev() {
        let dut = Cpld::new(Recorder::new(0x08_0000), ProtoRev::V9);
        assert_eq!(dut.init(), Err(Error::ProtoRev { expected: 9, found: 8 }));

        let dut = Cpld::new(Recorder::new(0x09_0000), ProtoRev::V9);
        assert!(dut.init().is_ok());
    }

    #[test]
    fn dds_transfer_checks_arguments() {
        let dut = Cpld::new(Recorder::new(0), ProtoRev::V8);
        assert_eq!(dut.dds_transfer(4, 16, 0), Err(Error::Channel(4)));
        assert_eq!(dut.dds_transfer(0, 0, 0), Err(Error::Length(0)));
        assert_eq!(dut.dds_transfer(0, 65, 0), Err(Error::Length(65)));
        dut.dds_transfer(2, 16, 0x1234).unwrap();
        assert_eq!(dut.bus().log.borrow()[0], (ChipSelect::Dds2, 16, 0x1234));
    }

    #[test]
    #[should_panic(expected="revision == ProtoRev::V9")]
    fn cfg_access_wrong_revision() {
        let dut = Cpld::new(Recorder::new(0), ProtoRev::V8);
        let _ = dut.cfg_rev9();
    }
}
