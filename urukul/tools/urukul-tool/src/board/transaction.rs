use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use urukul_pac::device::Word;
use urukul_pac::register::{ChipSelect, ProtoRev, IFC_MODE};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected cs:bits:data, got {0:?}")]
    Format(String),
    #[error("invalid number {0:?}")]
    Number(String),
    #[error("chip select {0} not in 0..=7")]
    ChipSelect(u64),
    #[error("transfer length {0} not in 1..=64")]
    Length(u64),
    #[error("data {data:#x} wider than {length} bits")]
    Data { data: u64, length: u32 },
    #[error("protocol revision {0} not supported")]
    Revision(u64),
    #[error("IFC_MODE {0:#x} wider than 4 bits")]
    IfcMode(u64),
}

/// Decimal, `0x` hexadecimal or `0b` binary, `_` separators allowed.
pub fn parse_u64(s: &str) -> Result<u64, ParseError> {
    let digits: String = s.chars().filter(|&c| c != '_').collect();
    let result = if let Some(hex) = digits.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        u64::from_str_radix(bin, 2)
    } else {
        digits.parse()
    };
    result.map_err(|_| ParseError::Number(s.to_string()))
}

pub fn parse_u32(s: &str) -> Result<u32, ParseError> {
    let value = parse_u64(s)?;
    u32::try_from(value).map_err(|_| ParseError::Number(s.to_string()))
}

pub fn parse_revision(s: &str) -> Result<ProtoRev, ParseError> {
    let number = parse_u64(s)?;
    u8::try_from(number).ok()
        .and_then(ProtoRev::from_number)
        .ok_or(ParseError::Revision(number))
}

pub fn parse_ifc_mode(s: &str) -> Result<IFC_MODE, ParseError> {
    let bits = parse_u64(s)?;
    if bits > 0xf {
        return Err(ParseError::IfcMode(bits));
    }
    Ok(IFC_MODE::from(bits as u8))
}

/// One SPI transaction on the shared bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub cs: ChipSelect,
    pub length: u32,
    pub data: Word,
}

impl FromStr for Transaction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(':').collect();
        let (cs, length, data) = match fields[..] {
            [cs, length, data] => (cs, length, data),
            _ => return Err(ParseError::Format(s.to_string())),
        };

        let cs = parse_u64(cs)?;
        if cs > 7 {
            return Err(ParseError::ChipSelect(cs));
        }
        let length = parse_u64(length)?;
        if !(1..=64).contains(&length) {
            return Err(ParseError::Length(length));
        }
        let length = length as u32;
        let data = parse_u64(data)?;
        if length < 64 && data >> length != 0 {
            return Err(ParseError::Data { data, length });
        }

        Ok(Self {
            cs: ChipSelect::from(cs as u8),
            length,
            data,
        })
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = ((self.length + 3) / 4) as usize;
        write!(f, "{}:{}:0x{:0digits$x}", u8::from(self.cs), self.length, self.data, digits = digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(parse_u64("42"), Ok(42));
        assert_eq!(parse_u64("0x12_3456"), Ok(0x123456));
        assert_eq!(parse_u64("0b0101"), Ok(5));
        assert_eq!(parse_u64("0xg"), Err(ParseError::Number("0xg".to_string())));
        assert_eq!(parse_u32("0x1_0000_0000"), Err(ParseError::Number("0x1_0000_0000".to_string())));
    }

    #[test]
    fn transaction() {
        let t: Transaction = "1:24:0x123456".parse().unwrap();
        assert_eq!(t, Transaction { cs: ChipSelect::Cfg, length: 24, data: 0x123456 });
        assert_eq!(t.to_string(), "1:24:0x123456");
        let t: Transaction = "6:16:0xbe".parse().unwrap();
        assert_eq!(t.to_string(), "6:16:0x00be");
    }

    #[test]
    fn transaction_errors() {
        assert_eq!("1:24".parse::<Transaction>(), Err(ParseError::Format("1:24".to_string())));
        assert_eq!("8:24:0".parse::<Transaction>(), Err(ParseError::ChipSelect(8)));
        assert_eq!("1:0:0".parse::<Transaction>(), Err(ParseError::Length(0)));
        assert_eq!("1:65:0".parse::<Transaction>(), Err(ParseError::Length(65)));
        assert_eq!("1:8:0x100".parse::<Transaction>(), Err(ParseError::Data { data: 0x100, length: 8 }));
        assert!("2:64:0xffff_ffff_ffff_ffff".parse::<Transaction>().is_ok());
    }

    #[test]
    fn straps_and_revision() {
        assert_eq!(parse_revision("9"), Ok(ProtoRev::V9));
        assert_eq!(parse_revision("7"), Err(ParseError::Revision(7)));
        assert_eq!(parse_ifc_mode("0b0011").unwrap().EN_NU(), 1);
        assert_eq!(parse_ifc_mode("0x10"), Err(ParseError::IfcMode(0x10)));
    }
}
