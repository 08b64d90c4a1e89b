use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

const MASK: u32 = 0b1000_0000;

pub trait NumberReader: Read {
    fn read_u64_le(&mut self) -> Result<u64> {
        self.read_u64::<LittleEndian>().map_err(From::from)
    }
    fn read_u8_le(&mut self) -> Result<u8> {
        self.read_u8().map_err(From::from)
    }
}

impl NumberReader for &[u8] {}

pub trait VarIntReader: NumberReader {
    fn read_var_u32(&mut self) -> Result<(u32, usize)> {
        let mut shift = 0;
        let mut result = 0;
        let mut len = 0;
        while shift <= 28 {
            let byte = self.read_u8_le()?;
            len += 1;
            if u32::from(byte) & MASK == 0 {
                result |= (u32::from(byte)) << shift;
                return Ok((result, len));
            } else {
                result |= ((u32::from(byte)) & 127) << shift;
            }
            shift += 7;
        }

        Err(Error::Corruption(
            "Error when decoding varint32".to_string(),
        ))
    }
}

impl VarIntReader for &[u8] {}

pub fn read_length_prefixed_slice<'a>(data: &mut &'a [u8]) -> Result<&'a [u8]> {
    let (len, _) = data.read_var_u32()?;
    if data.len() < len as usize {
        return Err(Error::Corruption(
            "error slice length when decoding length prefixed slice".to_string(),
        ));
    }
    let (left, right) = data.split_at(len as usize);
    *data = right;
    Ok(left)
}
