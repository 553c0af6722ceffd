//! The FIT CRC-16 and a checksumming writer.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

static CRC_TABLE: &[u16] = &[
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800, 0xB401,
    0x5000, 0x9C01, 0x8801, 0x4400,
];

/// Implements the Garmin FIT CRC algorithm.
///
/// Follows Garmin's reference implementation at
/// <https://developer.garmin.com/fit/protocol/>, processing each byte as two
/// nibbles against a sixteen entry table.
#[derive(Clone, Copy, Debug, Default)]
pub struct Crc {
    sum: u16,
}

impl Crc {
    pub fn new() -> Self {
        Self { sum: 0 }
    }

    pub fn add_byte(&mut self, byte: u8) {
        let mut tmp = CRC_TABLE[(self.sum & 0x0F) as usize];
        self.sum = (self.sum >> 4) & 0x0FFF;
        self.sum = self.sum ^ tmp ^ CRC_TABLE[(byte & 0x0F) as usize];

        tmp = CRC_TABLE[(self.sum & 0x0F) as usize];
        self.sum = (self.sum >> 4) & 0x0FFF;
        self.sum = self.sum ^ tmp ^ CRC_TABLE[(byte >> 4) as usize];
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.add_byte(*byte);
        }
    }

    pub fn sum(&self) -> u16 {
        self.sum
    }
}

/// Computes the CRC of a complete byte slice.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut crc = Crc::new();
    crc.add_bytes(bytes);
    crc.sum()
}

/// A Write implementation that wraps another Write and computes a checksum over
/// data written.
///
/// Wrappers nest: a header written through an inner `CheckSummingWrite` that
/// itself wraps the file-level one contributes both its bytes and its CRC to
/// the file checksum.
pub struct CheckSummingWrite<'a, W: Write> {
    crc: Crc,
    base: &'a mut W,
    bytes_written: usize,
}

impl<'a, W: Write> CheckSummingWrite<'a, W> {
    pub fn new(base: &'a mut W) -> Self {
        Self {
            crc: Crc::new(),
            base,
            bytes_written: 0usize,
        }
    }

    /// Finish using the writer and append the little-endian CRC to the base
    /// stream, returning the number of checksummed bytes.
    pub fn finish(self) -> std::io::Result<usize> {
        self.base.write_u16::<LittleEndian>(self.crc.sum)?;
        Ok(self.bytes_written)
    }
}

impl<W: Write> Write for CheckSummingWrite<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.base.write(buf)?;
        self.bytes_written += n;
        self.crc.add_bytes(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.base.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use quickcheck_macros::quickcheck;

    use super::{CheckSummingWrite, Crc, checksum};

    const GARMIN_CONNECT_HEADER: &[u8] = &[
        0x0e, 0x10, 0xb2, 0x52, 0x88, 0x42, 0x00, 0x00, 0x2e, 0x46, 0x49, 0x54,
    ];

    #[test]
    fn test_header_crc() {
        let mut crc = Crc::new();
        crc.add_bytes(GARMIN_CONNECT_HEADER);
        assert_eq!(crc.sum(), 0xf94b);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_nested_writers() -> std::io::Result<()> {
        let mut buf: Vec<u8> = vec![];
        let mut outer = CheckSummingWrite::new(&mut buf);
        {
            let mut inner = CheckSummingWrite::new(&mut outer);
            inner.write_all(GARMIN_CONNECT_HEADER)?;
            assert_eq!(inner.finish()?, 12);
        }
        assert_eq!(outer.finish()?, 14);

        assert_eq!(&buf[12..14], &[0x4b, 0xf9]);
        assert_eq!(u16::from_le_bytes([buf[14], buf[15]]), checksum(&buf[..14]));
        Ok(())
    }

    /// Appending a message's little-endian CRC yields a zero residue.
    #[quickcheck]
    fn qc_crc_residue(bytes: Vec<u8>) -> bool {
        let mut with_crc = bytes.clone();
        with_crc.extend_from_slice(&checksum(&bytes).to_le_bytes());
        checksum(&with_crc) == 0
    }
}
