//! Handler for TIFF LZW compressed data
//!
//! TIFF LZW packs codes MSB-first, starts at 9 bits, grows to at most 12
//! bits and switches width one code early relative to GIF. Code 256 clears
//! the table, 257 ends the stream.

use std::collections::HashMap;
use log::debug;
use crate::tiff::constants::compression;
use crate::tiff::errors::{TiffError, TiffResult};
use super::handler::CompressionHandler;

const CLEAR_CODE: u16 = 256;
const EOI_CODE: u16 = 257;
const FIRST_CODE: u16 = 258;
const MIN_BITS: u32 = 9;
const MAX_BITS: u32 = 12;
const TABLE_SIZE: usize = 1 << MAX_BITS;

/// LZW compression handler (compression code 5)
pub struct LzwHandler;

/// MSB-first bit reader over a byte slice
struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BitReader { data, bit_pos: 0 }
    }

    fn read(&mut self, bits: u32) -> Option<u16> {
        if self.bit_pos + bits as usize > self.data.len() * 8 {
            return None;
        }

        let mut value: u32 = 0;
        for _ in 0..bits {
            let byte = self.data[self.bit_pos / 8];
            let bit = (byte >> (7 - (self.bit_pos % 8))) & 1;
            value = (value << 1) | bit as u32;
            self.bit_pos += 1;
        }
        Some(value as u16)
    }
}

/// MSB-first bit writer
struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    acc_bits: u32,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter { out: Vec::new(), acc: 0, acc_bits: 0 }
    }

    fn write(&mut self, code: u16, bits: u32) {
        self.acc = (self.acc << bits) | code as u32;
        self.acc_bits += bits;
        while self.acc_bits >= 8 {
            self.acc_bits -= 8;
            self.out.push((self.acc >> self.acc_bits) as u8);
        }
        self.acc &= (1 << self.acc_bits) - 1;
    }

    fn finish(mut self) -> Vec<u8> {
        if self.acc_bits > 0 {
            self.out.push((self.acc << (8 - self.acc_bits)) as u8);
        }
        self.out
    }
}

/// Decoder string table stored as prefix links
struct DecodeTable {
    prefix: Vec<u16>,
    suffix: Vec<u8>,
    first: Vec<u8>,
    len: Vec<u16>,
}

impl DecodeTable {
    fn new() -> Self {
        let mut table = DecodeTable {
            prefix: vec![0; TABLE_SIZE],
            suffix: vec![0; TABLE_SIZE],
            first: vec![0; TABLE_SIZE],
            len: vec![0; TABLE_SIZE],
        };
        for code in 0..256usize {
            table.suffix[code] = code as u8;
            table.first[code] = code as u8;
            table.len[code] = 1;
        }
        table
    }

    fn emit(&self, code: u16, out: &mut Vec<u8>) {
        let start = out.len();
        let len = self.len[code as usize] as usize;
        out.resize(start + len, 0);

        let mut current = code;
        for i in (0..len).rev() {
            out[start + i] = self.suffix[current as usize];
            current = self.prefix[current as usize];
        }
    }

    fn add(&mut self, slot: u16, prefix: u16, byte: u8) {
        let slot = slot as usize;
        self.prefix[slot] = prefix;
        self.suffix[slot] = byte;
        self.first[slot] = self.first[prefix as usize];
        self.len[slot] = self.len[prefix as usize].saturating_add(1);
    }
}

impl LzwHandler {
    fn decode(data: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
        let mut reader = BitReader::new(data);
        let mut table = DecodeTable::new();
        let mut out = Vec::with_capacity(expected_len);

        let mut code_len = MIN_BITS;
        let mut next_code = FIRST_CODE;
        let mut previous: Option<u16> = None;

        while let Some(code) = reader.read(code_len) {
            if code == CLEAR_CODE {
                code_len = MIN_BITS;
                next_code = FIRST_CODE;
                previous = None;
                continue;
            }
            if code == EOI_CODE {
                break;
            }

            match previous {
                None => {
                    if code > 255 {
                        return Err(TiffError::GenericError(format!(
                            "LZW stream starts with non-literal code {}", code)));
                    }
                    out.push(code as u8);
                }
                Some(prev) => {
                    let first_byte = if code < next_code {
                        table.emit(code, &mut out);
                        table.first[code as usize]
                    } else if code == next_code {
                        let first_byte = table.first[prev as usize];
                        table.emit(prev, &mut out);
                        out.push(first_byte);
                        first_byte
                    } else {
                        return Err(TiffError::GenericError(format!(
                            "LZW code {} beyond table size {}", code, next_code)));
                    };

                    if (next_code as usize) < TABLE_SIZE {
                        table.add(next_code, prev, first_byte);
                        next_code += 1;
                    }
                }
            }
            previous = Some(code);

            if next_code as u32 + 1 >= (1 << code_len) && code_len < MAX_BITS {
                code_len += 1;
            }
            if expected_len > 0 && out.len() >= expected_len {
                break;
            }
        }

        if expected_len > 0 {
            out.truncate(expected_len);
        }
        Ok(out)
    }

    fn encode(data: &[u8]) -> Vec<u8> {
        let mut writer = BitWriter::new();
        let mut dictionary: HashMap<(u16, u8), u16> = HashMap::new();
        let mut code_len = MIN_BITS;
        let mut next_code = FIRST_CODE;

        writer.write(CLEAR_CODE, code_len);

        let mut current: Option<u16> = None;
        for &byte in data {
            let prefix = match current {
                None => {
                    current = Some(byte as u16);
                    continue;
                }
                Some(prefix) => prefix,
            };

            if let Some(&code) = dictionary.get(&(prefix, byte)) {
                current = Some(code);
                continue;
            }

            writer.write(prefix, code_len);
            dictionary.insert((prefix, byte), next_code);
            next_code += 1;

            if next_code as usize == TABLE_SIZE - 2 {
                writer.write(CLEAR_CODE, code_len);
                dictionary.clear();
                code_len = MIN_BITS;
                next_code = FIRST_CODE;
            } else if next_code as u32 >= (1 << code_len) {
                code_len += 1;
            }
            current = Some(byte as u16);
        }

        if let Some(code) = current {
            writer.write(code, code_len);
            next_code += 1;
            if next_code as u32 >= (1 << code_len) && code_len < MAX_BITS {
                code_len += 1;
            }
        }
        writer.write(EOI_CODE, code_len);
        writer.finish()
    }
}

impl CompressionHandler for LzwHandler {
    fn decompress(&self, data: &[u8], expected_len: usize) -> TiffResult<Vec<u8>> {
        let out = Self::decode(data, expected_len)?;
        debug!("LZW: {} -> {} bytes", data.len(), out.len());
        Ok(out)
    }

    fn compress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        Ok(Self::encode(data))
    }

    fn name(&self) -> &'static str {
        "LZW"
    }

    fn code(&self) -> u16 {
        compression::LZW
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repetitive_data_survives_codec() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 7) as u8 * 30).collect();
        let packed = LzwHandler.compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(LzwHandler.decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_table_reset_on_noisy_data() {
        let mut state = 12345u32;
        let data: Vec<u8> = (0..20000).map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            (state >> 16) as u8
        }).collect();
        let packed = LzwHandler.compress(&data).unwrap();
        assert_eq!(LzwHandler.decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_known_stream() {
        // Clear, 'A', 'B', EOI at 9 bits
        let mut writer = BitWriter::new();
        for code in [CLEAR_CODE, 65, 66, EOI_CODE] {
            writer.write(code, 9);
        }
        let stream = writer.finish();
        assert_eq!(LzwHandler.decompress(&stream, 2).unwrap(), b"AB".to_vec());
    }
}
