use std::io::Write;

use tracing::trace;

/// Maximum number of data bytes carried by one record.
pub const MAX_RECORD_BYTES: usize = 32;

/// Record offsets are 16 bits wide.
pub const MAX_PAYLOAD_BYTES: usize = 0x10000;

pub const END_OF_FILE_RECORD: &str = ":00000001FF";

const WORDS_PER_RECORD: usize = MAX_RECORD_BYTES / 2;

#[derive(Debug, thiserror::Error)]
pub enum HexRecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record too long: {length} bytes, at most {} allowed", MAX_RECORD_BYTES)]
    RecordTooLong { length: usize },

    #[error("Payload too large: {length} bytes, at most {} addressable", MAX_PAYLOAD_BYTES)]
    PayloadTooLarge { length: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Data = 0x00,
    EndOfFile = 0x01,
}

/// Two's complement of the byte sum, so that the whole record sums to zero.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |sum, &byte| sum.wrapping_add(byte))
        .wrapping_neg()
}

/// Encodes a single `:LLAAAATT[DD..]CC` line, without the line terminator.
pub fn encode_record(
    record_type: RecordType,
    offset: u16,
    data: &[u8],
) -> Result<String, HexRecordError> {
    if data.len() > MAX_RECORD_BYTES {
        return Err(HexRecordError::RecordTooLong { length: data.len() });
    }

    let length = data.len() as u8;
    let [offset_high, offset_low] = offset.to_be_bytes();

    let mut line = format!(":{:02X}{:04X}{:02X}", length, offset, record_type as u8);
    let mut sum = length
        .wrapping_add(offset_high)
        .wrapping_add(offset_low)
        .wrapping_add(record_type as u8);

    for &byte in data {
        line.push_str(&format!("{:02X}", byte));
        sum = sum.wrapping_add(byte);
    }

    line.push_str(&format!("{:02X}", sum.wrapping_neg()));
    Ok(line)
}

/// Writes `words` as data records of up to 32 bytes each, followed by the
/// end-of-file record. Words are laid out little-endian. Returns the number of
/// data records written.
pub fn write_hex_records<W: Write>(sink: &mut W, words: &[u16]) -> Result<usize, HexRecordError> {
    let length = words.len() * 2;
    if length > MAX_PAYLOAD_BYTES {
        return Err(HexRecordError::PayloadTooLarge { length });
    }

    let mut offset = 0usize;
    let mut records = 0usize;

    for chunk in words.chunks(WORDS_PER_RECORD) {
        let data: Vec<u8> = chunk.iter().flat_map(|word| word.to_le_bytes()).collect();
        let record_offset =
            u16::try_from(offset).map_err(|_| HexRecordError::PayloadTooLarge { length })?;

        let line = encode_record(RecordType::Data, record_offset, &data)?;
        trace!("Record {} at offset 0x{:04X}: {}", records, record_offset, line);
        writeln!(sink, "{}", line)?;

        offset += data.len();
        records += 1;
    }

    writeln!(sink, "{}", END_OF_FILE_RECORD)?;

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_line(line: &str) -> Vec<u8> {
        let hex = line.strip_prefix(':').expect("record must start with ':'");
        assert_eq!(hex.len() % 2, 0, "odd number of hex digits in {}", line);
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect()
    }

    fn encode(words: &[u16]) -> Vec<String> {
        let mut out = Vec::new();
        write_hex_records(&mut out, words).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[]), 0x00);
        assert_eq!(checksum(&[0x00, 0x00, 0x00, 0x01]), 0xFF);
        assert_eq!(checksum(&[0x02, 0x00, 0x00, 0x00, 0xAA, 0x55]), 0xFF);
        assert_eq!(checksum(&[0x80, 0x80]), 0x00);
    }

    #[test]
    fn test_end_of_file_record_matches_encoder() {
        let line = encode_record(RecordType::EndOfFile, 0, &[]).unwrap();
        assert_eq!(line, END_OF_FILE_RECORD);
    }

    #[test]
    fn test_single_word() {
        let lines = encode(&[0x55AA]);
        assert_eq!(lines, vec![":02000000AA55FF", END_OF_FILE_RECORD]);
    }

    #[test]
    fn test_pid_block_record() {
        let block: [u16; 8] = [2026, 667, 400, 2000, 0, 0, 1, 1];
        let lines = encode(&block);
        assert_eq!(
            lines,
            vec![
                ":10000000EA079B029001D0070000000001000100F8",
                END_OF_FILE_RECORD
            ]
        );
    }

    #[test]
    fn test_sentinel_and_block_record() {
        let words: [u16; 9] = [0x55AA, 2026, 667, 400, 2000, 0, 0, 1, 1];
        let lines = encode(&words);
        assert_eq!(lines[0], ":12000000AA55EA079B029001D0070000000001000100F7");
    }

    #[test]
    fn test_empty_payload_is_terminator_only() {
        let mut out = Vec::new();
        let records = write_hex_records(&mut out, &[]).unwrap();
        assert_eq!(records, 0);
        assert_eq!(String::from_utf8(out).unwrap(), ":00000001FF\n");
    }

    #[test]
    fn test_output_ends_with_newline_after_terminator() {
        let mut out = Vec::new();
        write_hex_records(&mut out, &[1, 2, 3]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with(":00000001FF\n"));
        assert_eq!(text.matches(END_OF_FILE_RECORD).count(), 1);
    }

    #[test]
    fn test_exact_multiple_of_record_size() {
        let words: Vec<u16> = (0..32).collect();
        let lines = encode(&words);
        assert_eq!(
            lines,
            vec![
                ":2000000000000100020003000400050006000700080009000A000B000C000D000E000F0068",
                ":2000200010001100120013001400150016001700180019001A001B001C001D001E001F0048",
                END_OF_FILE_RECORD,
            ]
        );
    }

    #[test]
    fn test_every_record_sums_to_zero() {
        let words: Vec<u16> = (0..100u16).map(|i| i.wrapping_mul(0x9E37)).collect();
        for line in encode(&words) {
            let sum = decode_line(&line)
                .iter()
                .fold(0u8, |acc, &byte| acc.wrapping_add(byte));
            assert_eq!(sum, 0, "checksum mismatch in {}", line);
        }
    }

    #[test]
    fn test_records_tile_payload_and_round_trip() {
        for count in [1usize, 15, 16, 17, 31, 33, 250] {
            let words: Vec<u16> = (0..count as u16).map(|i| 0xA500 ^ i.rotate_left(3)).collect();
            let lines = encode(&words);
            let (terminator, data_lines) = lines.split_last().unwrap();
            assert_eq!(terminator, END_OF_FILE_RECORD);

            let mut expected_offset = 0usize;
            let mut bytes = Vec::new();
            for line in data_lines {
                let raw = decode_line(line);
                let length = raw[0] as usize;
                let offset = u16::from_be_bytes([raw[1], raw[2]]) as usize;

                assert_eq!(raw[3], RecordType::Data as u8);
                assert!(length > 0 && length <= MAX_RECORD_BYTES);
                assert_eq!(raw.len(), 4 + length + 1);
                assert_eq!(offset, expected_offset);

                bytes.extend_from_slice(&raw[4..4 + length]);
                expected_offset += length;
            }

            assert_eq!(expected_offset, count * 2);
            let decoded: Vec<u16> = bytes
                .chunks(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            assert_eq!(decoded, words);
        }
    }

    #[test]
    fn test_largest_addressable_payload() {
        let words = vec![0xFFFFu16; MAX_PAYLOAD_BYTES / 2];
        let mut out = Vec::new();
        let records = write_hex_records(&mut out, &words).unwrap();
        assert_eq!(records, MAX_PAYLOAD_BYTES / MAX_RECORD_BYTES);

        let text = String::from_utf8(out).unwrap();
        let last_data = text.lines().rev().nth(1).unwrap();
        assert!(last_data.starts_with(":20FFE000"));
    }

    #[test]
    fn test_payload_too_large() {
        let words = vec![0u16; MAX_PAYLOAD_BYTES / 2 + 1];
        let mut out = Vec::new();
        let result = write_hex_records(&mut out, &words);
        assert!(matches!(
            result,
            Err(HexRecordError::PayloadTooLarge { length }) if length == MAX_PAYLOAD_BYTES + 2
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_record_too_long() {
        let data = [0u8; MAX_RECORD_BYTES + 1];
        assert!(matches!(
            encode_record(RecordType::Data, 0, &data),
            Err(HexRecordError::RecordTooLong { length: 33 })
        ));
    }

    #[test]
    fn test_sink_failure_propagates() {
        struct FailingSink;

        impl Write for FailingSink {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let result = write_hex_records(&mut FailingSink, &[1, 2, 3]);
        assert!(matches!(result, Err(HexRecordError::Io(_))));
    }
}
