use serde::Serialize;
use std::io::{self, Read};

/// How many leading bytes of a file are inspected to decide text vs binary.
pub const SAMPLE_SIZE: usize = 8 * 1024;

/// Share of control bytes in the sample above which a file counts as binary.
pub const CONTROL_RATIO_THRESHOLD: f64 = 0.30;

/// The verdict for a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Eligible for rewriting.
    Text,
    /// Left alone.
    Binary,
}

/// Decides whether a byte sample looks like text.
///
/// A NUL byte anywhere in the sample means binary. Otherwise the sample is
/// binary when more than [`CONTROL_RATIO_THRESHOLD`] of it consists of ASCII
/// control characters other than the usual whitespace (`\t`, `\n`, `\r`,
/// form feed) and escape. Bytes `>= 0x80` count as printable so UTF-8 and
/// legacy 8-bit encodings stay eligible.
///
/// Only the first [`SAMPLE_SIZE`] bytes are considered, so passing a whole
/// file gives the same answer as passing its sample.
pub fn classify(sample: &[u8]) -> Classification {
    let sample = &sample[..sample.len().min(SAMPLE_SIZE)];
    if sample.is_empty() {
        return Classification::Text;
    }

    let mut control = 0usize;
    for &b in sample {
        if b == 0 {
            return Classification::Binary;
        }
        if is_control(b) {
            control += 1;
        }
    }

    if control as f64 / sample.len() as f64 > CONTROL_RATIO_THRESHOLD {
        Classification::Binary
    } else {
        Classification::Text
    }
}

fn is_control(b: u8) -> bool {
    match b {
        b'\t' | b'\n' | b'\r' | 0x0c | 0x1b => false,
        0x00..=0x1f | 0x7f => true,
        _ => false,
    }
}

/// Reads up to [`SAMPLE_SIZE`] bytes from `reader` into `buf` and classifies them.
///
/// The sample stays in `buf` so the caller can keep reading the rest of the
/// file into the same buffer without a second open.
pub fn sniff<R: Read>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Classification> {
    buf.clear();
    reader.take(SAMPLE_SIZE as u64).read_to_end(buf)?;
    Ok(classify(buf))
}
