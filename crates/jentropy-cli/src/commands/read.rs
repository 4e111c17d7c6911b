//! `jentropy read` — print conditioned random bytes from a live
//! entropy collector.

use jentropy_core::{CollectorConfig, EntropyCollector, MemoryAddressingMode};
use std::io::Write;

pub fn run(
    bytes: usize,
    format: &str,
    osr: u32,
    flags: u32,
    memblocksize: Option<usize>,
    memblocks: usize,
) {
    if let Err(e) = jentropy_core::init(osr, flags) {
        eprintln!("Error: startup self-test failed: {e}");
        std::process::exit(1);
    }

    let collector_result = match memblocksize {
        Some(memblocksize) => {
            let config = CollectorConfig {
                memory_mode: MemoryAddressingMode::Block {
                    memblocks,
                    memblocksize,
                },
                ..CollectorConfig::from_raw(osr, flags)
            };
            EntropyCollector::alloc_from_config(&config)
        }
        None => EntropyCollector::alloc(osr, flags),
    };
    let mut collector = match collector_result {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to allocate entropy collector: {e}");
            std::process::exit(1);
        }
    };

    let mut buf = vec![0u8; bytes];
    if let Err(e) = collector.read_safe(&mut buf) {
        eprintln!("Error: read failed: {e}");
        std::process::exit(1);
    }

    match format {
        "raw" => {
            if std::io::stdout().write_all(&buf).is_err() {
                std::process::exit(1);
            }
        }
        "base64" => println!("{}", base64_encode(&buf)),
        _ => println!("{}", hex_encode(&buf)),
    }
}

fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn base64_encode(data: &[u8]) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut result = String::new();
    for chunk in data.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = if chunk.len() > 1 { chunk[1] as u32 } else { 0 };
        let b2 = if chunk.len() > 2 { chunk[2] as u32 } else { 0 };
        let triple = (b0 << 16) | (b1 << 8) | b2;
        result.push(CHARS[((triple >> 18) & 0x3F) as usize] as char);
        result.push(CHARS[((triple >> 12) & 0x3F) as usize] as char);
        result.push(if chunk.len() > 1 {
            CHARS[((triple >> 6) & 0x3F) as usize] as char
        } else {
            '='
        });
        result.push(if chunk.len() > 2 {
            CHARS[(triple & 0x3F) as usize] as char
        } else {
            '='
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_encode_matches_expected_digits() {
        assert_eq!(hex_encode(&[0x00, 0xff, 0x0a]), "00ff0a");
    }

    #[test]
    fn base64_encode_matches_known_vector() {
        assert_eq!(base64_encode(b"foobar"), "Zm9vYmFy");
        assert_eq!(base64_encode(b"fo"), "Zm8=");
    }
}
