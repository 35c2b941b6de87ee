//! Reversible byte-level obfuscation applied to downloaded bundles.
//!
//! A bundle starts with a little-endian u32 magic:
//! - `0x10`: the next 128 bytes are XORed with a repeating 8-byte key
//! - `0x20`: the header is simply prepended to the plain bundle
//!
//! Anything else is treated as a plain bundle.

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

const MAGIC_XOR: u32 = 0x10;
const MAGIC_PLAIN: u32 = 0x20;
const HEADER_LEN: usize = 4;
const XOR_WINDOW: usize = 128;
const XOR_KEY: [u8; 8] = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00];

fn xor_window(data: &mut [u8]) {
    let end = data.len().min(XOR_WINDOW);
    for (i, byte) in data[..end].iter_mut().enumerate() {
        *byte ^= XOR_KEY[i % XOR_KEY.len()];
    }
}

/// Remove the obfuscation header and, for `0x10` bundles, undo the XOR window.
pub fn deobfuscate(data: &[u8]) -> Vec<u8> {
    if data.len() < HEADER_LEN {
        return data.to_vec();
    }

    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    match magic {
        MAGIC_PLAIN => data[HEADER_LEN..].to_vec(),
        MAGIC_XOR => {
            let mut body = data[HEADER_LEN..].to_vec();
            xor_window(&mut body);
            body
        }
        _ => data.to_vec(),
    }
}

/// Apply the `0x10` transform. There is no way back to a `0x20` header.
pub fn obfuscate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + HEADER_LEN);
    out.extend_from_slice(&MAGIC_XOR.to_le_bytes());
    out.extend_from_slice(data);
    xor_window(&mut out[HEADER_LEN..]);
    out
}

/// Deobfuscate a file in place.
pub async fn deobfuscate_file(path: &Path) -> std::io::Result<()> {
    rewrite_in_place(path, deobfuscate).await
}

/// Obfuscate a file in place.
pub async fn obfuscate_file(path: &Path) -> std::io::Result<()> {
    rewrite_in_place(path, obfuscate).await
}

async fn rewrite_in_place(path: &Path, transform: fn(&[u8]) -> Vec<u8>) -> std::io::Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path).await?;

    let mut data = Vec::new();
    file.read_to_end(&mut data).await?;
    let transformed = transform(&data);

    file.seek(SeekFrom::Start(0)).await?;
    file.write_all(&transformed).await?;
    file.set_len(transformed.len() as u64).await?;
    file.flush().await?;
    Ok(())
}
