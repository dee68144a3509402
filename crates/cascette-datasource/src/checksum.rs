//! MD5 helpers shared by index probing, BLTE chunk checks and verification

use md5::{Digest, Md5};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// MD5 of a byte slice
pub fn md5_of(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Md5::digest(data));
    out
}

/// MD5 of a file's full contents, read in 64 KiB pieces
pub async fn md5_file(path: impl AsRef<Path>) -> std::io::Result<[u8; 16]> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize());
    Ok(out)
}
