//! TOFU イメージの完全性チェック
//!
//! - ブロック単位: CRC16-CCITT (Kermit)。ブロック末尾に CRC を LE で付けたもの全体の
//!   CRC が 0 になれば正しい。
//! - イメージ全体: SHA-256 の逐次ハッシュ。中断・再開をまたいで状態を保持する。

use crc::{Crc, CRC_16_KERMIT};
use sha2::{Digest, Sha256};

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_KERMIT);

/// CRC16-CCITT (Kermit) を計算する
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// 末尾に CRC16 (LE) を含むブロック全体の残差が 0 かを判定する
pub fn block_crc_ok(block_with_crc: &[u8]) -> bool {
    crc16(block_with_crc) == 0
}

/// イメージ全体の SHA-256 を逐次計算する
#[derive(Clone, Default)]
pub struct ImageHasher {
    inner: Sha256,
}

impl ImageHasher {
    pub fn new() -> Self {
        ImageHasher { inner: Sha256::new() }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// ハッシュを確定する
    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}

impl core::fmt::Debug for ImageHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ImageHasher")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_kermit_check_value() {
        // CRC-16/KERMIT の check 値
        assert_eq!(crc16(b"123456789"), 0x2189);
    }

    #[test]
    fn test_block_crc_residue() {
        let data = [0x10u8, 0x20, 0x30, 0x40, 0x50];
        let mut block = data.to_vec();
        block.extend_from_slice(&crc16(&data).to_le_bytes());
        assert!(block_crc_ok(&block));

        block[2] ^= 0x01;
        assert!(!block_crc_ok(&block), "1 ビット反転で CRC が壊れるはず");
    }

    #[test]
    fn test_hasher_incremental_matches_oneshot() {
        let mut inc = ImageHasher::new();
        inc.update(b"hello ");
        let snapshot = inc.clone();
        inc.update(b"world");

        let mut resumed = snapshot;
        resumed.update(b"world");

        let oneshot: [u8; 32] = Sha256::digest(b"hello world").into();
        assert_eq!(inc.finalize(), oneshot);
        assert_eq!(resumed.finalize(), oneshot);
    }
}
