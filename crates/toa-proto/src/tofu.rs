//! TOFU（ファームウェア更新）サブプロトコルとイメージヘッダー
//!
//! ```text
//! TOFU_CTL payload[0]:
//!   RESUME 0x01  [version:10][img_len LE24]
//!   EXIT   0x02  [mode]   INIT=0 / CLEAR=1
//!
//! RSP_TOFU_CTL payload[0]:
//!   RESUME_READY 0x01  [block_len LE32][resume_offset LE32]
//!   BLOCK_OK     0x02
//!   IMAGE_OK     0x03
//!   EXIT_OK      0x04
//!   ERROR        0x20  [command][error]   command は TOFU_DATA なら 0x00
//!
//! TOFU_DATA: ブロックの生バイト列（末尾 2 バイトが CRC16 LE）
//! ```
//!
//! ## イメージヘッダー（116 バイト、最初のブロックの先頭）
//!
//! ```text
//! [0..2]     magic          0x70 0x51
//! [2]        valid_flag
//! [3]        image_id
//! [4..8]     code_size      LE32
//! [8..40]    hash           SHA-256
//! [40..104]  signature      r ‖ s
//! [104..114] version
//! [114]      encryption
//! [115]      reserved
//! ```

use crate::error::ProtoError;

pub const CTL_RESUME: u8 = 0x01;
pub const CTL_EXIT: u8 = 0x02;

/// データ経路のエラー応答で command 欄に入れる値
pub const CMD_DATA: u8 = 0x00;

pub const RSP_RESUME_READY: u8 = 0x01;
pub const RSP_BLOCK_OK: u8 = 0x02;
pub const RSP_IMAGE_OK: u8 = 0x03;
pub const RSP_EXIT_OK: u8 = 0x04;
pub const RSP_ERROR: u8 = 0x20;

pub const EXIT_INIT: u8 = 0x00;
pub const EXIT_CLEAR: u8 = 0x01;

/// ファームウェアバージョン文字列の長さ
pub const VERSION_LEN: usize = 10;

/// RESUME の引数長（version + img_len 24bit）
pub const RESUME_PARAMS_LEN: usize = VERSION_LEN + 3;

/// ブロック末尾の CRC16 の長さ
pub const CRC_LEN: usize = 2;

/// イメージヘッダー長
pub const HEADER_LEN: usize = 116;

/// ヘッダーのマジック
pub const HEADER_MAGIC: [u8; 2] = [0x70, 0x51];

/// ヘッダーの hash 入力のうち code_size フィールドの位置
pub const CODE_SIZE_RANGE: core::ops::Range<usize> = 4..8;

/// ヘッダーの hash 入力のうち version フィールドの位置
pub const VERSION_RANGE: core::ops::Range<usize> = 104..114;

/// TOFU イメージヘッダー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub valid_flag: u8,
    pub image_id: u8,
    pub code_size: u32,
    pub hash: [u8; 32],
    pub signature: [u8; 64],
    pub version: [u8; VERSION_LEN],
    pub encryption: u8,
    pub reserved: u8,
}

impl ImageHeader {
    /// ブロック先頭の 116 バイトを解析する
    ///
    /// # エラー
    /// - `ProtoError::TooShort`: 116 バイト未満
    /// - `ProtoError::BadMagic`: マジック不一致
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtoError> {
        if bytes.len() < HEADER_LEN {
            return Err(ProtoError::TooShort {
                len: bytes.len(),
                min: HEADER_LEN,
            });
        }

        let magic = [bytes[0], bytes[1]];
        if magic != HEADER_MAGIC {
            return Err(ProtoError::BadMagic(magic));
        }

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[8..40]);
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&bytes[40..104]);
        let mut version = [0u8; VERSION_LEN];
        version.copy_from_slice(&bytes[VERSION_RANGE]);

        Ok(ImageHeader {
            valid_flag: bytes[2],
            image_id: bytes[3],
            code_size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            hash,
            signature,
            version,
            encryption: bytes[114],
            reserved: bytes[115],
        })
    }

    /// 116 バイトのワイヤー表現を返す
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..2].copy_from_slice(&HEADER_MAGIC);
        out[2] = self.valid_flag;
        out[3] = self.image_id;
        out[CODE_SIZE_RANGE].copy_from_slice(&self.code_size.to_le_bytes());
        out[8..40].copy_from_slice(&self.hash);
        out[40..104].copy_from_slice(&self.signature);
        out[VERSION_RANGE].copy_from_slice(&self.version);
        out[114] = self.encryption;
        out[115] = self.reserved;
        out
    }
}
