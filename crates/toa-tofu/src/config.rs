//! TOFU 設定

use alloc::string::String;

use serde::{Deserialize, Serialize};

use toa_crypto::PublicKey;
use toa_proto::tofu::{HEADER_LEN, VERSION_LEN};

use crate::error::TofuError;

/// 既定のブロック長（CRC16 を除く）
pub const DEFAULT_BLOCK_LEN: u32 = 1024;

/// ブロック長の上限（ブロックバッファは RAM に載る）
pub const MAX_BLOCK_LEN: u32 = 16 * 1024;

/// TOFU 設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TofuConfig {
    /// 1 ブロックのバイト数（CRC16 を除く）
    pub block_len: u32,
    /// 動作中のファームウェアバージョン（10 文字、例 "01.02.03.4"）
    pub running_version: String,
    /// 署名検証用公開鍵（Base64 URL-safe、raw 64 バイトまたは SEC1）
    ///
    /// 未設定だと最終ブロックで必ず SIGNATURE エラーになる。
    pub public_key: Option<String>,
}

impl Default for TofuConfig {
    fn default() -> Self {
        TofuConfig {
            block_len: DEFAULT_BLOCK_LEN,
            running_version: String::from("00.00.00.0"),
            public_key: None,
        }
    }
}

impl TofuConfig {
    /// 設定値の範囲を検証する
    pub fn validate(&self) -> Result<(), TofuError> {
        if self.block_len < HEADER_LEN as u32 || self.block_len > MAX_BLOCK_LEN {
            return Err(TofuError::InvalidConfig {
                field: "block_len",
                reason: "must hold the image header and fit in RAM",
            });
        }
        if self.running_version.len() != VERSION_LEN {
            return Err(TofuError::InvalidConfig {
                field: "running_version",
                reason: "must be exactly 10 bytes",
            });
        }
        Ok(())
    }

    /// バージョン文字列のワイヤー表現
    pub fn running_version_bytes(&self) -> Result<[u8; VERSION_LEN], TofuError> {
        self.running_version
            .as_bytes()
            .try_into()
            .map_err(|_| TofuError::InvalidConfig {
                field: "running_version",
                reason: "must be exactly 10 bytes",
            })
    }

    /// 公開鍵を読み込む（未設定なら `None`）
    pub fn public_key(&self) -> Result<Option<PublicKey>, TofuError> {
        self.public_key
            .as_deref()
            .map(PublicKey::from_base64)
            .transpose()
            .map_err(TofuError::from)
    }
}
