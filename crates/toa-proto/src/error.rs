//! toa-proto エラー型

use thiserror::Error;

/// フレーム / イメージヘッダー解析のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// フレームが空
    #[error("Empty frame")]
    Empty,
    /// フレームが短すぎる
    #[error("Frame too short ({len} bytes, need at least {min})")]
    TooShort { len: usize, min: usize },
    /// イメージヘッダーのマジックが一致しない
    #[error("Bad image header magic: {0:02x?}")]
    BadMagic([u8; 2]),
}
