//! toa-tofu エラー型

use thiserror::Error;

use toa_crypto::CryptoError;

/// TOFU エンジン構築時のエラー
///
/// 転送中の失敗はワイヤー上の ErrorCode で返すので、ここには含めない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TofuError {
    /// 設定値が範囲外
    #[error("Invalid TOFU config `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
    /// 公開鍵の読み込み失敗
    #[error("Public key error: {0}")]
    PublicKey(#[from] CryptoError),
}
