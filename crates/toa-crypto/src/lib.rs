//! # toa-crypto
//!
//! TOA の暗号プリミティブ実装
//!
//! 鍵導出・MIC（メッセージ完全性コード）・TOFU イメージ検証に使う
//! HMAC-SHA256 / SHA-256 / secp256k1 ECDSA / CRC16 をまとめたクレート。
//! `no_std` + `alloc` 環境（MCU を含む）で動作する。
//!
//! ## TOA の鍵導出仕様
//!
//! すべての導出は HMAC-SHA256(auth_key, msg[32]) を必要な長さに切り詰めたもの。
//!
//! ```text
//! device_auth:       msg = randA[14] ‖ 0×2 ‖ randT[10] ‖ 0×6
//!                    sresT = mac[4..8], aco = mac[8..32]
//! session_key:       msg = randA[14] ‖ randT[13] ‖ cid[1] ‖ token[4]
//! broadcast_key:     msg = randT[10] ‖ tile_id[8] ‖ 0×14
//! assoc_session_key: msg = aco[24] ‖ tile_id[8]
//!
//! mic:               msg = LE32(nonce) ‖ 0×4 ‖ direction ‖ len ‖ payload[≤22] ‖ 0…
//! broadcast_mic:     msg = LE32(nonce) ‖ len ‖ payload[≤27] ‖ 0…
//! ```
//!
//! direction:
//!   デバイス発 = 0, アプリ発 = 1

#![no_std]
extern crate alloc;

mod error;
mod image;
mod kdf;
mod mic;
mod session;
mod signature;

pub use error::CryptoError;
pub use image::{block_crc_ok, crc16, ImageHasher};
pub use kdf::{assoc_session_key, broadcast_key, device_auth, session_key, AuthKey, DeviceAuth};
pub use mic::{broadcast_mic, mic, mic_eq, Mic};
pub use session::{BroadcastSession, ChannelSession, SessionKey};
pub use signature::{verify_signature, PublicKey};

/// 長期認証鍵の長さ
pub const AUTH_KEY_LEN: usize = 16;
/// Tile ID の長さ
pub const TILE_ID_LEN: usize = 8;
/// セッション鍵・ブロードキャスト鍵の長さ
pub const SESSION_KEY_LEN: usize = 16;
/// アプリ側チャレンジ randA の長さ
pub const RAND_A_LEN: usize = 14;
/// OPEN_CHANNEL で返す randT の長さ（固定プレフィックス + 乱数）
pub const RAND_T_LEN: usize = 13;
/// 接続ごとに生成する randT 固定プレフィックスの長さ
pub const RAND_T_FIXED_LEN: usize = 10;
/// AUTHENTICATE / ASSOCIATE で返す randT の長さ
pub const AUTH_RAND_T_LEN: usize = 10;
/// sresT の長さ
pub const SRES_LEN: usize = 4;
/// aco の長さ
pub const ACO_LEN: usize = 24;
/// MIC の長さ
pub const MIC_LEN: usize = 4;
/// コネクションレス要求のトークン長
pub const TOKEN_LEN: usize = 4;

/// MIC 計算に混ぜるメッセージの方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// デバイス → アプリ（nonceT）
    DeviceToApp = 0,
    /// アプリ → デバイス（nonceA）
    AppToDevice = 1,
}

impl Direction {
    /// MIC メッセージに埋め込むバイト値
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Base64 文字列（URL-safe, パディングなし）を N バイトの固定長配列にデコードする
///
/// 認証鍵（16 バイト = 22 文字）と Tile ID（8 バイト = 11 文字）の読み込みに使う。
pub fn decode_base64_fixed<const N: usize>(b64: &str) -> Result<[u8; N], CryptoError> {
    use base64::Engine as _;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(b64)
        .map_err(|_| CryptoError::InvalidBase64)?;

    if bytes.len() != N {
        return Err(CryptoError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }

    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// OS の乱数源でバッファを埋める
pub fn random_bytes(buf: &mut [u8]) -> Result<(), CryptoError> {
    getrandom::getrandom(buf).map_err(|_| CryptoError::RandomUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_bytes() {
        assert_eq!(Direction::DeviceToApp.as_byte(), 0);
        assert_eq!(Direction::AppToDevice.as_byte(), 1);
    }

    #[test]
    fn test_decode_base64_key_valid() {
        // 16バイト = 22文字（URL-safe base64 no-pad）
        let key: [u8; 16] = decode_base64_fixed("AAAAAAAAAAAAAAAAAAAAAA").unwrap();
        assert_eq!(key, [0u8; 16]);
    }

    #[test]
    fn test_decode_base64_tile_id_valid() {
        // 8バイト = 11文字
        let id: [u8; 8] = decode_base64_fixed("AQIDBAUGBwg").unwrap();
        assert_eq!(id, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_decode_base64_invalid_length() {
        let result = decode_base64_fixed::<16>("AAAAAAAAAAAAAA"); // 短すぎる
        assert_eq!(
            result,
            Err(CryptoError::InvalidLength { expected: 16, actual: 10 })
        );
    }

    #[test]
    fn test_decode_base64_garbage() {
        let result = decode_base64_fixed::<16>("!!!not base64!!!");
        assert_eq!(result, Err(CryptoError::InvalidBase64));
    }

    #[test]
    fn test_random_bytes_fills_buffer() {
        let mut buf = [0u8; 32];
        random_bytes(&mut buf).unwrap();
        // 32 バイトすべてゼロになる確率は無視できる
        assert_ne!(buf, [0u8; 32]);
    }
}
