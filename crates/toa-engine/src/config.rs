//! エンジン設定と資格情報
//!
//! 設定は serde でデシリアライズでき、省略したフィールドはファームウェア既定値になる。

use serde::{Deserialize, Serialize};

use toa_crypto::{decode_base64_fixed, AuthKey, AUTH_KEY_LEN, TILE_ID_LEN, TOKEN_LEN};
use toa_proto::{tka, MAX_SESSION_CHANNELS, MPS};
use toa_transport::default_queue_size;

use crate::error::EngineError;

/// 既定のセッションチャンネル数
pub const DEFAULT_NUM_CHANNELS: usize = 8;

/// 接続直後、認証されないまま許す時間（秒）
pub const DEFAULT_AUTHENTICATION_TIMEOUT_SECS: u32 = 30;

/// 最後のチャンネルが閉じてから切断するまでの時間（秒）
pub const DEFAULT_DISCONNECT_DELAY_SECS: u32 = 10;

/// キープアライブの既定値
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    /// チェック間隔（秒）
    pub check_delay_secs: u32,
    /// CHECK 送信後の ACK 待ち（秒）
    pub ack_delay_secs: u32,
    /// OPEN_CHANNEL から最初のチェックまで（秒）
    pub start_delay_secs: u32,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        KeepAliveConfig {
            check_delay_secs: tka::DEFAULT_CHECK_DELAY_SECS,
            ack_delay_secs: tka::DEFAULT_ACK_DELAY_SECS,
            start_delay_secs: tka::DEFAULT_START_DELAY_SECS,
        }
    }
}

/// エンジン設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// セッションチャンネル数（1..=8）
    pub num_channels: usize,
    /// 応答キューの容量（バイト）
    pub queue_size: usize,
    /// 応答ペイロードの最大長（1..=MPS）
    pub max_payload: usize,
    /// 接続直後の認証タイムアウト（秒、0 で無効）
    pub authentication_timeout_secs: u32,
    /// 全チャンネル解放後の自動切断までの時間（秒）
    pub disconnect_delay_secs: u32,
    pub keepalive: KeepAliveConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            num_channels: DEFAULT_NUM_CHANNELS,
            queue_size: default_queue_size(DEFAULT_NUM_CHANNELS),
            max_payload: MPS,
            authentication_timeout_secs: DEFAULT_AUTHENTICATION_TIMEOUT_SECS,
            disconnect_delay_secs: DEFAULT_DISCONNECT_DELAY_SECS,
            keepalive: KeepAliveConfig::default(),
        }
    }
}

impl EngineConfig {
    /// 設定値の範囲を検証する
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.num_channels == 0 || self.num_channels > MAX_SESSION_CHANNELS {
            return Err(EngineError::InvalidConfig {
                field: "num_channels",
                reason: "must be between 1 and 8",
            });
        }
        if self.max_payload == 0 || self.max_payload > MPS {
            return Err(EngineError::InvalidConfig {
                field: "max_payload",
                reason: "must be between 1 and 14",
            });
        }
        // 最大のフレーム（コネクションレス応答）が 1 つは入ること
        if self.queue_size < 1 + 1 + TOKEN_LEN + 1 + self.max_payload {
            return Err(EngineError::InvalidConfig {
                field: "queue_size",
                reason: "too small for a single response",
            });
        }
        if self.disconnect_delay_secs == 0 {
            return Err(EngineError::InvalidConfig {
                field: "disconnect_delay_secs",
                reason: "must be non-zero",
            });
        }
        let ka = &self.keepalive;
        if ka.check_delay_secs == 0 || ka.ack_delay_secs == 0 || ka.start_delay_secs == 0 {
            return Err(EngineError::InvalidConfig {
                field: "keepalive",
                reason: "delays must be non-zero",
            });
        }
        Ok(())
    }
}

/// デバイスの長期資格情報
#[derive(Debug, Clone)]
pub struct Credentials {
    pub auth_key: AuthKey,
    pub tile_id: [u8; TILE_ID_LEN],
}

impl Credentials {
    pub fn new(auth_key: [u8; AUTH_KEY_LEN], tile_id: [u8; TILE_ID_LEN]) -> Self {
        Credentials {
            auth_key: AuthKey::new(auth_key),
            tile_id,
        }
    }

    /// Base64（URL-safe, パディングなし）の認証鍵と Tile ID から読み込む
    ///
    /// # エラー
    /// - `EngineError::Credential`: デコード失敗・長さ不正
    pub fn from_base64(auth_key_b64: &str, tile_id_b64: &str) -> Result<Self, EngineError> {
        let auth_key = decode_base64_fixed::<AUTH_KEY_LEN>(auth_key_b64)?;
        let tile_id = decode_base64_fixed::<TILE_ID_LEN>(tile_id_b64)?;
        Ok(Self::new(auth_key, tile_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toa_crypto::CryptoError;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue_size, 380);
        assert_eq!(config.keepalive.check_delay_secs, 17 * 60);
    }

    #[test]
    fn test_validate_channel_count() {
        let config = EngineConfig {
            num_channels: 9,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig { field: "num_channels", .. })
        ));
    }

    #[test]
    fn test_validate_queue_too_small() {
        let config = EngineConfig {
            queue_size: 10,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig { field: "queue_size", .. })
        ));
    }

    #[test]
    fn test_validate_max_payload() {
        let config = EngineConfig {
            max_payload: 15,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_from_base64() {
        let creds = Credentials::from_base64("AAAAAAAAAAAAAAAAAAAAAA", "AQIDBAUGBwg").unwrap();
        assert_eq!(creds.auth_key.as_bytes(), &[0u8; 16]);
        assert_eq!(creds.tile_id, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_credentials_bad_tile_id() {
        let err = Credentials::from_base64("AAAAAAAAAAAAAAAAAAAAAA", "AQID").unwrap_err();
        assert_eq!(
            err,
            EngineError::Credential(CryptoError::InvalidLength { expected: 8, actual: 3 })
        );
    }
}
