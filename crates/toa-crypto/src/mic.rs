//! MIC（メッセージ完全性コード）計算
//!
//! ## セッションチャンネル MIC
//! ```text
//! msg[0..4]  = nonce (LE32)
//! msg[4..8]  = 0
//! msg[8]     = direction (デバイス発 0 / アプリ発 1)
//! msg[9]     = payload 長（切り詰め前）
//! msg[10..]  = payload（最大 22 バイト）、残りはゼロ
//! ```
//!
//! ## ブロードキャスト MIC
//! ```text
//! msg[0..4]  = nonce (LE32)
//! msg[4]     = payload 長（最大 27 に切り詰め）
//! msg[5..]   = payload（最大 27 バイト）、残りはゼロ
//! ```
//!
//! MIC = HMAC-SHA256(key, msg) の先頭 4 バイト。

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::kdf::{hmac_sha256, KDF_MSG_LEN};
use crate::session::SessionKey;
use crate::{Direction, MIC_LEN};

/// 4 バイトの MIC
pub type Mic = [u8; MIC_LEN];

/// セッション MIC が覆う payload の最大長
const MIC_MAX_TEXT: usize = KDF_MSG_LEN - 10;

/// ブロードキャスト MIC が覆う payload の最大長
const BROADCAST_MIC_MAX_TEXT: usize = KDF_MSG_LEN - 5;

/// セッションチャンネルの MIC を計算する
pub fn mic(key: &SessionKey, nonce: u32, direction: Direction, payload: &[u8]) -> Mic {
    let mut msg = Zeroizing::new([0u8; KDF_MSG_LEN]);
    msg[0..4].copy_from_slice(&nonce.to_le_bytes());
    msg[8] = direction.as_byte();
    msg[9] = payload.len() as u8;

    let text_len = payload.len().min(MIC_MAX_TEXT);
    msg[10..10 + text_len].copy_from_slice(&payload[..text_len]);

    truncate_mic(&hmac_sha256(key.as_bytes(), &msg))
}

/// ブロードキャストチャンネルの MIC を計算する
pub fn broadcast_mic(key: &SessionKey, nonce: u32, payload: &[u8]) -> Mic {
    let mut msg = Zeroizing::new([0u8; KDF_MSG_LEN]);
    msg[0..4].copy_from_slice(&nonce.to_le_bytes());

    let text_len = payload.len().min(BROADCAST_MIC_MAX_TEXT);
    msg[4] = text_len as u8;
    msg[5..5 + text_len].copy_from_slice(&payload[..text_len]);

    truncate_mic(&hmac_sha256(key.as_bytes(), &msg))
}

/// MIC を定数時間で比較する
pub fn mic_eq(a: &Mic, b: &[u8]) -> bool {
    if b.len() != MIC_LEN {
        return false;
    }
    a.ct_eq(b).into()
}

fn truncate_mic(mac: &[u8; 32]) -> Mic {
    let mut out = [0u8; MIC_LEN];
    out.copy_from_slice(&mac[..MIC_LEN]);
    out
}
