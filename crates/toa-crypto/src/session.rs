//! MIC セッション実装
//!
//! チャンネルごとの鍵と方向別 nonce を管理する。
//! nonce は署名・検証の **前に** インクリメントされるので、
//! 最初のメッセージは nonce = 1 で計算される。

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::mic::{broadcast_mic, mic, mic_eq, Mic};
use crate::{Direction, SESSION_KEY_LEN};

/// 16 バイトのセッション鍵（ブロードキャスト鍵にも使う）
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    pub fn new(bytes: [u8; SESSION_KEY_LEN]) -> Self {
        SessionKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }
}

impl core::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// セッションチャンネルの MIC セッション
///
/// OPEN_CHANNEL で一度だけ生成され、チャンネル解放まで鍵も nonce も
/// リセットされない。同じ鍵で nonce が重複することはない。
#[derive(Debug, Clone)]
pub struct ChannelSession {
    key: SessionKey,
    /// デバイス発メッセージの nonce（nonceT）
    nonce_t: u32,
    /// アプリ発メッセージの nonce（nonceA）
    nonce_a: u32,
}

impl ChannelSession {
    /// 導出済みセッション鍵から nonce = 0 のセッションを作る
    pub fn new(key: SessionKey) -> Self {
        ChannelSession {
            key,
            nonce_t: 0,
            nonce_a: 0,
        }
    }

    /// デバイス発メッセージ（opcode + payload）に MIC を付ける
    ///
    /// nonceT をインクリメントしてから計算する。
    pub fn sign(&mut self, body: &[u8]) -> Mic {
        self.nonce_t = self.nonce_t.wrapping_add(1);
        mic(&self.key, self.nonce_t, Direction::DeviceToApp, body)
    }

    /// アプリ発メッセージ（opcode + payload）の MIC を検証する
    ///
    /// 成否にかかわらず nonceA はインクリメントされる。
    pub fn verify(&mut self, body: &[u8], received: &[u8]) -> bool {
        self.check(body, received).is_ok()
    }

    /// `verify` と同じだが、失敗時にデバイス側で計算した MIC を返す
    ///
    /// CLOSE_CHANNEL(MIC_FAILURE) に載せてアプリ側の再同期に使わせる。
    pub fn check(&mut self, body: &[u8], received: &[u8]) -> Result<(), Mic> {
        self.nonce_a = self.nonce_a.wrapping_add(1);
        let expected = mic(&self.key, self.nonce_a, Direction::AppToDevice, body);
        if mic_eq(&expected, received) {
            Ok(())
        } else {
            Err(expected)
        }
    }

    /// 最後に使ったデバイス発 nonce
    pub fn nonce_t(&self) -> u32 {
        self.nonce_t
    }

    /// 最後に使ったアプリ発 nonce
    pub fn nonce_a(&self) -> u32 {
        self.nonce_a
    }
}

/// ブロードキャスト MIC セッション
///
/// リンク確立時に導出され、全セッションチャンネルで共有される。
#[derive(Debug, Clone)]
pub struct BroadcastSession {
    key: SessionKey,
    nonce: u32,
}

impl BroadcastSession {
    pub fn new(key: SessionKey) -> Self {
        BroadcastSession { key, nonce: 0 }
    }

    /// ブロードキャストメッセージ（opcode + payload）に MIC を付ける
    pub fn sign(&mut self, body: &[u8]) -> Mic {
        self.nonce = self.nonce.wrapping_add(1);
        broadcast_mic(&self.key, self.nonce, body)
    }

    /// 現在のブロードキャスト nonce（READY 応答に埋め込む）
    pub fn nonce(&self) -> u32 {
        self.nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session() -> ChannelSession {
        ChannelSession::new(SessionKey::new([0x21u8; 16]))
    }

    #[test]
    fn test_sign_increments_before_use() {
        let mut session = make_session();
        assert_eq!(session.nonce_t(), 0);

        let m = session.sign(b"\x01abc");
        assert_eq!(session.nonce_t(), 1);
        assert_eq!(
            m,
            mic(&SessionKey::new([0x21u8; 16]), 1, Direction::DeviceToApp, b"\x01abc")
        );
    }

    #[test]
    fn test_nonce_monotonic() {
        let mut session = make_session();
        for expected in 1..=50u32 {
            session.sign(b"x");
            assert_eq!(session.nonce_t(), expected);
        }
        assert_eq!(session.nonce_a(), 0, "nonceA は独立している");
    }

    #[test]
    fn test_verify_accepts_peer_mic() {
        let key = SessionKey::new([0x21u8; 16]);
        let mut session = make_session();

        for n in 1..=3u32 {
            let peer = mic(&key, n, Direction::AppToDevice, b"\x05ping");
            assert!(session.verify(b"\x05ping", &peer));
            assert_eq!(session.nonce_a(), n);
        }
    }

    #[test]
    fn test_verify_rejects_replay() {
        let key = SessionKey::new([0x21u8; 16]);
        let mut session = make_session();

        let first = mic(&key, 1, Direction::AppToDevice, b"\x05ping");
        assert!(session.verify(b"\x05ping", &first));
        // 同じ MIC を再送しても nonceA が進んでいるので失敗する
        assert!(!session.verify(b"\x05ping", &first));
        assert_eq!(session.nonce_a(), 2);
    }

    #[test]
    fn test_check_returns_expected_mic() {
        let key = SessionKey::new([0x21u8; 16]);
        let mut session = make_session();
        let expected = mic(&key, 1, Direction::AppToDevice, b"\x05ping");
        assert_eq!(session.check(b"\x05ping", &[0u8; 4]), Err(expected));
        assert_eq!(session.nonce_a(), 1);
    }

    #[test]
    fn test_verify_rejects_device_direction() {
        let key = SessionKey::new([0x21u8; 16]);
        let mut session = make_session();
        let wrong_dir = mic(&key, 1, Direction::DeviceToApp, b"\x05ping");
        assert!(!session.verify(b"\x05ping", &wrong_dir));
    }

    #[test]
    fn test_broadcast_nonce_per_send() {
        let mut bcast = BroadcastSession::new(SessionKey::new([0u8; 16]));
        assert_eq!(bcast.nonce(), 0);
        let a = bcast.sign(b"\x20\x10\x05");
        let b = bcast.sign(b"\x20\x10\x05");
        assert_eq!(bcast.nonce(), 2);
        assert_ne!(a, b, "nonce が変われば MIC も変わる");
    }
}
