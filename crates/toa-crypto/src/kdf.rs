//! HMAC-SHA256 ベースの鍵導出
//!
//! すべての導出は 32 バイト固定長のメッセージに対する HMAC-SHA256 を
//! 必要な長さに切り詰めたもの。入力が足りない部分はゼロ埋めされる。

use hmac::digest::Key;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::session::SessionKey;
use crate::{
    ACO_LEN, AUTH_KEY_LEN, AUTH_RAND_T_LEN, RAND_A_LEN, RAND_T_FIXED_LEN, RAND_T_LEN,
    SESSION_KEY_LEN, SRES_LEN, TILE_ID_LEN, TOKEN_LEN,
};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 の入力ブロック長
const HMAC_BLOCK_LEN: usize = 64;

/// 導出に使うメッセージ長
pub(crate) const KDF_MSG_LEN: usize = 32;

/// デバイスの長期認証鍵（16 バイト）
///
/// Drop 時にゼロクリアされる。
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AuthKey([u8; AUTH_KEY_LEN]);

impl AuthKey {
    pub fn new(bytes: [u8; AUTH_KEY_LEN]) -> Self {
        AuthKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; AUTH_KEY_LEN] {
        &self.0
    }
}

impl core::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AuthKey(..)")
    }
}

/// `device_auth` の出力
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DeviceAuth {
    /// アプリに返す署名応答
    pub sres_t: [u8; SRES_LEN],
    /// 認証相関出力（アソシエーション時の代替セッション鍵導出に使う）
    pub aco: [u8; ACO_LEN],
}

impl core::fmt::Debug for DeviceAuth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceAuth")
            .field("sres_t", &self.sres_t)
            .finish_non_exhaustive()
    }
}

/// 16 バイト鍵で 32 バイトメッセージの HMAC-SHA256 を計算する
pub(crate) fn hmac_sha256(key: &[u8; 16], msg: &[u8; KDF_MSG_LEN]) -> [u8; 32] {
    // HMAC はブロック長未満の鍵をゼロ埋めして使う。先に 64 バイトへ広げても結果は同じ
    let mut block = Zeroizing::new([0u8; HMAC_BLOCK_LEN]);
    block[..key.len()].copy_from_slice(key);

    let mut mac = <HmacSha256 as Mac>::new(Key::<HmacSha256>::from_slice(&block[..]));
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

/// HMAC 出力の先頭 16 バイトを鍵として切り出す
fn truncate_key(mac: &[u8; 32]) -> SessionKey {
    let mut key = [0u8; SESSION_KEY_LEN];
    key.copy_from_slice(&mac[..SESSION_KEY_LEN]);
    SessionKey::new(key)
}

/// チャレンジレスポンス認証（AUTHENTICATE / ASSOCIATE）
///
/// ```text
/// msg[0..14]  = randA
/// msg[14..16] = 0
/// msg[16..26] = randT
/// msg[26..32] = 0
/// sresT = mac[4..8], aco = mac[8..32]
/// ```
pub fn device_auth(
    auth_key: &AuthKey,
    rand_a: &[u8; RAND_A_LEN],
    rand_t: &[u8; AUTH_RAND_T_LEN],
) -> DeviceAuth {
    let mut msg = Zeroizing::new([0u8; KDF_MSG_LEN]);
    msg[..RAND_A_LEN].copy_from_slice(rand_a);
    msg[16..16 + AUTH_RAND_T_LEN].copy_from_slice(rand_t);

    let mut mac = hmac_sha256(auth_key.as_bytes(), &msg);

    let mut out = DeviceAuth {
        sres_t: [0u8; SRES_LEN],
        aco: [0u8; ACO_LEN],
    };
    out.sres_t.copy_from_slice(&mac[4..8]);
    out.aco.copy_from_slice(&mac[8..32]);
    mac.zeroize();
    out
}

/// チャンネルごとのセッション鍵を導出する
///
/// ```text
/// msg = randA[14] ‖ randT[13] ‖ cid[1] ‖ token[4]   (32 bytes)
/// ```
pub fn session_key(
    auth_key: &AuthKey,
    rand_a: &[u8; RAND_A_LEN],
    rand_t: &[u8; RAND_T_LEN],
    cid: u8,
    token: &[u8; TOKEN_LEN],
) -> SessionKey {
    let mut msg = Zeroizing::new([0u8; KDF_MSG_LEN]);
    msg[..RAND_A_LEN].copy_from_slice(rand_a);
    msg[RAND_A_LEN..RAND_A_LEN + RAND_T_LEN].copy_from_slice(rand_t);
    msg[RAND_A_LEN + RAND_T_LEN] = cid;
    msg[RAND_A_LEN + RAND_T_LEN + 1..].copy_from_slice(token);

    let mut mac = hmac_sha256(auth_key.as_bytes(), &msg);
    let key = truncate_key(&mac);
    mac.zeroize();
    key
}

/// リンク全体で共有するブロードキャスト鍵を導出する
///
/// ```text
/// msg = randT_fixed[10] ‖ tile_id[8] ‖ 0×14
/// ```
pub fn broadcast_key(
    auth_key: &AuthKey,
    rand_t: &[u8; RAND_T_FIXED_LEN],
    tile_id: &[u8; TILE_ID_LEN],
) -> SessionKey {
    let mut msg = Zeroizing::new([0u8; KDF_MSG_LEN]);
    msg[..RAND_T_FIXED_LEN].copy_from_slice(rand_t);
    msg[RAND_T_FIXED_LEN..RAND_T_FIXED_LEN + TILE_ID_LEN].copy_from_slice(tile_id);

    let mut mac = hmac_sha256(auth_key.as_bytes(), &msg);
    let key = truncate_key(&mac);
    mac.zeroize();
    key
}

/// aco からアソシエーション用セッション鍵を導出する
///
/// ```text
/// msg = aco[24] ‖ tile_id[8]
/// ```
pub fn assoc_session_key(
    auth_key: &AuthKey,
    aco: &[u8; ACO_LEN],
    tile_id: &[u8; TILE_ID_LEN],
) -> SessionKey {
    let mut msg = Zeroizing::new([0u8; KDF_MSG_LEN]);
    msg[..ACO_LEN].copy_from_slice(aco);
    msg[ACO_LEN..].copy_from_slice(tile_id);

    let mut mac = hmac_sha256(auth_key.as_bytes(), &msg);
    let key = truncate_key(&mac);
    mac.zeroize();
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    /// HMAC-SHA256(key = 0×16, msg = 0×32)
    const ZERO_MAC: [u8; 32] = [
        0x33, 0xad, 0x0a, 0x1c, 0x60, 0x7e, 0xc0, 0x3b, 0x09, 0xe6, 0xcd, 0x98, 0x93, 0x68, 0x0c,
        0xe2, 0x10, 0xad, 0xf3, 0x00, 0xaa, 0x1f, 0x26, 0x60, 0xe1, 0xb2, 0x2e, 0x10, 0xf1, 0x70,
        0xf9, 0x2a,
    ];

    #[test]
    fn test_hmac_zero_vector() {
        assert_eq!(hmac_sha256(&[0u8; 16], &[0u8; 32]), ZERO_MAC);
    }

    #[test]
    fn test_device_auth_golden_vector() {
        // auth_key / randA / randT がすべてゼロなら msg もすべてゼロ
        let out = device_auth(&AuthKey::new([0u8; 16]), &[0u8; 14], &[0u8; 10]);
        assert_eq!(out.sres_t, [0x60, 0x7e, 0xc0, 0x3b]);
        assert_eq!(&out.aco[..], &ZERO_MAC[8..32]);
    }

    #[test]
    fn test_device_auth_deterministic() {
        let key = AuthKey::new([0x42u8; 16]);
        let a = device_auth(&key, &[1u8; 14], &[2u8; 10]);
        let b = device_auth(&key, &[1u8; 14], &[2u8; 10]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_device_auth_distinct_challenges() {
        let key = AuthKey::new([0x42u8; 16]);
        let base = device_auth(&key, &[1u8; 14], &[2u8; 10]);
        let other_a = device_auth(&key, &[3u8; 14], &[2u8; 10]);
        let other_t = device_auth(&key, &[1u8; 14], &[4u8; 10]);
        assert_ne!(base.sres_t, other_a.sres_t, "randA が違えば sresT も違うはず");
        assert_ne!(base.sres_t, other_t.sres_t, "randT が違えば sresT も違うはず");
    }

    #[test]
    fn test_session_key_zero_inputs() {
        // すべてゼロの入力はゼロメッセージになる
        let key = session_key(&AuthKey::new([0u8; 16]), &[0u8; 14], &[0u8; 13], 0, &[0u8; 4]);
        assert_eq!(key.as_bytes(), &ZERO_MAC[..16]);
    }

    #[test]
    fn test_session_key_binds_cid_and_token() {
        let auth = AuthKey::new([7u8; 16]);
        let k2 = session_key(&auth, &[1u8; 14], &[2u8; 13], 2, &[9u8; 4]);
        let k3 = session_key(&auth, &[1u8; 14], &[2u8; 13], 3, &[9u8; 4]);
        let k2b = session_key(&auth, &[1u8; 14], &[2u8; 13], 2, &[8u8; 4]);
        assert_ne!(k2.as_bytes(), k3.as_bytes());
        assert_ne!(k2.as_bytes(), k2b.as_bytes());
    }

    #[test]
    fn test_broadcast_key_zero_inputs() {
        let key = broadcast_key(&AuthKey::new([0u8; 16]), &[0u8; 10], &[0u8; 8]);
        assert_eq!(key.as_bytes(), &ZERO_MAC[..16]);
    }

    #[test]
    fn test_broadcast_key_depends_on_tile_id() {
        let auth = AuthKey::new([5u8; 16]);
        let a = broadcast_key(&auth, &[1u8; 10], &[1u8; 8]);
        let b = broadcast_key(&auth, &[1u8; 10], &[2u8; 8]);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_assoc_session_key_zero_inputs() {
        let key = assoc_session_key(&AuthKey::new([0u8; 16]), &[0u8; 24], &[0u8; 8]);
        assert_eq!(key.as_bytes(), &ZERO_MAC[..16]);
    }

    #[test]
    fn test_auth_key_debug_hides_material() {
        let key = AuthKey::new([0xAB; 16]);
        let s = alloc::format!("{:?}", key);
        assert!(!s.contains("171"), "鍵の値がデバッグ出力に漏れている");
    }
}
