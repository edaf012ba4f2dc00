//! TOFU イメージ署名検証（secp256k1 ECDSA）
//!
//! 署名対象はイメージ全体の SHA-256（prehash）。署名は r ‖ s の 64 バイト。
//! 公開鍵は以下のいずれかを受け付ける:
//!
//! ```text
//! 64 bytes: X ‖ Y（raw、0x04 プレフィックスなし）
//! 65 bytes: 0x04 ‖ X ‖ Y（SEC1 非圧縮）
//! 33 bytes: 0x02/0x03 ‖ X（SEC1 圧縮）
//! ```

use alloc::vec::Vec;

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};

use crate::error::CryptoError;

/// raw 公開鍵の長さ（X ‖ Y）
const RAW_PUBLIC_KEY_LEN: usize = 64;

/// ファームウェア署名検証用の公開鍵
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// raw / SEC1 形式の公開鍵を読み込む
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key = if bytes.len() == RAW_PUBLIC_KEY_LEN {
            let mut sec1 = Vec::with_capacity(RAW_PUBLIC_KEY_LEN + 1);
            sec1.push(0x04);
            sec1.extend_from_slice(bytes);
            VerifyingKey::from_sec1_bytes(&sec1)
        } else {
            VerifyingKey::from_sec1_bytes(bytes)
        };
        key.map(PublicKey).map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Base64（URL-safe, パディングなし）の公開鍵を読み込む
    pub fn from_base64(b64: &str) -> Result<Self, CryptoError> {
        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(b64)
            .map_err(|_| CryptoError::InvalidBase64)?;
        Self::from_bytes(&bytes)
    }

    /// SEC1 非圧縮形式（65 バイト）で返す
    pub fn to_sec1_uncompressed(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }
}

/// イメージハッシュに対する署名を検証する
///
/// 署名のフォーマット不正も「検証失敗」として false を返す。
pub fn verify_signature(public_key: &PublicKey, hash: &[u8; 32], signature: &[u8; 64]) -> bool {
    let Ok(sig) = Signature::from_slice(signature) else {
        return false;
    };
    public_key.0.verify_prehash(hash, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::SigningKey;

    fn signing_key(seed: u8) -> SigningKey {
        SigningKey::from_slice(&[seed; 32]).unwrap()
    }

    fn sign(sk: &SigningKey, hash: &[u8; 32]) -> [u8; 64] {
        let sig: Signature = sk.sign_prehash(hash).unwrap();
        let mut out = [0u8; 64];
        out.copy_from_slice(&sig.to_bytes());
        out
    }

    fn raw_public_key(sk: &SigningKey) -> Vec<u8> {
        // 0x04 を除いた X ‖ Y
        sk.verifying_key().to_encoded_point(false).as_bytes()[1..].to_vec()
    }

    #[test]
    fn test_verify_valid_signature_raw_key() {
        let sk = signing_key(0x11);
        let hash = [0xA5u8; 32];
        let sig = sign(&sk, &hash);

        let pk = PublicKey::from_bytes(&raw_public_key(&sk)).unwrap();
        assert!(verify_signature(&pk, &hash, &sig));
    }

    #[test]
    fn test_verify_valid_signature_sec1_compressed() {
        let sk = signing_key(0x12);
        let hash = [0x5Au8; 32];
        let sig = sign(&sk, &hash);

        let compressed = sk.verifying_key().to_encoded_point(true);
        let pk = PublicKey::from_bytes(compressed.as_bytes()).unwrap();
        assert!(verify_signature(&pk, &hash, &sig));
        assert_eq!(pk.to_sec1_uncompressed().len(), 65);
    }

    #[test]
    fn test_verify_wrong_key_fails() {
        let hash = [0x01u8; 32];
        let sig = sign(&signing_key(0x21), &hash);
        let other = PublicKey::from_bytes(&raw_public_key(&signing_key(0x22))).unwrap();
        assert!(!verify_signature(&other, &hash, &sig));
    }

    #[test]
    fn test_verify_tampered_hash_fails() {
        let sk = signing_key(0x31);
        let mut hash = [0x01u8; 32];
        let sig = sign(&sk, &hash);
        hash[0] ^= 0x80;
        let pk = PublicKey::from_bytes(&raw_public_key(&sk)).unwrap();
        assert!(!verify_signature(&pk, &hash, &sig));
    }

    #[test]
    fn test_zero_signature_rejected() {
        let pk = PublicKey::from_bytes(&raw_public_key(&signing_key(0x41))).unwrap();
        assert!(!verify_signature(&pk, &[0u8; 32], &[0u8; 64]));
    }

    #[test]
    fn test_invalid_public_key() {
        assert_eq!(
            PublicKey::from_bytes(&[0u8; 64]),
            Err(CryptoError::InvalidPublicKey)
        );
        assert_eq!(
            PublicKey::from_bytes(&[1u8; 10]),
            Err(CryptoError::InvalidPublicKey)
        );
    }

    #[test]
    fn test_public_key_from_base64() {
        use base64::Engine as _;
        let sk = signing_key(0x51);
        let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw_public_key(&sk));
        let pk = PublicKey::from_base64(&b64).unwrap();
        assert_eq!(pk, PublicKey::from_bytes(&raw_public_key(&sk)).unwrap());
        assert_eq!(PublicKey::from_base64("!!"), Err(CryptoError::InvalidBase64));
    }
}
