//! フレームの解析と組み立て
//!
//! 受信フレームは CID で 3 種類に振り分ける。MIC の検証自体はエンジン側の責務で、
//! ここでは `[opcode][payload]` と末尾 4 バイトの MIC を切り分けるだけ。

use alloc::vec::Vec;

use crate::error::ProtoError;
use crate::{BROADCAST_CID, CONNECTIONLESS_CID, MIC_LEN, TOKEN_LEN};

/// コネクションレス要求と応答を対応付けるトークン
pub type Token = [u8; TOKEN_LEN];

/// 受信フレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame<'a> {
    /// `[0][token:4][command][payload...]`
    Connectionless {
        token: Token,
        command: u8,
        payload: &'a [u8],
    },
    /// ブロードキャスト CID 宛て（アプリからは送られないので破棄対象）
    Broadcast { sealed: &'a [u8] },
    /// `[cid][command][payload...][mic:4]`（MIC 未検証）
    Channel { cid: u8, sealed: &'a [u8] },
}

impl<'a> InboundFrame<'a> {
    /// 受信バイト列を CID で振り分ける
    ///
    /// # エラー
    /// - `ProtoError::Empty`: 0 バイト
    /// - `ProtoError::TooShort`: コネクションレスでトークン + コマンドに満たない
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ProtoError> {
        let (&cid, rest) = bytes.split_first().ok_or(ProtoError::Empty)?;

        match cid {
            CONNECTIONLESS_CID => {
                if rest.len() < TOKEN_LEN + 1 {
                    return Err(ProtoError::TooShort {
                        len: bytes.len(),
                        min: 1 + TOKEN_LEN + 1,
                    });
                }
                let mut token = [0u8; TOKEN_LEN];
                token.copy_from_slice(&rest[..TOKEN_LEN]);
                Ok(InboundFrame::Connectionless {
                    token,
                    command: rest[TOKEN_LEN],
                    payload: &rest[TOKEN_LEN + 1..],
                })
            }
            BROADCAST_CID => Ok(InboundFrame::Broadcast { sealed: rest }),
            cid => Ok(InboundFrame::Channel { cid, sealed: rest }),
        }
    }
}

/// `[opcode][payload...][mic:4]` を本文と MIC に分ける
///
/// 本文（opcode を含む）が 1 バイト未満なら `None`。
pub fn split_mic(sealed: &[u8]) -> Option<(&[u8], &[u8])> {
    if sealed.len() < MIC_LEN + 1 {
        return None;
    }
    Some(sealed.split_at(sealed.len() - MIC_LEN))
}

/// コネクションレス応答 `[0][token][opcode][payload]` を組み立てる
///
/// payload は `max_payload` バイトに切り詰める。
pub fn encode_connectionless(
    token: &Token,
    opcode: u8,
    payload: &[u8],
    max_payload: usize,
) -> Vec<u8> {
    let len = payload.len().min(max_payload);
    let mut frame = Vec::with_capacity(1 + TOKEN_LEN + 1 + len);
    frame.push(CONNECTIONLESS_CID);
    frame.extend_from_slice(token);
    frame.push(opcode);
    frame.extend_from_slice(&payload[..len]);
    frame
}

/// チャンネル応答 `[cid][opcode][payload]` を組み立てる（MIC は送信時に付ける）
///
/// payload は `max_payload` バイトに切り詰める。
pub fn encode_channel(cid: u8, opcode: u8, payload: &[u8], max_payload: usize) -> Vec<u8> {
    let len = payload.len().min(max_payload);
    let mut frame = Vec::with_capacity(2 + len + MIC_LEN);
    frame.push(cid);
    frame.push(opcode);
    frame.extend_from_slice(&payload[..len]);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connectionless() {
        let bytes = [0u8, 1, 2, 3, 4, 0x10, 0xAA, 0xBB];
        let frame = InboundFrame::parse(&bytes).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Connectionless {
                token: [1, 2, 3, 4],
                command: 0x10,
                payload: &[0xAA, 0xBB],
            }
        );
    }

    #[test]
    fn test_parse_connectionless_too_short() {
        let result = InboundFrame::parse(&[0u8, 1, 2, 3, 4]);
        assert_eq!(result, Err(ProtoError::TooShort { len: 5, min: 6 }));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(InboundFrame::parse(&[]), Err(ProtoError::Empty));
    }

    #[test]
    fn test_parse_channel_and_split() {
        let bytes = [3u8, 0x01, 0x42, 9, 9, 9, 9];
        let InboundFrame::Channel { cid, sealed } = InboundFrame::parse(&bytes).unwrap() else {
            panic!("チャンネルフレームになるはず");
        };
        assert_eq!(cid, 3);
        let (body, mic) = split_mic(sealed).unwrap();
        assert_eq!(body, &[0x01, 0x42]);
        assert_eq!(mic, &[9, 9, 9, 9]);
    }

    #[test]
    fn test_split_mic_needs_opcode() {
        assert_eq!(split_mic(&[1, 2, 3, 4]), None);
        assert!(split_mic(&[0x01, 1, 2, 3, 4]).is_some());
    }

    #[test]
    fn test_encode_truncates_to_max_payload() {
        let frame = encode_channel(2, 0x01, &[7u8; 20], 14);
        assert_eq!(frame.len(), 2 + 14);
        assert_eq!(frame[0], 2);
        assert_eq!(frame[1], 0x01);

        let frame = encode_connectionless(&[1, 2, 3, 4], 0x10, &[7u8; 20], 14);
        assert_eq!(frame.len(), 1 + 4 + 1 + 14);
        assert_eq!(&frame[..6], &[0, 1, 2, 3, 4, 0x10]);
    }
}
