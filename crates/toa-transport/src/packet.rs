//! 送信パケット
//!
//! キューから取り出したフレームに送信直前の加工（nonce の埋め込み、MIC 付与）を施す。
//!
//! ## Wire Format
//! ```text
//! [cid][opcode][payload...]          キュー内
//! [cid][opcode][payload...][mic:4]   送信時（CID 0 以外）
//! ```

use alloc::vec::Vec;

use toa_proto::opcode::response;
use toa_proto::{ErrorCode, BROADCAST_CID, MIC_LEN};

/// 送信パケット
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    bytes: Vec<u8>,
}

impl OutboundPacket {
    /// キューから取り出したフレームを包む
    pub fn from_frame(bytes: Vec<u8>) -> Self {
        OutboundPacket { bytes }
    }

    /// キュー溢れを通知するブロードキャストエラー
    ///
    /// ```text
    /// [1][RSP_ERROR][DROPPED_RSP][dropped opcode]
    /// ```
    pub fn dropped_notice(dropped_opcode: u8) -> Self {
        let mut bytes = Vec::with_capacity(4 + MIC_LEN);
        bytes.push(BROADCAST_CID);
        bytes.push(response::ERROR);
        bytes.push(ErrorCode::DroppedResponse.as_u8());
        bytes.push(dropped_opcode);
        OutboundPacket { bytes }
    }

    pub fn cid(&self) -> u8 {
        self.bytes.first().copied().unwrap_or_default()
    }

    /// 応答オペコード（CID 0 以外のフレーム）
    pub fn opcode(&self) -> Option<u8> {
        self.bytes.get(1).copied()
    }

    /// MIC が覆う部分（CID を除く）
    pub fn body(&self) -> &[u8] {
        self.bytes.get(1..).unwrap_or(&[])
    }

    /// `offset` から `data` を上書きする。範囲外なら何もしない
    pub fn patch(&mut self, offset: usize, data: &[u8]) -> bool {
        match self.bytes.get_mut(offset..offset + data.len()) {
            Some(slot) => {
                slot.copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    /// 末尾に MIC を付ける
    pub fn seal(&mut self, mic: &[u8; MIC_LEN]) {
        self.bytes.extend_from_slice(mic);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_notice_layout() {
        let p = OutboundPacket::dropped_notice(0x02);
        assert_eq!(p.as_bytes(), &[BROADCAST_CID, response::ERROR, 0x11, 0x02]);
        assert_eq!(p.body(), &[response::ERROR, 0x11, 0x02]);
    }

    #[test]
    fn test_patch_and_seal() {
        let mut p = OutboundPacket::from_frame(alloc::vec![2, 0x01, 14, 0, 0, 0, 0, 0, 0, 0]);
        assert!(p.patch(6, &7u32.to_le_bytes()));
        assert_eq!(&p.as_bytes()[6..10], &[7, 0, 0, 0]);
        assert!(!p.patch(8, &[0u8; 4]), "範囲外の上書きは拒否する");

        p.seal(&[0xAA; 4]);
        assert_eq!(p.len(), 14);
        assert_eq!(&p.as_bytes()[10..], &[0xAA; 4]);
    }

    #[test]
    fn test_accessors_on_short_frame() {
        let p = OutboundPacket::from_frame(alloc::vec![3]);
        assert_eq!(p.cid(), 3);
        assert_eq!(p.opcode(), None);
        assert!(p.body().is_empty());
    }
}
