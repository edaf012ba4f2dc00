//! # toa-proto
//!
//! TOA のワイヤーフォーマット定義。
//!
//! オペコード・エラーコード・フレームの組み立て/解析・TOFU イメージヘッダーを扱う。
//! 暗号処理（MIC の計算）は `toa-crypto` が担当し、このクレートはバイト配置だけを知っている。
//!
//! ## フレーム形式（マルチバイトは LE）
//!
//! ```text
//! コネクションレス (CID 0):  [0][token:4][opcode][payload...]          MIC なし
//! ブロードキャスト (CID 1):  [1][opcode][payload...][mic:4]            broadcast 鍵
//! セッション (CID 2..):      [cid][opcode][payload...][mic:4]          チャンネル鍵
//! ```
//!
//! ## エラー応答
//!
//! ```text
//! [RSP_ERROR][error_code][command](param)
//! ```

#![no_std]
extern crate alloc;

pub mod code;
pub mod error;
pub mod feature;
pub mod frame;
pub mod opcode;
pub mod tka;
pub mod tofu;

pub use code::{CloseReason, ErrorCode};
pub use error::ProtoError;
pub use feature::{Capabilities, Feature};
pub use frame::{encode_channel, encode_connectionless, split_mic, InboundFrame, Token};
pub use tofu::ImageHeader;

pub use toa_crypto::{MIC_LEN, TOKEN_LEN};

/// コネクションレスチャンネル（認証前、MIC なし）
pub const CONNECTIONLESS_CID: u8 = 0;

/// ブロードキャストチャンネル（broadcast 鍵で MIC を付ける）
pub const BROADCAST_CID: u8 = 1;

/// 最初のセッションチャンネル
pub const FIRST_SESSION_CID: u8 = 2;

/// セッションチャンネル数の上限
pub const MAX_SESSION_CHANNELS: usize = 8;

/// 1 応答あたりの最大ペイロード長（opcode を除く）
pub const MPS: usize = 14;

/// AUTHORIZED 通知に使うトークン（全アプリ宛て）
pub const BROADCAST_TOKEN: Token = [0xFF; TOKEN_LEN];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_layout() {
        assert_eq!(CONNECTIONLESS_CID, 0);
        assert_eq!(BROADCAST_CID, 1);
        assert_eq!(FIRST_SESSION_CID as usize + MAX_SESSION_CHANNELS - 1, 9);
    }

    #[test]
    fn test_mps_fits_in_mic_window() {
        // セッション MIC は opcode + payload の先頭 22 バイトまでを覆う
        assert!(1 + MPS <= 22);
    }
}
