//! # toa-transport
//!
//! 送信側トランスポート層の実装。
//!
//! 全チャンネルで共有する応答キューと、送信中 1 パケットだけを許すフロー制御を担当する。
//!
//! ## キューの内部形式
//!
//! ```text
//! [len:1][frame:len][len:1][frame:len]...
//!   ↑ 容量はバイト単位。1 アイテムは長さ 1 バイト + フレーム長を消費する
//! ```
//!
//! ## 送信ループ
//!
//! ```text
//! enqueue → (ready && !in_flight) → dequeue → MIC 付与 → transport.send
//!                   ↑                                         │
//!                   └──────────── 送信完了通知 (ack) ──────────┘
//! ```
//!
//! キューが溢れた場合は破棄した応答のオペコードを覚えておき、次の送信機会に
//! ブロードキャストの DROPPED_RSP エラーを割り込ませる。

#![no_std]
extern crate alloc;

pub mod error;
pub mod flow;
pub mod packet;
pub mod queue;

pub use error::TransportError;
pub use flow::{FlowControl, Outbox};
pub use packet::OutboundPacket;
pub use queue::{QueueStats, ResponseQueue};

/// セッションチャンネル数から既定のキュー容量（バイト）を求める
pub const fn default_queue_size(num_channels: usize) -> usize {
    100 + 40 * num_channels.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_queue_size() {
        assert_eq!(default_queue_size(1), 100);
        assert_eq!(default_queue_size(8), 380);
    }
}
