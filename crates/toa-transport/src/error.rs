//! toa-transport エラー型

use thiserror::Error;

/// キュー操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// 空き容量不足
    #[error("Response queue full ({needed} bytes needed, {free} free)")]
    QueueFull { needed: usize, free: usize },
    /// 1 アイテムの長さが 255 バイトを超える
    #[error("Frame too large for queue ({0} bytes)")]
    FrameTooLarge(usize),
}
