//! 長さプレフィックス付きの有界 FIFO
//!
//! 容量はアイテム数ではなくバイト数で制限する（組み込み側の固定長バッファと同じ扱い）。

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::error::TransportError;

/// 1 アイテムの最大長（長さプレフィックスが 1 バイトのため）
const MAX_ITEM_LEN: usize = u8::MAX as usize;

/// 応答キュー
#[derive(Debug, Clone)]
pub struct ResponseQueue {
    /// `[len][bytes...]` の連続
    buf: VecDeque<u8>,
    /// 容量（バイト）
    capacity: usize,
    /// 格納中のアイテム数
    items: usize,
}

impl ResponseQueue {
    /// 容量 `capacity` バイトの空キューを作る
    pub fn new(capacity: usize) -> Self {
        ResponseQueue {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            items: 0,
        }
    }

    /// フレームを末尾に積む
    ///
    /// # エラー
    /// - `TransportError::FrameTooLarge`: 255 バイト超
    /// - `TransportError::QueueFull`: 長さ 1 バイト + フレームが空き容量を超える
    pub fn push(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if frame.len() > MAX_ITEM_LEN {
            return Err(TransportError::FrameTooLarge(frame.len()));
        }

        let needed = frame.len() + 1;
        let free = self.free();
        if needed > free {
            return Err(TransportError::QueueFull { needed, free });
        }

        self.buf.push_back(frame.len() as u8);
        self.buf.extend(frame.iter().copied());
        self.items += 1;
        Ok(())
    }

    /// 先頭のフレームを取り出す
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        let len = self.buf.pop_front()? as usize;
        let frame: Vec<u8> = self.buf.drain(..len).collect();
        self.items -= 1;
        Some(frame)
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    pub fn len(&self) -> usize {
        self.items
    }

    /// 空き容量（バイト）
    pub fn free(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// すべて破棄する（リンク再初期化時）
    pub fn clear(&mut self) {
        self.buf.clear();
        self.items = 0;
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            capacity: self.capacity,
            used: self.buf.len(),
            items: self.items,
        }
    }
}

/// キュー統計情報
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// 容量（バイト）
    pub capacity: usize,
    /// 使用中（バイト、長さプレフィックス込み）
    pub used: usize,
    /// 格納中のアイテム数
    pub items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut q = ResponseQueue::new(64);
        q.push(&[1, 1]).unwrap();
        q.push(&[2]).unwrap();
        q.push(&[3, 3, 3]).unwrap();
        assert_eq!(q.len(), 3);

        assert_eq!(q.pop(), Some(alloc::vec![1, 1]));
        assert_eq!(q.pop(), Some(alloc::vec![2]));
        assert_eq!(q.pop(), Some(alloc::vec![3, 3, 3]));
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_length_prefix_counts_against_capacity() {
        let mut q = ResponseQueue::new(10);
        // 4 + 1 = 5 バイト消費
        q.push(&[0u8; 4]).unwrap();
        assert_eq!(q.free(), 5);
        // 4 + 1 = 5 バイトはちょうど入る
        q.push(&[0u8; 4]).unwrap();
        assert_eq!(q.free(), 0);
        // 空 0 バイトフレームでも長さ 1 バイトが必要
        assert_eq!(
            q.push(&[]),
            Err(TransportError::QueueFull { needed: 1, free: 0 })
        );
    }

    #[test]
    fn test_full_then_drain_frees_space() {
        let mut q = ResponseQueue::new(8);
        q.push(&[9u8; 6]).unwrap();
        assert!(q.push(&[9u8; 2]).is_err());

        q.pop().unwrap();
        assert_eq!(q.free(), 8);
        q.push(&[9u8; 2]).unwrap();
        assert_eq!(q.stats(), QueueStats { capacity: 8, used: 3, items: 1 });
    }

    #[test]
    fn test_frame_too_large() {
        let mut q = ResponseQueue::new(1024);
        let big = [0u8; 256];
        assert_eq!(q.push(&big), Err(TransportError::FrameTooLarge(256)));
    }

    #[test]
    fn test_clear() {
        let mut q = ResponseQueue::new(32);
        q.push(&[1, 2, 3]).unwrap();
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.free(), 32);
    }
}
