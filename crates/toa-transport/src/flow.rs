//! フロー制御
//!
//! 送信できるのは「トランスポートが ready」かつ「送信完了待ちのパケットがない」ときだけ。
//! 送信完了通知で次のパケットを送れるようになる。

use alloc::vec::Vec;

use crate::error::TransportError;
use crate::packet::OutboundPacket;
use crate::queue::{QueueStats, ResponseQueue};

/// 送信ゲートの状態
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowControl {
    /// トランスポートが送信を受け付けるか
    ready: bool,
    /// 送信済みで完了通知待ちのパケットがあるか
    in_flight: bool,
    /// キュー溢れで破棄した応答のオペコード
    dropped: Option<u8>,
}

impl FlowControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_send(&self) -> bool {
        self.ready && !self.in_flight
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn mark_in_flight(&mut self) {
        self.in_flight = true;
    }

    /// 送信完了通知
    pub fn acknowledge(&mut self) {
        self.in_flight = false;
    }

    /// 破棄した応答を記録する（未通知のものがあれば上書き）
    pub fn note_dropped(&mut self, opcode: u8) {
        self.dropped = Some(opcode);
    }

    pub fn take_dropped(&mut self) -> Option<u8> {
        self.dropped.take()
    }

    pub fn dropped(&self) -> Option<u8> {
        self.dropped
    }
}

/// 応答キュー + フロー制御
///
/// エンジンはここに応答を積み、`next_packet` が返したパケットに MIC を付けて送る。
#[derive(Debug, Clone)]
pub struct Outbox {
    queue: ResponseQueue,
    flow: FlowControl,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Outbox {
            queue: ResponseQueue::new(capacity),
            flow: FlowControl::new(),
        }
    }

    /// 応答フレームを積む
    ///
    /// 溢れた場合は `opcode` を破棄済みとして記録し、エラーを返す。
    pub fn enqueue(&mut self, frame: Vec<u8>, opcode: u8) -> Result<(), TransportError> {
        self.queue.push(&frame).inspect_err(|e| {
            log::warn!("response 0x{:02x} dropped: {}", opcode, e);
            self.flow.note_dropped(opcode);
        })
    }

    /// 今送れるパケットを取り出す
    ///
    /// 破棄通知が残っていれば、キューより先にそれを返す。
    pub fn next_packet(&mut self) -> Option<OutboundPacket> {
        if !self.flow.can_send() {
            return None;
        }
        if let Some(opcode) = self.flow.take_dropped() {
            return Some(OutboundPacket::dropped_notice(opcode));
        }
        self.queue.pop().map(OutboundPacket::from_frame)
    }

    /// トランスポートに渡したことを記録する
    pub fn mark_in_flight(&mut self) {
        self.flow.mark_in_flight();
    }

    /// 送信完了通知
    pub fn acknowledge(&mut self) {
        self.flow.acknowledge();
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.flow.set_ready(ready);
    }

    pub fn is_ready(&self) -> bool {
        self.flow.is_ready()
    }

    pub fn is_in_flight(&self) -> bool {
        self.flow.is_in_flight()
    }

    /// リンク確立時の初期化（キューを空にし、ゲートを閉じる）
    pub fn reset(&mut self) {
        self.queue.clear();
        self.flow = FlowControl::new();
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn ready_outbox(capacity: usize) -> Outbox {
        let mut outbox = Outbox::new(capacity);
        outbox.set_ready(true);
        outbox
    }

    #[test]
    fn test_not_ready_holds_packets() {
        let mut outbox = Outbox::new(64);
        outbox.enqueue(vec![2, 0x01], 0x01).unwrap();
        assert!(outbox.next_packet().is_none());

        outbox.set_ready(true);
        assert!(outbox.next_packet().is_some());
    }

    #[test]
    fn test_single_in_flight() {
        let mut outbox = ready_outbox(64);
        outbox.enqueue(vec![2, 0x01], 0x01).unwrap();
        outbox.enqueue(vec![2, 0x02], 0x02).unwrap();

        let first = outbox.next_packet().unwrap();
        assert_eq!(first.opcode(), Some(0x01));
        outbox.mark_in_flight();

        // 完了通知までは次を出さない
        assert!(outbox.next_packet().is_none());

        outbox.acknowledge();
        let second = outbox.next_packet().unwrap();
        assert_eq!(second.opcode(), Some(0x02));
    }

    #[test]
    fn test_dropped_notice_preempts_queue() {
        // 長さ 1 + 3 バイトで満杯になる容量
        let mut outbox = ready_outbox(4);
        outbox.enqueue(vec![2, 0x01, 0xAA], 0x01).unwrap();
        assert!(outbox.enqueue(vec![2, 0x09, 0xBB], 0x09).is_err());

        let notice = outbox.next_packet().unwrap();
        assert_eq!(notice, OutboundPacket::dropped_notice(0x09));
        outbox.mark_in_flight();
        outbox.acknowledge();

        // 通知は 1 回だけ、その後は元のキュー
        let queued = outbox.next_packet().unwrap();
        assert_eq!(queued.opcode(), Some(0x01));
        outbox.mark_in_flight();
        outbox.acknowledge();
        assert!(outbox.next_packet().is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut outbox = ready_outbox(4);
        outbox.enqueue(vec![2, 0x01, 0xAA], 0x01).unwrap();
        let _ = outbox.enqueue(vec![2, 0x02, 0xAA], 0x02);
        outbox.mark_in_flight();

        outbox.reset();
        assert!(!outbox.is_ready());
        assert!(!outbox.is_in_flight());
        outbox.set_ready(true);
        assert!(outbox.next_packet().is_none());
    }
}
