//! 機能ハンドラーの登録とディスパッチ
//!
//! TOFU などの上位機能は `FeatureHandler` を実装してエンジンに登録する。
//! エンジンはオペコードで登録済みハンドラーを引き、機能ビットが立っていれば
//! `&mut Link` を渡して処理させる。
//!
//! ```text
//! command_received
//!   └─ MIC 検証 ─┬─ READY / CLOSE_CHANNEL / TKA  → エンジン内で処理
//!                └─ その他 → FeatureRegistry::channel_handler(opcode)
//!                               ├─ 機能ビット OFF → UNSUPPORTED
//!                               └─ handler.process(link, cid, opcode, payload)
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;

use toa_proto::opcode::command;
use toa_proto::{ErrorCode, Feature, Token};

use crate::error::EngineError;
use crate::link::Link;

/// エンジン自身が処理するオペコード
const RESERVED_COMMANDS: [u8; 6] = [
    command::READY,
    command::CLOSE_CHANNEL,
    command::TKA,
    command::OPEN_CHANNEL,
    command::AUTHENTICATE,
    command::ASSOCIATE,
];

/// 上位機能のハンドラー
pub trait FeatureHandler: Any {
    /// 対応する機能ビット
    fn feature(&self) -> Feature;

    /// セッションチャンネルで受け付けるオペコード
    fn channel_commands(&self) -> &'static [u8];

    /// コネクションレスで受け付けるオペコード
    fn connectionless_commands(&self) -> &'static [u8] {
        &[]
    }

    /// MIC 検証済みのチャンネルコマンド（payload は 1 バイト以上）
    fn process(&mut self, link: &mut Link, cid: u8, command: u8, payload: &[u8]);

    fn process_connectionless(
        &mut self,
        link: &mut Link,
        token: &Token,
        command: u8,
        _payload: &[u8],
    ) {
        link.send_connectionless_error(token, ErrorCode::Unsupported, command);
    }

    /// 新しいリンクの確立時
    fn link_init(&mut self, _link: &mut Link) {}

    /// チャンネルが解放された
    fn channel_unassigned(&mut self, _link: &mut Link, _cid: u8) {}

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 登録済みハンドラーの一覧
#[derive(Default)]
pub struct FeatureRegistry {
    handlers: Vec<Box<dyn FeatureHandler>>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        FeatureRegistry::default()
    }

    /// ハンドラーを登録する
    ///
    /// # エラー
    /// - `EngineError::DuplicateCommand`: オペコードが予約済みか、既に他のハンドラーが持っている
    pub fn register(&mut self, handler: Box<dyn FeatureHandler>) -> Result<(), EngineError> {
        let commands = handler
            .channel_commands()
            .iter()
            .chain(handler.connectionless_commands());
        for &opcode in commands {
            if RESERVED_COMMANDS.contains(&opcode)
                || self.channel_handler_index(opcode).is_some()
                || self.connectionless_handler_index(opcode).is_some()
            {
                return Err(EngineError::DuplicateCommand(opcode));
            }
        }
        log::debug!("registered {:?} handler", handler.feature());
        self.handlers.push(handler);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// チャンネルコマンドのハンドラー
    pub fn channel_handler(&mut self, opcode: u8) -> Option<&mut Box<dyn FeatureHandler>> {
        let i = self.channel_handler_index(opcode)?;
        self.handlers.get_mut(i)
    }

    /// コネクションレスコマンドのハンドラー
    pub fn connectionless_handler(&mut self, opcode: u8) -> Option<&mut Box<dyn FeatureHandler>> {
        let i = self.connectionless_handler_index(opcode)?;
        self.handlers.get_mut(i)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn FeatureHandler>> {
        self.handlers.iter_mut()
    }

    /// 型でハンドラーを引く
    pub fn get_mut<H: FeatureHandler>(&mut self) -> Option<&mut H> {
        self.handlers
            .iter_mut()
            .find_map(|h| h.as_any_mut().downcast_mut::<H>())
    }

    // ===== Private メソッド =====

    fn channel_handler_index(&self, opcode: u8) -> Option<usize> {
        self.handlers
            .iter()
            .position(|h| h.channel_commands().contains(&opcode))
    }

    fn connectionless_handler_index(&self, opcode: u8) -> Option<usize> {
        self.handlers
            .iter()
            .position(|h| h.connectionless_commands().contains(&opcode))
    }
}
