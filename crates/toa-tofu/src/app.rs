//! アプリケーション側のコールバック

use toa_proto::ErrorCode;

/// フラッシュ書き込みなどを担うアプリケーション
///
/// `block_ready` と `complete` は非同期処理の開始だけを行い、
/// 結果は `TofuEngine::block_done` / `TofuEngine::complete_done` で返す。
pub trait TofuApp {
    /// 新しい転送の開始（領域の消去など）
    fn begin(&mut self) -> Result<(), ErrorCode>;

    /// CRC 検証済みブロック（CRC16 を除く）の書き込み要求
    ///
    /// `offset` はイメージ先頭からの位置。最初のブロックはヘッダーを含む。
    fn block_ready(&mut self, offset: u32, block: &[u8]);

    /// イメージ全体の検証が済んだ。適用準備を始める
    fn complete(&mut self);
}
