//! エラーコードとチャンネルクローズ理由

/// エラー応答で返すコード
///
/// プロトコル上の失敗はすべてこのコードで応答され、プロセスを止めることはない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    /// 未知のコマンド / 無効な機能
    Unsupported = 0x01,
    /// 引数の不足・範囲外
    Parameters = 0x02,
    /// 現在の状態では受け付けられない
    InvalidState = 0x03,
    /// 共有リソースを別チャンネルが使用中
    ResourceInUse = 0x04,
    /// ペイロードが宣言長・バッファ長を超えた
    DataLength = 0x05,
    /// 宣言サイズが不正
    InvalidSize = 0x06,
    /// 保存後の整合性チェック失敗
    Crc = 0x07,
    /// 受信直後のブロック CRC 失敗
    Crc2 = 0x08,
    /// イメージハッシュ不一致
    Hash = 0x09,
    /// 署名検証失敗 / 公開鍵なし
    Signature = 0x0A,
    /// 実行中ファームウェアと同じバージョン
    SameImage = 0x0B,
    /// イメージヘッダー不正
    ImageHeader = 0x0C,
    /// ストレージ読み出し失敗
    MemRead = 0x0D,
    /// ストレージ書き込み失敗
    MemWrite = 0x0E,
    /// アプリ側認可の拒否（サブタイプ付き）
    Authorization = 0x0F,
    /// 空きチャンネルなし
    NoCidAvailable = 0x10,
    /// キュー溢れで応答を破棄した
    DroppedResponse = 0x11,
}

impl ErrorCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        use ErrorCode::*;
        let code = match value {
            0x01 => Unsupported,
            0x02 => Parameters,
            0x03 => InvalidState,
            0x04 => ResourceInUse,
            0x05 => DataLength,
            0x06 => InvalidSize,
            0x07 => Crc,
            0x08 => Crc2,
            0x09 => Hash,
            0x0A => Signature,
            0x0B => SameImage,
            0x0C => ImageHeader,
            0x0D => MemRead,
            0x0E => MemWrite,
            0x0F => Authorization,
            0x10 => NoCidAvailable,
            0x11 => DroppedResponse,
            _ => return None,
        };
        Some(code)
    }
}

/// CLOSE_CHANNEL 応答の先頭バイト
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CloseReason {
    /// MIC 検証失敗。payload = nonceT (LE32) ‖ デバイスが期待した MIC
    MicFailure = 0x01,
    /// キープアライブ応答なし
    KeepAliveMissing = 0x02,
}

impl CloseReason {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_roundtrip_all() {
        for v in 0x01..=0x11u8 {
            let code = ErrorCode::from_u8(v).unwrap();
            assert_eq!(code.as_u8(), v);
        }
        assert_eq!(ErrorCode::from_u8(0x00), None);
        assert_eq!(ErrorCode::from_u8(0x12), None);
    }
}
