//! 機能（フィーチャー）ビットマップ
//!
//! READY 応答で 3 バイト（24 ビット）の LE ビットマップとしてアプリに通知する。

/// TOA の機能ビット
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Feature {
    /// TOA 本体（常に有効）
    Tma = 0,
    /// ファームウェア更新
    Tofu = 1,
    /// ダブルタップ検出
    Tdt = 2,
    /// メロディー再生
    Song = 3,
    /// アドバタイズ間隔
    AdvInt = 4,
    /// キープアライブ（常に有効）
    Tka = 5,
    /// 診断ログ
    Tdg = 6,
    /// モード設定
    Tmd = 7,
    /// 接続パラメータ更新
    Tcu = 8,
    /// 時刻
    Time = 9,
    /// テストコマンド
    Test = 10,
    /// 電力制御
    Tpc = 11,
    /// RSSI レポート
    Trm = 12,
    /// 診断情報（コネクションレス）
    Tdi = 13,
    /// 製造コマンド（コネクションレス）
    Tmf = 14,
}

impl Feature {
    pub fn bit(self) -> u32 {
        1u32 << (self as u8)
    }
}

/// 機能ビットマップ（24 ビット）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    const MASK: u32 = 0x00FF_FFFF;

    pub fn new() -> Self {
        Capabilities(0)
    }

    pub fn set(&mut self, feature: Feature) {
        self.0 |= feature.bit();
    }

    pub fn clear(&mut self, feature: Feature) {
        self.0 &= !feature.bit();
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    /// ワイヤー上の 3 バイト表現（LE）
    pub fn to_bytes(&self) -> [u8; 3] {
        let b = (self.0 & Self::MASK).to_le_bytes();
        [b[0], b[1], b[2]]
    }

    pub fn bits(&self) -> u32 {
        self.0 & Self::MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_clear_contains() {
        let mut caps = Capabilities::new();
        assert!(!caps.contains(Feature::Tofu));

        caps.set(Feature::Tofu);
        caps.set(Feature::Tmf);
        assert!(caps.contains(Feature::Tofu));
        assert!(caps.contains(Feature::Tmf));
        assert!(!caps.contains(Feature::Song));

        caps.clear(Feature::Tofu);
        assert!(!caps.contains(Feature::Tofu));
    }

    #[test]
    fn test_wire_bytes() {
        let mut caps = Capabilities::new();
        caps.set(Feature::Tma); // bit 0
        caps.set(Feature::Tka); // bit 5
        caps.set(Feature::Tcu); // bit 8
        assert_eq!(caps.to_bytes(), [0x21, 0x01, 0x00]);
    }
}
