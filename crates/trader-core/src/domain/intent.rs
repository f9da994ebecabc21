//! 매매 의도 (시그널 해석 결과).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// 매수 (롱)
    Buy,
    /// 매도 (숏)
    Sell,
}

impl Side {
    /// 거래소 API 표기 ("BUY" / "SELL").
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 시그널에서 해석된 매매 의도.
///
/// 해석 이후에는 변경되지 않습니다. 가격 방향 불변식
/// (BUY: 손절가 < 평균 진입가 < 모든 익절가, SELL은 반대)은
/// [`crate::signal::validate`]가 검사합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingIntent {
    /// 심볼 (예: "AERGOUSDT")
    pub symbol: String,
    /// 방향
    pub direction: Side,
    /// 진입가 목록 (첫 번째가 실제 진입 기준가)
    pub entry_prices: Vec<Decimal>,
    /// 레버리지 배수
    pub leverage: u32,
    /// 익절가 목록 (거래소가 TP 하나만 지원하므로 첫 번째만 유지)
    pub take_profits: Vec<Decimal>,
    /// 손절가
    pub stop_loss: Decimal,
}

impl TradingIntent {
    /// 실제 진입 기준가 (첫 번째 진입가).
    pub fn effective_entry(&self) -> Option<Decimal> {
        self.entry_prices.first().copied()
    }

    /// 진입가 산술 평균.
    pub fn average_entry(&self) -> Option<Decimal> {
        if self.entry_prices.is_empty() {
            return None;
        }
        let sum: Decimal = self.entry_prices.iter().sum();
        Some(sum / Decimal::from(self.entry_prices.len()))
    }

    /// 실행 가능한 익절가 (TP1).
    pub fn take_profit(&self) -> Option<Decimal> {
        self.take_profits.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn average_entry_uses_all_entries() {
        let intent = TradingIntent {
            symbol: "AERGOUSDT".to_string(),
            direction: Side::Buy,
            entry_prices: vec![dec!(0.11477), dec!(0.11458)],
            leverage: 5,
            take_profits: vec![dec!(0.11547)],
            stop_loss: dec!(0.1143),
        };

        assert_eq!(intent.effective_entry(), Some(dec!(0.11477)));
        assert_eq!(intent.average_entry(), Some(dec!(0.114675)));
        assert_eq!(intent.take_profit(), Some(dec!(0.11547)));
    }

    #[test]
    fn side_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
        assert_eq!(Side::Sell.as_str(), "SELL");
    }
}
