use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{Side, TradingIntent};

const MIN_SYMBOL_LEN: usize = 3;

/// 시그널 검증 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("유효하지 않은 심볼: {0}")]
    InvalidSymbol(String),
    #[error("진입가 없음")]
    NoEntries,
    #[error("익절가 없음")]
    NoTakeProfit,
    #[error("0 이하의 가격: {0}")]
    NonPositivePrice(Decimal),
    #[error("레버리지는 0보다 커야 함")]
    NonPositiveLeverage,
    #[error("{direction} 익절가 {take_profit}가 평균 진입가 {average_entry} 기준 잘못된 방향")]
    TakeProfitOnWrongSide {
        direction: Side,
        take_profit: Decimal,
        average_entry: Decimal,
    },
    #[error("{direction} 손절가 {stop_loss}가 평균 진입가 {average_entry} 기준 잘못된 방향")]
    StopLossOnWrongSide {
        direction: Side,
        stop_loss: Decimal,
        average_entry: Decimal,
    },
}

/// 가격 방향 불변식 검사.
///
/// 예외 대신 false를 반환하므로 호출자가 사용자 피드백을 만들 수 있습니다.
pub fn validate(intent: &TradingIntent) -> bool {
    validate_signal(intent).is_ok()
}

/// 가격 방향 불변식 검사 (실패 사유 포함).
///
/// 진입가 산술 평균을 기준으로 BUY는 `손절가 < 평균 < 모든 익절가`,
/// SELL은 `손절가 > 평균 > 모든 익절가`여야 합니다.
pub fn validate_signal(intent: &TradingIntent) -> Result<(), ValidationError> {
    if intent.symbol.len() < MIN_SYMBOL_LEN {
        return Err(ValidationError::InvalidSymbol(intent.symbol.clone()));
    }
    if intent.leverage == 0 {
        return Err(ValidationError::NonPositiveLeverage);
    }
    if intent.take_profits.is_empty() {
        return Err(ValidationError::NoTakeProfit);
    }

    let prices = intent
        .entry_prices
        .iter()
        .chain(intent.take_profits.iter())
        .chain(std::iter::once(&intent.stop_loss));
    if let Some(bad) = prices.copied().find(|p| *p <= Decimal::ZERO) {
        return Err(ValidationError::NonPositivePrice(bad));
    }

    let average_entry = intent.average_entry().ok_or(ValidationError::NoEntries)?;
    let direction = intent.direction;

    // 유리한 방향: BUY는 위, SELL은 아래
    let beyond = |price: Decimal| match direction {
        Side::Buy => price > average_entry,
        Side::Sell => price < average_entry,
    };

    if let Some(&take_profit) = intent.take_profits.iter().find(|tp| !beyond(**tp)) {
        return Err(ValidationError::TakeProfitOnWrongSide {
            direction,
            take_profit,
            average_entry,
        });
    }

    let stop_ok = match direction {
        Side::Buy => intent.stop_loss < average_entry,
        Side::Sell => intent.stop_loss > average_entry,
    };
    if !stop_ok {
        return Err(ValidationError::StopLossOnWrongSide {
            direction,
            stop_loss: intent.stop_loss,
            average_entry,
        });
    }

    Ok(())
}
