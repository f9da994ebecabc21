//! 텍스트 시그널 해석기.
//!
//! 다음 형식의 5줄 시그널만 받아들입니다:
//!
//! ```text
//! 🟢 LONG (AERGOUSDT)
//! Entrys: 0.11477 - 0.11458
//! Leverage: 5X
//! Tps: 0.11547 - 0.11593 - 0.1164
//! Stop Loss: 0.1143
//! ```
//!
//! - [`parse`]: 구조 검사 + 필드 추출 (숫자 토큰 하나라도 실패하면 전체 실패)
//! - [`validate`]: 가격 방향 불변식 검사 (실패 시 false)
//! - [`interpret`]: 두 단계를 합친 진입점 (인테이크 경로에서 사용)

mod parser;
mod validation;

use thiserror::Error;

use crate::domain::TradingIntent;

pub use parser::{parse, ParseError};
pub use validation::{validate, validate_signal, ValidationError};

/// 시그널 해석 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// 형식 오류
    #[error("시그널 형식 오류: {0}")]
    Parse(#[from] ParseError),
    /// 가격/방향 불일치
    #[error("시그널 검증 실패: {0}")]
    Validation(#[from] ValidationError),
}

/// 시그널 텍스트를 해석하고 검증합니다.
///
/// 불변식을 위반하는 시그널은 `TradingIntent`로 만들어지지 않습니다.
pub fn interpret(text: &str) -> Result<TradingIntent, SignalError> {
    let intent = parse(text)?;
    validate_signal(&intent)?;
    Ok(intent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpret_rejects_inconsistent_prices() {
        let text = "🟢 LONG (AERGOUSDT)\nEntrys: 0.11477\nLeverage: 5X\nTps: 0.11547\nStop Loss: 0.12";
        assert!(matches!(interpret(text), Err(SignalError::Validation(_))));
    }

    #[test]
    fn interpret_rejects_malformed_text() {
        assert!(matches!(interpret("hello"), Err(SignalError::Parse(_))));
    }
}
