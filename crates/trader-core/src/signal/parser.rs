use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{Side, TradingIntent};

const SIGNAL_LINE_COUNT: usize = 5;

const LONG_MARKER: &str = "🟢 LONG";
const SHORT_MARKER: &str = "🔴 SHORT";

const ENTRIES_LABEL: &str = "Entrys";
const LEVERAGE_LABEL: &str = "Leverage";
const TAKE_PROFITS_LABEL: &str = "Tps";
const STOP_LOSS_LABEL: &str = "Stop Loss";

/// 시그널 형식 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("빈 시그널")]
    Empty,
    #[error("줄 수 불일치: 예상 {expected}, 실제 {found}")]
    LineCount { expected: usize, found: usize },
    #[error("{0}번째 줄이 비어 있음")]
    BlankLine(usize),
    #[error("헤더 형식 오류: {0}")]
    Header(String),
    #[error("필드 누락: {0}")]
    MissingField(&'static str),
    #[error("{field} 값이 비어 있음")]
    EmptyField { field: &'static str },
    #[error("{field}의 숫자 형식 오류: {token}")]
    InvalidNumber { field: &'static str, token: String },
    #[error("{field} 값은 0보다 커야 함")]
    NonPositive { field: &'static str },
    #[error("레버리지 형식 오류: {0}")]
    InvalidLeverage(String),
}

/// 시그널 텍스트를 `TradingIntent`로 변환합니다.
///
/// 다섯 줄이 정해진 순서대로 모두 있어야 하며, 구조 검사가 끝난 뒤에만
/// 필드 값을 추출합니다. 가격 방향 불변식은 검사하지 않습니다.
pub fn parse(text: &str) -> Result<TradingIntent, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    if lines.len() != SIGNAL_LINE_COUNT {
        return Err(ParseError::LineCount {
            expected: SIGNAL_LINE_COUNT,
            found: lines.len(),
        });
    }
    if let Some(idx) = lines.iter().position(|line| line.is_empty()) {
        return Err(ParseError::BlankLine(idx + 1));
    }

    // 구조 검사
    let (direction, symbol) = parse_header(lines[0])?;
    let entries = field_value(lines[1], ENTRIES_LABEL)?;
    let leverage = field_value(lines[2], LEVERAGE_LABEL)?;
    let take_profits = field_value(lines[3], TAKE_PROFITS_LABEL)?;
    let stop_loss = field_value(lines[4], STOP_LOSS_LABEL)?;

    // 필드 추출
    let entry_prices = parse_price_list(ENTRIES_LABEL, entries)?;
    let leverage = parse_leverage(leverage)?;
    let take_profits = parse_price_list(TAKE_PROFITS_LABEL, take_profits)?;
    let stop_loss = parse_price(STOP_LOSS_LABEL, stop_loss)?;

    Ok(TradingIntent {
        symbol,
        direction,
        entry_prices,
        leverage,
        // 거래소가 TP를 하나만 지원하므로 첫 번째만 유지
        take_profits: take_profits.into_iter().take(1).collect(),
        stop_loss,
    })
}

fn parse_header(line: &str) -> Result<(Side, String), ParseError> {
    let (direction, rest) = if let Some(rest) = line.strip_prefix(LONG_MARKER) {
        (Side::Buy, rest)
    } else if let Some(rest) = line.strip_prefix(SHORT_MARKER) {
        (Side::Sell, rest)
    } else {
        return Err(ParseError::Header(line.to_string()));
    };

    let symbol = rest
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| ParseError::Header(line.to_string()))?;

    let valid = !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if !valid {
        return Err(ParseError::Header(line.to_string()));
    }

    Ok((direction, symbol.to_string()))
}

/// `라벨 : 값` 형식에서 값 부분을 꺼냅니다.
fn field_value<'a>(line: &'a str, label: &'static str) -> Result<&'a str, ParseError> {
    line.strip_prefix(label)
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(str::trim)
        .ok_or(ParseError::MissingField(label))
}

/// `0.1 - 0.2 - 0.3` 또는 공백 구분 가격 목록.
fn parse_price_list(field: &'static str, value: &str) -> Result<Vec<Decimal>, ParseError> {
    let prices = value
        .split(|c: char| c == '-' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| parse_price(field, token))
        .collect::<Result<Vec<_>, _>>()?;

    if prices.is_empty() {
        return Err(ParseError::EmptyField { field });
    }
    Ok(prices)
}

fn parse_price(field: &'static str, token: &str) -> Result<Decimal, ParseError> {
    let price = Decimal::from_str(token).map_err(|_| ParseError::InvalidNumber {
        field,
        token: token.to_string(),
    })?;
    if price <= Decimal::ZERO {
        return Err(ParseError::NonPositive { field });
    }
    Ok(price)
}

fn parse_leverage(value: &str) -> Result<u32, ParseError> {
    let digits = value
        .strip_suffix('X')
        .or_else(|| value.strip_suffix('x'))
        .ok_or_else(|| ParseError::InvalidLeverage(value.to_string()))?;

    match digits.trim().parse::<u32>() {
        Ok(leverage) if leverage > 0 => Ok(leverage),
        _ => Err(ParseError::InvalidLeverage(value.to_string())),
    }
}
