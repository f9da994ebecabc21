//! 트레일링 스탑 컨트롤러.
//!
//! TP1 체결이 확인되면 현재가에서 일정 비율(기본 0.5%) 떨어진 곳에 스탑을 두고,
//! 이후 가격이 포지션에 유리하게 움직일 때만 스탑을 따라 옮깁니다.
//!
//! ```text
//! INACTIVE ──activate(price)──▶ ACTIVE ──ratchet(price)──▶ ACTIVE
//!                                 │
//!                                 └── 가격이 스탑을 역방향으로 돌파 ──▶ 청산 (원장 제거)
//! ```
//!
//! 스탑은 봇이 관찰하여 집행합니다. 거래소의 손절 주문을 수정하지 않습니다.

use rust_decimal::Decimal;
use trader_core::{Side, TrailingStopState};

/// 기본 트레일링 간격 (0.5%).
pub const DEFAULT_TRAILING_OFFSET: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// 스탑 갱신 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopUpdate {
    /// 갱신 후 상태
    pub state: TrailingStopState,
    /// 스탑 가격이 바뀌었는지 (영속화 필요 여부)
    pub changed: bool,
    /// 현재가가 스탑을 역방향으로 돌파했는지
    pub triggered: bool,
}

impl StopUpdate {
    fn unchanged(state: TrailingStopState) -> Self {
        Self {
            state,
            changed: false,
            triggered: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrailingStopController {
    offset: Decimal,
}

impl Default for TrailingStopController {
    fn default() -> Self {
        Self::new(DEFAULT_TRAILING_OFFSET)
    }
}

impl TrailingStopController {
    /// `offset`은 비율 (0.005 = 0.5%).
    pub fn new(offset: Decimal) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> Decimal {
        self.offset
    }

    /// 현재가 기준 후보 스탑 가격. BUY는 아래, SELL은 위.
    pub fn candidate(&self, side: Side, price: Decimal) -> Decimal {
        match side {
            Side::Buy => price * (Decimal::ONE - self.offset),
            Side::Sell => price * (Decimal::ONE + self.offset),
        }
    }

    /// 트레일링 스탑 활성화.
    ///
    /// 이미 활성 상태면 [`Self::ratchet`]과 같게 동작하므로
    /// 같은 TP 체결 내역이 반복 관찰되어도 스탑이 후퇴하지 않습니다.
    pub fn activate(&self, state: &TrailingStopState, side: Side, price: Decimal) -> StopUpdate {
        if state.is_active {
            return self.ratchet(state, side, price);
        }

        StopUpdate {
            state: TrailingStopState {
                is_active: true,
                current_stop_price: self.candidate(side, price),
            },
            changed: true,
            triggered: false,
        }
    }

    /// 활성 스탑을 현재가 기준으로 갱신하고 돌파 여부를 판정합니다.
    ///
    /// 후보가 기존 스탑보다 엄격히 유리할 때만 채택합니다.
    pub fn ratchet(&self, state: &TrailingStopState, side: Side, price: Decimal) -> StopUpdate {
        if !state.is_active {
            return StopUpdate::unchanged(*state);
        }

        let candidate = self.candidate(side, price);
        let changed = is_more_favorable(side, candidate, state.current_stop_price);

        let mut next = *state;
        if changed {
            next.current_stop_price = candidate;
        }

        StopUpdate {
            state: next,
            changed,
            triggered: is_triggered(side, price, next.current_stop_price),
        }
    }
}

fn is_more_favorable(side: Side, candidate: Decimal, current: Decimal) -> bool {
    match side {
        Side::Buy => candidate > current,
        Side::Sell => candidate < current,
    }
}

/// 롱은 가격이 스탑 이하, 숏은 스탑 이상이면 돌파.
pub fn is_triggered(side: Side, price: Decimal, stop: Decimal) -> bool {
    match side {
        Side::Buy => price <= stop,
        Side::Sell => price >= stop,
    }
}
