//! 환경변수 기반 설정 모듈.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context};
use rust_decimal::Decimal;
use trader_exchange::connector::bingx::DEFAULT_BASE_URL;
use trader_exchange::BingxConfig;

/// 봇 전체 설정
#[derive(Clone)]
pub struct BotConfig {
    /// BingX API 키 (`run --dry-run`, `parse`에서는 불필요)
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    /// BingX REST 기본 URL (기본: 모의거래 엔드포인트)
    pub base_url: String,
    /// `demoTrade=on` 파라미터 추가
    pub demo_trade: bool,
    /// 주문당 위험 비율 (%)
    pub risk_percentage: Decimal,
    /// 조정 주기 (초)
    pub poll_interval_secs: u64,
    /// 원장 스냅샷 경로
    pub ledger_path: PathBuf,
    /// 청산 판정 시 조회할 주문 내역 개수
    pub history_lookback: usize,
    /// 트레일링 스탑 간격 (%, 0.5 = 0.5%)
    pub trailing_offset_pct: Decimal,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "***" } else { "<unset>" };
        f.debug_struct("BotConfig")
            .field("api_key", &mask(&self.api_key))
            .field("secret_key", &mask(&self.secret_key))
            .field("base_url", &self.base_url)
            .field("demo_trade", &self.demo_trade)
            .field("risk_percentage", &self.risk_percentage)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("ledger_path", &self.ledger_path)
            .field("history_lookback", &self.history_lookback)
            .field("trailing_offset_pct", &self.trailing_offset_pct)
            .finish()
    }
}

impl BotConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            api_key: env_var_opt("BINGX_API_KEY"),
            secret_key: env_var_opt("BINGX_SECRET_KEY"),
            base_url: env_var_opt("BINGX_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            demo_trade: env_var_bool("BINGX_DEMO_TRADE", true),
            risk_percentage: env_var_parse("RISK_PERCENTAGE", Decimal::ONE),
            poll_interval_secs: env_var_parse("POLL_INTERVAL_SECS", 30),
            ledger_path: env_var_parse("LEDGER_PATH", PathBuf::from("active_orders.json")),
            history_lookback: env_var_parse("HISTORY_LOOKBACK", 50),
            trailing_offset_pct: env_var_parse("TRAILING_OFFSET_PCT", Decimal::new(5, 1)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.risk_percentage > Decimal::ZERO && self.risk_percentage <= Decimal::ONE_HUNDRED,
            "RISK_PERCENTAGE는 0 초과 100 이하여야 합니다: {}",
            self.risk_percentage
        );
        ensure!(
            self.trailing_offset_pct > Decimal::ZERO && self.trailing_offset_pct < Decimal::ONE_HUNDRED,
            "TRAILING_OFFSET_PCT는 0 초과 100 미만이어야 합니다: {}",
            self.trailing_offset_pct
        );
        ensure!(self.poll_interval_secs > 0, "POLL_INTERVAL_SECS는 1 이상이어야 합니다");
        ensure!(self.history_lookback > 0, "HISTORY_LOOKBACK은 1 이상이어야 합니다");
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// 트레일링 간격을 비율로 (0.5% → 0.005)
    pub fn trailing_offset(&self) -> Decimal {
        self.trailing_offset_pct / Decimal::ONE_HUNDRED
    }

    /// BingX 커넥터 설정. API 키가 없으면 에러.
    pub fn bingx_config(&self) -> anyhow::Result<BingxConfig> {
        let api_key = self.api_key.clone().context("BINGX_API_KEY 환경변수 없음")?;
        let secret_key = self
            .secret_key
            .clone()
            .context("BINGX_SECRET_KEY 환경변수 없음")?;

        Ok(BingxConfig::new(api_key, secret_key)
            .with_base_url(&self.base_url)
            .with_demo_trade(self.demo_trade))
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1" || v == "on")
        .unwrap_or(default)
}

/// 비어 있지 않은 환경변수 값
fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
