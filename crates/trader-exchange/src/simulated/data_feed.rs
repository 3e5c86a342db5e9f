//! 시뮬레이션 거래소를 위한 캔들 데이터 피드.
//!
//! 심볼/타임프레임별 캔들을 보관하고 시뮬레이션 시간을 진행시킵니다.
//! 시간이 진행되면 마지막 종가에서 이어지는 새 캔들을 생성합니다.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap};
use trader_core::{Kline, Symbol, Ticker, Timeframe, MAX_SIMULATED_HISTORY};

/// 캔들 데이터 피드.
pub struct DataFeed {
    /// 심볼/타임프레임별 캔들 (시작 시간 순)
    data: HashMap<(Symbol, Timeframe), BTreeMap<DateTime<Utc>, Kline>>,
    /// 현재 시뮬레이션 시간
    current_time: Option<DateTime<Utc>>,
    /// 캔들 생성용 난수 생성기
    rng: StdRng,
    /// 캔들 변동성
    volatility: f64,
}

impl DataFeed {
    /// 새로운 데이터 피드를 생성합니다.
    pub fn new(seed: u64, volatility: Decimal) -> Self {
        Self {
            data: HashMap::new(),
            current_time: None,
            rng: StdRng::seed_from_u64(seed),
            volatility: volatility.to_f64().unwrap_or(0.02),
        }
    }

    /// 심볼의 캔들 데이터를 로드합니다. 기존 데이터는 대체됩니다.
    pub fn load_klines(&mut self, symbol: Symbol, timeframe: Timeframe, klines: Vec<Kline>) {
        let series = klines.into_iter().map(|k| (k.open_time, k)).collect();
        self.data.insert((symbol, timeframe), series);
    }

    /// `end` 이전에 마감되는 과거 캔들 `count`개를 생성해 로드합니다.
    ///
    /// `count`는 [`MAX_SIMULATED_HISTORY`]로 제한되며, 시작 시각이 표현
    /// 범위를 벗어나면 아무것도 로드하지 않습니다.
    pub fn generate_history(
        &mut self,
        symbol: Symbol,
        timeframe: Timeframe,
        count: usize,
        start_price: Decimal,
        end: DateTime<Utc>,
    ) {
        let count = count.min(MAX_SIMULATED_HISTORY);
        let period = tf_duration(timeframe);
        let Some(start) = i32::try_from(count)
            .ok()
            .and_then(|n| period.checked_mul(n))
            .and_then(|span| align_down(end, timeframe).checked_sub_signed(span))
        else {
            return;
        };
        let klines = generate_sample_klines(
            &mut self.rng,
            symbol.clone(),
            timeframe,
            start,
            count,
            start_price,
            self.volatility,
        );
        self.load_klines(symbol, timeframe, klines);
    }

    /// 시뮬레이션 시간을 진행시키고 새로 마감된 캔들을 생성합니다.
    pub fn advance_to(&mut self, time: DateTime<Utc>) {
        self.current_time = Some(time);

        for ((symbol, timeframe), series) in self.data.iter_mut() {
            let period = tf_duration(*timeframe);
            loop {
                let Some(last) = series.values().next_back() else {
                    break;
                };
                if last.close_time + period > time {
                    break;
                }
                let open_time = last.close_time;
                let start_price = last.close;
                let next = generate_sample_klines(
                    &mut self.rng,
                    symbol.clone(),
                    *timeframe,
                    open_time,
                    1,
                    start_price,
                    self.volatility,
                );
                for kline in next {
                    series.insert(kline.open_time, kline);
                }
            }
        }
    }

    /// 현재 시뮬레이션 시간.
    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.current_time
    }

    /// 현재 시간까지 마감된 캔들 중 최근 `limit`개 (오래된 것부터).
    pub fn historical_klines(&self, symbol: &Symbol, timeframe: Timeframe, limit: usize) -> Vec<Kline> {
        let Some(series) = self.data.get(&(symbol.clone(), timeframe)) else {
            return vec![];
        };
        let now = self.current_time.unwrap_or_else(Utc::now);

        let mut klines: Vec<Kline> = series
            .values()
            .rev()
            .filter(|k| k.is_closed_at(now))
            .take(limit)
            .cloned()
            .collect();
        klines.reverse();
        klines
    }

    /// 심볼의 가장 짧은 타임프레임에서 마지막으로 마감된 캔들.
    pub fn latest_kline(&self, symbol: &Symbol) -> Option<Kline> {
        let timeframe = self.timeframes(symbol).into_iter().next()?;
        self.historical_klines(symbol, timeframe, 1).pop()
    }

    /// 심볼의 현재 시세.
    pub fn ticker(&self, symbol: &Symbol) -> Option<Ticker> {
        self.latest_kline(symbol).map(|k| kline_to_ticker(&k))
    }

    /// 심볼의 현재 가격.
    pub fn current_price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.latest_kline(symbol).map(|k| k.close)
    }

    /// 심볼에 로드된 타임프레임 (기간 오름차순).
    pub fn timeframes(&self, symbol: &Symbol) -> Vec<Timeframe> {
        let mut tfs: Vec<Timeframe> = self
            .data
            .keys()
            .filter(|(s, _)| s == symbol)
            .map(|(_, tf)| *tf)
            .collect();
        tfs.sort();
        tfs
    }

    /// 로드된 캔들 수.
    pub fn data_count(&self, symbol: &Symbol, timeframe: Timeframe) -> usize {
        self.data
            .get(&(symbol.clone(), timeframe))
            .map(|d| d.len())
            .unwrap_or(0)
    }
}

fn tf_duration(timeframe: Timeframe) -> Duration {
    Duration::from_std(timeframe.duration()).unwrap_or_else(|_| Duration::minutes(1))
}

/// 타임프레임 경계(에포크 기준)로 내림합니다.
fn align_down(time: DateTime<Utc>, timeframe: Timeframe) -> DateTime<Utc> {
    let period_ms = timeframe.duration().as_millis() as i64;
    let ms = time.timestamp_millis();
    DateTime::from_timestamp_millis(ms - ms.rem_euclid(period_ms)).unwrap_or(time)
}

/// 캔들을 시세로 변환합니다.
pub fn kline_to_ticker(kline: &Kline) -> Ticker {
    let price_change = kline.close - kline.open;
    let price_change_pct = if kline.open != dec!(0) {
        ((price_change / kline.open) * dec!(100)).round_dp(4)
    } else {
        dec!(0)
    };

    Ticker {
        symbol: kline.symbol.clone(),
        last: kline.close,
        bid: (kline.close * dec!(0.9999)).round_dp(8),
        ask: (kline.close * dec!(1.0001)).round_dp(8),
        high_24h: kline.high,
        low_24h: kline.low,
        volume_24h: kline.volume,
        change_24h: price_change,
        change_24h_percent: price_change_pct,
        timestamp: kline.close_time,
    }
}

/// 랜덤 워크로 캔들을 생성합니다.
pub fn generate_sample_klines<R: Rng>(
    rng: &mut R,
    symbol: Symbol,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    count: usize,
    start_price: Decimal,
    volatility: f64,
) -> Vec<Kline> {
    let period = tf_duration(timeframe);
    let mut klines = Vec::with_capacity(count);
    let mut current_price = start_price;
    let mut open_time = start;

    for _ in 0..count {
        let change_pct = (rng.gen::<f64>() - 0.5) * 2.0 * volatility;
        let change = current_price * Decimal::from_f64_retain(change_pct).unwrap_or_default();

        let open = current_price;
        let close = (current_price + change).round_dp(8);

        let high_extra = current_price.abs()
            * Decimal::from_f64_retain(rng.gen::<f64>() * 0.01).unwrap_or_default();
        let low_extra = current_price.abs()
            * Decimal::from_f64_retain(rng.gen::<f64>() * 0.01).unwrap_or_default();

        let high = (open.max(close) + high_extra).round_dp(8);
        let low = (open.min(close) - low_extra).round_dp(8);
        let volume = Decimal::from_f64_retain(rng.gen_range(10.0..1000.0))
            .unwrap_or(dec!(100))
            .round_dp(4);

        klines.push(Kline {
            symbol: symbol.clone(),
            timeframe,
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time: open_time + period,
            num_trades: Some(rng.gen_range(10..500)),
        });

        current_price = close;
        open_time += period;
    }

    klines
}
