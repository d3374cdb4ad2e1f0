//! Contrarian signal generation.
//!
//! One signal per bar: Buy when sentiment sinks to the buy threshold,
//! Sell when it climbs to the sell threshold, Hold otherwise — gated by a
//! shadow bracket per side. Once a side fires, it stays blocked until a
//! later bar (or the same bar, see the re-check) touches the bracket a
//! real trade opened there would carry. The shadow state never reads the
//! engine's trade list; both sides derive the same bracket math from the
//! same bars, and property tests keep them honest.

use crate::config::StrategyConfig;
use crate::domain::{MarketBar, Signal, TradeSide};
use crate::execution::bracket_touched;

/// Shadow bracket carried while a side is blocked.
#[derive(Debug, Clone, Copy)]
struct Shadow {
    take_profit: f64,
    stop_loss: f64,
}

fn unblock_if_touched(side: TradeSide, shadow: &mut Option<Shadow>, bar: &MarketBar) {
    if let Some(s) = *shadow {
        if bracket_touched(side, s.take_profit, s.stop_loss, bar) {
            *shadow = None;
        }
    }
}

/// Produce the per-bar signal sequence, same length and order as `bars`.
///
/// Pure function: all state is local, so identical inputs always yield
/// the identical sequence. Per bar: unblock sides whose shadow bracket
/// the bar touches, emit at most one signal, then re-check the same
/// bar's range so a bracket it already touches unblocks before the next
/// bar.
pub fn generate_signals(bars: &[MarketBar], cfg: &StrategyConfig) -> Vec<Signal> {
    let mut long_shadow: Option<Shadow> = None; // Some = long side blocked
    let mut short_shadow: Option<Shadow> = None;
    let mut signals = Vec::with_capacity(bars.len());

    for bar in bars {
        unblock_if_touched(TradeSide::Long, &mut long_shadow, bar);
        unblock_if_touched(TradeSide::Short, &mut short_shadow, bar);

        let signal = if bar.sentiment <= cfg.buy_threshold && long_shadow.is_none() {
            long_shadow = Some(Shadow {
                take_profit: bar.open * (1.0 + cfg.loss_buffer_pct * cfg.risk_reward_ratio),
                stop_loss: bar.open * (1.0 - cfg.loss_buffer_pct),
            });
            Signal::Buy
        } else if bar.sentiment >= cfg.sell_threshold && short_shadow.is_none() {
            short_shadow = Some(Shadow {
                take_profit: bar.open * (1.0 - cfg.loss_buffer_pct * cfg.risk_reward_ratio),
                stop_loss: bar.open * (1.0 + cfg.loss_buffer_pct),
            });
            Signal::Sell
        } else {
            Signal::Hold
        };
        signals.push(signal);

        // Same-bar resolution: a just-set shadow whose bracket this bar
        // already touches must not block the next bar.
        unblock_if_touched(TradeSide::Long, &mut long_shadow, bar);
        unblock_if_touched(TradeSide::Short, &mut short_shadow, bar);
    }

    signals
}
