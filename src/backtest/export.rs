//! Flat trade export.
//!
//! Column order is a stable contract with downstream consumers; changing it
//! is a breaking change.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::trade::CompletedTrade;

pub const TRADE_CSV_HEADER: &str = "id,strategy,entry_date,entry_price,exit_date,exit_price,pnl,pnl_pct,costs,capital_before,capital_after,margin_before,margin_after";

/// Write `trades` as CSV, header first.
pub fn write_trades_csv<W: Write>(writer: W, trades: &[CompletedTrade]) -> io::Result<()> {
    let mut writer = BufWriter::new(writer);
    writeln!(writer, "{}", TRADE_CSV_HEADER)?;

    for t in trades {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{:.4},{},{},{},{},{}",
            t.id,
            escape(&t.strategy),
            t.entry_date,
            t.entry_price,
            t.exit_date,
            t.exit_price,
            t.net_pnl,
            t.pnl_pct,
            t.costs.total,
            t.capital_before,
            t.capital_after,
            t.margin_before,
            t.margin_after,
        )?;
    }

    writer.flush()
}

/// Write `trades` to a CSV file at `path`.
pub fn export_trades_csv(path: impl AsRef<Path>, trades: &[CompletedTrade]) -> io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    write_trades_csv(File::create(path)?, trades)
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{ExitReason, TradeCosts};
    use crate::regime::MarketRegime;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn trade() -> CompletedTrade {
        CompletedTrade {
            id: 7,
            strategy: "short_strangle_50d".to_string(),
            regime: MarketRegime::RangeBound,
            entry_date: NaiveDate::from_ymd_opt(2024, 2, 12).unwrap(),
            exit_date: NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
            entry_price: dec!(410.50),
            exit_price: dec!(355.25),
            gross_pnl: dec!(2762.50),
            costs: TradeCosts {
                brokerage: dec!(80),
                turnover_charges: dec!(19.14),
                slippage: dec!(27.63),
                total: dec!(126.77),
            },
            net_pnl: dec!(2635.73),
            pnl_pct: 2.3961,
            exit_reason: ExitReason::ProfitTarget,
            days_held: 3,
            margin_blocked: dec!(110000),
            capital_before: dec!(1000000),
            capital_after: dec!(1002635.73),
            margin_before: dec!(110000),
            margin_after: dec!(0),
        }
    }

    #[test]
    fn test_header_and_row() {
        let mut buf = Vec::new();
        write_trades_csv(&mut buf, &[trade()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], TRADE_CSV_HEADER);
        assert_eq!(
            lines[1],
            "7,short_strangle_50d,2024-02-12,410.50,2024-02-15,355.25,2635.73,2.3961,126.77,1000000,1002635.73,110000,0"
        );
        assert_eq!(lines[1].split(',').count(), lines[0].split(',').count());
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
