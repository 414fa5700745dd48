use rust_decimal::prelude::{FromPrimitive, Zero};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::overview::*;

#[derive(Clone, Debug, PartialEq)]
pub struct CurrencyFormat {
    pub iso_code: String,
    pub currency_symbol: String,
    pub decimal_digits: u32,
    pub decimal_separator: String,
    pub group_separator: String,
    pub symbol_first: bool,
    pub display_symbol: bool,
}

#[derive(Debug)]
pub struct BudgetFormatter {
    currency_format: CurrencyFormat,
}

impl CurrencyFormat {
    pub fn for_currency_and_locale(currency: &str, locale: &str) -> CurrencyFormat {
        let language = locale
            .split(|c| c == '-' || c == '_')
            .next()
            .unwrap_or("")
            .to_lowercase();
        let comma_decimal = match language.as_str() {
            "pt" | "es" | "de" | "it" | "fr" | "nl" | "da" | "nb" | "sv" | "fi" | "pl" | "tr"
            | "ru" => true,
            _ => false,
        };
        let (decimal_separator, group_separator) = if comma_decimal {
            (",", if language == "fr" { " " } else { "." })
        } else {
            (".", ",")
        };
        let iso_code = currency.to_uppercase();
        let (currency_symbol, decimal_digits) = match iso_code.as_str() {
            "BRL" => ("R$".to_string(), 2),
            "USD" => ("$".to_string(), 2),
            "EUR" => ("€".to_string(), 2),
            "GBP" => ("£".to_string(), 2),
            "JPY" => ("¥".to_string(), 0),
            _ => (iso_code.clone(), 2),
        };
        CurrencyFormat {
            symbol_first: !(comma_decimal && iso_code == "EUR"),
            iso_code,
            currency_symbol,
            decimal_digits,
            decimal_separator: decimal_separator.to_string(),
            group_separator: group_separator.to_string(),
            display_symbol: true,
        }
    }
}

impl BudgetFormatter {
    pub fn new(currency_format: CurrencyFormat) -> BudgetFormatter {
        BudgetFormatter { currency_format }
    }

    pub fn for_overview(overview: &Overview) -> BudgetFormatter {
        BudgetFormatter::new(CurrencyFormat::for_currency_and_locale(
            &overview.currency,
            &overview.locale,
        ))
    }

    pub fn format_amount(&self, amount: f64) -> String {
        let symbol = self.currency_format.currency_symbol.clone();
        self.format_currency_custom(&symbol, " ", true, amount)
    }

    pub fn format_plain(&self, amount: f64) -> String {
        self.format_currency_custom("", "", false, amount)
            .trim()
            .to_string()
    }

    fn format_currency_custom(
        &self,
        currency_symbol: &str,
        currency_symbol_spacer: &str,
        minus_before_symbol_first: bool,
        amount: f64,
    ) -> String {
        let currency_format = &self.currency_format;
        let amount = Decimal::from_f64(amount).unwrap_or_else(Decimal::zero);
        let abs_amount: Decimal = amount.abs().round_dp_with_strategy(
            currency_format.decimal_digits,
            RoundingStrategy::RoundHalfUp,
        );
        let is_negative = amount < Decimal::zero() && !abs_amount.is_zero();
        let raw_formatted = format!("{:.*}", currency_format.decimal_digits as usize, abs_amount);
        let mut split_around_decimal = raw_formatted.split('.');
        let group_separated_before_decimal =
            self.add_group_separators(split_around_decimal.next().unwrap_or("0"));
        let group_separated = match split_around_decimal.next() {
            Some(after_decimal) => format!(
                "{}{}{}",
                group_separated_before_decimal, currency_format.decimal_separator, after_decimal
            ),
            None => group_separated_before_decimal,
        };
        let group_separated = if !minus_before_symbol_first && is_negative {
            format!("-{}", group_separated)
        } else {
            group_separated
        };
        let with_symbol = if currency_format.display_symbol && !currency_symbol.is_empty() {
            if currency_format.symbol_first {
                format!("{}{}{}", currency_symbol, currency_symbol_spacer, group_separated)
            } else {
                format!("{}{}{}", group_separated, currency_symbol_spacer, currency_symbol)
            }
        } else {
            group_separated
        };
        if minus_before_symbol_first && is_negative {
            format!("-{}", with_symbol)
        } else {
            with_symbol
        }
    }

    fn add_group_separators(&self, before_decimal: &str) -> String {
        before_decimal
            .chars()
            .rev()
            .collect::<Vec<char>>()
            .chunks(3)
            .map(|chunk| chunk.iter().collect())
            .collect::<Vec<String>>()
            .join(&self.currency_format.group_separator.chars().rev().collect::<String>())
            .chars()
            .rev()
            .collect()
    }
}
