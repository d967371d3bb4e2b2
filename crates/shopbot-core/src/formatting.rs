//! Formatting helpers for customer-facing text (prices, phones, carts).

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::{CartLine, CatalogItem};

/// Format an amount the way Colombian storefronts print it: `100000` -> `100.000`,
/// `1234.5` -> `1.234,5`.
pub fn format_price(amount: Decimal) -> String {
    let rounded = amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let abs = rounded.abs().to_string();
    let (int_part, frac_part) = match abs.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (abs, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(f) = frac_part {
        out.push(',');
        out.push_str(&f);
    }
    out
}

/// Pretty-print a Colombian phone number; other formats are returned unchanged.
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.starts_with("57") && digits.len() == 12 {
        return format!(
            "+{} ({}) {}-{}",
            &digits[..2],
            &digits[2..5],
            &digits[5..8],
            &digits[8..]
        );
    }
    if digits.len() == 10 {
        return format!("+57 ({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]);
    }
    phone.to_string()
}

/// `2x Camiseta Negra - $70.000`, one line per cart entry.
pub fn format_cart(cart: &[CartLine]) -> String {
    cart.iter()
        .map(|l| format!("{}x {} - ${}", l.quantity, l.name, format_price(l.total())))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `1. Camiseta Negra - $35.000`, numbered from one.
pub fn format_numbered(items: &[CatalogItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {} - ${}", i + 1, p.name, format_price(p.price)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Same as [`format_numbered`] with the name in bold.
pub fn format_numbered_bold(items: &[CatalogItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. *{}* - ${}", i + 1, p.name, format_price(p.price)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Names only, numbered from one.
pub fn format_names(items: &[CatalogItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p.name))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_use_dot_grouping() {
        assert_eq!(format_price(Decimal::from(100_000)), "100.000");
        assert_eq!(format_price(Decimal::from(1_234_567)), "1.234.567");
        assert_eq!(format_price(Decimal::from(999)), "999");
        assert_eq!(format_price(Decimal::ZERO), "0");
    }

    #[test]
    fn prices_keep_significant_fraction() {
        assert_eq!(format_price(Decimal::new(123_450, 2)), "1.234,5");
        assert_eq!(format_price(Decimal::new(10_000_00, 2)), "10.000");
        assert_eq!(format_price(Decimal::new(12_345, 3)), "12,35");
    }

    #[test]
    fn colombian_phones_are_pretty_printed() {
        assert_eq!(format_phone("573001112233"), "+57 (300) 111-2233");
        assert_eq!(format_phone("+57 300 111 2233"), "+57 (300) 111-2233");
        assert_eq!(format_phone("3001112233"), "+57 (300) 111-2233");
        assert_eq!(format_phone("12345"), "12345");
    }

    #[test]
    fn cart_lines_show_line_totals() {
        let cart = vec![CartLine {
            product_id: "1".into(),
            name: "Camiseta Negra".into(),
            price: Decimal::from(35_000),
            quantity: 2,
            size: None,
            color: None,
            note: None,
        }];
        assert_eq!(format_cart(&cart), "2x Camiseta Negra - $70.000");
    }
}
