fn with_commas(int_part: &str) -> String {
    let mut out = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.chars().rev().collect()
}

/// Format a float as a dollar amount with thousands separators: $1,234.56
#[cfg(feature = "pdf")]
pub fn money(val: f64) -> String {
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let sign = if val < 0.0 { "-" } else { "" };
    format!("{sign}${}.{dec_part}", with_commas(int_part))
}

/// Whole dollars, no cents: $60,000
pub fn whole_dollars(val: f64) -> String {
    let rounded = format!("{:.0}", val.abs());
    let sign = if val < 0.0 { "-" } else { "" };
    format!("{sign}${}", with_commas(&rounded))
}

/// Plain number with at most six decimals and no trailing zeros.
pub fn decimal(val: f64) -> String {
    let s = format!("{val:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// A fraction rendered as a percentage with two decimals: 0.0725 -> 7.25%
pub fn percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}
