//! Number and indentation formatting for generated TCL

/// Canonical decimal text for floating values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoubleFormatter {
    /// Significant digits, or `None` for the shortest round-trip form
    pub significant_digits: Option<usize>,
}

impl DoubleFormatter {
    const EXP_UPPER: f64 = 1e16;
    const EXP_LOWER: f64 = 1e-5;

    pub fn new(significant_digits: Option<usize>) -> Self {
        Self {
            significant_digits: significant_digits.map(|p| p.max(1)),
        }
    }

    pub fn format(&self, value: f64) -> String {
        if value.is_nan() {
            return "nan".to_string();
        }
        if value.is_infinite() {
            return if value > 0.0 { "inf".into() } else { "-inf".into() };
        }
        if value == 0.0 {
            return "0.0".to_string();
        }

        let magnitude = value.abs();
        let use_exponent = magnitude >= Self::EXP_UPPER || magnitude < Self::EXP_LOWER;

        match self.significant_digits {
            None if use_exponent => format!("{:e}", value),
            None => {
                let text = format!("{}", value);
                if text.contains('.') {
                    text
                } else {
                    format!("{}.0", text)
                }
            }
            Some(p) if use_exponent => {
                let text = format!("{:.*e}", p - 1, value);
                match text.split_once('e') {
                    Some((mantissa, exp)) => format!("{}e{}", trim_fraction(mantissa), exp),
                    None => text,
                }
            }
            Some(p) => {
                let exponent = magnitude.log10().floor() as i32;
                let decimals = (p as i32 - 1 - exponent).max(0) as usize;
                trim_fraction(&format!("{:.*}", decimals, value))
            }
        }
    }
}

/// Drop trailing zeros but keep one digit after the point.
fn trim_fraction(text: &str) -> String {
    if !text.contains('.') {
        return format!("{}.0", text);
    }
    let trimmed = text.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

pub fn indent(unit: &str, level: usize) -> String {
    unit.repeat(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortest_form() {
        let f = DoubleFormatter::default();
        assert_eq!(f.format(1.0), "1.0");
        assert_eq!(f.format(-2.5), "-2.5");
        assert_eq!(f.format(0.0), "0.0");
        assert_eq!(f.format(200000000000.0), "200000000000.0");
        assert_eq!(f.format(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn test_exponent_form() {
        let f = DoubleFormatter::default();
        assert_eq!(f.format(1e-6), "1e-6");
        assert_eq!(f.format(2.5e20), "2.5e20");
    }

    #[test]
    fn test_fixed_precision() {
        let f = DoubleFormatter::new(Some(4));
        assert_eq!(f.format(3.14159265), "3.142");
        assert_eq!(f.format(1200.0), "1200.0");
        assert_eq!(f.format(0.000123456), "1.235e-4");
        assert_eq!(f.format(2.0), "2.0");
    }

    #[test]
    fn test_non_finite() {
        let f = DoubleFormatter::default();
        assert_eq!(f.format(f64::NAN), "nan");
        assert_eq!(f.format(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("\t", 2), "\t\t");
        assert_eq!(indent("  ", 0), "");
    }
}
