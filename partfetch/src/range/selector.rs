//! Block selection grammar.
//!
//! A selector restricts which 1-based request ordinals (epochs) a run will
//! touch. The grammar is a colon-separated token list:
//!
//! - `<N` includes every epoch at or below `N`
//! - `>N` includes every epoch at or above `N`
//! - `L-H` includes the explicit epochs `L..=H`
//! - a bare integer `N` includes exactly `N`
//!
//! Threshold tokens may appear anywhere and apply retroactively: explicit
//! ranges never materialize epochs a threshold already covers.

use std::collections::BTreeSet;

use thiserror::Error;

/// Errors raised while compiling a selector expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorParseError {
    /// A token's bound is not an integer.
    #[error("malformed selector token '{0}': bounds must be integers")]
    MalformedToken(String),

    /// A range token does not split into exactly two bounds.
    #[error("malformed selector range '{0}': expected <low>-<high>")]
    MalformedRange(String),
}

/// Compiled membership predicate over epoch numbers.
///
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct BlockSelector {
    selected: BTreeSet<u64>,
    lower: Option<u64>,
    upper: Option<u64>,
}

impl BlockSelector {
    /// Compile a selector expression.
    pub fn parse(expr: &str) -> Result<Self, SelectorParseError> {
        let tokens: Vec<&str> = expr.split(':').collect();

        // Thresholds first, so later range expansion can honor them no
        // matter where the threshold token appeared.
        let mut lower = None;
        let mut upper = None;
        for token in &tokens {
            if let Some(bound) = token.strip_prefix('<') {
                lower = Some(parse_bound(bound, token)?);
            } else if let Some(bound) = token.strip_prefix('>') {
                upper = Some(parse_bound(bound, token)?);
            }
        }

        let covered = |epoch: u64| {
            lower.is_some_and(|l| epoch <= l) || upper.is_some_and(|u| epoch >= u)
        };

        let mut selected = BTreeSet::new();
        for token in &tokens {
            if token.starts_with('<') || token.starts_with('>') {
                continue;
            }
            if token.contains('-') {
                let mut bounds = token.split('-');
                let (low, high) = match (bounds.next(), bounds.next(), bounds.next()) {
                    (Some(low), Some(high), None) => (low, high),
                    _ => return Err(SelectorParseError::MalformedRange(token.to_string())),
                };
                let low = parse_bound(low, token)?;
                let high = parse_bound(high, token)?;
                for epoch in low..=high {
                    if !covered(epoch) {
                        selected.insert(epoch);
                    }
                }
            } else {
                let epoch = parse_bound(token, token)?;
                if !covered(epoch) {
                    selected.insert(epoch);
                }
            }
        }

        Ok(Self {
            selected,
            lower,
            upper,
        })
    }

    /// Whether the given epoch is selected.
    pub fn contains(&self, epoch: u64) -> bool {
        self.selected.contains(&epoch)
            || self.upper.is_some_and(|u| epoch >= u)
            || self.lower.is_some_and(|l| epoch <= l)
    }
}

impl PartialEq for BlockSelector {
    fn eq(&self, other: &Self) -> bool {
        self.selected == other.selected && self.lower == other.lower && self.upper == other.upper
    }
}

fn parse_bound(bound: &str, token: &str) -> Result<u64, SelectorParseError> {
    bound
        .parse()
        .map_err(|_| SelectorParseError::MalformedToken(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_truth_table() {
        let selector = BlockSelector::parse("2:5-7:>10").unwrap();

        for epoch in [2, 5, 6, 7] {
            assert!(selector.contains(epoch), "epoch {} should be selected", epoch);
        }
        for epoch in [10, 11, 100, 1_000_000] {
            assert!(selector.contains(epoch), "epoch {} should be selected", epoch);
        }
        for epoch in [1, 3, 4, 8, 9] {
            assert!(!selector.contains(epoch), "epoch {} should be skipped", epoch);
        }
    }

    #[test]
    fn test_lower_threshold() {
        let selector = BlockSelector::parse("<3:7").unwrap();
        assert!(selector.contains(1));
        assert!(selector.contains(2));
        assert!(selector.contains(3));
        assert!(!selector.contains(4));
        assert!(selector.contains(7));
    }

    #[test]
    fn test_threshold_applies_retroactively() {
        // The range appears before the threshold token, but epochs at or
        // above 6 must still be excluded from the explicit set.
        let a = BlockSelector::parse("4-8:>6").unwrap();
        let b = BlockSelector::parse(">6:4-8").unwrap();
        for epoch in 1..=12 {
            assert_eq!(a.contains(epoch), b.contains(epoch));
        }
    }

    #[test]
    fn test_bare_integer() {
        let selector = BlockSelector::parse("3").unwrap();
        assert!(selector.contains(3));
        assert!(!selector.contains(2));
        assert!(!selector.contains(4));
    }

    #[test]
    fn test_malformed_bound_is_fatal() {
        assert_eq!(
            BlockSelector::parse("2:abc"),
            Err(SelectorParseError::MalformedToken("abc".to_string()))
        );
        assert_eq!(
            BlockSelector::parse(">x"),
            Err(SelectorParseError::MalformedToken(">x".to_string()))
        );
        assert_eq!(
            BlockSelector::parse(""),
            Err(SelectorParseError::MalformedToken("".to_string()))
        );
    }

    #[test]
    fn test_malformed_range_is_fatal() {
        assert_eq!(
            BlockSelector::parse("1-2-3"),
            Err(SelectorParseError::MalformedRange("1-2-3".to_string()))
        );
    }
}
