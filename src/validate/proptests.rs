//! Property-based tests for the validators

use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_separator() -> impl Strategy<Value = char> {
    prop_oneof![Just('-'), Just(' '), Just('('), Just(')'), Just('.')]
}

/// A valid number with separators sprinkled between the digits
fn arb_decorated_phone() -> impl Strategy<Value = (String, String)> {
    (
        "0[0-9]{9}",
        prop::collection::vec(prop::option::of(arb_separator()), 10),
    )
        .prop_map(|(digits, seps)| {
            let mut decorated = String::new();
            for (c, sep) in digits.chars().zip(seps) {
                if let Some(s) = sep {
                    decorated.push(s);
                }
                decorated.push(c);
            }
            (digits, decorated)
        })
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Accepted iff the cleaned text is ten ASCII digits starting with 0
    #[test]
    fn prop_phone_accepts_exactly_well_formed(text in "[0-9a-z()\\-. ]{0,16}") {
        let cleaned: String = text
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | ' ' | '(' | ')' | '.'))
            .collect();
        let expected = cleaned.len() == 10
            && cleaned.starts_with('0')
            && cleaned.chars().all(|c| c.is_ascii_digit());

        match validate_phone(&text) {
            Ok(phone) => {
                prop_assert!(expected);
                prop_assert_eq!(phone.as_str(), cleaned.as_str());
            }
            Err(rejection) => {
                prop_assert!(!expected);
                prop_assert_eq!(rejection, Rejection::PhoneFormat);
            }
        }
    }

    /// Separators never change the stored number
    #[test]
    fn prop_phone_separators_stripped((digits, decorated) in arb_decorated_phone()) {
        let phone = validate_phone(&decorated).unwrap();
        prop_assert_eq!(phone.as_str(), digits.as_str());
    }

    /// Accepted iff an integer in 1..=20
    #[test]
    fn prop_party_size_range(n in -100i64..200) {
        let result = validate_party_size(&n.to_string());
        if (1..=20).contains(&n) {
            prop_assert_eq!(i64::from(result.unwrap().get()), n);
        } else if n < 1 {
            prop_assert_eq!(result, Err(Rejection::PartySizeTooSmall));
        } else {
            prop_assert_eq!(result, Err(Rejection::PartySizeTooLarge));
        }
    }

    #[test]
    fn prop_party_size_non_numeric(text in "[a-zก-ฮ]{1,8}") {
        prop_assert_eq!(validate_party_size(&text), Err(Rejection::PartySizeNotNumber));
    }

    #[test]
    fn prop_name_length(name in "[a-zA-Zก-ฮ]{0,60}") {
        let len = name.chars().count();
        let result = validate_name(&name);
        prop_assert_eq!(result.is_ok(), (2..=50).contains(&len));
    }

    /// Dates inside the window are accepted, outside are rejected for the right reason
    #[test]
    fn prop_date_window(today in arb_date(), offset in -20i64..20) {
        let candidate = today + chrono::TimeDelta::days(offset);
        let text = BookingDate::from_gregorian(candidate).to_string();
        let result = validate_date(&text, today);
        if offset < 0 {
            prop_assert_eq!(result, Err(Rejection::DateInPast));
        } else if offset > 7 {
            prop_assert_eq!(result, Err(Rejection::DateTooFar));
        } else {
            prop_assert_eq!(result.unwrap().gregorian(), candidate);
        }
    }

    #[test]
    fn prop_time_grid(hour in 0u32..24, minute in 0u32..60) {
        let text = format!("{hour:02}:{minute:02}");
        let t = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        let in_service = t >= NaiveTime::from_hms_opt(18, 30, 0).unwrap()
            && t <= NaiveTime::from_hms_opt(21, 30, 0).unwrap();
        let result = validate_time(&text);
        if !in_service {
            prop_assert_eq!(result, Err(Rejection::TimeOutsideService));
        } else if minute % 30 != 0 {
            prop_assert_eq!(result, Err(Rejection::TimeOffGrid));
        } else {
            prop_assert_eq!(result.unwrap().to_string(), text);
        }
    }

    #[test]
    fn prop_special_requests_length(text in "[a-z ]{0,250}") {
        let trimmed_len = text.trim().chars().count();
        let result = validate_special_requests(&text);
        prop_assert_eq!(result.is_ok(), trimmed_len <= 200);
    }
}
