//! Business ID validation
//!
//! Business IDs have the form `NNNNNNN-C`: seven digits, a hyphen and a
//! modulus-11 check digit. Older IDs with a six-digit body are accepted and
//! treated as if left-padded with a single zero.

/// Weights applied to the seven body digits, left to right
const WEIGHTS: [u32; 7] = [7, 9, 10, 5, 8, 4, 2];

/// Validate a business ID including its check digit
///
/// # Examples
///
/// ```
/// use bizval_common::business_id::is_valid_business_id;
///
/// assert!(is_valid_business_id("0737546-2"));
/// assert!(!is_valid_business_id("0737546-3"));
/// assert!(!is_valid_business_id("not an id"));
/// ```
pub fn is_valid_business_id(input: &str) -> bool {
    let Some((body, check)) = input.trim().split_once('-') else {
        return false;
    };

    if !(body.len() == 6 || body.len() == 7) || check.len() != 1 {
        return false;
    }
    if !body.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Some(check_digit) = check.chars().next().and_then(|c| c.to_digit(10)) else {
        return false;
    };

    let padded = format!("{:0>7}", body);
    match expected_check_digit(&padded) {
        Some(expected) => expected == check_digit,
        None => false,
    }
}

/// Compute the check digit for a seven-digit body
///
/// Returns `None` when the weighted sum leaves remainder 1, which no valid ID
/// can have.
pub fn expected_check_digit(body: &str) -> Option<u32> {
    let digits: Vec<u32> = body.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != WEIGHTS.len() {
        return None;
    }

    let sum: u32 = digits.iter().zip(WEIGHTS.iter()).map(|(d, w)| d * w).sum();

    match sum % 11 {
        0 => Some(0),
        1 => None,
        r => Some(11 - r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids_accepted() {
        assert!(is_valid_business_id("0737546-2"));
        assert!(is_valid_business_id("1572860-0"));
        assert!(is_valid_business_id("  0737546-2  "));
    }

    #[test]
    fn test_wrong_check_digit_rejected() {
        assert!(!is_valid_business_id("0737546-1"));
        assert!(!is_valid_business_id("1572860-1"));
    }

    #[test]
    fn test_six_digit_body_is_zero_padded() {
        assert!(is_valid_business_id("737546-2"));
        assert!(!is_valid_business_id("737546-3"));
    }

    #[test]
    fn test_malformed_input_rejected() {
        assert!(!is_valid_business_id(""));
        assert!(!is_valid_business_id("07375462"));
        assert!(!is_valid_business_id("0737546-"));
        assert!(!is_valid_business_id("0737546-22"));
        assert!(!is_valid_business_id("07a7546-2"));
        assert!(!is_valid_business_id("12345-6"));
        assert!(!is_valid_business_id("12345678-9"));
    }

    #[test]
    fn test_remainder_one_has_no_check_digit() {
        // 6 * 2 = 12, remainder 1
        assert_eq!(expected_check_digit("0000006"), None);
        for c in 0..=9 {
            assert!(!is_valid_business_id(&format!("0000006-{}", c)));
        }
    }

    #[test]
    fn test_remainder_zero_gives_zero() {
        let sum: u32 = [1u32, 5, 7, 2, 8, 6, 0]
            .iter()
            .zip(WEIGHTS.iter())
            .map(|(d, w)| d * w)
            .sum();
        assert_eq!(sum % 11, 0);
        assert_eq!(expected_check_digit("1572860"), Some(0));
    }
}
