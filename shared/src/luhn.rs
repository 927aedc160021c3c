//! Order-number validation (Luhn checksum)
//!
//! Order numbers are assigned outside this system; the only structural check
//! is the Luhn mod-10 checksum over the decimal digits.

/// Returns `true` if `number` is a non-empty string of ASCII digits whose Luhn
/// checksum is valid.
///
/// Whitespace anywhere in the input is ignored, so `"4561 2612 1234 5467"`
/// validates the same as `"4561261212345467"`.
pub fn valid(number: &str) -> bool {
    let mut sum: u32 = 0;
    let mut seen = false;

    // Walk from the rightmost digit; every second digit is doubled.
    for (i, ch) in number
        .chars()
        .rev()
        .filter(|c| !c.is_whitespace())
        .enumerate()
    {
        let Some(mut digit) = ch.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        seen = true;
    }

    seen && sum % 10 == 0
}

/// Strip whitespace from an order number as submitted.
pub fn normalize(number: &str) -> String {
    number.chars().filter(|c| !c.is_whitespace()).collect()
}
