//! Phone number normalization for the Daraja API.
//!
//! The gateway expects MSISDNs in `2547XXXXXXXX` form. Accepts the shapes
//! customers actually type: `07..`, `7..`, `+2547..`, `2547..`.

/// Normalizes a customer-entered phone number to gateway form.
///
/// Any shape not recognized passes through unchanged; the gateway rejects it
/// with a structural error and the booking stays retryable.
pub fn normalize(phone: &str) -> String {
    let p = phone.trim();
    let p = p.strip_prefix('+').unwrap_or(p);

    if p.len() == 10 && p.starts_with('0') {
        return format!("254{}", &p[1..]);
    }
    if p.len() == 9 && p.starts_with('7') {
        return format!("254{}", p);
    }
    p.to_string()
}
