use chrono::NaiveDate;
use rand::Rng;
use uuid::Uuid;

/// Check-in code alphabet. Skips 0/O/1/I so staff can read codes over
/// the phone without ambiguity.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

/// Booking reference printed on confirmations and invoices.
/// Format: BL-{slot date}-{short item id}.
pub fn booking_ref(slot_date: NaiveDate, item_id: Uuid) -> String {
    let short = &item_id.simple().to_string()[..8];
    format!("BL-{}-{}", slot_date.format("%Y%m%d"), short.to_uppercase())
}

/// A fresh 6-character check-in code. Uniqueness is enforced by the
/// caller against storage, not here.
pub fn check_in_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
