/// Advisory progress shown while the provider is still working.
///
/// Grows by `step` per attempt and stops at `cap`, so a job never looks done
/// before the provider says so. Only a completed job reaches 100.
pub fn estimate_progress(attempt: u32, step: u8, cap: u8) -> u8 {
    let raw = attempt.saturating_mul(u32::from(step));
    raw.min(u32::from(cap.min(100))) as u8
}
