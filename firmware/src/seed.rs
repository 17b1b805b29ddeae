//! Boot-time entropy folding for the session id.

/// Number of ADC conversions folded into the seed.
pub const SEED_SAMPLES: usize = 64;

/// Folds noisy analog readings and the boot timestamp into one seed.
///
/// Only the low bits of a floating input carry noise, so each reading
/// contributes its two least significant bits before the accumulated value is
/// passed through a splitmix finalizer.
pub fn fold_samples<I>(samples: I, boot_ticks: u64) -> u64
where
    I: IntoIterator<Item = u16>,
{
    let mut acc = boot_ticks;
    for sample in samples {
        acc = acc.rotate_left(2) ^ u64::from(sample & 0b11);
        acc = acc.wrapping_add(u64::from(sample));
    }
    finalize(acc)
}

fn finalize(mut value: u64) -> u64 {
    value = (value ^ (value >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    value ^ (value >> 31)
}
