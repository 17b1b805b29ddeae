//! Session-id seed drawn from a floating analog input.

use embassy_stm32::Peri;
use embassy_stm32::adc::{Adc, AdcChannel, SampleTime};
use embassy_stm32::peripherals::{ADC1, PA4};
use embassy_time::Instant;

use crate::seed::{SEED_SAMPLES, fold_samples};

/// Samples the unconnected entropy pin and folds the readings into a seed.
pub fn boot_seed(adc: Peri<'_, ADC1>, pin: Peri<'_, PA4>) -> u64 {
    let mut adc = Adc::new(adc);
    // Shortest sample time keeps the most noise in the low bits.
    adc.set_sample_time(SampleTime::CYCLES1_5);
    let mut channel = pin.degrade_adc();

    let mut samples = [0u16; SEED_SAMPLES];
    for sample in &mut samples {
        *sample = adc.blocking_read(&mut channel);
    }
    fold_samples(samples, Instant::now().as_ticks())
}
