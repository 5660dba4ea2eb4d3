//! Board identity reported at start-up.

use embassy_stm32::uid;

/// Logs the firmware version and the MCU's 96-bit unique identifier.
pub fn log_banner() {
    defmt::info!(
        "gnss: positioning gnss-only v{}",
        env!("CARGO_PKG_VERSION")
    );
    defmt::info!("gnss: device uid {}", uid::uid_hex());
}
