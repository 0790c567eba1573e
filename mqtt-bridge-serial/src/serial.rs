//! Serial port access.

use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use crate::config::SerialConfig;
use crate::error::Result;

/// Open the device bus at 8N1.
pub fn open(config: &SerialConfig) -> Result<SerialStream> {
    let stream = tokio_serial::new(&config.port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .open_native_async()?;

    tracing::info!(
        port = %config.port,
        baud_rate = config.baud_rate,
        "Serial port opened"
    );

    Ok(stream)
}
