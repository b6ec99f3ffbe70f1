use embedded_hal::serial::Write;
use ufmt::uWrite;

// Wrapper so any embedded-hal serial transmitter can be used with uwrite! and uwriteln!
pub struct SerialWriter<TX>{
    serial: TX
}
impl<TX: Write<u8>> SerialWriter<TX>{
    pub fn new(serial: TX) -> SerialWriter<TX> {
        SerialWriter{serial}
    }
    pub fn return_pin(self) -> TX {
        self.serial
    }
}
impl<TX: Write<u8>> uWrite for SerialWriter<TX>{
    type Error = nb::Error<TX::Error>;
    fn write_char(&mut self, c: char) -> Result<(), Self::Error>{
        let mut buf = [0u8; 4];
        for byte in c.encode_utf8(&mut buf).as_bytes() {
            nb::block!(self.serial.write(*byte)).map_err(nb::Error::Other)?;
        }
        Ok(())
    }

    fn write_str(&mut self, string: &str) -> Result<(), Self::Error> {
        for byte in string.as_bytes() {
            nb::block!(self.serial.write(*byte)).map_err(nb::Error::Other)?;
        }
        Ok(())
    }
}

/// `uwriteln!` that only exists in builds with the `debug_print` feature. Errors are discarded.
#[macro_export]
macro_rules! dbg_uwriteln {
    ($writer:expr, $($arg:tt)*) => {
        #[cfg(feature = "debug_print")]
        { ufmt::uwriteln!($writer, $($arg)*).ok(); }
    };
}
