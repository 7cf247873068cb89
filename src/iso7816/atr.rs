use heapless::Vec;

pub const MAX_HISTORICAL_BYTES: usize = 15;
/// TS, T0 and the historical bytes.
pub const MAX_ATR_LEN: usize = 2 + MAX_HISTORICAL_BYTES;

pub const DEFAULT_HISTORICAL_BYTES: &[u8] = b"usbd-ccid-card";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Convention {
    Direct = 0x3B,
    Inverse = 0x3F,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtrError {
    /// T0 only has a nibble to count historical bytes.
    TooManyHistoricalBytes(usize),
}

/// Answer to reset without interface bytes: `TS T0 T1..TK`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Atr {
    bytes: Vec<u8, MAX_ATR_LEN>,
}

impl Default for Atr {
    fn default() -> Self {
        let mut atr = Self { bytes: Vec::new() };
        atr.set_historical_bytes(DEFAULT_HISTORICAL_BYTES).ok();
        atr
    }
}

impl Atr {
    pub fn new(historical_bytes: &[u8]) -> Result<Self, AtrError> {
        let mut atr = Self { bytes: Vec::new() };
        atr.set_historical_bytes(historical_bytes)?;
        Ok(atr)
    }

    /// Rebuilds the ATR around new historical bytes.
    ///
    /// More than 15 bytes are rejected and the current ATR is kept.
    pub fn set_historical_bytes(&mut self, historical_bytes: &[u8]) -> Result<(), AtrError> {
        let k = historical_bytes.len();
        if k > MAX_HISTORICAL_BYTES {
            return Err(AtrError::TooManyHistoricalBytes(k));
        }

        self.bytes.clear();
        self.bytes.push(Convention::Direct as u8).ok();
        // T0: no TA1/TB1/TC1/TD1, K historical bytes
        self.bytes.push(k as u8).ok();
        self.bytes.extend_from_slice(historical_bytes).ok();
        Ok(())
    }

    pub fn convention(&self) -> Option<Convention> {
        match self.bytes.first() {
            Some(0x3B) => Some(Convention::Direct),
            Some(0x3F) => Some(Convention::Inverse),
            _ => None,
        }
    }

    pub fn historical_bytes(&self) -> &[u8] {
        self.bytes.get(2..).unwrap_or(&[])
    }
}

impl core::ops::Deref for Atr {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let atr = Atr::new(&[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(&atr[..], &[0x3B, 0x03, 0x01, 0x02, 0x03]);
        assert_eq!(atr.convention(), Some(Convention::Direct));
        assert_eq!(atr.historical_bytes(), &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn fifteen_historical_bytes_fit() {
        let atr = Atr::new(&[0xAA; 15]).unwrap();
        assert_eq!(atr.len(), MAX_ATR_LEN);
        assert_eq!(atr[1], 0x0F);
    }

    #[test]
    fn sixteen_historical_bytes_leave_atr_untouched() {
        let mut atr = Atr::new(&[0x01]).unwrap();
        assert_eq!(
            atr.set_historical_bytes(&[0xAA; 16]),
            Err(AtrError::TooManyHistoricalBytes(16))
        );
        assert_eq!(&atr[..], &[0x3B, 0x01, 0x01]);
        assert!(Atr::new(&[0xAA; 16]).is_err());
    }

    #[test]
    fn default_fits() {
        let atr = Atr::default();
        assert_eq!(atr.historical_bytes(), DEFAULT_HISTORICAL_BYTES);
        assert!(atr.len() <= MAX_ATR_LEN);
    }
}
