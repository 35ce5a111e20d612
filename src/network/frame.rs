/// The reserved end-of-session value. A frame carrying it is a hangup
/// request, never an input to the computation.
pub const SENTINEL: i64 = 0;

/// A single protocol frame: one signed 64-bit value in network byte order.
///
/// Every frame on the wire has the same fixed size, [`ValueFrame::WIRE_LEN`]
/// bytes, with no header and no length prefix. Requests and replies use the
/// same encoding. The value `0` is reserved: a client sends it to end the
/// session, and the server never replies to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueFrame(i64);

impl ValueFrame {
    /// Encoded size of every frame.
    pub const WIRE_LEN: usize = 8;

    pub fn new(value: i64) -> ValueFrame {
        ValueFrame(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// True if this frame carries the end-of-session sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL
    }

    /// Encodes the frame in network byte order.
    pub fn to_wire(self) -> [u8; Self::WIRE_LEN] {
        self.0.to_be_bytes()
    }

    /// Decodes a frame from exactly [`Self::WIRE_LEN`] bytes in network
    /// byte order.
    pub fn from_wire(buf: [u8; Self::WIRE_LEN]) -> ValueFrame {
        ValueFrame(i64::from_be_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, [0, 0, 0, 0, 0, 0, 0, 0])]
    #[case(1, [0, 0, 0, 0, 0, 0, 0, 1])]
    #[case(5, [0, 0, 0, 0, 0, 0, 0, 5])]
    #[case(120, [0, 0, 0, 0, 0, 0, 0, 120])]
    #[case(3_628_800, [0, 0, 0, 0, 0, 0x37, 0x5f, 0])]
    #[case(-1, [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff])]
    #[case(i64::MAX, [0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff])]
    fn encodes_big_endian(#[case] value: i64, #[case] wire: [u8; 8]) {
        assert_eq!(ValueFrame::new(value).to_wire(), wire);
        assert_eq!(ValueFrame::from_wire(wire).value(), value);
    }

    #[test]
    fn only_zero_is_the_sentinel() {
        assert!(ValueFrame::new(SENTINEL).is_sentinel());
        assert!(!ValueFrame::new(1).is_sentinel());
        assert!(!ValueFrame::new(-1).is_sentinel());
    }
}
