use crate::error::PackError;
use crate::wiring::LANE_COUNT;

/// Bytes in the panel bus payload.
pub const PAYLOAD_LEN: usize = LANE_COUNT / 8;

/// Pack bits into bytes, least-significant bit first.
///
/// Bit `i` lands in byte `i / 8` at bit position `i % 8`.
pub fn pack(bits: &[bool]) -> Result<Vec<u8>, PackError> {
    if bits.len() % 8 != 0 {
        return Err(PackError::Unaligned { len: bits.len() });
    }
    let mut out = vec![0u8; bits.len() / 8];
    pack_into(bits, &mut out);
    Ok(out)
}

pub(crate) fn pack_into(bits: &[bool], out: &mut [u8]) {
    for (byte, chunk) in out.iter_mut().zip(bits.chunks(8)) {
        *byte = chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (bit, &on)| acc | (u8::from(on) << bit));
    }
}

/// Expand bytes into bits, least-significant bit first.
pub fn unpack(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).map(move |bit| byte & (1 << bit) != 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsb_first_within_byte() {
        let mut bits = vec![false; 16];
        bits[0] = true;
        bits[5] = true;
        bits[15] = true;
        assert_eq!(pack(&bits).unwrap(), vec![0x21, 0x80]);
    }

    #[test]
    fn unaligned_length_rejected() {
        assert_eq!(pack(&[true; 7]), Err(PackError::Unaligned { len: 7 }));
        assert_eq!(pack(&[]), Ok(vec![]));
    }

    #[test]
    fn unpack_inverts_pack() {
        let bits: Vec<bool> = (0..LANE_COUNT).map(|i| i % 3 == 0 || i % 7 == 2).collect();
        let bytes = pack(&bits).unwrap();
        assert_eq!(bytes.len(), PAYLOAD_LEN);
        assert_eq!(unpack(&bytes), bits);
    }

    #[test]
    fn pack_inverts_unpack() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        assert_eq!(pack(&unpack(&bytes)).unwrap(), bytes);
    }
}
