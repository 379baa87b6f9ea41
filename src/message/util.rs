use std::io::{self, prelude::*};

/// Compute the log-base-two of the next power of two: 8 -> 3, 9 -> 4.
///
pub fn ceil_log2(x: usize) -> usize {
    let mut n = 0;
    while 1 << n < x {
        n += 1
    }
    n
}

/// Read a little-endian u64 out of the given stream.
///
pub fn read_u64<R: Read>(stream: &mut R) -> io::Result<u64> {
    Ok(u64::from_le_bytes(read_bytes_array(stream)?))
}

/// Read the given number of bytes from a stream, into a vec.
///
pub fn read_bytes_vec<R: Read>(stream: &mut R, size: usize) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0; size];
    stream.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Read the given (const) number of bytes from a stream, into an array.
///
pub fn read_bytes_array<R: Read, const SIZE: usize>(stream: &mut R) -> io::Result<[u8; SIZE]> {
    let mut buffer = [0; SIZE];
    stream.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Encode a slice of floating point values as raw little-endian bytes.
///
pub fn encode_f64s(values: &[f64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for x in values {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    bytes
}

/// Decode raw little-endian bytes into floating point values. Returns `None`
/// if the number of bytes is not a multiple of eight.
///
pub fn decode_f64s(bytes: &[u8]) -> Option<Vec<f64>> {
    if bytes.len() % 8 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(8)
            .map(|b| {
                let mut a = [0; 8];
                a.copy_from_slice(b);
                f64::from_le_bytes(a)
            })
            .collect(),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ceil_log2_works() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(8), 3);
        assert_eq!(ceil_log2(9), 4);
    }

    #[test]
    fn floats_survive_the_byte_encoding() {
        let values = [0.0, -1.5, f64::MAX, 1e-300];
        assert_eq!(decode_f64s(&encode_f64s(&values)).unwrap(), values.to_vec());
        assert!(decode_f64s(&[0; 7]).is_none());
    }

    #[test]
    fn can_read_framed_bytes() {
        let mut frame = 3u64.to_le_bytes().to_vec();
        frame.extend_from_slice(&[7, 8, 9]);
        let mut cursor = &frame[..];
        let n = read_u64(&mut cursor).unwrap();
        assert_eq!(read_bytes_vec(&mut cursor, n as usize).unwrap(), vec![7, 8, 9]);
    }
}
