use super::*;

#[test]
fn fixed32_round_trip() {
    let mut buf = [0u8; 4];
    encode_fixed32(&mut buf, 0xDEAD_BEEF);
    assert_eq!(decode_fixed32(&buf), 0xDEAD_BEEF);
}

#[test]
fn fixed64_round_trip() {
    let mut buf = [0u8; 8];
    encode_fixed64(&mut buf, u64::MAX);
    assert_eq!(decode_fixed64(&buf), u64::MAX);
}

#[test]
fn fixed32_little_endian_byte_order() {
    let mut buf = [0u8; 4];
    encode_fixed32(&mut buf, 1);
    assert_eq!(buf, [1, 0, 0, 0]);
}

#[test]
fn varint32_boundaries() {
    // Boundary values around the 1/2/3-byte varint cutoffs.
    let mut dst = Vec::new();
    put_varint32(&mut dst, 127);
    assert_eq!(dst, vec![0x7F]);

    dst.clear();
    put_varint32(&mut dst, 128);
    assert_eq!(dst, vec![0x80, 0x01]);

    dst.clear();
    put_varint32(&mut dst, 16383);
    assert_eq!(dst, vec![0xFF, 0x7F]);

    dst.clear();
    put_varint32(&mut dst, 16384);
    assert_eq!(dst, vec![0x80, 0x80, 0x01]);
}

#[test]
fn varint32_round_trip_exhaustive_sample() {
    let samples: Vec<u32> = (0..20_000)
        .chain((u32::MAX - 20_000)..=u32::MAX)
        .chain([0, 1, 127, 128, 16383, 16384, u32::MAX / 2])
        .collect();
    for v in samples {
        let mut dst = Vec::new();
        put_varint32(&mut dst, v);
        assert_eq!(dst.len(), varint_length(v as u64));
        let (decoded, n) = decode_varint32(&dst).unwrap();
        assert_eq!(decoded, v);
        assert_eq!(n, dst.len());
    }
}

#[test]
fn varint64_round_trip() {
    for v in [0u64, 1, 127, 128, u64::MAX, u64::MAX / 3, 1 << 55] {
        let mut dst = Vec::new();
        put_varint64(&mut dst, v);
        assert_eq!(dst.len(), varint_length(v));
        let (decoded, n) = decode_varint64(&dst).unwrap();
        assert_eq!(decoded, v);
        assert_eq!(n, dst.len());
    }
}

#[test]
fn decode_varint_truncated_is_error() {
    // Continuation bit set, but buffer ends before a terminating byte.
    let buf = [0x80u8];
    assert!(matches!(
        decode_varint32(&buf),
        Err(CodecError::Truncated { .. })
    ));
}

#[test]
fn decode_varint_malformed_past_max_bytes() {
    // 6 bytes, all with the continuation bit set: no 32-bit value needs
    // more than 5 bytes, so this must be rejected rather than silently
    // truncated.
    let buf = [0x80u8, 0x80, 0x80, 0x80, 0x80, 0x80];
    assert!(matches!(
        decode_varint32(&buf),
        Err(CodecError::MalformedVarint)
    ));
}

#[test]
fn length_prefixed_slice_round_trip() {
    let mut dst = Vec::new();
    put_length_prefixed_slice(&mut dst, b"hello world");
    let (s, consumed) = get_length_prefixed_slice(&dst).unwrap();
    assert_eq!(s, b"hello world");
    assert_eq!(consumed, dst.len());
}

#[test]
fn length_prefixed_slice_empty() {
    let mut dst = Vec::new();
    put_length_prefixed_slice(&mut dst, b"");
    let (s, consumed) = get_length_prefixed_slice(&dst).unwrap();
    assert!(s.is_empty());
    assert_eq!(consumed, 1);
}

#[test]
fn length_prefixed_slice_truncated_payload_is_error() {
    let mut dst = Vec::new();
    put_varint32(&mut dst, 10); // claims 10 bytes follow
    dst.extend_from_slice(b"short");
    assert!(matches!(
        get_length_prefixed_slice(&dst),
        Err(CodecError::Truncated { .. })
    ));
}

#[test]
fn multiple_length_prefixed_slices_in_sequence() {
    let mut dst = Vec::new();
    put_length_prefixed_slice(&mut dst, b"k1");
    put_length_prefixed_slice(&mut dst, b"v1");

    let (k, n1) = get_length_prefixed_slice(&dst).unwrap();
    assert_eq!(k, b"k1");
    let (v, n2) = get_length_prefixed_slice(&dst[n1..]).unwrap();
    assert_eq!(v, b"v1");
    assert_eq!(n1 + n2, dst.len());
}
