//! End-to-end pipeline scenarios exercised through the public surface.

use stackio_core::codec::aes::AesMode;
use stackio_core::codec::sha1::DIGEST_LEN;
use stackio_core::codec::zlib::ZlibParams;
use stackio_core::typed::registry;
use stackio_core::typed::{Arg, Value};
use stackio_core::{ErrorKind, SeekFrom, Stream, copy};

const KEY_128: [u8; 16] = [
    0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
    0x3c,
];
const IV: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];

fn read_to_end(s: &Stream) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        let n = s.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    out
}

#[test]
fn hex_encode_chain_into_growable_buffer() {
    let buffer = Stream::dynamic_buffer("wb").unwrap();
    let enc = Stream::hex_encode(&buffer, "wb").unwrap();
    enc.write_all(&[0xff, 0x00, 0x10]).unwrap();
    enc.close().unwrap();
    assert_eq!(buffer.contents().unwrap(), b"ff0010");
    assert_eq!(buffer.size().unwrap(), 6);
}

#[test]
fn hex_roundtrip_both_shapes() {
    let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

    // One-shot write pipeline.
    let mid = Stream::dynamic_buffer("r+b").unwrap();
    let enc = Stream::hex_encode(&mid, "wb").unwrap();
    enc.write_all(&data).unwrap();
    enc.close().unwrap();
    mid.seek(SeekFrom::Start(0)).unwrap();

    // Byte-by-byte read pipeline.
    let dec = Stream::hex_decode(&mid, "rb").unwrap();
    let mut back = Vec::new();
    while let Some(b) = dec.getc().unwrap() {
        back.push(b);
    }
    assert_eq!(back, data);
}

#[test]
fn aes_cbc_pkcs7_hex_pipeline() {
    // Encrypt: plaintext -> pad(16) -> aes-cbc -> hex -> buffer.
    let buffer = Stream::dynamic_buffer("r+b").unwrap();
    let hex = Stream::hex_encode(&buffer, "wb").unwrap();
    let aes = Stream::aes_encrypt(&hex, &KEY_128, AesMode::Cbc, Some(IV), "wb").unwrap();
    let pad = Stream::pkcs7_pad(&aes, 16, "wb").unwrap();
    pad.puts("Hello, world!").unwrap();
    // Innermost first: the pad tail must flow through the cipher.
    pad.close().unwrap();
    aes.close().unwrap();
    hex.close().unwrap();

    let hex_text = buffer.contents().unwrap();
    // 13 bytes pad to one whole block: 16 ciphertext bytes, 32 hex chars.
    assert_eq!(hex_text.len(), 32);
    assert!(hex_text.iter().all(|b| b.is_ascii_hexdigit()));

    // The pipeline is deterministic.
    let buffer2 = Stream::dynamic_buffer("wb").unwrap();
    let hex2 = Stream::hex_encode(&buffer2, "wb").unwrap();
    let aes2 = Stream::aes_encrypt(&hex2, &KEY_128, AesMode::Cbc, Some(IV), "wb").unwrap();
    let pad2 = Stream::pkcs7_pad(&aes2, 16, "wb").unwrap();
    pad2.puts("Hello, world!").unwrap();
    pad2.close().unwrap();
    aes2.close().unwrap();
    hex2.close().unwrap();
    assert_eq!(buffer2.contents().unwrap(), hex_text);

    // Decrypt: buffer -> hex-decode -> aes-cbc-decrypt -> unpad.
    buffer.seek(SeekFrom::Start(0)).unwrap();
    let dehex = Stream::hex_decode(&buffer, "rb").unwrap();
    let deaes = Stream::aes_decrypt(&dehex, &KEY_128, AesMode::Cbc, Some(IV), "rb").unwrap();
    let unpad = Stream::pkcs7_unpad(&deaes, 16, "rb").unwrap();
    assert_eq!(read_to_end(&unpad), b"Hello, world!");
}

#[test]
fn sha1_pull_over_hex_decoded_empty_input() {
    let empty = Stream::cstring(&b""[..]);
    let dehex = Stream::hex_decode(&empty, "rb").unwrap();
    let sha = Stream::sha1(&dehex, "rb").unwrap();
    let mut digest = [0u8; DIGEST_LEN];
    let n = sha.read(&mut digest).unwrap();
    assert_eq!(n, DIGEST_LEN);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    assert_eq!(hex, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
}

#[test]
fn gzip_megabyte_roundtrip_through_copy() {
    let params = ZlibParams {
        window_bits: 31,
        ..ZlibParams::default()
    };

    // Deflate 1 MiB of zeros into g.
    let zeros = Stream::dynamic_buffer_with(vec![0u8; 1 << 20], "rb").unwrap();
    let g = Stream::dynamic_buffer("r+b").unwrap();
    let deflate = Stream::zlib_deflate(&g, params, "wb").unwrap();
    copy(&zeros, &deflate).unwrap();
    deflate.close().unwrap();
    assert!(g.size().unwrap() > 0);

    // Inflate g into a sink.
    g.seek(SeekFrom::Start(0)).unwrap();
    let inflate = Stream::zlib_inflate(&g, params, "rb").unwrap();
    let sink = Stream::dynamic_buffer("wb").unwrap();
    let n = copy(&inflate, &sink).unwrap();
    assert_eq!(n, 1 << 20);
    assert!(inflate.eof());
    let out = sink.contents().unwrap();
    assert_eq!(out.len(), 1 << 20);
    assert!(out.iter().all(|&b| b == 0));
}

#[test]
fn tee_into_two_sized_buffers() {
    let a = Stream::sized_buffer(vec![0u8; 10], "wb").unwrap();
    let b = Stream::sized_buffer(vec![0u8; 10], "wb").unwrap();
    let tee = Stream::tee(&a, &b, "wb").unwrap();

    let input: Vec<u8> = (1..=21u8).collect();
    let mut failed_at = None;
    for (i, &byte) in input.iter().enumerate() {
        if tee.putc(byte).is_err() {
            failed_at = Some(i);
            break;
        }
    }
    assert_eq!(failed_at, Some(10));
    assert!(tee.error().is_some());
    assert_eq!(a.contents().unwrap(), &input[..10]);
    assert_eq!(b.contents().unwrap(), &input[..10]);
}

#[test]
fn json_of_insertion_ordered_map() {
    registry::init();
    let mut m = Value::map();
    m.map_insert("a".into(), Value::Int(1));
    m.map_insert(
        "b".into(),
        Value::list(vec![Value::Bool(true), Value::Null, Value::str("x")]),
    );

    let out = Stream::dynamic_buffer("wb").unwrap();
    out.write_format("%{map[JSON]}", &[Arg::Value(&m)]).unwrap();
    assert_eq!(out.contents().unwrap(), br#"{"a":1,"b":[true,null,"x"]}"#);
}

#[test]
fn text_mode_line_endings() {
    // Reads fold every ending to LF.
    let src = Stream::custom(
        stackio_core::stream::mem::CStrDevice::new(&b"one\r\ntwo\rthree\n"[..]),
        "rt",
    )
    .unwrap();
    let mut folded = Vec::new();
    while let Some(b) = src.getc().unwrap() {
        folded.push(b);
    }
    assert_eq!(folded, b"one\ntwo\nthree\n");
}

#[test]
fn ungetc_honors_four_and_seek_discards() {
    let s = Stream::cstring(&b"stream"[..]);
    assert_eq!(s.getc().unwrap(), Some(b's'));
    for b in [1u8, 2, 3, 4] {
        s.ungetc(b).unwrap();
    }
    assert_eq!(s.getc().unwrap(), Some(4));
    s.seek(SeekFrom::Start(2)).unwrap();
    assert_eq!(s.getc().unwrap(), Some(b'r'));
}

#[test]
fn direction_switch_gated_by_commit() {
    let s = Stream::dynamic_buffer("r+b").unwrap();
    s.write_all(b"ab").unwrap();
    let mut buf = [0u8; 1];
    let err = s.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadForbidden);
    s.clear_err();
    s.seek(SeekFrom::Current(0)).unwrap();
    assert_eq!(s.read(&mut buf).unwrap(), 0);

    // And the symmetric case.
    s.clear_err();
    s.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(s.read(&mut buf).unwrap(), 1);
    let err = s.write(b"z").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WriteForbidden);
}

#[test]
fn sticky_error_until_cleared() {
    let s = Stream::cstring(&b"x"[..]);
    assert!(s.write(b"y").is_err());
    assert!(s.getc().is_err());
    assert!(s.seek(SeekFrom::Start(0)).is_err());
    s.clear_err();
    assert_eq!(s.getc().unwrap(), Some(b'x'));
}

#[test]
fn closing_filter_keeps_inner_position() {
    let inner = Stream::cstring(&b"abcd"[..]);
    let enc = Stream::hex_encode(&inner, "rb").unwrap();
    let mut out = [0u8; 4];
    enc.read(&mut out).unwrap(); // two source bytes consumed
    enc.close().unwrap();
    assert!(!inner.is_closed());
    assert_eq!(inner.tell(), 2);
    assert_eq!(inner.getc().unwrap(), Some(b'c'));
}

#[test]
fn limiter_window_over_buffer() {
    let inner = Stream::dynamic_buffer_with(b"0123456789".to_vec(), "r+b").unwrap();
    let window = Stream::limit(&inner, 4, 3, "rb").unwrap();
    assert_eq!(read_to_end(&window), b"456");
    assert!(window.seek(SeekFrom::Start(4)).is_err());
}

#[test]
fn concat_two_buffers_as_one_surface() {
    let a = Stream::sized_buffer(vec![0u8; 3], "wb").unwrap();
    let b = Stream::sized_buffer(vec![0u8; 16], "wb").unwrap();
    let joined = Stream::concat(&a, &b, "wb").unwrap();
    joined.write_all(b"split here").unwrap();
    assert_eq!(a.contents().unwrap(), b"spl");
    assert_eq!(b.contents().unwrap(), b"it here\0\0\0\0\0\0\0\0\0");
}

#[test]
fn aes_roundtrip_sweep() {
    // Every key length, every mode, several whole-block payload sizes.
    for key_len in [16usize, 24, 32] {
        let key: Vec<u8> = (0..key_len as u8).map(|b| b.wrapping_mul(7)).collect();
        for mode in [
            AesMode::Ecb,
            AesMode::Cbc,
            AesMode::Pcbc,
            AesMode::Cfb,
            AesMode::Ofb,
        ] {
            let iv = if mode == AesMode::Ecb { None } else { Some(IV) };
            for blocks in [1usize, 2, 5] {
                let plain: Vec<u8> = (0..blocks * 16).map(|i| (i * 31 % 251) as u8).collect();

                let mid = Stream::dynamic_buffer("r+b").unwrap();
                let enc = Stream::aes_encrypt(&mid, &key, mode, iv, "wb").unwrap();
                enc.write_all(&plain).unwrap();
                enc.close().unwrap();
                assert_eq!(mid.size().unwrap() as usize, plain.len());

                mid.seek(SeekFrom::Start(0)).unwrap();
                let dec = Stream::aes_decrypt(&mid, &key, mode, iv, "rb").unwrap();
                let back = read_to_end(&dec);
                assert_eq!(back, plain, "key={key_len} mode={mode:?} blocks={blocks}");
            }
        }
    }
}

#[test]
fn pkcs7_under_aes_many_lengths() {
    // The padding layer guarantees the cipher always sees whole blocks.
    for len in [0usize, 1, 15, 16, 17, 31, 32, 100] {
        let plain: Vec<u8> = (0..len).map(|i| i as u8).collect();

        let mid = Stream::dynamic_buffer("r+b").unwrap();
        let aes = Stream::aes_encrypt(&mid, &KEY_128, AesMode::Cbc, Some(IV), "wb").unwrap();
        let pad = Stream::pkcs7_pad(&aes, 16, "wb").unwrap();
        pad.write_all(&plain).unwrap();
        pad.close().unwrap();
        aes.close().unwrap();
        // Ciphertext is the padded length: the next multiple of 16.
        assert_eq!(mid.size().unwrap() as usize, (len / 16 + 1) * 16);

        mid.seek(SeekFrom::Start(0)).unwrap();
        let deaes = Stream::aes_decrypt(&mid, &KEY_128, AesMode::Cbc, Some(IV), "rb").unwrap();
        let unpad = Stream::pkcs7_unpad(&deaes, 16, "rb").unwrap();
        assert_eq!(read_to_end(&unpad), plain, "len={len}");
    }
}

#[cfg(not(windows))]
#[test]
fn text_mode_write_passthrough_on_posix() {
    let sink = Stream::dynamic_buffer("r+t").unwrap();
    sink.puts("a\nb\n").unwrap();
    sink.flush().unwrap();
    assert_eq!(sink.contents().unwrap(), b"a\nb\n");
}

#[test]
fn sha1_write_mode_under_gzip() {
    // Stack shapes compose: hash the compressed representation.
    let store = Stream::dynamic_buffer("wb").unwrap();
    let hash = Stream::sha1(&store, "wb").unwrap();
    let deflate = Stream::zlib_deflate(&hash, ZlibParams::default(), "wb").unwrap();
    deflate.write_all(b"payload").unwrap();
    deflate.close().unwrap();
    hash.close().unwrap();
    // The store received exactly the 20-byte digest of the zlib bytes.
    assert_eq!(store.contents().unwrap().len(), DIGEST_LEN);
}
