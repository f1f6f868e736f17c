//! The scenario suite.
//!
//! Each scenario builds a pipeline from scratch, drives it, and checks
//! the observable outcome. Failures carry a human-readable explanation
//! into the report rather than panicking the runner.

use stackio_core::codec::aes::AesMode;
use stackio_core::codec::sha1;
use stackio_core::codec::zlib::ZlibParams;
use stackio_core::typed::registry;
use stackio_core::typed::{Arg, Value};
use stackio_core::{ErrorKind, SeekFrom, Stream, copy};

/// One runnable scenario.
pub struct Scenario {
    pub name: &'static str,
    pub section: &'static str,
    pub run: fn() -> Result<(), String>,
}

/// The full suite, in presentation order.
pub fn all_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "hex_encode_chain",
            section: "codec/hex",
            run: hex_encode_chain,
        },
        Scenario {
            name: "hex_roundtrip",
            section: "codec/hex",
            run: hex_roundtrip,
        },
        Scenario {
            name: "aes_cbc_pkcs7_hex_pipeline",
            section: "codec/aes",
            run: aes_pipeline,
        },
        Scenario {
            name: "aes_known_answer",
            section: "codec/aes",
            run: aes_known_answer,
        },
        Scenario {
            name: "sha1_known_answers",
            section: "codec/sha1",
            run: sha1_known_answers,
        },
        Scenario {
            name: "sha1_pull_over_empty",
            section: "codec/sha1",
            run: sha1_pull_over_empty,
        },
        Scenario {
            name: "pkcs7_roundtrip_sweep",
            section: "codec/pkcs7",
            run: pkcs7_roundtrip_sweep,
        },
        Scenario {
            name: "gzip_megabyte_roundtrip",
            section: "codec/zlib",
            run: gzip_megabyte_roundtrip,
        },
        Scenario {
            name: "tee_sized_buffers",
            section: "codec/tee",
            run: tee_sized_buffers,
        },
        Scenario {
            name: "json_insertion_order",
            section: "typed/json",
            run: json_insertion_order,
        },
        Scenario {
            name: "ungetc_contract",
            section: "stream/core",
            run: ungetc_contract,
        },
        Scenario {
            name: "direction_switch_contract",
            section: "stream/core",
            run: direction_switch_contract,
        },
        Scenario {
            name: "sticky_error_contract",
            section: "stream/core",
            run: sticky_error_contract,
        },
        Scenario {
            name: "chain_independence",
            section: "stream/core",
            run: chain_independence,
        },
    ]
}

fn check(cond: bool, what: &str) -> Result<(), String> {
    if cond {
        Ok(())
    } else {
        Err(format!("check failed: {what}"))
    }
}

fn ok<T>(r: stackio_core::Result<T>, what: &str) -> Result<T, String> {
    r.map_err(|e| format!("{what}: {e}"))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

fn hex_encode_chain() -> Result<(), String> {
    let buffer = ok(Stream::dynamic_buffer("wb"), "open buffer")?;
    let enc = ok(Stream::hex_encode(&buffer, "wb"), "open encoder")?;
    ok(enc.write_all(&[0xff, 0x00, 0x10]), "write")?;
    ok(enc.close(), "close encoder")?;
    check(buffer.contents().unwrap_or_default() == b"ff0010", "buffer holds ff0010")?;
    check(buffer.size().map_err(|e| e.to_string())? == 6, "size is 6")
}

fn hex_roundtrip() -> Result<(), String> {
    let data: Vec<u8> = (0..=255u8).collect();
    let mid = ok(Stream::dynamic_buffer("r+b"), "open buffer")?;
    let enc = ok(Stream::hex_encode(&mid, "wb"), "open encoder")?;
    ok(enc.write_all(&data), "encode")?;
    ok(enc.close(), "close encoder")?;
    ok(mid.seek(SeekFrom::Start(0)), "rewind")?;
    let dec = ok(Stream::hex_decode(&mid, "rb"), "open decoder")?;
    let mut back = vec![0u8; 256];
    let n = ok(dec.read(&mut back), "decode")?;
    check(n == 256 && back == data, "decode(encode(b)) == b")
}

fn aes_pipeline() -> Result<(), String> {
    let key = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf,
        0x4f, 0x3c,
    ];
    let iv = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
        0x0e, 0x0f,
    ];
    let buffer = ok(Stream::dynamic_buffer("r+b"), "open buffer")?;
    let hex = ok(Stream::hex_encode(&buffer, "wb"), "open hex")?;
    let aes = ok(
        Stream::aes_encrypt(&hex, &key, AesMode::Cbc, Some(iv), "wb"),
        "open aes",
    )?;
    let pad = ok(Stream::pkcs7_pad(&aes, 16, "wb"), "open pad")?;
    ok(pad.puts("Hello, world!"), "write plaintext")?;
    ok(pad.close(), "close pad")?;
    ok(aes.close(), "close aes")?;
    ok(hex.close(), "close hex")?;
    let hex_text = buffer.contents().map_err(|e| e.to_string())?;
    check(hex_text.len() == 32, "one padded block is 32 hex chars")?;

    ok(buffer.seek(SeekFrom::Start(0)), "rewind")?;
    let dehex = ok(Stream::hex_decode(&buffer, "rb"), "open dehex")?;
    let deaes = ok(
        Stream::aes_decrypt(&dehex, &key, AesMode::Cbc, Some(iv), "rb"),
        "open deaes",
    )?;
    let unpad = ok(Stream::pkcs7_unpad(&deaes, 16, "rb"), "open unpad")?;
    let mut out = vec![0u8; 64];
    let n = ok(unpad.read(&mut out), "decrypt")?;
    check(&out[..n] == b"Hello, world!", "round trip restores plaintext")
}

fn aes_known_answer() -> Result<(), String> {
    let key = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf,
        0x4f, 0x3c,
    ];
    let plain = [
        0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93,
        0x17, 0x2a,
    ];
    let expect = [
        0x3a, 0xd7, 0x7b, 0xb4, 0x0d, 0x7a, 0x36, 0x60, 0xa8, 0x9e, 0xca, 0xf3, 0x24, 0x66,
        0xef, 0x97,
    ];
    let sink = ok(Stream::dynamic_buffer("wb"), "open buffer")?;
    let enc = ok(
        Stream::aes_encrypt(&sink, &key, AesMode::Ecb, None, "wb"),
        "open aes",
    )?;
    ok(enc.write_all(&plain), "write block")?;
    ok(enc.close(), "close")?;
    check(
        sink.contents().unwrap_or_default() == expect,
        "SP800-38A ECB-128 block 1",
    )
}

fn sha1_known_answers() -> Result<(), String> {
    let digest_hex = |data: &[u8]| -> String {
        sha1::sha1(data).iter().map(|b| format!("{b:02x}")).collect()
    };
    check(
        digest_hex(b"abc") == "a9993e364706816aba3e25717850c26c9cd0d89d",
        "SHA1(abc)",
    )?;
    check(
        digest_hex(b"") == "da39a3ee5e6b4b0d3255bfef95601890afd80709",
        "SHA1(empty)",
    )
}

fn sha1_pull_over_empty() -> Result<(), String> {
    let empty = Stream::cstring(&b""[..]);
    let dehex = ok(Stream::hex_decode(&empty, "rb"), "open dehex")?;
    let sha = ok(Stream::sha1(&dehex, "rb"), "open sha1")?;
    let mut digest = [0u8; 20];
    let n = ok(sha.read(&mut digest), "read digest")?;
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    check(
        n == 20 && hex == "da39a3ee5e6b4b0d3255bfef95601890afd80709",
        "digest of empty input",
    )
}

fn pkcs7_roundtrip_sweep() -> Result<(), String> {
    let data = b"sweep across block sizes";
    for block in [1u8, 2, 5, 16, 24, 25, 255] {
        let sink = ok(Stream::dynamic_buffer("wb"), "open buffer")?;
        let pad = ok(Stream::pkcs7_pad(&sink, block, "wb"), "open pad")?;
        ok(pad.write_all(data), "pad")?;
        ok(pad.close(), "close pad")?;
        let padded = sink.contents().map_err(|e| e.to_string())?;
        let expect_len = (data.len() / block as usize + 1) * block as usize;
        check(padded.len() == expect_len, "padded length formula")?;

        let out = ok(Stream::dynamic_buffer("wb"), "open out")?;
        let unpad = ok(Stream::pkcs7_unpad(&out, block, "wb"), "open unpad")?;
        ok(unpad.write_all(&padded), "unpad")?;
        ok(unpad.close(), "close unpad")?;
        check(
            out.contents().unwrap_or_default() == data,
            "unpad(pad(b)) == b",
        )?;
    }
    Ok(())
}

fn gzip_megabyte_roundtrip() -> Result<(), String> {
    let params = ZlibParams {
        window_bits: 31,
        ..ZlibParams::default()
    };
    let zeros = ok(
        Stream::dynamic_buffer_with(vec![0u8; 1 << 20], "rb"),
        "open source",
    )?;
    let g = ok(Stream::dynamic_buffer("r+b"), "open g")?;
    let deflate = ok(Stream::zlib_deflate(&g, params, "wb"), "open deflate")?;
    ok(copy(&zeros, &deflate), "deflate copy")?;
    ok(deflate.close(), "finish deflate")?;

    ok(g.seek(SeekFrom::Start(0)), "rewind g")?;
    let inflate = ok(Stream::zlib_inflate(&g, params, "rb"), "open inflate")?;
    let sink = ok(Stream::dynamic_buffer("wb"), "open sink")?;
    let n = ok(copy(&inflate, &sink), "inflate copy")?;
    check(n == 1 << 20, "sink received exactly 1 MiB")?;
    check(inflate.eof(), "inflate reports eof")?;
    let out = sink.contents().map_err(|e| e.to_string())?;
    check(out.iter().all(|&b| b == 0), "sink holds zeros")
}

fn tee_sized_buffers() -> Result<(), String> {
    let a = ok(Stream::sized_buffer(vec![0u8; 10], "wb"), "open a")?;
    let b = ok(Stream::sized_buffer(vec![0u8; 10], "wb"), "open b")?;
    let tee = ok(Stream::tee(&a, &b, "wb"), "open tee")?;
    let input: Vec<u8> = (1..=21u8).collect();
    let mut failed_at = None;
    for (i, &byte) in input.iter().enumerate() {
        if tee.putc(byte).is_err() {
            failed_at = Some(i);
            break;
        }
    }
    check(failed_at == Some(10), "tee errors on the 11th byte")?;
    check(tee.error().is_some(), "tee is marked errored")?;
    check(
        a.contents().unwrap_or_default() == input[..10]
            && b.contents().unwrap_or_default() == input[..10],
        "both buffers hold the first 10 bytes",
    )
}

fn json_insertion_order() -> Result<(), String> {
    registry::init();
    let mut m = Value::map();
    m.map_insert("a".into(), Value::Int(1));
    m.map_insert(
        "b".into(),
        Value::list(vec![Value::Bool(true), Value::Null, Value::str("x")]),
    );
    let out = ok(Stream::dynamic_buffer("wb"), "open buffer")?;
    ok(
        out.write_format("%{map[JSON]}", &[Arg::Value(&m)]),
        "serialize",
    )?;
    check(
        out.contents().unwrap_or_default() == br#"{"a":1,"b":[true,null,"x"]}"#[..],
        "exact JSON bytes in insertion order",
    )
}

fn ungetc_contract() -> Result<(), String> {
    let s = Stream::cstring(&b"stream"[..]);
    ok(s.getc(), "first read")?;
    for b in [1u8, 2, 3, 4] {
        ok(s.ungetc(b), "push back")?;
    }
    check(s.getc().map_err(|e| e.to_string())? == Some(4), "LIFO order")?;
    ok(s.seek(SeekFrom::Start(0)), "absolute seek")?;
    check(
        s.getc().map_err(|e| e.to_string())? == Some(b's'),
        "seek discards push-back",
    )
}

fn direction_switch_contract() -> Result<(), String> {
    let s = ok(Stream::dynamic_buffer("r+b"), "open buffer")?;
    ok(s.write_all(b"ab"), "write")?;
    let mut buf = [0u8; 1];
    let err = s.read(&mut buf).err().map(|e| e.kind());
    check(
        err == Some(ErrorKind::ReadForbidden),
        "read-after-write is forbidden",
    )?;
    s.clear_err();
    ok(s.seek(SeekFrom::Current(0)), "position-commit")?;
    check(s.read(&mut buf).is_ok(), "commit legalizes the switch")
}

fn sticky_error_contract() -> Result<(), String> {
    let s = Stream::cstring(&b"x"[..]);
    check(s.write(b"y").is_err(), "write on read-only fails")?;
    check(s.getc().is_err(), "error is sticky")?;
    s.clear_err();
    check(
        s.getc().map_err(|e| e.to_string())? == Some(b'x'),
        "clear_err restores service",
    )
}

fn chain_independence() -> Result<(), String> {
    let inner = Stream::cstring(&b"abcd"[..]);
    let enc = ok(Stream::hex_encode(&inner, "rb"), "open encoder")?;
    let mut out = [0u8; 4];
    ok(enc.read(&mut out), "read through filter")?;
    ok(enc.close(), "close filter")?;
    check(!inner.is_closed(), "inner stream stays open")?;
    check(inner.tell() == 2, "inner position reflects consumption")
}
