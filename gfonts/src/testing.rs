//! Test fixtures: a loopback HTTP server and synthetic TrueType fonts

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use fontcull_write_fonts::FontBuilder;
use fontcull_write_fonts::tables::cmap::Cmap;
use fontcull_write_fonts::types::{GlyphId, Tag};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub(crate) struct FixtureResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl FixtureResponse {
    pub(crate) fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
        }
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    pub(crate) fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Serves canned responses by path and records every request head it sees.
pub(crate) struct FixtureServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FixtureServer {
    pub(crate) async fn start(routes: Vec<(&str, FixtureResponse)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fixture server");
        let addr = listener.local_addr().expect("fixture server has no address");
        let routes: Arc<HashMap<String, FixtureResponse>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, response)| (path.to_string(), response))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };

                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&head).to_string();
                recorded.lock().unwrap().push(head.clone());

                let target = head.split_whitespace().nth(1).unwrap_or("/");
                let path = target.split('?').next().unwrap_or(target);
                let response = routes
                    .get(path)
                    .cloned()
                    .unwrap_or_else(|| FixtureResponse::status(404, "not found"));

                let mut reply = format!(
                    "HTTP/1.1 {} Fixture\r\nContent-Length: {}\r\nConnection: close\r\n",
                    response.status,
                    response.body.len()
                );
                for (name, value) in &response.headers {
                    reply.push_str(&format!("{name}: {value}\r\n"));
                }
                reply.push_str("\r\n");

                let mut bytes = reply.into_bytes();
                bytes.extend_from_slice(&response.body);
                let _ = stream.write_all(&bytes).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { addr, requests }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// One glyph of a synthetic font
pub(crate) struct TestGlyph {
    pub codepoint: Option<char>,
    pub advance: u16,
    pub data: Vec<u8>,
}

impl TestGlyph {
    pub(crate) fn empty(codepoint: Option<char>, advance: u16) -> Self {
        Self {
            codepoint,
            advance,
            data: Vec::new(),
        }
    }

    /// A single-contour triangle spanning (0,0)..(size,size)
    pub(crate) fn triangle(codepoint: char, size: i16) -> Self {
        let mut data = Vec::new();
        for v in [1i16, 0, 0, size, size] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(&2u16.to_be_bytes()); // endPtsOfContours
        data.extend_from_slice(&0u16.to_be_bytes()); // instructionLength
        data.extend_from_slice(&[0x01, 0x01, 0x01]); // on-curve, long deltas
        for dx in [0i16, size, -size / 2] {
            data.extend_from_slice(&dx.to_be_bytes());
        }
        for dy in [0i16, 0, size] {
            data.extend_from_slice(&dy.to_be_bytes());
        }
        Self {
            codepoint: Some(codepoint),
            advance: size as u16,
            data,
        }
    }

    /// A composite glyph with one component, offset by word-sized arguments
    pub(crate) fn composite(codepoint: char, component: u16) -> Self {
        let mut data = Vec::new();
        for v in [-1i16, 0, 0, 100, 100] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(&0x0003u16.to_be_bytes()); // ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES
        data.extend_from_slice(&component.to_be_bytes());
        data.extend_from_slice(&10i16.to_be_bytes());
        data.extend_from_slice(&20i16.to_be_bytes());
        Self {
            codepoint: Some(codepoint),
            advance: 100,
            data,
        }
    }
}

/// Assemble a minimal glyf-flavoured font: head, hhea, maxp, hmtx, loca (long), glyf, cmap, post.
pub(crate) fn build_font(units_per_em: u16, glyphs: &[TestGlyph]) -> Vec<u8> {
    let num_glyphs = glyphs.len() as u16;

    let mut head = Vec::new();
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // version
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // fontRevision
    head.extend_from_slice(&0u32.to_be_bytes()); // checkSumAdjustment
    head.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes()); // magicNumber
    head.extend_from_slice(&0u16.to_be_bytes()); // flags
    head.extend_from_slice(&units_per_em.to_be_bytes());
    head.extend_from_slice(&[0u8; 16]); // created, modified
    for v in [0i16, 0, 100, 100] {
        head.extend_from_slice(&v.to_be_bytes());
    }
    head.extend_from_slice(&0u16.to_be_bytes()); // macStyle
    head.extend_from_slice(&8u16.to_be_bytes()); // lowestRecPPEM
    head.extend_from_slice(&2i16.to_be_bytes()); // fontDirectionHint
    head.extend_from_slice(&1i16.to_be_bytes()); // indexToLocFormat
    head.extend_from_slice(&0i16.to_be_bytes()); // glyphDataFormat

    let advance_max = glyphs.iter().map(|g| g.advance).max().unwrap_or(0);
    let mut hhea = Vec::new();
    hhea.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    for v in [800i16, -200, 0] {
        hhea.extend_from_slice(&v.to_be_bytes());
    }
    hhea.extend_from_slice(&advance_max.to_be_bytes());
    for v in [0i16, 0, 100, 1, 0, 0, 0, 0, 0, 0, 0] {
        hhea.extend_from_slice(&v.to_be_bytes());
    }
    hhea.extend_from_slice(&num_glyphs.to_be_bytes());

    let mut maxp = Vec::new();
    maxp.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    maxp.extend_from_slice(&num_glyphs.to_be_bytes());
    for v in [3u16, 1, 0, 0, 2, 0, 0, 0, 0, 0, 0, 1, 1] {
        maxp.extend_from_slice(&v.to_be_bytes());
    }

    let mut hmtx = Vec::new();
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    let mut mappings = BTreeMap::new();
    for (gid, glyph) in glyphs.iter().enumerate() {
        hmtx.extend_from_slice(&glyph.advance.to_be_bytes());
        hmtx.extend_from_slice(&0i16.to_be_bytes());
        loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());
        glyf.extend_from_slice(&glyph.data);
        while glyf.len() % 4 != 0 {
            glyf.push(0);
        }
        if let Some(c) = glyph.codepoint {
            mappings.insert(c, GlyphId::new(gid as u32));
        }
    }
    loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());

    let mut post = Vec::new();
    post.extend_from_slice(&0x0003_0000u32.to_be_bytes());
    post.extend_from_slice(&[0u8; 28]);

    let cmap = Cmap::from_mappings(mappings).expect("test cmap has conflicts");

    let mut builder = FontBuilder::new();
    builder.add_table(&cmap).expect("failed to add test cmap");
    builder
        .add_raw(Tag::new(b"head"), head)
        .add_raw(Tag::new(b"hhea"), hhea)
        .add_raw(Tag::new(b"maxp"), maxp)
        .add_raw(Tag::new(b"hmtx"), hmtx)
        .add_raw(Tag::new(b"loca"), loca)
        .add_raw(Tag::new(b"glyf"), glyf)
        .add_raw(Tag::new(b"post"), post);
    builder.build()
}

/// Two disjoint subsets in the shape Google Fonts serves them: both start with .notdef and space.
pub(crate) fn latin_and_greek_subsets() -> (Vec<u8>, Vec<u8>) {
    let latin = build_font(
        1000,
        &[
            TestGlyph::empty(None, 500),
            TestGlyph::empty(Some(' '), 250),
            TestGlyph::triangle('A', 600),
            TestGlyph::triangle('B', 620),
        ],
    );
    let greek = build_font(
        1000,
        &[
            TestGlyph::empty(None, 500),
            TestGlyph::empty(Some(' '), 250),
            TestGlyph::triangle('Ω', 700),
        ],
    );
    (latin, greek)
}
