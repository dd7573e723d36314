//! Shared helpers for integration tests: mock portal responses and page PDFs.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

/// Copyright notice the portal stamps on every page.
pub const WATERMARK: &str =
    "Alle Rechte vorbehalten. © Ostthüringer Zeitung.  Download vom 02.01.2024 08:00";

/// Starts a mock server, or returns `None` when the sandbox forbids sockets.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if let Err(error) = std::net::TcpListener::bind("127.0.0.1:0") {
        eprintln!("skipping: cannot bind local socket ({error})");
        return None;
    }
    Some(MockServer::start().await)
}

/// One TOC row as the portal renders it.
pub fn toc_row(id: &str, resort: &str, page: u32) -> String {
    format!(
        r#"<tr class="item_{id} even">
             <td><input type="checkbox"/></td>
             <td>Artikel {id}</td>
             <td><span class="description">Vorspann</span></td>
             <td>OTZ</td>
             <td>{resort}</td>
             <td>02.01.2024</td>
             <td>S. {page}</td>
           </tr>"#
    )
}

/// A TOC listing page.
pub fn toc_page(rows: &[String]) -> String {
    format!(
        "<html><body><table class=\"toc\">{}</table></body></html>",
        rows.join("\n")
    )
}

/// An article document page carrying editions and the PDF link id.
pub fn document_page(editions: &str, pdf_link: &str) -> String {
    format!(
        r##"<html><body>
             <table>
               <tr><td class="boxFirst">Seite</td><td>Seite 1</td></tr>
               <tr><td class="boxFirst">Ressort</td><td>Lokales</td></tr>
               <tr><td class="boxFirst">Ausgabe</td><td>{editions}</td></tr>
             </table>
             <span class="boxItem"><a id="{pdf_link}" href="#">Seite als PDF</a></span>
           </body></html>"##
    )
}

/// Download console reply pointing at `path`, padded past the token length.
pub fn console_reply(path: &str) -> String {
    format!(r#"{{"short":"x","url":"{path}"}}"#)
}

/// A download path long enough to be recognized in the console reply.
pub fn download_path(article_id: &str) -> String {
    format!("/stream/pdf/{article_id}/{}", "a".repeat(120))
}

/// A one-page PDF whose rectangle width is `marker`, drawing `texts`.
pub fn page_pdf(marker: i64, texts: &[&str]) -> Vec<u8> {
    pdf(&[(marker, texts)])
}

/// A PDF with two pages, which the archive must never deliver.
pub fn two_page_pdf() -> Vec<u8> {
    pdf(&[(1, &[]), (2, &[])])
}

fn pdf(pages: &[(i64, &[&str])]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for (marker, texts) in pages {
        let mut operations = vec![
            Operation::new(
                "re",
                vec![
                    Object::Integer(10),
                    Object::Integer(10),
                    Object::Integer(*marker),
                    Object::Integer(100),
                ],
            ),
            Operation::new("S", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(10)]),
        ];
        for text in *texts {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        });
        kids.push(Object::Reference(page_id));
    }

    let count = i64::try_from(kids.len()).unwrap();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Rectangle widths of every page of `document`, in page order.
pub fn page_markers(document: &Document) -> Vec<i64> {
    document
        .get_pages()
        .values()
        .map(|id| {
            let content = Content::decode(&document.get_page_content(*id).unwrap()).unwrap();
            content
                .operations
                .iter()
                .find(|op| op.operator == "re")
                .and_then(|op| op.operands.get(2))
                .and_then(|width| width.as_i64().ok())
                .unwrap()
        })
        .collect()
}

/// Every `Tj` text of every page, in page order.
pub fn page_texts(document: &Document) -> Vec<Vec<u8>> {
    let mut texts = Vec::new();
    for id in document.get_pages().values() {
        let content = Content::decode(&document.get_page_content(*id).unwrap()).unwrap();
        for op in content.operations.iter().filter(|op| op.operator == "Tj") {
            if let Some(Object::String(bytes, _)) = op.operands.first() {
                texts.push(bytes.clone());
            }
        }
    }
    texts
}

/// Responder that stalls the first `stall_count` requests past the client
/// timeout, then answers with `body`.
pub struct StallingResponder {
    request_count: Arc<AtomicUsize>,
    stall_count: usize,
    stall: Duration,
    body: Vec<u8>,
}

impl StallingResponder {
    pub fn new(stall_count: usize, stall: Duration, body: impl Into<Vec<u8>>) -> Self {
        Self {
            request_count: Arc::new(AtomicUsize::new(0)),
            stall_count,
            stall,
            body: body.into(),
        }
    }

    /// Counter shared with the responder after it is mounted.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.request_count)
    }
}

impl Respond for StallingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        let template = ResponseTemplate::new(200).set_body_bytes(self.body.clone());
        if n < self.stall_count {
            template.set_delay(self.stall)
        } else {
            template
        }
    }
}
