//! Generated PDF documents for unit tests.

#![allow(clippy::unwrap_used)]

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

/// A document with one page per entry of `pages`, each drawing its text runs.
///
/// Resources and media box live on the page tree node, so pages inherit them.
pub(crate) fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
    let marked: Vec<(&[&str], i64)> = pages.iter().map(|texts| (*texts, 200)).collect();
    build(&marked)
}

/// A one-page document whose rectangle width is `marker`.
pub(crate) fn marked_page_pdf(marker: i64) -> Vec<u8> {
    build(&[(&[], marker)])
}

fn build(pages: &[(&[&str], i64)]) -> Vec<u8> {
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
    for (texts, marker) in pages {
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
            Operation::new("Td", vec![Object::Integer(50), Object::Integer(700)]),
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
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
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

/// A one-page document drawing `texts`.
pub(crate) fn single_page_pdf(texts: &[&str]) -> Vec<u8> {
    pdf_with_pages(&[texts])
}

/// Text runs of the first page of `document`, in drawing order.
pub(crate) fn page_texts(document: &Document) -> Vec<String> {
    let page_id = *document.get_pages().values().next().unwrap();
    let content = Content::decode(&document.get_page_content(page_id).unwrap()).unwrap();
    content
        .operations
        .iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| match op.operands.first() {
            Some(Object::String(bytes, _)) => Some(super::watermark::decode_pdf_string(bytes)),
            _ => None,
        })
        .collect()
}

/// Rectangle width drawn on `page_id`.
pub(crate) fn page_marker(document: &Document, page_id: lopdf::ObjectId) -> i64 {
    let content = Content::decode(&document.get_page_content(page_id).unwrap()).unwrap();
    content
        .operations
        .iter()
        .find(|op| op.operator == "re")
        .and_then(|op| op.operands.get(2))
        .and_then(|width| width.as_i64().ok())
        .unwrap()
}
