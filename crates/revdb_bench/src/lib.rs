//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::Rng;
use revdb_core::{Document, Object, Value};

/// Random alphanumeric text of the given length.
pub fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// A note-like body: a title, a text field of roughly `text_len` bytes,
/// a few tags and a counter.
pub fn note_body(text_len: usize) -> Object {
    let mut rng = rand::thread_rng();
    let mut body = Object::new();
    body.insert("title".into(), Value::Text(random_text(16)));
    body.insert("text".into(), Value::Text(random_text(text_len)));
    body.insert(
        "tags".into(),
        Value::Array((0..3).map(|_| Value::Text(random_text(6))).collect()),
    );
    body.insert("views".into(), Value::Integer(rng.gen_range(0..10_000)));
    body.insert("pinned".into(), Value::Bool(rng.gen()));
    body
}

/// `count` documents with ids `"{prefix}/{n:06}"`.
pub fn generate_docs(prefix: &str, count: usize, text_len: usize) -> Vec<Document> {
    (0..count)
        .map(|n| {
            let mut doc = Document::new(format!("{prefix}/{n:06}"));
            doc.body = note_body(text_len);
            doc
        })
        .collect()
}
