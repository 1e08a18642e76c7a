use std::fs;
use std::path::{Path, PathBuf};

use encoder::ndarray::Array2;
use encoder::{splade_activation, EncoderConfig, EncoderError, SimilarityFunction, SpladeEncoder};
use graph::fixtures::toy_masked_lm;
use graph::{export_model, save_model, ExportConfig};

const VOCAB: [&str; 8] = [
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "sun", "skin", "aging", "fast",
];

fn table() -> Vec<Vec<f32>> {
    (0..VOCAB.len())
        .map(|id| {
            (0..VOCAB.len())
                .map(|v| ((id * 3 + v * 5) % 7) as f32 - 3.0)
                .collect()
        })
        .collect()
}

struct Fixture {
    _dir: tempfile::TempDir,
    source: PathBuf,
    raw: PathBuf,
    pooled: PathBuf,
    vocab: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let vocab = dir.path().join("vocab.txt");
    fs::write(&vocab, VOCAB.join("\n")).unwrap();

    let source = dir.path().join("masked_lm.onnx");
    save_model(&toy_masked_lm(&table()), &source).unwrap();

    let summary = export_model(
        toy_masked_lm(&table()),
        &ExportConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        },
    )
    .unwrap();

    Fixture {
        source,
        raw: summary.raw.path,
        pooled: summary.pooled.path,
        vocab,
        _dir: dir,
    }
}

fn encoder_for(model: &Path, vocab: &Path) -> SpladeEncoder {
    SpladeEncoder::from_config(EncoderConfig {
        model_path: Some(model.to_path_buf()),
        tokenizer_path: Some(vocab.to_path_buf()),
        vocab_size: Some(VOCAB.len()),
        ..Default::default()
    })
    .unwrap()
}

/// `max_t ln(1 + relu(table[id_t]))` over `[CLS] words [SEP]`.
fn expected_row(words: &[&str]) -> Vec<f32> {
    expected_row_in(&table(), words)
}

fn expected_row_in(table: &[Vec<f32>], words: &[&str]) -> Vec<f32> {
    let mut ids = vec![2usize];
    ids.extend(
        words
            .iter()
            .map(|w| VOCAB.iter().position(|t| t == w).unwrap()),
    );
    ids.push(3);

    (0..VOCAB.len())
        .map(|v| {
            ids.iter()
                .map(|&id| splade_activation(table[id][v]))
                .fold(0.0f32, f32::max)
        })
        .collect()
}

fn assert_close(actual: &Array2<f32>, expected: &[Vec<f32>]) {
    assert_eq!(actual.nrows(), expected.len());
    for (row, want) in actual.rows().into_iter().zip(expected) {
        for (a, b) in row.iter().zip(want) {
            assert!((a - b).abs() < 1e-5, "got {a}, expected {b}");
        }
    }
}

#[test]
fn pooled_graph_matches_hand_computation() {
    let fx = fixture();
    let encoder = encoder_for(&fx.pooled, &fx.vocab);

    let emb = encoder.encode(&["sun skin", "aging fast sun"]).unwrap();
    assert_eq!(emb.shape(), (2, VOCAB.len()));
    assert_close(
        &emb.into_array(),
        &[
            expected_row(&["sun", "skin"]),
            expected_row(&["aging", "fast", "sun"]),
        ],
    );
}

#[test]
fn raw_and_source_graphs_pool_on_host_identically() {
    let fx = fixture();
    let texts = ["sun skin", "aging fast sun", "fast"];

    let pooled = encoder_for(&fx.pooled, &fx.vocab).encode(&texts).unwrap();
    let raw = encoder_for(&fx.raw, &fx.vocab).encode(&texts).unwrap();
    let source = encoder_for(&fx.source, &fx.vocab).encode(&texts).unwrap();

    let reference: Vec<Vec<f32>> = pooled.view().rows().into_iter().map(|r| r.to_vec()).collect();
    assert_close(&raw.into_array(), &reference);
    assert_close(&source.into_array(), &reference);
}

#[test]
fn padding_does_not_change_rows() {
    let fx = fixture();
    let encoder = encoder_for(&fx.pooled, &fx.vocab);

    let batched = encoder.encode(&["fast", "aging fast sun skin"]).unwrap();
    let alone = encoder.encode(&["fast"]).unwrap();
    assert_close(
        &alone.into_array(),
        &[batched.row(0).unwrap().to_vec()],
    );
}

#[test]
fn empty_input_fails_fast() {
    let fx = fixture();
    let encoder = encoder_for(&fx.pooled, &fx.vocab);
    let err = encoder.encode::<&str>(&[]).unwrap_err();
    assert!(matches!(err, EncoderError::EmptyInput));
}

#[test]
fn vocabulary_width_is_checked() {
    let fx = fixture();
    let encoder = SpladeEncoder::from_config(EncoderConfig {
        model_path: Some(fx.pooled.clone()),
        tokenizer_path: Some(fx.vocab.clone()),
        vocab_size: Some(30522),
        ..Default::default()
    })
    .unwrap();

    let err = encoder.encode(&["sun"]).unwrap_err();
    assert!(matches!(
        err,
        EncoderError::VocabMismatch {
            expected: 30522,
            found: 8
        }
    ));
}

#[test]
fn similarity_matrix_is_queries_by_documents() {
    let fx = fixture();
    let encoder = encoder_for(&fx.pooled, &fx.vocab);

    let queries = encoder.encode_query(&["aging fast"]).unwrap();
    let docs = encoder
        .encode_document(&["sun skin", "aging", "fast sun"])
        .unwrap();
    let scores = encoder.similarity(&queries, &docs).unwrap();
    assert_eq!(scores.dim(), (1, 3));

    for (j, doc) in docs.view().rows().into_iter().enumerate() {
        let dot: f32 = queries.row(0).unwrap().dot(&doc);
        assert!((scores[[0, j]] - dot).abs() < 1e-5);
    }
    assert_eq!(encoder.config().similarity, SimilarityFunction::Dot);
}

#[test]
fn decode_lists_heaviest_terms() {
    let fx = fixture();
    let encoder = encoder_for(&fx.pooled, &fx.vocab);
    let emb = encoder.encode(&["sun"]).unwrap();
    let row = emb.row(0).unwrap();

    let terms = encoder.decode(row, 3);
    assert!(terms.len() <= 3);
    assert!(terms.windows(2).all(|w| w[0].1 >= w[1].1));
    for (token, weight) in &terms {
        let id = VOCAB.iter().position(|t| *t == token.as_str()).unwrap();
        assert!((row[id] - weight).abs() < 1e-6);
    }
    assert_eq!(encoder.vocab_size(), VOCAB.len());
}

#[test]
fn token_ids_wrap_words_in_special_tokens() {
    let fx = fixture();
    let encoder = encoder_for(&fx.pooled, &fx.vocab);
    assert_eq!(encoder.token_ids("Aging sun").unwrap(), vec![2, 6, 4, 3]);
}

#[test]
fn sparse_view_agrees_with_dense_rows() {
    let fx = fixture();
    let encoder = encoder_for(&fx.pooled, &fx.vocab);
    let emb = encoder.encode(&["sun skin", "aging"]).unwrap();

    let a = emb.to_sparse(0).unwrap();
    let b = emb.to_sparse(1).unwrap();
    assert_eq!(a.nnz(), emb.active_dims(0).unwrap());
    let dense = emb.row(0).unwrap().dot(&emb.row(1).unwrap());
    assert!((a.dot(&b) - dense).abs() < 1e-5);
}

#[test]
fn unmasked_head_pools_over_padding_too() {
    let fx = fixture();
    let dir = tempfile::tempdir().unwrap();
    let summary = export_model(
        toy_masked_lm(&table()),
        &ExportConfig {
            output_dir: dir.path().to_path_buf(),
            mask_padding: false,
            ..Default::default()
        },
    )
    .unwrap();
    let encoder = encoder_for(&summary.pooled.path, &fx.vocab);

    let alone = encoder.encode(&["aging fast"]).unwrap();
    assert_close(&alone.into_array(), &[expected_row(&["aging", "fast"])]);

    // "fast" is padded with [PAD] (id 0) up to the longer text; without the
    // mask those positions join the max.
    let batched = encoder.encode(&["fast", "aging fast sun skin"]).unwrap();
    let pad: Vec<f32> = table()[0].iter().map(|&x| splade_activation(x)).collect();
    let padded: Vec<f32> = expected_row(&["fast"])
        .iter()
        .zip(&pad)
        .map(|(a, b)| a.max(*b))
        .collect();
    assert_close(
        &batched.into_array(),
        &[padded, expected_row(&["aging", "fast", "sun", "skin"])],
    );
}

#[test]
fn rewritten_model_file_is_reloaded() {
    let fx = fixture();
    let before = encoder_for(&fx.pooled, &fx.vocab).encode(&["aging fast"]).unwrap();

    let scaled: Vec<Vec<f32>> = table()
        .iter()
        .map(|row| row.iter().map(|x| x * 10.0).collect())
        .collect();
    export_model(
        toy_masked_lm(&scaled),
        &ExportConfig {
            output_dir: fx.pooled.parent().unwrap().to_path_buf(),
            ..Default::default()
        },
    )
    .unwrap();

    let after = encoder_for(&fx.pooled, &fx.vocab).encode(&["aging fast"]).unwrap();
    assert_ne!(before.view(), after.view());
    assert_close(&after.into_array(), &[expected_row_in(&scaled, &["aging", "fast"])]);
}
