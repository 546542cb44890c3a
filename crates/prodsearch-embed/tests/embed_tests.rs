use prodsearch_core::config::EmbeddingSettings;
use prodsearch_embed::get_default_embedder;

fn fake_settings() -> EmbeddingSettings {
    EmbeddingSettings { use_fake: true, ..EmbeddingSettings::default() }
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = get_default_embedder(&fake_settings()).expect("embedder");
    let texts = vec!["hello world".to_string(), "Hello World  ".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim is 384");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Guard lower-cases and trims before embedding, so both inputs agree
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn empty_input_yields_zero_vector_of_configured_dimension() {
    let embedder = get_default_embedder(&fake_settings()).expect("embedder");
    for text in ["", "  ", "ab"] {
        let v = embedder.embed(text).expect("embed");
        assert_eq!(v.len(), 384);
        assert!(v.iter().all(|x| *x == 0.0), "zero vector for {text:?}");
    }
}
