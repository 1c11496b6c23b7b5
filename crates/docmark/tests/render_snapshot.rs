use std::sync::Arc;

use docmark::app::render::{DocSource, DocumentRenderer, RenderOptions};
use docmark::domain::model::{Highlight, HighlightId, StructuralPath};
use docmark::infra::highlight::AssetCache;
use docmark::infra::markdown::PulldownConverter;
use insta::assert_snapshot;

#[test]
fn annotated_body_renders() {
    let renderer = DocumentRenderer::with_parts(
        Box::new(PulldownConverter::new()),
        Arc::new(AssetCache::load_defaults()),
        RenderOptions::default(),
    )
    .expect("renderer builds");
    let doc = DocSource {
        title: "Guide".into(),
        content: "# Guide\n\nHello world.\n\nSecond *paragraph*.\n".into(),
        file_path: None,
    };
    let highlights = [Highlight {
        id: HighlightId(1),
        title: "Guide".into(),
        path: StructuralPath::from(vec![1, 0, 0, 5]),
        created_at: None,
    }];

    let page = renderer.render(&doc, &highlights).expect("page renders");
    assert_snapshot!("annotated_body", page.body);
}
