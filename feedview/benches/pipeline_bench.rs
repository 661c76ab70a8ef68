//! Benchmarks for change classification and rendering.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use feedview::prelude::*;
use feedview::testing::{episode_attributes, episode_insert, episode_move, view_modify};

fn classification_benchmark(c: &mut Criterion) {
    let episodes = ChangeBatch::new(
        (0..500)
            .map(|i| {
                if i % 10 == 0 {
                    episode_move(&format!("e{i}"), "f1", &format!("f{}", i % 7))
                } else {
                    episode_insert(&format!("f{}", i % 25), &format!("e{i}"))
                }
            })
            .collect(),
    );
    let views = ChangeBatch::new(
        (0..500)
            .map(|i| {
                view_modify(&ViewRecord::new(
                    ViewKey::new(format!("f{}", i % 25), format!("v{}", i % 40)),
                    "x",
                ))
            })
            .collect(),
    );

    c.bench_function("classify_episode_batch", |b| {
        b.iter(|| FeedSet::from_batch(black_box(&episodes)))
    });
    c.bench_function("classify_view_batch", |b| {
        b.iter(|| ViewChangeSet::from_batch(black_box(&views)))
    });
}

fn render_benchmark(c: &mut Criterion) {
    let settings = PipelineSettings::default().with_default_bucket("podcasts");
    let renderer = TemplateRenderer::new(&settings);
    let episodes: Vec<EpisodeRecord> = (0..200)
        .filter_map(|i| {
            EpisodeRecord::from_attributes(episode_attributes(
                "f1",
                &format!("e{i}"),
                json!({"title": format!("Episode {i} & friends"), "duration": i * 60}),
            ))
            .ok()
        })
        .collect();

    let aggregate = ViewRecord::new(
        ViewKey::new("f1", "index"),
        "<h1><%- view.title %></h1><p><%= episodes.length %> episodes</p><p><%- episodes[0].title %></p>",
    )
    .with_field("title", json!("Rust & Friends"));
    let per_item = ViewRecord::new(
        ViewKey::new("f1", "pages"),
        "<h1><%- episode.title %></h1><span><%= episode.duration %></span>",
    )
    .with_filename_template("<%= episode.episodeId %>.html")
    .with_render_each(true);

    c.bench_function("render_aggregate", |b| {
        b.iter(|| renderer.render(black_box(&aggregate), black_box(&episodes)))
    });
    c.bench_function("render_per_item", |b| {
        b.iter(|| renderer.render(black_box(&per_item), black_box(&episodes)))
    });
}

criterion_group!(benches, classification_benchmark, render_benchmark);
criterion_main!(benches);
