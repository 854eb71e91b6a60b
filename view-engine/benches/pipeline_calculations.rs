//! FILENAME: view-engine/benches/pipeline_calculations.rs
//! Benchmarks for the recompute path over a synthetic dataset.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use engine::{ColumnMeta, DataSet, DataType, RowValue};
use view_engine::definition::{
    FilterCondition, FilterOperator, GroupDescriptor, SortDescriptor, SortDirection, VirtualConfig,
};
use view_engine::pipeline::ViewPipeline;

fn synthetic_data(rows: usize) -> DataSet {
    let depts = ["Eng", "Sales", "Ops", "Legal", "HR"];
    DataSet::from_rows(
        vec![
            ColumnMeta::new("id", DataType::Number),
            ColumnMeta::new("dept", DataType::Text),
            ColumnMeta::new("name", DataType::Text),
            ColumnMeta::new("salary", DataType::Number),
        ],
        (0..rows)
            .map(|i| {
                vec![
                    RowValue::Number(i as f64),
                    RowValue::text(depts[i % depts.len()]),
                    RowValue::text(format!("employee {}", i)),
                    RowValue::Number(((i * 37) % 900) as f64 + 100.0),
                ]
            })
            .collect(),
    )
}

fn bench_filter_sort_group(c: &mut Criterion) {
    let data = synthetic_data(10_000);
    let mut pipeline = ViewPipeline::new(data);
    pipeline.set_conditions(vec![FilterCondition::new("salary", FilterOperator::GreaterThan)
        .with_value(RowValue::Number(300.0))]);
    pipeline.set_sorts(vec![
        SortDescriptor::new("dept", SortDirection::Ascending).with_index(0),
        SortDescriptor::new("salary", SortDirection::Descending).with_index(1),
    ]);
    pipeline.set_groups(vec![GroupDescriptor::new("dept", 0)]);

    c.bench_function("filter_sort_group_10k", |b| {
        b.iter(|| black_box(pipeline.recompute()))
    });
}

fn bench_search(c: &mut Criterion) {
    let data = synthetic_data(10_000);
    let mut pipeline = ViewPipeline::new(data);
    pipeline.set_search_term(Some("employee 42".into()));

    c.bench_function("indexed_search_10k", |b| {
        b.iter(|| black_box(pipeline.recompute()))
    });
}

fn bench_virtual_window(c: &mut Criterion) {
    let data = synthetic_data(50_000);
    let mut pipeline = ViewPipeline::new(data);
    pipeline.set_virtual_config(Some(VirtualConfig::default()));
    pipeline.set_container_height(600.0);
    pipeline.set_scroll_top(120_000.0);

    c.bench_function("virtual_window_50k", |b| {
        b.iter(|| black_box(pipeline.recompute()))
    });
}

criterion_group!(
    benches,
    bench_filter_sort_group,
    bench_search,
    bench_virtual_window
);
criterion_main!(benches);
