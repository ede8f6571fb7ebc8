use blueprint_dsl::{compile, parse, validate_syntax};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const DOC: &str = r#"
template "ServiceBase":
  stack:
    language = "Rust"
    web = "axum"

system "TodoApp" extends "ServiceBase":
  version = "1.0.0"
  override stack.web = "actix"

interface TodoStore:
  method save(item: TodoInput) -> UUID
  method find(id: UUID) -> Todo?
  method all() -> List[Todo]

module Persistence:
  implements = [TodoStore]
  contract:
    method save(item: TodoInput) -> UUID
    method find(id: UUID) -> Todo?
    method all() -> List[Todo]
  api:
    endpoint "GET /todos" -> List[Todo] 200
    model Todo:
      field id: UUID
      field title: str
    model TodoInput:
      field title: str

pipeline "delivery":
  step implement:
    modules = [Persistence]
    output = code
"#;

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile/full_document", |b| {
        b.iter(|| {
            let result = compile(black_box(DOC), "bench.bp");
            black_box(result.success);
        });
    });
}

fn bench_parse_only(c: &mut Criterion) {
    c.bench_function("compile/parse_only", |b| {
        b.iter(|| {
            let (document, diagnostics) = parse(black_box(DOC));
            black_box((document.statements.len(), diagnostics.len()));
        });
    });
}

fn bench_validate_syntax(c: &mut Criterion) {
    c.bench_function("compile/validate_syntax", |b| {
        b.iter(|| {
            let check = validate_syntax(black_box(DOC));
            black_box(check.valid);
        });
    });
}

criterion_group!(benches, bench_compile, bench_parse_only, bench_validate_syntax);
criterion_main!(benches);
