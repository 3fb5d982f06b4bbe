use criterion::{Criterion, criterion_group, criterion_main};
use doxprep::ci::boards::PioProject;
use doxprep::docs::prefilter::filter_str;
use doxprep::docs::{FileContext, convert_name_to_file, convert_ref_to_name, escape};
use std::hint::black_box;

const MOCK_README: &str = r#"# ModularSensors

[//]: # ( @tableofcontents )

[//]: # ( Start GitHub Only )
- [ModularSensors](#modularsensors)
  - [Getting Started](#getting-started)
[//]: # ( End GitHub Only )

## Getting Started <!-- {#getting_started} -->

See the [logger base](https://envirodiy.github.io/ModularSensors/class_logger_base.html)
and [the change log](#change-log).

```cpp
Logger dataLogger(LoggerID, loggingInterval, &varArray);
```

```mermaid
graph TD
  A --> B
```

### Thanks @someone
"#;

const MOCK_INI: &str = r#"
[platformio]
description = ModularSensors CI

[env]
framework = arduino
lib_deps =
    envirodiy/SDI-12

[env:mayfly]
board = mayfly
platform = atmelavr

[env:esp32dev]
board = esp32dev
platform = espressif32
"#;

fn bench_filter_readme(c: &mut Criterion) {
    let input = MOCK_README.repeat(20);
    c.bench_function("filter_readme", |b| {
        b.iter(|| {
            let ctx = FileContext::named("ReadMe", Some("ModularSensors".to_string()));
            filter_str(ctx, black_box(&input)).unwrap()
        })
    });
}

fn bench_escape(c: &mut Criterion) {
    c.bench_function("escape_name", |b| {
        b.iter(|| escape(black_box("ModularSensors::LoggerBase::setRTClock(int8_t)"), false, false))
    });
}

fn bench_long_file_name(c: &mut Criterion) {
    let name = "VeryLongTemplate<".repeat(12);
    c.bench_function("convert_name_to_file_hashed", |b| {
        b.iter(|| convert_name_to_file(black_box(&name), false, false))
    });
}

fn bench_ref_to_name(c: &mut Criterion) {
    c.bench_function("convert_ref_to_name", |b| {
        b.iter(|| convert_ref_to_name(black_box("class_variable_array-members")))
    });
}

fn bench_parse_platformio_ini(c: &mut Criterion) {
    c.bench_function("parse_platformio_ini", |b| {
        b.iter(|| PioProject::parse(black_box(MOCK_INI)))
    });
}

criterion_group!(
    benches,
    bench_filter_readme,
    bench_escape,
    bench_long_file_name,
    bench_ref_to_name,
    bench_parse_platformio_ini
);
criterion_main!(benches);
