use std::env;

use anyhow::{bail, Result};
use dialekt_core::{parse_expression, DialectKind, StaticProvider, Type};

/// Parse, print, dump and evaluate one expression against a tiny
/// synthetic target image.
///
/// usage: cargo run --example eval -- [c|go|java|opencl] '<expression>'
fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let dialect = match args.first().map(String::as_str) {
        Some("c") => DialectKind::C,
        Some("go") => DialectKind::Go,
        Some("java") => DialectKind::Java,
        Some("opencl") => DialectKind::OpenCl,
        _ => DialectKind::C,
    };
    if matches!(
        args.first().map(String::as_str),
        Some("c" | "go" | "java" | "opencl")
    ) {
        args.remove(0);
    }
    if args.is_empty() {
        bail!("usage: cargo run --example eval -- [c|go|java|opencl] '<expression>'");
    }
    let src = args.join(" ");

    let mut provider = StaticProvider::new(0x1000, 0x100);
    provider.define_variable("x", Type::int(), 0x1000);
    provider.poke(0x1000, &42i32.to_le_bytes());
    let int4 = Type::vector(Type::int(), 4);
    provider.define_type("int4", int4.clone());
    provider.define_variable("v", int4, 0x1010);
    for (i, n) in [0i32, 1, 2, 3].iter().enumerate() {
        provider.poke(0x1010 + 4 * i as u64, &n.to_le_bytes());
    }

    let tree = parse_expression(&src, dialect, &provider, None)?;
    println!("print: {}", tree.print());
    println!("dump:\n{}", tree.dump());
    match tree.evaluate(&provider) {
        Ok(value) => println!("value: {}  ({})", value, value.ty().display_name()),
        Err(e) => println!("evaluation error: {}", e),
    }
    Ok(())
}
