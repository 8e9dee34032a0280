//! # Typesetting CLI
//!
//! Usage:
//!   typesetting input.json [--font face.ttf]
//!   echo '{ ... }' | typesetting
//!   typesetting --example > heading.json
//!
//! Logs go to stderr; set `RUST_LOG=typesetting=debug` to watch each pass.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use tracing_subscriber::EnvFilter;
use typesetting::font::GlyphMetrics;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_document_json());
        return;
    }

    let font_path = args
        .windows(2)
        .find(|w| w[0] == "--font")
        .map(|w| w[1].clone());

    let input = match args.get(1).filter(|a| !a.starts_with('-')) {
        Some(path) => fs::read_to_string(path).unwrap_or_else(|e| fail(&format!("Failed to read {path}: {e}"))),
        None => {
            let mut buf = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buf) {
                fail(&format!("Failed to read stdin: {e}"));
            }
            buf
        }
    };

    let metrics = font_path.map(|path| {
        let data = fs::read(&path).unwrap_or_else(|e| fail(&format!("Failed to read {path}: {e}")));
        GlyphMetrics::from_font_data(&data).unwrap_or_else(|e| fail(&e.to_string()))
    });

    match typesetting::fit_json(&input, metrics) {
        Ok(output) => println!("{output}"),
        Err(e) => fail(&format!("Failed to fit document: {e}")),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("✗ {message}");
    process::exit(1);
}

fn example_document_json() -> &'static str {
    r##"{
  "content": [
    { "type": "Text", "content": "Islay single malt " },
    { "type": "Element", "tag": "em", "text": "Scotch" },
    { "type": "Text", "content": " whisky, aged in sherry casks for twelve years on the shores of Loch Indaal" }
  ],
  "container": {
    "width": 420,
    "fontSize": 18,
    "lineHeight": 24,
    "advance": 0.5
  },
  "preset": "heading",
  "presets": {
    "heading": {
      "tighten": { "minScale": 0.96, "maxIterations": 6 },
      "widows": { "maxSubstitutions": 2 }
    }
  },
  "config": {
    "widows": { "minLineWidth": "25%" }
  }
}
"##
}
