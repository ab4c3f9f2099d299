//! Score one candidate image against a reference.
//!
//! Run with: cargo run --release --example compare_images -- <reference> <candidate>

use std::{env, process};

use render_ssim::{compute_ssim, FloatImage, SsimConfig};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: compare_images <reference> <candidate>");
        process::exit(1);
    }

    let reference = match FloatImage::open(&args[1]) {
        Ok(img) => img,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };
    let candidate = match FloatImage::open(&args[2]) {
        Ok(img) => img,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    let config = SsimConfig::new(reference.data_range());
    match compute_ssim(&reference, &candidate, config) {
        Ok(score) => println!("SSIM: {score}"),
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}
