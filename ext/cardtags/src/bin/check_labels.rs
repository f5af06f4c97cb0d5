use std::env;
use std::path::Path;
use std::process;

use cardtags::{CardDataset, GenerationConfig, TargetEncoder, TokenizerLoader};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <tokenizer.json|hub_repo_id> <dataset_dir> [max_length]", args[0]);
        process::exit(1);
    }

    let max_length = match args.get(3) {
        Some(value) => value.parse()?,
        None => GenerationConfig::default().max_length,
    };

    let tokenizer = if Path::new(&args[1]).is_file() {
        TokenizerLoader::from_file(&args[1])?
    } else {
        TokenizerLoader::from_hf_hub_blocking(&args[1], None)?
    };
    let dataset = CardDataset::load(&args[2], TargetEncoder::new(tokenizer, max_length))?;
    println!("Checking {} cards at max_length {}", dataset.len(), max_length);

    let mut truncated = 0;
    let mut longest = 0;
    for card in dataset.cards() {
        let encoded = dataset.encoder().encode(card)?;
        longest = longest.max(encoded.token_count);
        if encoded.truncated {
            truncated += 1;
            println!(
                "  truncated: {} ({} tokens)",
                card.image_reference().display(),
                encoded.token_count
            );
        }
    }

    println!("\nLongest target: {} tokens", longest);
    println!("Truncated: {}/{}", truncated, dataset.len());
    if truncated > 0 {
        process::exit(2);
    }
    Ok(())
}
